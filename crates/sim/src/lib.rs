//! robovis: load a URDF robot, hold it with PD drives and passive-force
//! compensation, and watch it in an interactive viewer.

pub mod config;
pub mod demo;

pub use config::{AppConfig, ConfigError};
pub use demo::{Demo, DemoError};
