//! wgpu rendering for robovis: render context, orbit camera, lit mesh
//! pipeline and the interactive [`Viewer`].

pub mod camera;
pub mod context;
pub mod mesh;
pub mod pipelines;
pub mod primitives;
pub mod viewer;

pub use camera::OrbitCamera;
pub use context::{RenderContext, RenderError};
pub use viewer::Viewer;
