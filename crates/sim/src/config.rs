//! Application configuration
//!
//! Configuration is loaded from multiple sources with the following priority (lowest to highest):
//! 1. `config/default.toml` (version controlled)
//! 2. `config/user.toml` (gitignored, user overrides)
//! 3. Environment variables (`ROBOVIS_SECTION__KEY`)
//!
//! Every field has a default, so a missing file or section falls back to the
//! built-in debugging setup.

use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("configuration error: {0}")]
pub struct ConfigError(#[from] Box<figment::Error>);

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        Self(Box::new(e))
    }
}

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub scene: SceneConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub robot: RobotConfig,
    #[serde(default)]
    pub drive: DriveConfig,
    #[serde(default)]
    pub demo: DemoConfig,
    #[serde(default)]
    pub debug: DebugConfig,
}

impl AppConfig {
    /// Load configuration from `config/` in the working directory.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific config directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();
        let default_path = config_dir.join("default.toml");
        let user_path = config_dir.join("user.toml");

        let mut figment = Figment::new();
        if default_path.exists() {
            figment = figment.merge(Toml::file(&default_path));
        }
        if user_path.exists() {
            figment = figment.merge(Toml::file(&user_path));
        }

        // ROBOVIS_ROBOT__URDF_PATH=foo.urdf -> robot.urdf_path = "foo.urdf"
        figment = figment.merge(Env::prefixed("ROBOVIS_").split("__"));

        Ok(figment.extract()?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "robovis".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

/// Physics scene and lighting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Physics timestep (s)
    pub timestep: f64,
    pub gravity: [f64; 3],
    /// Ground plane altitude; `None` leaves the scene without a ground.
    pub ground_altitude: Option<f64>,
    pub ambient_light: [f32; 3],
    /// Direction the light travels (Z-up world frame)
    pub light_direction: [f64; 3],
    pub light_color: [f32; 3],
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            timestep: 1.0 / 500.0,
            gravity: [0.0, 0.0, -9.81],
            ground_altitude: Some(0.0),
            ambient_light: [0.5, 0.5, 0.5],
            light_direction: [0.0, 1.0, -1.0],
            light_color: [0.5, 0.5, 0.5],
        }
    }
}

/// Initial viewer camera, Z-up world frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub xyz: [f64; 3],
    /// Roll, pitch, yaw (rad)
    pub rpy: [f64; 3],
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            xyz: [-2.0, 0.0, 1.0],
            rpy: [0.0, -0.3, 0.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    pub urdf_path: PathBuf,
    pub fix_root_link: bool,
    pub load_multiple_collisions_from_file: bool,
    pub scale: f64,
    pub root_position: [f64; 3],
    /// Root orientation quaternion (w, x, y, z)
    pub root_orientation: [f64; 4],
    /// Initial joint positions, one per active joint
    pub init_qpos: Vec<f64>,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            urdf_path: PathBuf::from(
                "ManiSkill2_real2sim/mani_skill2_real2sim/assets/descriptions/panda_robotiq_85_alt_2.urdf",
            ),
            fix_root_link: true,
            load_multiple_collisions_from_file: true,
            scale: 1.0,
            root_position: [0.0, 0.0, 0.06205],
            root_orientation: [1.0, 0.0, 0.0, 0.0],
            init_qpos: vec![
                0.0, 0.003, -0.002, -0.944, 0.019, 1.195, 0.005, -0.021, -0.00, -0.00, -0.022,
                0.001, 0.017,
            ],
        }
    }
}

/// PD drive applied to every active joint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    pub stiffness: f64,
    pub damping: f64,
    pub force_limit: f64,
    /// Drive toward the initial qpos. When off, the drive target is left
    /// at zero and the drives pull the robot toward the zero configuration.
    pub track_initial_qpos: bool,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            stiffness: 1e5,
            damping: 1e3,
            force_limit: f64::INFINITY,
            track_initial_qpos: false,
        }
    }
}

/// Per-frame stepping behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Set `qf` to the passive force before every step
    pub balance_passive_force: bool,
    pub steps_per_frame: u32,
    /// Print target and current qpos before every step
    pub print_qpos: bool,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            balance_passive_force: true,
            steps_per_frame: 4,
            print_qpos: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level (error, warn, info, debug, trace); `RUST_LOG` overrides it
    pub log_level: String,
    /// Show collision shapes at startup
    pub show_collisions: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            show_collisions: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.scene.timestep, 1.0 / 500.0);
        assert_eq!(config.camera.xyz, [-2.0, 0.0, 1.0]);
        assert_eq!(config.robot.init_qpos.len(), 13);
        assert!(config.robot.fix_root_link);
        assert_eq!(config.drive.stiffness, 1e5);
        assert!(!config.drive.track_initial_qpos);
        assert_eq!(config.demo.steps_per_frame, 4);
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml = toml::to_string(&config).unwrap();
        assert!(toml.contains("urdf_path"));
        assert!(toml.contains("steps_per_frame"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("default.toml"),
            "[demo]\nsteps_per_frame = 2\n\n[robot]\nfix_root_link = false\n",
        )
        .unwrap();
        let config = AppConfig::load_from(dir.path()).unwrap();
        assert_eq!(config.demo.steps_per_frame, 2);
        assert!(config.demo.balance_passive_force);
        assert!(!config.robot.fix_root_link);
        assert_eq!(config.robot.root_position, [0.0, 0.0, 0.06205]);
    }

    #[test]
    fn test_user_file_overrides_default() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("default.toml"), "[drive]\ndamping = 10.0\n").unwrap();
        std::fs::write(dir.path().join("user.toml"), "[drive]\ndamping = 20.0\n").unwrap();
        let config = AppConfig::load_from(dir.path()).unwrap();
        assert_eq!(config.drive.damping, 20.0);
    }

    #[test]
    fn test_bad_type_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("default.toml"), "[demo]\nsteps_per_frame = \"four\"\n")
            .unwrap();
        assert!(AppConfig::load_from(dir.path()).is_err());
    }
}
