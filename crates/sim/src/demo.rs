//! Demo driver: scene setup, robot loading and the per-frame step loop.

use std::io::Write;
use std::path::Path;

use nalgebra::Vector3;
use robovis_core::{Pose, PoseError};
use robovis_physics::{ArticulationId, PhysicsError, RenderSnapshot, Scene, SceneConfig as PhysicsSceneConfig};
use robovis_urdf::{UrdfError, UrdfLoader};
use thiserror::Error;

use crate::config::AppConfig;

#[derive(Debug, Error)]
pub enum DemoError {
    #[error("failed to load robot: {0}")]
    Urdf(#[from] UrdfError),

    #[error("simulation error: {0}")]
    Physics(#[from] PhysicsError),

    #[error("invalid root pose: {0}")]
    Pose(#[from] PoseError),

    #[error("failed to write diagnostics: {0}")]
    Io(#[from] std::io::Error),

    #[error("init_qpos has {got} entries but the robot has {expected} active joints")]
    QposLength { expected: usize, got: usize },
}

pub type Result<T> = std::result::Result<T, DemoError>;

/// A scene holding one driven robot.
pub struct Demo {
    scene: Scene,
    robot: ArticulationId,
    /// Configured initial qpos, reported as the target on every step.
    target_qpos: Vec<f64>,
    balance_passive_force: bool,
    steps_per_frame: u32,
    print_qpos: bool,
    frames: u64,
}

impl Demo {
    /// Build the scene and load the configured URDF.
    ///
    /// The link list and active joints are written to `out`.
    pub fn new(config: &AppConfig, out: &mut impl Write) -> Result<Self> {
        let mut scene = Self::build_scene(config)?;
        let robot = Self::loader(config).load(&mut scene, &config.robot.urdf_path)?;
        Self::setup(scene, robot, config, out)
    }

    /// Same as [`Demo::new`] with the robot given as URDF text. Relative mesh
    /// paths resolve against `base_dir`.
    pub fn from_urdf_str(
        config: &AppConfig,
        xml: &str,
        base_dir: &Path,
        out: &mut impl Write,
    ) -> Result<Self> {
        let mut scene = Self::build_scene(config)?;
        let articulation = Self::loader(config).build_str(xml, base_dir)?;
        let robot = scene.add_articulation(articulation);
        Self::setup(scene, robot, config, out)
    }

    fn build_scene(config: &AppConfig) -> Result<Scene> {
        let sc = &config.scene;
        let mut scene = Scene::new(PhysicsSceneConfig {
            gravity: Vector3::from(sc.gravity),
            default_timestep: sc.timestep,
        });
        scene.set_timestep(sc.timestep)?;
        if let Some(altitude) = sc.ground_altitude {
            scene.add_ground(altitude);
        }
        scene.set_ambient_light(sc.ambient_light);
        scene.add_directional_light(Vector3::from(sc.light_direction), sc.light_color);
        Ok(scene)
    }

    fn loader(config: &AppConfig) -> UrdfLoader {
        UrdfLoader::new()
            .with_fix_root_link(config.robot.fix_root_link)
            .with_multiple_collisions(config.robot.load_multiple_collisions_from_file)
            .with_scale(config.robot.scale)
    }

    fn setup(
        mut scene: Scene,
        robot: ArticulationId,
        config: &AppConfig,
        out: &mut impl Write,
    ) -> Result<Self> {
        let root_pose = Pose::new(config.robot.root_position, config.robot.root_orientation)?;
        let drive = &config.drive;
        let init_qpos = &config.robot.init_qpos;

        let art = scene.articulation_mut(robot)?;
        writeln!(out, "{:?}", art.link_names())?;
        writeln!(out, "active joints {:?}", art.active_joint_names())?;

        if init_qpos.len() != art.dof() {
            return Err(DemoError::QposLength {
                expected: art.dof(),
                got: init_qpos.len(),
            });
        }

        art.set_root_pose(root_pose);
        art.set_qpos(init_qpos)?;
        art.set_drive_property_all(drive.stiffness, drive.damping, drive.force_limit);
        // Without tracking the drive target stays at its zero default.
        if drive.track_initial_qpos {
            art.set_drive_target(init_qpos)?;
        }

        log::info!(
            "robot {} ready: {} links, {} dof, root {}",
            art.name(),
            art.links().len(),
            art.dof(),
            if art.root_fixed() { "fixed" } else { "floating" }
        );

        Ok(Self {
            scene,
            robot,
            target_qpos: init_qpos.clone(),
            balance_passive_force: config.demo.balance_passive_force,
            steps_per_frame: config.demo.steps_per_frame,
            print_qpos: config.demo.print_qpos,
            frames: 0,
        })
    }

    /// Run one frame's worth of physics steps and return the resulting link
    /// poses for rendering.
    pub fn step_frame(&mut self, out: &mut impl Write) -> Result<RenderSnapshot> {
        let g = self.scene.gravity();
        for _ in 0..self.steps_per_frame {
            let art = self.scene.articulation_mut(self.robot)?;
            if self.balance_passive_force {
                let qf = art.compute_passive_force(true, true, &g);
                art.set_qf(&qf)?;
            }
            if self.print_qpos {
                writeln!(out, "target qpos {:?}", self.target_qpos)?;
                writeln!(out, "current qpos {:?}", art.qpos())?;
            }
            self.scene.step()?;
        }
        self.frames += 1;
        Ok(self.scene.update_render())
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn robot(&self) -> ArticulationId {
        self.robot
    }

    /// Number of completed frames.
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    // Two-joint arm on a one-wheel base.
    const TEST_ROBOT: &str = r#"
        <robot name="test_bot">
          <link name="base">
            <inertial><mass value="5.0"/><inertia ixx="0.1" iyy="0.1" izz="0.1" ixy="0" ixz="0" iyz="0"/></inertial>
            <visual><geometry><box size="0.4 0.4 0.1"/></geometry></visual>
          </link>
          <link name="wheel">
            <inertial><mass value="0.5"/><inertia ixx="0.01" iyy="0.01" izz="0.01" ixy="0" ixz="0" iyz="0"/></inertial>
            <visual><geometry><cylinder radius="0.05" length="0.02"/></geometry></visual>
          </link>
          <link name="upper">
            <inertial><origin xyz="0 0 0.15"/><mass value="1.0"/><inertia ixx="0.01" iyy="0.01" izz="0.001" ixy="0" ixz="0" iyz="0"/></inertial>
            <visual><geometry><cylinder radius="0.03" length="0.3"/></geometry></visual>
          </link>
          <link name="lower">
            <inertial><origin xyz="0 0 0.1"/><mass value="0.5"/><inertia ixx="0.005" iyy="0.005" izz="0.0005" ixy="0" ixz="0" iyz="0"/></inertial>
            <visual><geometry><sphere radius="0.04"/></geometry></visual>
          </link>
          <joint name="joint_wheel" type="continuous">
            <parent link="base"/><child link="wheel"/>
            <origin xyz="0.2 0 0"/><axis xyz="0 1 0"/>
          </joint>
          <joint name="joint_shoulder" type="revolute">
            <parent link="base"/><child link="upper"/>
            <origin xyz="0 0 0.05"/><axis xyz="0 1 0"/>
            <limit lower="-2" upper="2" effort="100" velocity="1"/>
          </joint>
          <joint name="joint_elbow" type="revolute">
            <parent link="upper"/><child link="lower"/>
            <origin xyz="0 0 0.3"/><axis xyz="0 1 0"/>
            <limit lower="-2" upper="2" effort="100" velocity="1"/>
          </joint>
        </robot>
    "#;

    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.robot.init_qpos = vec![0.0, 0.3, -0.5];
        config
    }

    fn build(config: &AppConfig) -> (Demo, String) {
        let mut out = Vec::new();
        let demo = Demo::from_urdf_str(config, TEST_ROBOT, Path::new("."), &mut out).unwrap();
        (demo, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_setup_prints_links_and_poses_robot() {
        let config = test_config();
        let (demo, out) = build(&config);
        assert!(out.contains("\"base\""));
        assert!(out.contains("\"lower\""));
        assert!(out.contains("joint_elbow"));

        let scene = demo.scene();
        assert_relative_eq!(scene.timestep(), 0.002);
        assert!(scene.ground().is_some());
        assert_eq!(scene.lights().directional.len(), 1);

        let art = scene.articulation(demo.robot()).unwrap();
        assert!(art.root_fixed());
        assert_eq!(art.qpos(), vec![0.0, 0.3, -0.5]);
        assert_eq!(art.drive_target(), vec![0.0; 3]);
        assert_relative_eq!(art.root_pose().p.z, 0.06205);
    }

    #[test]
    fn test_tracking_sets_drive_target_to_init_qpos() {
        let mut config = test_config();
        config.drive.track_initial_qpos = true;
        let (demo, _) = build(&config);
        let art = demo.scene().articulation(demo.robot()).unwrap();
        assert_eq!(art.drive_target(), vec![0.0, 0.3, -0.5]);
    }

    #[test]
    fn test_default_drives_pull_toward_zero() {
        let config = test_config();
        let (mut demo, _) = build(&config);

        let mut out = Vec::new();
        demo.step_frame(&mut out).unwrap();
        let out = String::from_utf8(out).unwrap();
        let first = out.lines().next().unwrap();
        assert_eq!(first, format!("target qpos {:?}", config.robot.init_qpos));

        let mut sink = std::io::sink();
        for _ in 0..49 {
            demo.step_frame(&mut sink).unwrap();
        }
        let art = demo.scene().articulation(demo.robot()).unwrap();
        assert_eq!(art.drive_target(), vec![0.0; 3]);
        for q in art.qpos() {
            assert!(q.abs() < 1e-2, "joint did not settle at zero: {q}");
        }
        // The printed target stays the configured qpos.
        let mut out = Vec::new();
        demo.step_frame(&mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().starts_with("target qpos [0.0, 0.3, -0.5]"));
    }

    #[test]
    fn test_floating_root_falls_while_joints_are_balanced() {
        let mut config = test_config();
        config.robot.fix_root_link = false;
        config.drive.track_initial_qpos = true;
        let (mut demo, _) = build(&config);
        assert!(!demo.scene().articulation(demo.robot()).unwrap().root_fixed());

        let snapshot = demo.step_frame(&mut std::io::sink()).unwrap();
        let art = demo.scene().articulation(demo.robot()).unwrap();

        assert!(art.root_pose().p.z < 0.06205);
        assert!(snapshot.poses(demo.robot()).unwrap()[0].translation.z < 0.06205);
        let qf = art.qf();
        assert_eq!(qf.len(), 3);
        assert!(qf[1].abs() > 1e-3, "shoulder gravity load not applied: {qf:?}");
    }

    #[test]
    fn test_qpos_length_mismatch_is_rejected() {
        let mut config = test_config();
        config.robot.init_qpos = vec![0.0; 13];
        let mut out = Vec::new();
        let err = Demo::from_urdf_str(&config, TEST_ROBOT, Path::new("."), &mut out)
            .err()
            .unwrap();
        assert!(matches!(err, DemoError::QposLength { expected: 3, got: 13 }));
    }

    #[test]
    fn test_bad_root_orientation_is_rejected() {
        let mut config = test_config();
        config.robot.root_orientation = [0.0; 4];
        let mut out = Vec::new();
        let err = Demo::from_urdf_str(&config, TEST_ROBOT, Path::new("."), &mut out)
            .err()
            .unwrap();
        assert!(matches!(err, DemoError::Pose(_)));
    }

    #[test]
    fn test_missing_urdf_file_is_an_error() {
        let mut config = test_config();
        config.robot.urdf_path = "does/not/exist.urdf".into();
        let mut out = Vec::new();
        assert!(matches!(Demo::new(&config, &mut out), Err(DemoError::Urdf(_))));
    }

    #[test]
    fn test_step_frame_runs_four_steps_and_prints_qpos() {
        let config = test_config();
        let (mut demo, _) = build(&config);
        let mut out = Vec::new();
        let snapshot = demo.step_frame(&mut out).unwrap();
        let out = String::from_utf8(out).unwrap();

        assert_eq!(out.matches("target qpos").count(), 4);
        assert_eq!(out.matches("current qpos").count(), 4);
        assert_eq!(demo.scene().step_count(), 4);
        assert_eq!(demo.frames(), 1);
        assert_eq!(snapshot.poses(demo.robot()).unwrap().len(), 4);
    }

    #[test]
    fn test_balanced_robot_holds_pose() {
        let mut config = test_config();
        config.drive.track_initial_qpos = true;
        let (mut demo, _) = build(&config);
        let mut sink = std::io::sink();
        for _ in 0..50 {
            demo.step_frame(&mut sink).unwrap();
        }
        let qpos = demo.scene().articulation(demo.robot()).unwrap().qpos();
        assert_relative_eq!(qpos[1], 0.3, epsilon = 1e-3);
        assert_relative_eq!(qpos[2], -0.5, epsilon = 1e-3);
    }

    #[test]
    fn test_quiet_mode_prints_nothing_per_step() {
        let mut config = test_config();
        config.demo.print_qpos = false;
        config.demo.steps_per_frame = 2;
        let (mut demo, _) = build(&config);
        let mut out = Vec::new();
        demo.step_frame(&mut out).unwrap();
        assert!(out.is_empty());
        assert_eq!(demo.scene().step_count(), 2);
    }
}
