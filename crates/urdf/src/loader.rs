//! URDF to [`Articulation`] conversion.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use nalgebra::{Isometry3, Vector3};
use robovis_core::{ShapeGeometry, TriMesh, VisualShape};
use robovis_physics::{Articulation, ArticulationId, Joint, JointLimits, Link, Scene};

use crate::error::{Result, UrdfError};
use crate::mesh::load_mesh;
use crate::parser::parse_urdf_str;
use crate::types::{UrdfGeometry, UrdfJoint, UrdfJointType, UrdfLink, UrdfRobot};
use crate::validation::validate;

/// Builds articulations from URDF files.
#[derive(Debug, Clone)]
pub struct UrdfLoader {
    /// Weld the root link to the world; otherwise it floats with 6 DoF.
    pub fix_root_link: bool,
    /// Keep every `<collision>` of a link instead of only the first.
    pub load_multiple_collisions_from_file: bool,
    /// Uniform scale applied to geometry, joint origins and prismatic limits.
    pub scale: f64,
}

impl Default for UrdfLoader {
    fn default() -> Self {
        Self {
            fix_root_link: true,
            load_multiple_collisions_from_file: false,
            scale: 1.0,
        }
    }
}

impl UrdfLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fix_root_link(mut self, fix: bool) -> Self {
        self.fix_root_link = fix;
        self
    }

    pub fn with_multiple_collisions(mut self, multiple: bool) -> Self {
        self.load_multiple_collisions_from_file = multiple;
        self
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Load a URDF file and add the articulation to `scene`.
    pub fn load(&self, scene: &mut Scene, path: impl AsRef<Path>) -> Result<ArticulationId> {
        let articulation = self.build(path)?;
        Ok(scene.add_articulation(articulation))
    }

    /// Load a URDF file. Mesh paths resolve relative to its directory.
    pub fn build(&self, path: impl AsRef<Path>) -> Result<Articulation> {
        let path = path.as_ref();
        let xml = std::fs::read_to_string(path).map_err(|source| UrdfError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        log::info!("Loading URDF {}", path.display());
        self.build_str(&xml, base_dir)
    }

    pub fn build_str(&self, xml: &str, base_dir: &Path) -> Result<Articulation> {
        let robot = parse_urdf_str(xml)?;
        self.build_robot(&robot, base_dir)
    }

    pub fn build_robot(&self, robot: &UrdfRobot, base_dir: &Path) -> Result<Articulation> {
        let tree = validate(robot)?;
        let mut meshes = MeshCache::new(base_dir);

        let mut index_of: HashMap<usize, usize> = HashMap::new();
        let mut links = Vec::with_capacity(tree.order.len());

        for &li in &tree.order {
            let urdf_link = &robot.links[li];
            let (parent, joint) = match tree.parent_joint[li] {
                None => {
                    let joint = Joint::fixed(format!("{}_root", urdf_link.name), Isometry3::identity());
                    (None, joint)
                }
                Some(ji) => {
                    let urdf_joint = &robot.joints[ji];
                    let parent_urdf = robot
                        .links
                        .iter()
                        .position(|l| l.name == urdf_joint.parent)
                        .and_then(|p| index_of.get(&p).copied());
                    (parent_urdf, self.convert_joint(urdf_joint)?)
                }
            };

            let mut link = Link::new(urdf_link.name.clone(), parent, joint);
            if let Some(inertial) = urdf_link.inertial.filter(|i| i.mass > 0.0) {
                let rot = inertial.origin.rotation().to_rotation_matrix();
                let inertia = rot.matrix() * inertial.inertia.to_matrix() * rot.matrix().transpose();
                let s2 = self.scale * self.scale;
                link = link.with_inertial(inertial.mass, inertial.origin.xyz * self.scale, inertia * s2);
            } else {
                log::debug!("Link {} has no mass; using a placeholder", urdf_link.name);
            }

            let visuals = self.convert_visuals(robot, urdf_link, &mut meshes);
            let collisions = self.convert_collisions(urdf_link, &mut meshes);
            let visuals = if visuals.is_empty() && !urdf_link.visuals.is_empty() {
                log::warn!(
                    "No loadable visual for link {}; drawing its collision shapes",
                    urdf_link.name
                );
                collisions.clone()
            } else {
                visuals
            };

            index_of.insert(li, links.len());
            links.push(link.with_visuals(visuals).with_collisions(collisions));
        }

        let articulation = Articulation::new(robot.name.clone(), links, self.fix_root_link)?;
        log::info!(
            "Loaded robot {}: {} links, {} active joints",
            robot.name,
            articulation.links().len(),
            articulation.dof()
        );
        Ok(articulation)
    }

    fn convert_joint(&self, joint: &UrdfJoint) -> Result<Joint> {
        let origin = joint.origin.to_isometry(self.scale);
        let limit = joint.limit.unwrap_or_default();

        let mut converted = match joint.joint_type {
            UrdfJointType::Fixed => return Ok(Joint::fixed(joint.name.clone(), origin)),
            UrdfJointType::Revolute => Joint::revolute(joint.name.clone(), origin, joint.axis)
                .with_limits(JointLimits::new(limit.lower, limit.upper)),
            UrdfJointType::Continuous => Joint::revolute(joint.name.clone(), origin, joint.axis),
            UrdfJointType::Prismatic => Joint::prismatic(joint.name.clone(), origin, joint.axis)
                .with_limits(JointLimits::new(
                    limit.lower * self.scale,
                    limit.upper * self.scale,
                )),
            UrdfJointType::Floating | UrdfJointType::Planar => {
                return Err(UrdfError::Unsupported(format!(
                    "{:?} joint '{}' (only the root may float; use fix_root_link = false)",
                    joint.joint_type, joint.name
                )))
            }
        };

        if let Some(dynamics) = joint.dynamics {
            converted = converted.with_friction(dynamics.damping, dynamics.friction);
        }
        Ok(converted)
    }

    fn convert_visuals(
        &self,
        robot: &UrdfRobot,
        link: &UrdfLink,
        meshes: &mut MeshCache,
    ) -> Vec<VisualShape> {
        link.visuals
            .iter()
            .filter_map(|visual| {
                let geometry = self.convert_geometry(&visual.geometry, meshes)?;
                let mut shape = VisualShape::new(visual.origin.to_isometry(self.scale), geometry);
                if let Some(c) = robot.resolve_color(visual) {
                    shape = shape.with_color([c[0] as f32, c[1] as f32, c[2] as f32, c[3] as f32]);
                }
                Some(shape)
            })
            .collect()
    }

    fn convert_collisions(&self, link: &UrdfLink, meshes: &mut MeshCache) -> Vec<VisualShape> {
        let take = if self.load_multiple_collisions_from_file {
            link.collisions.len()
        } else {
            1
        };
        link.collisions
            .iter()
            .take(take)
            .filter_map(|collision| {
                let geometry = self.convert_geometry(&collision.geometry, meshes)?;
                Some(VisualShape::new(collision.origin.to_isometry(self.scale), geometry))
            })
            .collect()
    }

    /// `None` when a mesh cannot be loaded; the failure is logged.
    fn convert_geometry(&self, geometry: &UrdfGeometry, meshes: &mut MeshCache) -> Option<ShapeGeometry> {
        let s = self.scale;
        Some(match geometry {
            UrdfGeometry::Box { size } => ShapeGeometry::Box {
                half_extents: size * (0.5 * s),
            },
            UrdfGeometry::Cylinder { radius, length } => ShapeGeometry::Cylinder {
                radius: radius * s,
                length: length * s,
            },
            UrdfGeometry::Sphere { radius } => ShapeGeometry::Sphere { radius: radius * s },
            UrdfGeometry::Mesh { filename, scale } => {
                let scale = scale.unwrap_or_else(|| Vector3::repeat(1.0)) * s;
                ShapeGeometry::Mesh(meshes.get(filename, scale)?)
            }
        })
    }
}

/// Loads each (file, scale) pair once per articulation.
struct MeshCache {
    base_dir: PathBuf,
    loaded: HashMap<(PathBuf, [u64; 3]), Option<Arc<TriMesh>>>,
}

impl MeshCache {
    fn new(base_dir: &Path) -> Self {
        Self {
            base_dir: base_dir.to_path_buf(),
            loaded: HashMap::new(),
        }
    }

    fn get(&mut self, filename: &str, scale: Vector3<f64>) -> Option<Arc<TriMesh>> {
        let path = resolve_mesh_path(filename, &self.base_dir);
        let key = (path.clone(), [scale.x.to_bits(), scale.y.to_bits(), scale.z.to_bits()]);
        self.loaded
            .entry(key)
            .or_insert_with(|| match load_mesh(&path, scale) {
                Ok(mesh) => {
                    log::debug!("Loaded mesh {} ({} triangles)", path.display(), mesh.num_triangles());
                    Some(Arc::new(mesh))
                }
                Err(e) => {
                    log::warn!("{}", UrdfError::Mesh { path: path.clone(), source: e });
                    None
                }
            })
            .clone()
    }
}

/// Resolve a URDF mesh filename to a path.
///
/// `package://pkg/rest` is searched for as `pkg/rest` in `base_dir` and its
/// ancestors (or as `rest` inside an ancestor named `pkg`), falling back to
/// `rest` beside the URDF. `file://` prefixes are stripped and relative paths
/// are joined onto `base_dir`.
pub fn resolve_mesh_path(filename: &str, base_dir: &Path) -> PathBuf {
    if let Some(rest) = filename.strip_prefix("package://") {
        let (package, relative) = rest.split_once('/').unwrap_or((rest, ""));
        for dir in base_dir.ancestors() {
            if dir.file_name().is_some_and(|n| n == package) {
                let candidate = dir.join(relative);
                if candidate.exists() {
                    return candidate;
                }
            }
            let candidate = dir.join(package).join(relative);
            if candidate.exists() {
                return candidate;
            }
        }
        return base_dir.join(relative);
    }

    let path = Path::new(filename.strip_prefix("file://").unwrap_or(filename));
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}
