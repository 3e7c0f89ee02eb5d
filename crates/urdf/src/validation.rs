//! Kinematic-tree validation of a parsed URDF.

use std::collections::{HashMap, HashSet};

use crate::error::{Result, UrdfError};
use crate::types::UrdfRobot;

/// The validated link tree.
#[derive(Debug, Clone, PartialEq)]
pub struct KinematicTree {
    /// Index into `robot.links` of the root link.
    pub root: usize,
    /// Link indices in depth-first order from the root; children follow the
    /// declaration order of their joints.
    pub order: Vec<usize>,
    /// Index into `robot.joints` of each link's parent joint (`None` for the root).
    pub parent_joint: Vec<Option<usize>>,
}

/// Validate a URDF robot model.
///
/// Checks that link and joint names are unique, every joint references
/// defined links, no link has two parents, there is exactly one root, and
/// every link is reachable from the root (anything else sits on a cycle).
pub fn validate(robot: &UrdfRobot) -> Result<KinematicTree> {
    check_duplicates(robot)?;

    let link_index: HashMap<&str, usize> = robot
        .links
        .iter()
        .enumerate()
        .map(|(i, l)| (l.name.as_str(), i))
        .collect();

    let mut parent_joint: Vec<Option<usize>> = vec![None; robot.links.len()];
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); robot.links.len()];

    for (ji, joint) in robot.joints.iter().enumerate() {
        let parent = *link_index
            .get(joint.parent.as_str())
            .ok_or_else(|| UrdfError::undefined_link(&joint.parent, &joint.name))?;
        let child = *link_index
            .get(joint.child.as_str())
            .ok_or_else(|| UrdfError::undefined_link(&joint.child, &joint.name))?;

        if parent_joint[child].is_some() {
            return Err(UrdfError::MultipleParents(joint.child.clone()));
        }
        parent_joint[child] = Some(ji);
        children[parent].push(child);
    }

    let roots: Vec<usize> = (0..robot.links.len())
        .filter(|&i| parent_joint[i].is_none())
        .collect();
    let root = match roots.as_slice() {
        [] => return Err(UrdfError::NoRootLink),
        [root] => *root,
        _ => {
            return Err(UrdfError::MultipleRootLinks(
                roots.iter().map(|&i| robot.links[i].name.clone()).collect(),
            ))
        }
    };

    // Depth-first preorder; the stack holds children reversed so the first
    // declared child is visited first.
    let mut order = Vec::with_capacity(robot.links.len());
    let mut visited = HashSet::new();
    let mut stack = vec![root];
    while let Some(link) = stack.pop() {
        if !visited.insert(link) {
            continue;
        }
        order.push(link);
        stack.extend(children[link].iter().rev());
    }

    if order.len() != robot.links.len() {
        let unreachable = (0..robot.links.len())
            .filter(|i| !visited.contains(i))
            .map(|i| robot.links[i].name.clone())
            .collect();
        return Err(UrdfError::KinematicLoop(unreachable));
    }

    check_mass_properties(robot)?;

    Ok(KinematicTree {
        root,
        order,
        parent_joint,
    })
}

fn check_duplicates(robot: &UrdfRobot) -> Result<()> {
    let mut link_names = HashSet::new();
    for link in &robot.links {
        if !link_names.insert(&link.name) {
            return Err(UrdfError::DuplicateLink(link.name.clone()));
        }
    }

    let mut joint_names = HashSet::new();
    for joint in &robot.joints {
        if !joint_names.insert(&joint.name) {
            return Err(UrdfError::DuplicateJoint(joint.name.clone()));
        }
    }

    Ok(())
}

/// Negative or non-finite masses are rejected. A zero mass is allowed and
/// treated like a missing `<inertial>` by the loader.
fn check_mass_properties(robot: &UrdfRobot) -> Result<()> {
    for link in &robot.links {
        if let Some(inertial) = &link.inertial {
            if inertial.mass < 0.0 || !inertial.mass.is_finite() {
                return Err(UrdfError::InvalidMass {
                    link_name: link.name.clone(),
                    mass: inertial.mass,
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_urdf_str;

    fn robot(body: &str) -> UrdfRobot {
        parse_urdf_str(&format!(r#"<robot name="r">{body}</robot>"#)).unwrap()
    }

    fn joint(name: &str, parent: &str, child: &str) -> String {
        format!(
            r#"<joint name="{name}" type="fixed"><parent link="{parent}"/><child link="{child}"/></joint>"#
        )
    }

    #[test]
    fn test_depth_first_order() {
        let r = robot(&format!(
            r#"<link name="base"/><link name="a1"/><link name="a2"/><link name="b1"/>{}{}{}"#,
            joint("ja", "base", "a1"),
            joint("jb", "base", "b1"),
            joint("ja2", "a1", "a2"),
        ));
        let tree = validate(&r).unwrap();
        let names: Vec<&str> = tree.order.iter().map(|&i| r.links[i].name.as_str()).collect();
        assert_eq!(names, vec!["base", "a1", "a2", "b1"]);
        assert_eq!(tree.root, 0);
        assert_eq!(tree.parent_joint[0], None);
        assert_eq!(tree.parent_joint[2], Some(2));
    }

    #[test]
    fn test_root_need_not_be_declared_first() {
        let r = robot(&format!(
            r#"<link name="tip"/><link name="base"/>{}"#,
            joint("j", "base", "tip")
        ));
        let tree = validate(&r).unwrap();
        assert_eq!(tree.root, 1);
        assert_eq!(tree.order, vec![1, 0]);
    }

    #[test]
    fn test_duplicate_and_undefined() {
        let r = robot(r#"<link name="a"/><link name="a"/>"#);
        assert!(matches!(validate(&r), Err(UrdfError::DuplicateLink(n)) if n == "a"));

        let r = robot(&format!(r#"<link name="a"/>{}"#, joint("j", "a", "ghost")));
        assert!(matches!(validate(&r), Err(UrdfError::UndefinedLink { .. })));
    }

    #[test]
    fn test_multiple_parents_and_roots() {
        let r = robot(&format!(
            r#"<link name="a"/><link name="b"/><link name="c"/>{}{}"#,
            joint("j1", "a", "c"),
            joint("j2", "b", "c")
        ));
        assert!(matches!(validate(&r), Err(UrdfError::MultipleParents(n)) if n == "c"));

        let r = robot(r#"<link name="a"/><link name="b"/>"#);
        assert!(matches!(validate(&r), Err(UrdfError::MultipleRootLinks(v)) if v.len() == 2));
    }

    #[test]
    fn test_cycle_detected() {
        let r = robot(&format!(
            r#"<link name="base"/><link name="a"/><link name="b"/>{}{}"#,
            joint("j1", "a", "b"),
            joint("j2", "b", "a")
        ));
        assert!(matches!(validate(&r), Err(UrdfError::KinematicLoop(v)) if v.len() == 2));

        let r = robot(&format!(r#"<link name="a"/>{}"#, joint("j", "a", "a")));
        assert!(matches!(validate(&r), Err(UrdfError::NoRootLink)));
    }

    #[test]
    fn test_negative_mass_rejected() {
        let r = robot(r#"<link name="a"><inertial><mass value="-1"/></inertial></link>"#);
        assert!(matches!(validate(&r), Err(UrdfError::InvalidMass { .. })));
    }
}
