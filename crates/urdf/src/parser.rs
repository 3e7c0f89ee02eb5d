//! URDF XML parser built on quick-xml's pull reader.

use std::io::BufRead;

use nalgebra::Vector3;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{Result, UrdfError};
use crate::types::{
    UrdfCollision, UrdfGeometry, UrdfInertia, UrdfInertial, UrdfJoint, UrdfJointDynamics,
    UrdfJointLimit, UrdfJointType, UrdfLink, UrdfMaterial, UrdfOrigin, UrdfRobot, UrdfVisual,
};

/// Parse a URDF document.
///
/// Unknown elements (`gazebo`, `transmission`, `mimic`, ...) are skipped.
pub fn parse_urdf_str(xml: &str) -> Result<UrdfRobot> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    parse_urdf_reader(&mut reader)
}

fn parse_urdf_reader<R: BufRead>(reader: &mut Reader<R>) -> Result<UrdfRobot> {
    let mut buf = Vec::new();
    let mut robot: Option<UrdfRobot> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"robot" => {
                robot = Some(parse_robot(reader, e)?);
            }
            Ok(Event::Empty(ref e)) if e.name().as_ref() == b"robot" => {
                robot = Some(UrdfRobot::new(get_attribute(e, "name")?));
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(UrdfError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    robot.ok_or_else(|| UrdfError::missing_element("robot", "URDF document"))
}

fn parse_robot<R: BufRead>(reader: &mut Reader<R>, start: &BytesStart) -> Result<UrdfRobot> {
    let name = get_attribute(start, "name")?;
    let mut robot = UrdfRobot::new(name);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let elem_name = e.name().as_ref().to_vec();
                match elem_name.as_slice() {
                    b"link" => robot.links.push(parse_link(reader, e)?),
                    b"joint" => robot.joints.push(parse_joint(reader, e)?),
                    b"material" => robot.materials.push(parse_material(reader, e)?),
                    _ => skip_element(reader, &elem_name)?,
                }
            }
            Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"link" => robot.links.push(UrdfLink::new(get_attribute(e, "name")?)),
                b"material" => robot.materials.push(UrdfMaterial::named(get_attribute(e, "name")?)),
                _ => {}
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == b"robot" => break,
            Ok(Event::Eof) => return Err(UrdfError::XmlParse("unexpected EOF in robot".into())),
            Ok(_) => {}
            Err(e) => return Err(UrdfError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    Ok(robot)
}

fn parse_link<R: BufRead>(reader: &mut Reader<R>, start: &BytesStart) -> Result<UrdfLink> {
    let name = get_attribute(start, "name")?;
    let mut link = UrdfLink::new(name);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let elem_name = e.name().as_ref().to_vec();
                match elem_name.as_slice() {
                    b"inertial" => link.inertial = Some(parse_inertial(reader)?),
                    b"visual" => link.visuals.push(parse_visual(reader, e, &link.name)?),
                    b"collision" => link.collisions.push(parse_collision(reader, e, &link.name)?),
                    _ => skip_element(reader, &elem_name)?,
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"link" => break,
            Ok(Event::Eof) => return Err(UrdfError::XmlParse("unexpected EOF in link".into())),
            Ok(_) => {}
            Err(e) => return Err(UrdfError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    Ok(link)
}

fn parse_inertial<R: BufRead>(reader: &mut Reader<R>) -> Result<UrdfInertial> {
    let mut inertial = UrdfInertial::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"origin" => inertial.origin = parse_origin(e)?,
                b"mass" => inertial.mass = parse_mass(e)?,
                b"inertia" => inertial.inertia = parse_inertia_element(e),
                _ => {}
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == b"inertial" => break,
            Ok(Event::Eof) => return Err(UrdfError::XmlParse("unexpected EOF in inertial".into())),
            Ok(_) => {}
            Err(e) => return Err(UrdfError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    Ok(inertial)
}

fn parse_origin(e: &BytesStart) -> Result<UrdfOrigin> {
    let xyz = get_attribute_opt(e, "xyz")
        .map(|s| parse_vector3(&s))
        .transpose()?
        .unwrap_or_else(Vector3::zeros);
    let rpy = get_attribute_opt(e, "rpy")
        .map(|s| parse_vector3(&s))
        .transpose()?
        .unwrap_or_else(Vector3::zeros);
    Ok(UrdfOrigin::new(xyz, rpy))
}

fn parse_mass(e: &BytesStart) -> Result<f64> {
    get_attribute(e, "value")?
        .trim()
        .parse()
        .map_err(|_| UrdfError::invalid_attribute("value", "mass", "expected a number"))
}

fn parse_inertia_element(e: &BytesStart) -> UrdfInertia {
    UrdfInertia {
        ixx: parse_float_attr(e, "ixx").unwrap_or(0.0),
        ixy: parse_float_attr(e, "ixy").unwrap_or(0.0),
        ixz: parse_float_attr(e, "ixz").unwrap_or(0.0),
        iyy: parse_float_attr(e, "iyy").unwrap_or(0.0),
        iyz: parse_float_attr(e, "iyz").unwrap_or(0.0),
        izz: parse_float_attr(e, "izz").unwrap_or(0.0),
    }
}

/// `<material name=".."><color rgba=".."/></material>`; the start tag has
/// already been consumed.
fn parse_material<R: BufRead>(reader: &mut Reader<R>, start: &BytesStart) -> Result<UrdfMaterial> {
    let mut material = UrdfMaterial::named(get_attribute_opt(start, "name").unwrap_or_default());
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) if e.name().as_ref() == b"color" => {
                let rgba = get_attribute(e, "rgba")?;
                material.color = Some(parse_rgba(&rgba)?);
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"material" => break,
            Ok(Event::Eof) => return Err(UrdfError::XmlParse("unexpected EOF in material".into())),
            Ok(_) => {}
            Err(e) => return Err(UrdfError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    Ok(material)
}

fn parse_visual<R: BufRead>(
    reader: &mut Reader<R>,
    start: &BytesStart,
    link: &str,
) -> Result<UrdfVisual> {
    let name = get_attribute_opt(start, "name");
    let mut origin = UrdfOrigin::default();
    let mut geometry: Option<UrdfGeometry> = None;
    let mut material: Option<UrdfMaterial> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let elem_name = e.name().as_ref().to_vec();
                match elem_name.as_slice() {
                    b"geometry" => geometry = Some(parse_geometry(reader)?),
                    b"material" => material = Some(parse_material(reader, e)?),
                    b"origin" => {
                        origin = parse_origin(e)?;
                        skip_element(reader, &elem_name)?;
                    }
                    _ => skip_element(reader, &elem_name)?,
                }
            }
            Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"origin" => origin = parse_origin(e)?,
                b"material" => material = Some(UrdfMaterial::named(get_attribute(e, "name")?)),
                _ => {}
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == b"visual" => break,
            Ok(Event::Eof) => return Err(UrdfError::XmlParse("unexpected EOF in visual".into())),
            Ok(_) => {}
            Err(e) => return Err(UrdfError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    let geometry = geometry
        .ok_or_else(|| UrdfError::missing_element("geometry", format!("visual of link '{link}'")))?;

    Ok(UrdfVisual {
        name,
        origin,
        geometry,
        material,
    })
}

fn parse_collision<R: BufRead>(
    reader: &mut Reader<R>,
    start: &BytesStart,
    link: &str,
) -> Result<UrdfCollision> {
    let name = get_attribute_opt(start, "name");
    let mut origin = UrdfOrigin::default();
    let mut geometry: Option<UrdfGeometry> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let elem_name = e.name().as_ref().to_vec();
                match elem_name.as_slice() {
                    b"geometry" => geometry = Some(parse_geometry(reader)?),
                    b"origin" => {
                        origin = parse_origin(e)?;
                        skip_element(reader, &elem_name)?;
                    }
                    _ => skip_element(reader, &elem_name)?,
                }
            }
            Ok(Event::Empty(ref e)) if e.name().as_ref() == b"origin" => origin = parse_origin(e)?,
            Ok(Event::End(ref e)) if e.name().as_ref() == b"collision" => break,
            Ok(Event::Eof) => {
                return Err(UrdfError::XmlParse("unexpected EOF in collision".into()));
            }
            Ok(_) => {}
            Err(e) => return Err(UrdfError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    let geometry = geometry.ok_or_else(|| {
        UrdfError::missing_element("geometry", format!("collision of link '{link}'"))
    })?;

    Ok(UrdfCollision {
        name,
        origin,
        geometry,
    })
}

fn parse_geometry<R: BufRead>(reader: &mut Reader<R>) -> Result<UrdfGeometry> {
    let mut buf = Vec::new();
    let mut geometry: Option<UrdfGeometry> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"box" => {
                    let size = parse_vector3(&get_attribute(e, "size")?)?;
                    geometry = Some(UrdfGeometry::Box { size });
                }
                b"cylinder" => {
                    let radius = parse_float_attr(e, "radius")
                        .ok_or_else(|| UrdfError::missing_attribute("radius", "cylinder"))?;
                    let length = parse_float_attr(e, "length")
                        .ok_or_else(|| UrdfError::missing_attribute("length", "cylinder"))?;
                    geometry = Some(UrdfGeometry::Cylinder { radius, length });
                }
                b"sphere" => {
                    let radius = parse_float_attr(e, "radius")
                        .ok_or_else(|| UrdfError::missing_attribute("radius", "sphere"))?;
                    geometry = Some(UrdfGeometry::Sphere { radius });
                }
                b"mesh" => {
                    let filename = get_attribute(e, "filename")?;
                    let scale = get_attribute_opt(e, "scale")
                        .map(|s| parse_scale(&s))
                        .transpose()?;
                    geometry = Some(UrdfGeometry::Mesh { filename, scale });
                }
                _ => {}
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == b"geometry" => break,
            Ok(Event::Eof) => return Err(UrdfError::XmlParse("unexpected EOF in geometry".into())),
            Ok(_) => {}
            Err(e) => return Err(UrdfError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    geometry.ok_or_else(|| UrdfError::missing_element("shape", "geometry"))
}

fn parse_joint<R: BufRead>(reader: &mut Reader<R>, start: &BytesStart) -> Result<UrdfJoint> {
    let name = get_attribute(start, "name")?;
    let type_str = get_attribute(start, "type")?;
    let joint_type: UrdfJointType = type_str
        .parse()
        .map_err(|_| UrdfError::UnknownJointType(type_str.clone()))?;

    let mut parent: Option<String> = None;
    let mut child: Option<String> = None;
    let mut origin = UrdfOrigin::default();
    let mut axis = Vector3::x();
    let mut limit: Option<UrdfJointLimit> = None;
    let mut dynamics: Option<UrdfJointDynamics> = None;
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let (e, is_start) = match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => (e, true),
            Ok(Event::Empty(e)) => (e, false),
            Ok(Event::End(ref e)) if e.name().as_ref() == b"joint" => break,
            Ok(Event::Eof) => return Err(UrdfError::XmlParse("unexpected EOF in joint".into())),
            Ok(_) => continue,
            Err(e) => return Err(UrdfError::XmlParse(e.to_string())),
        };

        let elem_name = e.name().as_ref().to_vec();
        match elem_name.as_slice() {
            b"parent" => parent = Some(get_attribute(&e, "link")?),
            b"child" => child = Some(get_attribute(&e, "link")?),
            b"origin" => origin = parse_origin(&e)?,
            b"axis" => {
                if let Some(xyz) = get_attribute_opt(&e, "xyz") {
                    axis = parse_vector3(&xyz)?;
                }
            }
            b"limit" => limit = Some(parse_joint_limit(&e)),
            b"dynamics" => dynamics = Some(parse_joint_dynamics(&e)),
            _ => {}
        }
        if is_start {
            skip_element(reader, &elem_name)?;
        }
    }

    let parent =
        parent.ok_or_else(|| UrdfError::missing_element("parent", format!("joint '{name}'")))?;
    let child =
        child.ok_or_else(|| UrdfError::missing_element("child", format!("joint '{name}'")))?;

    Ok(UrdfJoint {
        name,
        joint_type,
        parent,
        child,
        origin,
        axis,
        limit,
        dynamics,
    })
}

fn parse_joint_limit(e: &BytesStart) -> UrdfJointLimit {
    UrdfJointLimit {
        lower: parse_float_attr(e, "lower").unwrap_or(0.0),
        upper: parse_float_attr(e, "upper").unwrap_or(0.0),
        effort: parse_float_attr(e, "effort").unwrap_or(0.0),
        velocity: parse_float_attr(e, "velocity").unwrap_or(0.0),
    }
}

fn parse_joint_dynamics(e: &BytesStart) -> UrdfJointDynamics {
    UrdfJointDynamics {
        damping: parse_float_attr(e, "damping").unwrap_or(0.0),
        friction: parse_float_attr(e, "friction").unwrap_or(0.0),
    }
}

// ============================================================================
// Helper functions
// ============================================================================

fn get_attribute(e: &BytesStart, name: &'static str) -> Result<String> {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == name.as_bytes() {
            return String::from_utf8(attr.value.to_vec())
                .map_err(|_| UrdfError::invalid_attribute(name, element_name(e), "invalid UTF-8"));
        }
    }
    Err(UrdfError::missing_attribute(name, element_name(e)))
}

fn get_attribute_opt(e: &BytesStart, name: &str) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == name.as_bytes())
        .and_then(|attr| String::from_utf8(attr.value.to_vec()).ok())
}

fn parse_float_attr(e: &BytesStart, name: &str) -> Option<f64> {
    get_attribute_opt(e, name).and_then(|s| s.trim().parse().ok())
}

fn parse_floats(s: &str) -> Result<Vec<f64>> {
    s.split_whitespace()
        .map(str::parse::<f64>)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|_| UrdfError::XmlParse(format!("invalid number list: {s}")))
}

/// Parse a space-separated vector3 string.
fn parse_vector3(s: &str) -> Result<Vector3<f64>> {
    let parts = parse_floats(s)?;
    if parts.len() != 3 {
        return Err(UrdfError::XmlParse(format!(
            "expected 3 values in vector, got {}: {s}",
            parts.len()
        )));
    }
    Ok(Vector3::new(parts[0], parts[1], parts[2]))
}

/// Mesh scale: three values, or a single uniform factor.
fn parse_scale(s: &str) -> Result<Vector3<f64>> {
    match parse_floats(s)?.as_slice() {
        [k] => Ok(Vector3::repeat(*k)),
        [x, y, z] => Ok(Vector3::new(*x, *y, *z)),
        _ => Err(UrdfError::invalid_attribute("scale", "mesh", format!("expected 1 or 3 values: {s}"))),
    }
}

fn parse_rgba(s: &str) -> Result<[f64; 4]> {
    match parse_floats(s)?.as_slice() {
        [r, g, b, a] => Ok([*r, *g, *b, *a]),
        [r, g, b] => Ok([*r, *g, *b, 1.0]),
        _ => Err(UrdfError::invalid_attribute("rgba", "color", format!("expected 4 values: {s}"))),
    }
}

fn element_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.name().as_ref()).to_string()
}

/// Skip an element and all its children. The start tag has been consumed.
fn skip_element<R: BufRead>(reader: &mut Reader<R>, name: &[u8]) -> Result<()> {
    let mut buf = Vec::new();
    let mut depth = 1;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == name => depth += 1,
            Ok(Event::End(ref e)) if e.name().as_ref() == name => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(UrdfError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    Ok(())
}
