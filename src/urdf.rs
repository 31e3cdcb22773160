//! Populating a [`Robot`] from a URDF description (optional).
//!
//! The loader reads links (inertial mass and center of mass) and joints
//! (kind, origin, axis, limits, parent and child link) and decomposes the
//! link tree into serial linkages: a linkage runs until its distal link is
//! a leaf or a branching point, and a trailing fixed joint into a leaf
//! becomes the linkage's tool frame, carrying the leaf link's inertial
//! properties. The root link's inertial populates the robot base.
//!
//! Only the subset of URDF needed by the kinematic model is interpreted;
//! visual, collision and transmission elements are ignored.

extern crate sxd_document;

use std::collections::{HashMap, HashSet};
use std::fs::read_to_string;
use std::path::Path;

use nalgebra::{Translation3, Unit, UnitQuaternion, Vector3};
use sxd_document::{dom, parser, QName};

use crate::joint::{Joint, JointKind};
use crate::kinematic_traits::Pose;
use crate::linkage::{Linkage, Tool};
use crate::model_error::ModelError;
use crate::robot::Robot;

#[derive(Debug, Default, Clone)]
struct LinkRecord {
    mass: f64,
    com: Vector3<f64>,
}

#[derive(Debug)]
struct JointRecord {
    name: String,
    kind: JointKind,
    origin: Pose,
    axis: Unit<Vector3<f64>>,
    limits: Option<(f64, f64)>,
    parent: String,
    child: String,
}

/// Builds a robot from a URDF file on disk.
///
/// # Example
/// ```no_run
/// let robot = rs_tree_kinematics::urdf::from_urdf_file("robot.urdf").unwrap();
/// println!("{} joints", robot.n_joints());
/// ```
pub fn from_urdf_file<P: AsRef<Path>>(path: P) -> Result<Robot, ModelError> {
    let xml = read_to_string(path)?;
    from_urdf(&xml)
}

/// Builds a robot from URDF XML content.
pub fn from_urdf(xml: &str) -> Result<Robot, ModelError> {
    let package = parser::parse(xml)
        .map_err(|e| ModelError::XmlProcessingError(format!("Failed to parse XML: {}", e)))?;
    let document = package.as_document();

    let root_element = document
        .root()
        .children()
        .into_iter()
        .find_map(|c| c.element())
        .ok_or_else(|| ModelError::XmlProcessingError("No root element found".to_string()))?;
    if root_element.name() != QName::new("robot") {
        return Err(ModelError::XmlProcessingError(
            "Root element is not <robot>".to_string(),
        ));
    }
    let robot_name = root_element
        .attribute("name")
        .map(|a| a.value().to_string())
        .unwrap_or_else(|| "robot".to_string());

    let link_tag = QName::new("link");
    let joint_tag = QName::new("joint");
    let mut links: HashMap<String, LinkRecord> = HashMap::new();
    let mut link_order: Vec<String> = Vec::new();
    let mut joints: Vec<JointRecord> = Vec::new();

    for child in root_element.children().into_iter().filter_map(|c| c.element()) {
        if child.name() == link_tag {
            let (name, record) = parse_link(child)?;
            if links.insert(name.clone(), record).is_none() {
                link_order.push(name);
            }
        } else if child.name() == joint_tag {
            joints.push(parse_joint(child)?);
        }
    }

    build_robot(robot_name, &links, &link_order, &joints)
}

fn parse_link(element: dom::Element) -> Result<(String, LinkRecord), ModelError> {
    let name = element
        .attribute("name")
        .map(|a| a.value().to_string())
        .ok_or_else(|| ModelError::MissingField("link name".to_string()))?;

    let mut record = LinkRecord::default();
    if let Some(inertial) = named_child(element, "inertial") {
        if let Some(mass) = named_child(inertial, "mass") {
            let value = mass
                .attribute("value")
                .ok_or_else(|| ModelError::MissingField(format!("mass value of link {}", name)))?;
            record.mass = parse_number(value.value())?;
        }
        if let Some(origin) = named_child(inertial, "origin") {
            if let Some(xyz) = origin.attribute("xyz") {
                record.com = parse_vector3(xyz.value())?;
            }
        }
    }
    Ok((name, record))
}

fn parse_joint(element: dom::Element) -> Result<JointRecord, ModelError> {
    let name = element
        .attribute("name")
        .map(|a| a.value().to_string())
        .ok_or_else(|| ModelError::MissingField("joint name".to_string()))?;
    let kind = element
        .attribute("type")
        .map(|a| a.value().to_string())
        .ok_or_else(|| ModelError::MissingField(format!("type of joint {}", name)))?;
    let kind = match kind.as_str() {
        "revolute" => JointKind::Revolute,
        "continuous" => JointKind::Continuous,
        "prismatic" => JointKind::Prismatic,
        "fixed" => JointKind::Fixed,
        "floating" => JointKind::Floating,
        "planar" => JointKind::Planar,
        other => {
            return Err(ModelError::ParseError(format!(
                "Unknown joint type {} for joint {}",
                other, name
            )))
        }
    };

    let parent = named_child(element, "parent")
        .and_then(|e| e.attribute("link"))
        .map(|a| a.value().to_string())
        .ok_or_else(|| ModelError::MissingField(format!("parent link of joint {}", name)))?;
    let child = named_child(element, "child")
        .and_then(|e| e.attribute("link"))
        .map(|a| a.value().to_string())
        .ok_or_else(|| ModelError::MissingField(format!("child link of joint {}", name)))?;

    let origin = match named_child(element, "origin") {
        Some(origin) => parse_origin(origin)?,
        None => Pose::identity(),
    };

    // URDF defaults the axis to x.
    let axis = match named_child(element, "axis").and_then(|e| e.attribute("xyz")) {
        Some(xyz) => {
            let vector = parse_vector3(xyz.value())?;
            if vector.norm() == 0.0 {
                return Err(ModelError::ParseError(format!(
                    "Zero axis for joint {}",
                    name
                )));
            }
            Unit::new_normalize(vector)
        }
        None => Vector3::x_axis(),
    };

    let limits = match named_child(element, "limit") {
        Some(limit) => {
            let lower = limit
                .attribute("lower")
                .map(|a| parse_number(a.value()))
                .transpose()?;
            let upper = limit
                .attribute("upper")
                .map(|a| parse_number(a.value()))
                .transpose()?;
            match (lower, upper) {
                (Some(lower), Some(upper)) => Some((lower, upper)),
                _ => None,
            }
        }
        None => None,
    };

    Ok(JointRecord {
        name,
        kind,
        origin,
        axis,
        limits,
        parent,
        child,
    })
}

fn named_child<'d>(element: dom::Element<'d>, name: &str) -> Option<dom::Element<'d>> {
    let tag = QName::new(name);
    element
        .children()
        .into_iter()
        .find_map(|c| c.element().filter(|e| e.name() == tag))
}

fn parse_number(text: &str) -> Result<f64, ModelError> {
    text.trim()
        .parse()
        .map_err(|_| ModelError::ParseError(format!("Not a number: {}", text)))
}

fn parse_vector3(text: &str) -> Result<Vector3<f64>, ModelError> {
    let parts: Vec<f64> = text
        .split_whitespace()
        .map(|p| parse_number(p))
        .collect::<Result<_, _>>()?;
    if parts.len() != 3 {
        return Err(ModelError::ParseError(format!(
            "Expected three values, got: {}",
            text
        )));
    }
    Ok(Vector3::new(parts[0], parts[1], parts[2]))
}

fn parse_origin(element: dom::Element) -> Result<Pose, ModelError> {
    let translation = match element.attribute("xyz") {
        Some(xyz) => Translation3::from(parse_vector3(xyz.value())?),
        None => Translation3::identity(),
    };
    let rotation = match element.attribute("rpy") {
        Some(rpy) => {
            let angles = parse_vector3(rpy.value())?;
            UnitQuaternion::from_euler_angles(angles.x, angles.y, angles.z)
        }
        None => UnitQuaternion::identity(),
    };
    Ok(Pose::from_parts(translation, rotation))
}

fn build_robot(
    name: String,
    links: &HashMap<String, LinkRecord>,
    link_order: &[String],
    joints: &[JointRecord],
) -> Result<Robot, ModelError> {
    if link_order.is_empty() {
        return Err(ModelError::MissingField("at least one link".to_string()));
    }
    for joint in joints {
        for link in [&joint.parent, &joint.child] {
            if !links.contains_key(link) {
                return Err(ModelError::ParseError(format!(
                    "Joint {} refers to undeclared link {}",
                    joint.name, link
                )));
            }
        }
    }

    let children_of: HashMap<&str, Vec<usize>> = {
        let mut map: HashMap<&str, Vec<usize>> = HashMap::new();
        for (index, joint) in joints.iter().enumerate() {
            map.entry(joint.parent.as_str()).or_default().push(index);
        }
        map
    };

    let child_links: HashSet<&str> = joints.iter().map(|j| j.child.as_str()).collect();
    let root_link = link_order
        .iter()
        .find(|name| !child_links.contains(name.as_str()))
        .ok_or(ModelError::CyclicParentGraph)?;

    let mut robot = Robot::new(name, Pose::identity());
    let root_record = &links[root_link.as_str()];
    robot.set_root_inertial(root_record.mass, root_record.com);

    grow_linkages(&mut robot, root_link, None, &children_of, joints, links)?;
    robot.finalize()?;
    Ok(robot)
}

/// Starts one linkage per joint leaving `start_link` and extends each until
/// its distal link branches or ends.
fn grow_linkages(
    robot: &mut Robot,
    start_link: &str,
    parent_linkage: Option<&str>,
    children_of: &HashMap<&str, Vec<usize>>,
    joints: &[JointRecord],
    links: &HashMap<String, LinkRecord>,
) -> Result<(), ModelError> {
    let outgoing: &[usize] = children_of
        .get(start_link)
        .map(|v| v.as_slice())
        .unwrap_or(&[]);
    for &first in outgoing {
        let mut chain = vec![first];
        let mut tip = joints[first].child.as_str();
        while children_of.get(tip).map_or(0, |c| c.len()) == 1 {
            let next = children_of[tip][0];
            chain.push(next);
            tip = joints[next].child.as_str();
        }
        let tip_is_leaf = children_of.get(tip).map_or(true, |c| c.is_empty());

        // A trailing fixed joint into a leaf describes the end-effector.
        let mut tool = None;
        let mut kept = chain.as_slice();
        if tip_is_leaf && chain.len() > 1 {
            let last = &joints[*chain.last().expect("chain is non-empty")];
            if last.kind == JointKind::Fixed {
                let leaf = &links[last.child.as_str()];
                tool = Some(
                    Tool::new(last.child.clone(), last.origin).with_inertial(leaf.mass, leaf.com),
                );
                kept = &chain[..chain.len() - 1];
            }
        }

        let distal_link = joints[*kept.last().expect("kept is non-empty")].child.clone();
        let mut chain_joints = Vec::with_capacity(kept.len());
        for &index in kept {
            let record = &joints[index];
            let moved_link = &links[record.child.as_str()];
            let mut joint = Joint::new(record.name.clone(), record.kind, record.origin, record.axis)
                .with_inertial(moved_link.mass, moved_link.com);
            if let Some((lower, upper)) = record.limits {
                joint = joint.with_limits(lower, upper);
            }
            chain_joints.push(joint);
        }
        let tool = tool.unwrap_or_else(|| Tool::identity(format!("{}_tool", distal_link)));
        let linkage = Linkage::new(distal_link.clone(), chain_joints, tool)?;
        robot.add_linkage(parent_linkage, linkage);

        if !tip_is_leaf {
            grow_linkages(robot, tip, Some(distal_link.as_str()), children_of, joints, links)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinematic_traits::FrameRef;

    const TWO_LINK_ARM: &str = r#"
        <robot name="two_link_arm">
            <link name="base">
                <inertial><mass value="10.0"/><origin xyz="0 0 0.02"/></inertial>
            </link>
            <link name="upper_arm">
                <inertial><mass value="2.0"/><origin xyz="0 0 0.15"/></inertial>
            </link>
            <link name="forearm">
                <inertial><mass value="1.0"/><origin xyz="0 0 0.12"/></inertial>
            </link>
            <link name="end_effector">
                <inertial><mass value="0.1"/></inertial>
            </link>
            <joint name="shoulder" type="revolute">
                <parent link="base"/><child link="upper_arm"/>
                <origin xyz="0 0 0.05" rpy="0 0 0"/>
                <axis xyz="0 0 1"/>
                <limit lower="-2.617" upper="2.617" effort="50" velocity="3"/>
            </joint>
            <joint name="elbow" type="revolute">
                <parent link="upper_arm"/><child link="forearm"/>
                <origin xyz="0 0 0.3" rpy="0 0 0"/>
                <axis xyz="0 0 1"/>
                <limit lower="-2.094" upper="2.094" effort="30" velocity="5"/>
            </joint>
            <joint name="ee_fixed" type="fixed">
                <parent link="forearm"/><child link="end_effector"/>
                <origin xyz="0 0 0.25"/>
            </joint>
        </robot>
    "#;

    const BRANCHING_ROBOT: &str = r#"
        <robot name="torso_bot">
            <link name="pelvis"><inertial><mass value="8.0"/></inertial></link>
            <link name="torso"><inertial><mass value="6.0"/></inertial></link>
            <link name="arm_l"><inertial><mass value="1.5"/></inertial></link>
            <link name="arm_r"><inertial><mass value="1.5"/></inertial></link>
            <joint name="spine" type="revolute">
                <parent link="pelvis"/><child link="torso"/>
                <origin xyz="0 0 0.4"/><axis xyz="0 0 1"/>
                <limit lower="-1.0" upper="1.0"/>
            </joint>
            <joint name="shoulder_l" type="revolute">
                <parent link="torso"/><child link="arm_l"/>
                <origin xyz="0 0.2 0.3"/><axis xyz="0 1 0"/>
                <limit lower="-3.0" upper="3.0"/>
            </joint>
            <joint name="shoulder_r" type="revolute">
                <parent link="torso"/><child link="arm_r"/>
                <origin xyz="0 -0.2 0.3"/><axis xyz="0 1 0"/>
                <limit lower="-3.0" upper="3.0"/>
            </joint>
        </robot>
    "#;

    #[test]
    fn two_link_arm_becomes_one_linkage_with_tool() {
        let robot = from_urdf(TWO_LINK_ARM).unwrap();
        assert_eq!(robot.name(), "two_link_arm");
        assert_eq!(robot.n_linkages(), 1);
        assert_eq!(robot.n_joints(), 2);

        let linkage = robot.linkage(0).unwrap();
        assert_eq!(linkage.name(), "forearm");
        assert_eq!(linkage.joint(0).unwrap().name(), "shoulder");
        assert_eq!(linkage.joint(1).unwrap().name(), "elbow");

        // The trailing fixed joint became the tool, with the leaf inertial.
        assert_eq!(linkage.tool().name(), "end_effector");
        assert!((linkage.tool().mass() - 0.1).abs() < 1e-12);
        assert!((linkage.tool().local().translation.vector.z - 0.25).abs() < 1e-12);

        // The root link inertial landed on the base.
        assert!((robot.root_mass() - 10.0).abs() < 1e-12);
    }

    #[test]
    fn two_link_arm_forward_kinematics_at_zero() {
        let mut robot = from_urdf(TWO_LINK_ARM).unwrap();
        let tool = robot.world_pose(FrameRef::Tool(0)).unwrap();
        // 0.05 + 0.3 + 0.25 of z offsets.
        assert!((tool.translation.vector.z - 0.6).abs() < 1e-9);
        assert!(tool.translation.vector.x.abs() < 1e-12);
    }

    #[test]
    fn joint_limits_are_applied() {
        let mut robot = from_urdf(TWO_LINK_ARM).unwrap();
        robot.set_joint_value_named("shoulder", 5.0).unwrap();
        assert!((robot.joint_named("shoulder").unwrap().value() - 2.617).abs() < 1e-12);
    }

    #[test]
    fn branches_split_into_child_linkages() {
        let robot = from_urdf(BRANCHING_ROBOT).unwrap();
        assert_eq!(robot.n_linkages(), 3);
        assert_eq!(robot.n_joints(), 3);

        let torso = robot.linkage_named("torso").unwrap();
        assert_eq!(torso.parent_index(), None);
        let left = robot.linkage_named("arm_l").unwrap();
        let right = robot.linkage_named("arm_r").unwrap();
        assert_eq!(left.parent_index(), Some(torso.index()));
        assert_eq!(right.parent_index(), Some(torso.index()));
    }

    #[test]
    fn malformed_xml_is_reported() {
        let result = from_urdf("<robot><joint></robot>");
        assert!(matches!(result, Err(ModelError::XmlProcessingError(_))));
    }

    #[test]
    fn undeclared_link_is_reported() {
        let xml = r#"
            <robot name="broken">
                <link name="base"/>
                <joint name="j" type="revolute">
                    <parent link="base"/><child link="ghost"/>
                </joint>
            </robot>
        "#;
        let result = from_urdf(xml);
        assert!(matches!(result, Err(ModelError::ParseError(_))));
    }

    #[test]
    fn unknown_joint_type_is_reported() {
        let xml = r#"
            <robot name="broken">
                <link name="a"/><link name="b"/>
                <joint name="j" type="helical">
                    <parent link="a"/><child link="b"/>
                </joint>
            </robot>
        "#;
        let result = from_urdf(xml);
        assert!(matches!(result, Err(ModelError::ParseError(_))));
    }
}
