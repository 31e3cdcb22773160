//! Linkages: ordered serial chains of joints ending in a tool frame.
//!
//! Joint 0 is the proximal joint. Each joint anchors on its predecessor;
//! the tool anchors on the distal joint; the whole chain anchors on the
//! parent linkage's tool frame (or on the robot base). Linkages are owned
//! exclusively by a [`Robot`](crate::robot::Robot), which assigns their
//! index and resolves their parent reference.

use std::collections::HashMap;

use nalgebra::Vector3;

use crate::frame::Frame;
use crate::joint::Joint;
use crate::kinematic_traits::Pose;
use crate::model_error::ModelError;

/// The distal frame appended after the last joint of a linkage, optionally
/// carrying the mass of an attached end-effector.
#[derive(Debug, Clone)]
pub struct Tool {
    frame: Frame,
    mass: f64,
    com: Vector3<f64>,
}

impl Tool {
    /// Creates a massless tool with the given offset from the distal joint.
    pub fn new(name: impl Into<String>, local: Pose) -> Self {
        Tool {
            frame: Frame::new(name, local),
            mass: 0.0,
            com: Vector3::zeros(),
        }
    }

    /// A tool coincident with the distal joint's output frame.
    pub fn identity(name: impl Into<String>) -> Self {
        Tool::new(name, Pose::identity())
    }

    pub fn with_inertial(mut self, mass: f64, com: Vector3<f64>) -> Self {
        self.mass = mass;
        self.com = com;
        self
    }

    pub fn name(&self) -> &str {
        self.frame.name()
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    pub fn com(&self) -> &Vector3<f64> {
        &self.com
    }

    /// Offset of the tool relative to the distal joint.
    pub fn local(&self) -> &Pose {
        self.frame.local()
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub(crate) fn frame_mut(&mut self) -> &mut Frame {
        &mut self.frame
    }
}

/// An ordered chain of joints plus a tool frame.
#[derive(Debug, Clone)]
pub struct Linkage {
    name: String,
    index: usize,
    parent: Option<usize>,
    joints: Vec<Joint>,
    tool: Tool,
    joint_names: HashMap<String, usize>,
}

impl Linkage {
    /// Creates a linkage from its joints (proximal first) and tool. The
    /// index and parent are assigned when the linkage is registered with a
    /// robot.
    pub fn new(
        name: impl Into<String>,
        joints: Vec<Joint>,
        tool: Tool,
    ) -> Result<Self, ModelError> {
        let mut joint_names = HashMap::new();
        for (i, joint) in joints.iter().enumerate() {
            if joint_names.insert(joint.name().to_string(), i).is_some() {
                return Err(ModelError::DuplicateJointName(joint.name().to_string()));
            }
        }
        Ok(Linkage {
            name: name.into(),
            index: usize::MAX,
            parent: None,
            joints,
            tool,
            joint_names,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Index of this linkage within the owning robot.
    pub fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn set_index(&mut self, index: usize) {
        self.index = index;
    }

    /// Index of the parent linkage, or `None` when anchored on the base.
    pub fn parent_index(&self) -> Option<usize> {
        self.parent
    }

    pub(crate) fn set_parent(&mut self, parent: Option<usize>) {
        self.parent = parent;
    }

    pub fn n_joints(&self) -> usize {
        self.joints.len()
    }

    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    pub(crate) fn joints_mut(&mut self) -> &mut [Joint] {
        &mut self.joints
    }

    pub fn joint(&self, index: usize) -> Option<&Joint> {
        self.joints.get(index)
    }

    pub fn joint_named(&self, name: &str) -> Option<&Joint> {
        self.joint_names.get(name).map(|&i| &self.joints[i])
    }

    /// Local index of the named joint within this linkage.
    pub fn joint_index(&self, name: &str) -> Option<usize> {
        self.joint_names.get(name).copied()
    }

    pub fn tool(&self) -> &Tool {
        &self.tool
    }

    pub(crate) fn tool_mut(&mut self) -> &mut Tool {
        &mut self.tool
    }

    /// Current joint values in chain order.
    pub fn values(&self) -> Vec<f64> {
        self.joints.iter().map(|j| j.value()).collect()
    }

    /// Vectorised joint write; the length must match the joint count.
    /// Values are clamped per joint like any other write.
    pub(crate) fn set_values(&mut self, values: &[f64]) -> Result<(), ModelError> {
        if values.len() != self.joints.len() {
            return Err(ModelError::ValueCountMismatch {
                expected: self.joints.len(),
                found: values.len(),
            });
        }
        for (joint, &value) in self.joints.iter_mut().zip(values.iter()) {
            joint.set_value(value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::joint::JointKind;
    use nalgebra::Vector3;

    fn chain() -> Linkage {
        let joints = vec![
            Joint::new("a", JointKind::Revolute, Pose::identity(), Vector3::z_axis()),
            Joint::new(
                "b",
                JointKind::Revolute,
                Pose::translation(1.0, 0.0, 0.0),
                Vector3::z_axis(),
            ),
        ];
        Linkage::new("arm", joints, Tool::identity("tcp")).unwrap()
    }

    #[test]
    fn joint_lookup_by_name_and_index() {
        let linkage = chain();
        assert_eq!(linkage.n_joints(), 2);
        assert_eq!(linkage.joint(1).unwrap().name(), "b");
        assert_eq!(linkage.joint_named("a").unwrap().name(), "a");
        assert_eq!(linkage.joint_index("b"), Some(1));
        assert!(linkage.joint_named("c").is_none());
    }

    #[test]
    fn duplicate_joint_names_are_rejected() {
        let joints = vec![
            Joint::new("a", JointKind::Revolute, Pose::identity(), Vector3::z_axis()),
            Joint::new("a", JointKind::Revolute, Pose::identity(), Vector3::z_axis()),
        ];
        let result = Linkage::new("arm", joints, Tool::identity("tcp"));
        assert!(matches!(result, Err(ModelError::DuplicateJointName(_))));
    }

    #[test]
    fn vectorised_values_roundtrip() {
        let mut linkage = chain();
        linkage.set_values(&[0.5, -0.25]).unwrap();
        assert_eq!(linkage.values(), vec![0.5, -0.25]);
    }

    #[test]
    fn vectorised_values_length_checked() {
        let mut linkage = chain();
        let result = linkage.set_values(&[0.5]);
        assert!(matches!(
            result,
            Err(ModelError::ValueCountMismatch {
                expected: 2,
                found: 1
            })
        ));
    }
}
