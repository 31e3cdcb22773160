//! Shared fixtures for the cross-module tests.

use nalgebra::Vector3;

use crate::joint::{Joint, JointKind};
use crate::kinematic_traits::{FrameRef, Pose};
use crate::linkage::{Linkage, Tool};
use crate::robot::Robot;
use crate::solvers::pose_error;

/// Two revolute joints about z at the base, link length 1.0 each, with the
/// tool another 1.0 along x. Fully extended the tool sits at (2, 0, 0).
pub fn planar_two_link() -> Robot {
    let joints = vec![
        Joint::new(
            "shoulder",
            JointKind::Revolute,
            Pose::identity(),
            Vector3::z_axis(),
        ),
        Joint::new(
            "elbow",
            JointKind::Revolute,
            Pose::translation(1.0, 0.0, 0.0),
            Vector3::z_axis(),
        ),
    ];
    let arm = Linkage::new(
        "arm",
        joints,
        Tool::new("tcp", Pose::translation(1.0, 0.0, 0.0)),
    )
    .unwrap();
    Robot::from_linkages("planar", Pose::identity(), vec![arm], &[-1]).unwrap()
}

/// A 6R arm with alternating z and y axes, in the proportions of a small
/// tabletop manipulator.
pub fn six_dof_arm() -> Robot {
    let z = Vector3::z_axis();
    let y = Vector3::y_axis();
    let lift = |d: f64| Pose::translation(0.0, 0.0, d);
    let joints = vec![
        Joint::new("base_yaw", JointKind::Revolute, lift(0.05), z),
        Joint::new("shoulder_pitch", JointKind::Revolute, lift(0.2), y),
        Joint::new("elbow_pitch", JointKind::Revolute, lift(0.3), y),
        Joint::new("forearm_roll", JointKind::Revolute, lift(0.1), z),
        Joint::new("wrist_pitch", JointKind::Revolute, lift(0.2), y),
        Joint::new("wrist_roll", JointKind::Revolute, lift(0.06), z),
    ];
    let arm = Linkage::new("arm", joints, Tool::new("tcp", lift(0.1))).unwrap();
    Robot::from_linkages("six_dof", Pose::identity(), vec![arm], &[-1]).unwrap()
}

/// Norm of the 6-D pose error between the target and the current tool pose
/// of linkage 0, both in the base frame.
pub fn tool_error_norm(robot: &mut Robot, target: &Pose) -> f64 {
    let current = robot
        .pose_of_in(FrameRef::Tool(0), FrameRef::Base)
        .unwrap();
    pose_error(target, &current).norm()
}
