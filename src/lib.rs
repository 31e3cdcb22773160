//! Forward kinematics, geometric Jacobians, mass properties and numerical
//! inverse kinematics for rigid multi-body robots modelled as trees of
//! coordinate frames.
//!
//! A [`robot::Robot`] owns a tree of [`linkage::Linkage`]s (serial chains
//! of [`joint::Joint`]s ending in a tool frame) rooted at a base frame.
//! Joint values and structure mutations mark cached world poses stale;
//! queries refresh the tree bottom-up in topological order. On top of the
//! model sit four iterative Cartesian IK solvers sharing one iteration
//! skeleton: damped least-squares (the production solver, stable through
//! singularities), Jacobian pseudoinverse, Jacobian transpose, and
//! selectively damped least-squares.
//!
//! # Features
//!
//! - Arena-and-index tree: no pointer cycles, dense stable ids, safe bulk
//!   value updates.
//! - Geometric Jacobian over any ordered joint subset, at any world point,
//!   expressed in any frame of the tree.
//! - Mass and center of mass aggregation over the robot, a linkage, or an
//!   arbitrary scope, in a choice of reference frames.
//! - Explicit [`solvers::SolverConfig`] per solve call; solvers report
//!   [`kinematic_traits::SolveStatus`] codes instead of panicking or
//!   throwing.
//! - Optional URDF loading (feature `allow_filesystem`).
//!
//! # Example
//!
//! A planar two-joint arm reaching a pose with the damped least-squares
//! solver:
//!
//! ```
//! use nalgebra::{DVector, Vector3};
//! use rs_tree_kinematics::joint::{Joint, JointKind};
//! use rs_tree_kinematics::kinematic_traits::{FrameRef, Pose, SolveStatus};
//! use rs_tree_kinematics::linkage::{Linkage, Tool};
//! use rs_tree_kinematics::robot::Robot;
//!
//! let joints = vec![
//!     Joint::new("shoulder", JointKind::Revolute, Pose::identity(), Vector3::z_axis()),
//!     Joint::new("elbow", JointKind::Revolute, Pose::translation(1.0, 0.0, 0.0), Vector3::z_axis()),
//! ];
//! let arm = Linkage::new("arm", joints, Tool::new("tcp", Pose::translation(1.0, 0.0, 0.0))).unwrap();
//! let mut robot = Robot::from_linkages("planar", Pose::identity(), vec![arm], &[-1]).unwrap();
//!
//! // Take a reachable pose as the target...
//! robot.set_values(&DVector::from_vec(vec![0.4, 0.6])).unwrap();
//! let target = robot.pose_of_in(FrameRef::Tool(0), FrameRef::Base).unwrap();
//!
//! // ...and recover the joint values from a cold start.
//! let mut values = DVector::zeros(2);
//! let status = robot.damped_least_squares_ik_linkage("arm", &mut values, &target, &Pose::identity());
//! assert_eq!(status, SolveStatus::Solved);
//! ```

pub mod kinematic_traits;

pub mod model_error;

pub mod frame;
pub mod joint;
pub mod linkage;
pub mod robot;

pub mod jacobian;
pub mod mass;
pub mod solvers;

pub mod utils;

#[cfg(feature = "allow_filesystem")]
pub mod urdf;

#[cfg(test)]
mod tests;
