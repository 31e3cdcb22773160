//! Geometric Jacobian assembly.
//!
//! The Jacobian maps joint velocities to the spatial velocity of a chosen
//! point: each column is the twist a unit increment of one selected joint
//! induces at that point. Columns are assembled from the cached world poses
//! and can be expressed in any frame of the tree.

use std::collections::HashSet;

use nalgebra::{DMatrix, Vector3};

use crate::joint::JointKind;
use crate::kinematic_traits::FrameRef;
use crate::model_error::ModelError;
use crate::robot::Robot;

impl Robot {
    /// Assembles the 6×K geometric Jacobian for an ordered subset of
    /// joints, evaluated at `point` (world coordinates) and expressed in
    /// `reference`'s coordinates. Rows 0..3 are the linear part, rows 3..6
    /// the angular part; the column order matches `joint_ids`.
    ///
    /// A revolute joint with world axis `a` at world position `o`
    /// contributes `[a × (p − o); a]`; a prismatic joint contributes
    /// `[a; 0]`; fixed (and other unactuated) joints contribute a zero
    /// column. A joint id appearing twice in the subset is reported as an
    /// error, matching the `invalid_joint` contract of the solvers.
    pub fn jacobian(
        &mut self,
        joint_ids: &[usize],
        point: &Vector3<f64>,
        reference: FrameRef,
    ) -> Result<DMatrix<f64>, ModelError> {
        self.ensure_finalized()?;
        self.update_frames();

        let mut seen = HashSet::with_capacity(joint_ids.len());
        for &id in joint_ids {
            if id >= self.n_joints() {
                return Err(ModelError::JointIndexOutOfRange(id));
            }
            if !seen.insert(id) {
                return Err(ModelError::DuplicateJointInSubset(id));
            }
        }

        let reference_rotation = self.resolve_world(reference)?.rotation;
        let into_reference = reference_rotation.inverse();

        let mut jacobian = DMatrix::zeros(6, joint_ids.len());
        for (column, &id) in joint_ids.iter().enumerate() {
            let joint = self.joint(id).expect("ids validated above");
            let world = joint.world();
            let axis = world.rotation * joint.axis().into_inner();
            let origin = world.translation.vector;

            let (linear, angular) = match joint.kind() {
                JointKind::Revolute | JointKind::Continuous => {
                    (axis.cross(&(point - origin)), axis)
                }
                JointKind::Prismatic => (axis, Vector3::zeros()),
                JointKind::Fixed | JointKind::Floating | JointKind::Planar => {
                    (Vector3::zeros(), Vector3::zeros())
                }
            };

            let linear = into_reference * linear;
            let angular = into_reference * angular;
            for row in 0..3 {
                jacobian[(row, column)] = linear[row];
                jacobian[(row + 3, column)] = angular[row];
            }
        }
        Ok(jacobian)
    }
}
