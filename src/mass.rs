//! Mass properties: total mass and center of mass aggregation over the
//! whole robot, over linkages, or over arbitrary joint subsets.
//!
//! Every joint carries the mass of the link it moves; every tool may carry
//! the mass of an attached end-effector; the robot base carries the root
//! link's mass. Scoped sums cover exactly their scope (the root link only
//! participates in whole-robot queries), so mass is additive over disjoint
//! scopes. A zero total mass is a domain error, never a silent division.

use nalgebra::{Point3, Vector3};
use tracing::warn;

use crate::kinematic_traits::Pose;
use crate::model_error::ModelError;
use crate::robot::Robot;

/// Frame tags a center of mass can be expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComReference {
    World,
    /// The robot base frame.
    Base,
    /// The frame a linkage is anchored on (its parent's tool, or the
    /// base). Only meaningful for linkage-scoped queries.
    ParentLinkage,
}

/// Weighted center of mass accumulator.
struct ComAccumulator {
    weighted: Vector3<f64>,
    total_mass: f64,
}

impl ComAccumulator {
    fn new() -> Self {
        ComAccumulator {
            weighted: Vector3::zeros(),
            total_mass: 0.0,
        }
    }

    /// Adds a point mass whose center sits at `local` in the frame with
    /// world pose `frame_world`, accumulating in `reference` coordinates.
    fn add(&mut self, mass: f64, frame_world: &Pose, local: &Vector3<f64>, reference: &Pose) {
        if mass == 0.0 {
            return;
        }
        let world = frame_world.transform_point(&Point3::from(*local));
        let in_reference = reference.inverse_transform_point(&world);
        self.weighted += mass * in_reference.coords;
        self.total_mass += mass;
    }

    fn finish(self) -> Result<Vector3<f64>, ModelError> {
        if self.total_mass == 0.0 {
            warn!("center of mass requested over a scope with zero total mass");
            return Err(ModelError::ZeroMass);
        }
        Ok(self.weighted / self.total_mass)
    }
}

impl Robot {
    // ------------------------------------------------------------------
    // Mass
    // ------------------------------------------------------------------

    /// Total mass: all joints, all tools, and the root link.
    pub fn mass(&self) -> f64 {
        let moving: f64 = self
            .linkages()
            .iter()
            .map(|l| {
                l.joints().iter().map(|j| j.mass()).sum::<f64>() + l.tool().mass()
            })
            .sum();
        moving + self.root_mass()
    }

    /// Mass of one linkage: its joints plus its tool.
    pub fn linkage_mass(&self, index: usize) -> Result<f64, ModelError> {
        let linkage = self
            .linkage(index)
            .ok_or(ModelError::LinkageIndexOutOfRange(index))?;
        Ok(linkage.joints().iter().map(|j| j.mass()).sum::<f64>() + linkage.tool().mass())
    }

    /// Summed mass of a joint subset. The scope covers exactly the listed
    /// joints; the root link is not included.
    pub fn mass_of_joints(&self, joint_ids: &[usize]) -> Result<f64, ModelError> {
        let mut total = 0.0;
        for &id in joint_ids {
            total += self
                .joint(id)
                .ok_or(ModelError::JointIndexOutOfRange(id))?
                .mass();
        }
        Ok(total)
    }

    /// Summed mass of a linkage subset (joints plus tools).
    pub fn mass_of_linkages(&self, indices: &[usize]) -> Result<f64, ModelError> {
        let mut total = 0.0;
        for &index in indices {
            total += self.linkage_mass(index)?;
        }
        Ok(total)
    }

    // ------------------------------------------------------------------
    // Center of mass
    // ------------------------------------------------------------------

    /// Center of mass of the whole robot (joints, tools and root link),
    /// expressed in the world or base frame.
    pub fn center_of_mass(&mut self, reference: ComReference) -> Result<Vector3<f64>, ModelError> {
        self.ensure_finalized()?;
        self.update_frames();
        let reference = self.com_reference_pose(reference, None)?;

        let mut accumulator = ComAccumulator::new();
        let base_world = *self.base().world();
        let root_com = *self.root_com();
        accumulator.add(self.root_mass(), &base_world, &root_com, &reference);
        for linkage in self.linkages() {
            for joint in linkage.joints() {
                accumulator.add(joint.mass(), joint.world(), joint.com(), &reference);
            }
            let tool = linkage.tool();
            accumulator.add(tool.mass(), tool.frame().world(), tool.com(), &reference);
        }
        accumulator.finish()
    }

    /// Center of mass of a joint subset. An empty scope is an error.
    pub fn center_of_mass_of_joints(
        &mut self,
        joint_ids: &[usize],
        reference: ComReference,
    ) -> Result<Vector3<f64>, ModelError> {
        self.ensure_finalized()?;
        if joint_ids.is_empty() {
            warn!("center of mass requested over an empty joint scope");
            return Err(ModelError::EmptyScope);
        }
        self.update_frames();
        let reference = self.com_reference_pose(reference, None)?;

        let mut accumulator = ComAccumulator::new();
        for &id in joint_ids {
            let joint = self.joint(id).ok_or(ModelError::JointIndexOutOfRange(id))?;
            accumulator.add(joint.mass(), joint.world(), joint.com(), &reference);
        }
        accumulator.finish()
    }

    /// Center of mass of a linkage subset (joints plus tools).
    pub fn center_of_mass_of_linkages(
        &mut self,
        indices: &[usize],
        reference: ComReference,
    ) -> Result<Vector3<f64>, ModelError> {
        self.ensure_finalized()?;
        if indices.is_empty() {
            warn!("center of mass requested over an empty linkage scope");
            return Err(ModelError::EmptyScope);
        }
        self.update_frames();
        let reference = self.com_reference_pose(reference, None)?;

        let mut accumulator = ComAccumulator::new();
        for &index in indices {
            let linkage = self
                .linkage(index)
                .ok_or(ModelError::LinkageIndexOutOfRange(index))?;
            for joint in linkage.joints() {
                accumulator.add(joint.mass(), joint.world(), joint.com(), &reference);
            }
            let tool = linkage.tool();
            accumulator.add(tool.mass(), tool.frame().world(), tool.com(), &reference);
        }
        accumulator.finish()
    }

    /// Center of mass of one linkage including its tool. `ParentLinkage`
    /// expresses the result in the frame the linkage is anchored on.
    pub fn linkage_center_of_mass(
        &mut self,
        index: usize,
        reference: ComReference,
    ) -> Result<Vector3<f64>, ModelError> {
        let joint_count = self
            .linkage(index)
            .ok_or(ModelError::LinkageIndexOutOfRange(index))?
            .n_joints();
        self.linkage_com_over(index, 0..joint_count, true, reference)
    }

    /// Center of mass of the joints `from..=to` of one linkage, without the
    /// tool. The bounds are inclusive and order-insensitive: a reversed
    /// range sums the same joints.
    pub fn linkage_center_of_mass_range(
        &mut self,
        index: usize,
        from_joint: usize,
        to_joint: usize,
        reference: ComReference,
    ) -> Result<Vector3<f64>, ModelError> {
        let linkage = self
            .linkage(index)
            .ok_or(ModelError::LinkageIndexOutOfRange(index))?;
        let (low, high) = if from_joint <= to_joint {
            (from_joint, to_joint)
        } else {
            (to_joint, from_joint)
        };
        if high >= linkage.n_joints() {
            return Err(ModelError::JointIndexOutOfRange(high));
        }
        self.linkage_com_over(index, low..high + 1, false, reference)
    }

    fn linkage_com_over(
        &mut self,
        index: usize,
        joints: std::ops::Range<usize>,
        include_tool: bool,
        reference: ComReference,
    ) -> Result<Vector3<f64>, ModelError> {
        self.ensure_finalized()?;
        self.update_frames();
        let reference = self.com_reference_pose(reference, Some(index))?;

        let linkage = self
            .linkage(index)
            .ok_or(ModelError::LinkageIndexOutOfRange(index))?;
        let mut accumulator = ComAccumulator::new();
        for joint in &linkage.joints()[joints] {
            accumulator.add(joint.mass(), joint.world(), joint.com(), &reference);
        }
        if include_tool {
            let tool = linkage.tool();
            accumulator.add(tool.mass(), tool.frame().world(), tool.com(), &reference);
        }
        accumulator.finish()
    }

    /// World pose of the requested reference tag. `linkage_scope` carries
    /// the linkage index for `ParentLinkage`.
    fn com_reference_pose(
        &self,
        reference: ComReference,
        linkage_scope: Option<usize>,
    ) -> Result<Pose, ModelError> {
        match reference {
            ComReference::World => Ok(Pose::identity()),
            ComReference::Base => Ok(*self.base().world()),
            ComReference::ParentLinkage => {
                let index = linkage_scope.ok_or(ModelError::InvalidComReference)?;
                let linkage = self
                    .linkage(index)
                    .ok_or(ModelError::LinkageIndexOutOfRange(index))?;
                match linkage.parent_index() {
                    None => Ok(*self.base().world()),
                    Some(parent) => Ok(*self
                        .linkage(parent)
                        .expect("parent indices are valid after finalize")
                        .tool()
                        .frame()
                        .world()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::joint::{Joint, JointKind};
    use crate::linkage::{Linkage, Tool};
    use nalgebra::Vector3;

    fn weighted_arm() -> Robot {
        let joints = vec![
            Joint::new("a", JointKind::Revolute, Pose::identity(), Vector3::z_axis())
                .with_inertial(2.0, Vector3::new(0.5, 0.0, 0.0)),
            Joint::new(
                "b",
                JointKind::Revolute,
                Pose::translation(1.0, 0.0, 0.0),
                Vector3::z_axis(),
            )
            .with_inertial(1.0, Vector3::new(0.5, 0.0, 0.0)),
        ];
        let tool = Tool::new("tcp", Pose::translation(1.0, 0.0, 0.0))
            .with_inertial(0.5, Vector3::zeros());
        let linkage = Linkage::new("arm", joints, tool).unwrap();
        let mut robot =
            Robot::from_linkages("r", Pose::identity(), vec![linkage], &[-1]).unwrap();
        robot.set_root_inertial(4.0, Vector3::new(0.0, 0.0, -0.1));
        robot
    }

    #[test]
    fn total_mass_includes_root_and_tool() {
        let robot = weighted_arm();
        assert!((robot.mass() - 7.5).abs() < 1e-12);
        assert!((robot.linkage_mass(0).unwrap() - 3.5).abs() < 1e-12);
    }

    #[test]
    fn whole_robot_com_is_the_weighted_mean() {
        let mut robot = weighted_arm();
        let com = robot.center_of_mass(ComReference::World).unwrap();
        // Root 4 kg at (0, 0, -0.1), joint a 2 kg at (0.5, 0, 0),
        // joint b 1 kg at (1.5, 0, 0), tool 0.5 kg at (2, 0, 0).
        let expected_x = (2.0 * 0.5 + 1.0 * 1.5 + 0.5 * 2.0) / 7.5;
        let expected_z = (4.0 * -0.1) / 7.5;
        assert!((com.x - expected_x).abs() < 1e-12);
        assert!((com.z - expected_z).abs() < 1e-12);
    }

    #[test]
    fn scoped_mass_is_additive_over_disjoint_subsets() {
        let robot = weighted_arm();
        let a = robot.mass_of_joints(&[0]).unwrap();
        let b = robot.mass_of_joints(&[1]).unwrap();
        let both = robot.mass_of_joints(&[0, 1]).unwrap();
        assert!((a + b - both).abs() < 1e-12);
    }

    #[test]
    fn scoped_com_combines_linearly() {
        let mut robot = weighted_arm();
        let com_a = robot
            .center_of_mass_of_joints(&[0], ComReference::World)
            .unwrap();
        let com_b = robot
            .center_of_mass_of_joints(&[1], ComReference::World)
            .unwrap();
        let combined = robot
            .center_of_mass_of_joints(&[0, 1], ComReference::World)
            .unwrap();
        let mass_a = robot.mass_of_joints(&[0]).unwrap();
        let mass_b = robot.mass_of_joints(&[1]).unwrap();
        let expected = (mass_a * com_a + mass_b * com_b) / (mass_a + mass_b);
        assert!((combined - expected).norm() < 1e-12);
    }

    #[test]
    fn range_com_swaps_reversed_bounds() {
        let mut robot = weighted_arm();
        let forward = robot
            .linkage_center_of_mass_range(0, 0, 1, ComReference::World)
            .unwrap();
        let reversed = robot
            .linkage_center_of_mass_range(0, 1, 0, ComReference::World)
            .unwrap();
        assert_eq!(forward, reversed);
    }

    #[test]
    fn empty_scope_is_an_error() {
        let mut robot = weighted_arm();
        let result = robot.center_of_mass_of_joints(&[], ComReference::World);
        assert!(matches!(result, Err(ModelError::EmptyScope)));
    }

    #[test]
    fn zero_mass_is_a_domain_error() {
        let joints = vec![Joint::new(
            "a",
            JointKind::Revolute,
            Pose::identity(),
            Vector3::z_axis(),
        )];
        let linkage = Linkage::new("arm", joints, Tool::identity("tcp")).unwrap();
        let mut robot =
            Robot::from_linkages("r", Pose::identity(), vec![linkage], &[-1]).unwrap();
        let result = robot.center_of_mass(ComReference::World);
        assert!(matches!(result, Err(ModelError::ZeroMass)));
    }

    #[test]
    fn parent_linkage_reference_needs_a_linkage_scope() {
        let mut robot = weighted_arm();
        let result = robot.center_of_mass(ComReference::ParentLinkage);
        assert!(matches!(result, Err(ModelError::InvalidComReference)));

        let scoped = robot
            .linkage_center_of_mass(0, ComReference::ParentLinkage)
            .unwrap();
        // The linkage anchors on the base at the origin, so this matches
        // the world expression here.
        let world = robot.linkage_center_of_mass(0, ComReference::World).unwrap();
        assert!((scoped - world).norm() < 1e-12);
    }

    #[test]
    fn base_reference_subtracts_the_base_pose() {
        let mut robot = weighted_arm();
        robot.set_base_pose(Pose::translation(0.0, 0.0, 1.0));
        let world = robot.center_of_mass(ComReference::World).unwrap();
        let base = robot.center_of_mass(ComReference::Base).unwrap();
        assert!((world.z - (base.z + 1.0)).abs() < 1e-12);
    }
}
