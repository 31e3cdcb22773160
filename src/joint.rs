//! Joints: frames whose effective local transform depends on a scalar
//! degree of freedom along or about a fixed axis.
//!
//! The effective local transform of a joint is `local * exp(q * axis)`,
//! where the screw exponential is selected by the joint kind: a rotation
//! about the axis for revolute and continuous joints, a translation along
//! the axis for prismatic joints, identity for everything else. Setting the
//! value clamps silently to the limits for the bounded kinds; clamping is
//! part of the algorithm, not an error.

use nalgebra::{Translation3, Unit, UnitQuaternion, Vector3};

use crate::frame::Frame;
use crate::kinematic_traits::Pose;

/// Joint kinds, mirroring the URDF vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JointKind {
    Revolute,
    Continuous,
    Prismatic,
    Fixed,
    Floating,
    Planar,
}

impl JointKind {
    /// Kinds that respond to a scalar value.
    pub fn is_actuated(&self) -> bool {
        matches!(
            self,
            JointKind::Revolute | JointKind::Continuous | JointKind::Prismatic
        )
    }

    /// Kinds whose value is clamped to the `[min, max]` range. Continuous
    /// joints rotate freely; fixed, floating and planar joints carry no
    /// scalar degree of freedom in this model.
    pub fn is_bounded(&self) -> bool {
        matches!(self, JointKind::Revolute | JointKind::Prismatic)
    }
}

/// A frame extended with an axis, a scalar value with limits, and the
/// inertial properties of the link the joint moves.
#[derive(Debug, Clone)]
pub struct Joint {
    frame: Frame,
    kind: JointKind,
    axis: Unit<Vector3<f64>>,
    value: f64,
    min: f64,
    max: f64,
    mass: f64,
    com: Vector3<f64>,
}

impl Joint {
    /// Creates a joint at zero value, unbounded, massless. The axis is
    /// expressed in the joint's own frame.
    pub fn new(
        name: impl Into<String>,
        kind: JointKind,
        local: Pose,
        axis: Unit<Vector3<f64>>,
    ) -> Self {
        Joint {
            frame: Frame::new(name, local),
            kind,
            axis,
            value: 0.0,
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
            mass: 0.0,
            com: Vector3::zeros(),
        }
    }

    /// Sets the value limits, used by the bounded kinds.
    pub fn with_limits(mut self, min: f64, max: f64) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    /// Sets the mass and the local center of mass offset.
    pub fn with_inertial(mut self, mass: f64, com: Vector3<f64>) -> Self {
        self.mass = mass;
        self.com = com;
        self
    }

    pub fn name(&self) -> &str {
        self.frame.name()
    }

    /// Global joint id, dense in `[0, n_joints)` once the owning robot has
    /// been finalized.
    pub fn id(&self) -> usize {
        self.frame.id()
    }

    pub fn kind(&self) -> JointKind {
        self.kind
    }

    pub fn axis(&self) -> &Unit<Vector3<f64>> {
        &self.axis
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    pub fn com(&self) -> &Vector3<f64> {
        &self.com
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn limits(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    /// Sets the joint value. Bounded kinds clamp silently to their limits;
    /// out-of-range input is not an error.
    pub fn set_value(&mut self, value: f64) {
        let value = if self.kind.is_bounded() {
            value.clamp(self.min, self.max)
        } else {
            value
        };
        if value != self.value {
            self.value = value;
            self.frame.mark_dirty();
        }
    }

    /// The screw displacement induced by the current value.
    pub fn displacement(&self) -> Pose {
        match self.kind {
            JointKind::Revolute | JointKind::Continuous => Pose::from_parts(
                Translation3::identity(),
                UnitQuaternion::from_axis_angle(&self.axis, self.value),
            ),
            JointKind::Prismatic => Pose::from_parts(
                Translation3::from(self.axis.into_inner() * self.value),
                UnitQuaternion::identity(),
            ),
            JointKind::Fixed | JointKind::Floating | JointKind::Planar => Pose::identity(),
        }
    }

    /// Effective local transform: anchor-relative pose followed by the
    /// joint displacement.
    pub fn effective_local(&self) -> Pose {
        self.frame.local() * self.displacement()
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub(crate) fn frame_mut(&mut self) -> &mut Frame {
        &mut self.frame
    }

    /// Cached world pose of the joint's output frame (after the
    /// displacement).
    pub fn world(&self) -> &Pose {
        self.frame.world()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn revolute() -> Joint {
        Joint::new("j", JointKind::Revolute, Pose::identity(), Vector3::z_axis())
            .with_limits(-PI, PI)
    }

    #[test]
    fn revolute_displacement_rotates_about_axis() {
        let mut joint = revolute();
        joint.set_value(FRAC_PI_2);
        let moved = joint.displacement() * nalgebra::Point3::new(1.0, 0.0, 0.0);
        assert!((moved.coords - Vector3::new(0.0, 1.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn prismatic_displacement_translates_along_axis() {
        let mut joint = Joint::new(
            "slide",
            JointKind::Prismatic,
            Pose::identity(),
            Vector3::x_axis(),
        );
        joint.set_value(0.25);
        let d = joint.displacement();
        assert!((d.translation.vector - Vector3::new(0.25, 0.0, 0.0)).norm() < 1e-12);
        assert!(d.rotation.angle() < 1e-12);
    }

    #[test]
    fn fixed_displacement_is_identity() {
        let mut joint = Joint::new("f", JointKind::Fixed, Pose::identity(), Vector3::z_axis());
        joint.set_value(1.0);
        assert_eq!(joint.displacement(), Pose::identity());
    }

    #[test]
    fn bounded_value_clamps_silently() {
        let mut joint = revolute().with_limits(-1.0, 1.0);
        joint.set_value(2.5);
        assert_eq!(joint.value(), 1.0);
        joint.set_value(-3.0);
        assert_eq!(joint.value(), -1.0);
    }

    #[test]
    fn continuous_value_is_not_clamped() {
        let mut joint = Joint::new(
            "spin",
            JointKind::Continuous,
            Pose::identity(),
            Vector3::z_axis(),
        )
        .with_limits(-1.0, 1.0);
        joint.set_value(7.0);
        assert_eq!(joint.value(), 7.0);
    }

    #[test]
    fn set_value_marks_frame_dirty() {
        let mut joint = revolute();
        joint.frame_mut().set_world(Pose::identity());
        assert!(!joint.frame().is_dirty());
        joint.set_value(0.5);
        assert!(joint.frame().is_dirty());
    }

    #[test]
    fn effective_local_composes_anchor_offset_and_displacement() {
        let mut joint = Joint::new(
            "elbow",
            JointKind::Revolute,
            Pose::translation(1.0, 0.0, 0.0),
            Vector3::z_axis(),
        );
        joint.set_value(FRAC_PI_2);
        let tip = joint.effective_local() * nalgebra::Point3::new(1.0, 0.0, 0.0);
        assert!((tip.coords - Vector3::new(1.0, 1.0, 0.0)).norm() < 1e-12);
    }
}
