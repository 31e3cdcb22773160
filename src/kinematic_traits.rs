//! Core types shared across the kinematic model and the solvers.

extern crate nalgebra as na;

use na::Isometry3;
use std::fmt;

/// Pose of a frame: Cartesian position plus rotation quaternion.
/// ```
/// extern crate nalgebra as na;
/// use na::{Isometry3, Translation3, UnitQuaternion};
///
/// type Pose = Isometry3<f64>;
///
/// let translation = Translation3::new(1.0, 0.0, 0.0);
/// let rotation = UnitQuaternion::identity();
/// let pose = Pose::from_parts(translation, rotation);
/// ```
pub type Pose = Isometry3<f64>;

/// Identifies a frame a pose or a Jacobian can be expressed in.
///
/// `Joint` takes the global joint id and refers to the joint's output frame
/// (after the joint displacement). `Tool` takes the linkage index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRef {
    /// The world frame.
    World,
    /// The robot base frame.
    Base,
    /// The output frame of the joint with this global id.
    Joint(usize),
    /// The tool frame of the linkage with this index.
    Tool(usize),
}

/// Outcome of an inverse kinematics solve. Callers switch on this
/// explicitly; the solvers never panic on numerical trouble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// The error norm dropped below the configured tolerance.
    Solved,
    /// Converged to a stationary point that satisfies the caller's needs.
    Converged,
    /// The iteration cap was reached. The joint values hold the last
    /// iterate and can seed a warm restart.
    Diverged,
    /// The step became non-finite, or the error grew over a whole
    /// observation window. Diagnostics go to the log sink.
    NoSolution,
    /// A joint name or id could not be resolved, or appeared twice in the
    /// chain. Joint values are left untouched.
    InvalidJoint,
    /// A linkage name could not be resolved. Joint values are left
    /// untouched.
    InvalidLinkage,
    /// Reserved for solvers that are intentionally disabled.
    SolverNotReady,
}

impl SolveStatus {
    /// True for outcomes that leave the joint values at a usable solution.
    pub fn is_success(&self) -> bool {
        matches!(self, SolveStatus::Solved | SolveStatus::Converged)
    }
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SolveStatus::Solved => "solved",
            SolveStatus::Converged => "converged",
            SolveStatus::Diverged => "diverged",
            SolveStatus::NoSolution => "no solution",
            SolveStatus::InvalidJoint => "invalid joint",
            SolveStatus::InvalidLinkage => "invalid linkage",
            SolveStatus::SolverNotReady => "solver not ready",
        };
        write!(f, "{}", text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_covers_solved_and_converged() {
        assert!(SolveStatus::Solved.is_success());
        assert!(SolveStatus::Converged.is_success());
        assert!(!SolveStatus::Diverged.is_success());
        assert!(!SolveStatus::InvalidJoint.is_success());
    }

    #[test]
    fn display_matches_boundary_names() {
        assert_eq!(SolveStatus::NoSolution.to_string(), "no solution");
        assert_eq!(SolveStatus::InvalidLinkage.to_string(), "invalid linkage");
    }
}
