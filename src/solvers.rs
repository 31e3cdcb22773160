//! Iterative Cartesian inverse kinematics over a selected joint chain.
//!
//! All solvers share one iteration skeleton: push the joint values into the
//! robot, refresh the frames, form the 6-D pose error between the target
//! and the end-effector (translation difference plus the shortest-arc
//! rotation vector of `R_target * R_current^T`), ask a step rule for a
//! joint increment, and accumulate until the error norm drops below the
//! tolerance or the iteration cap is reached. The rules differ only in how
//! they turn the Jacobian and the error into an increment, so they are
//! modelled as implementations of [`StepRule`].
//!
//! Targets are expressed in the robot base frame, as is the error; the
//! Jacobian is referenced to the base accordingly. The damped least-squares
//! rule is the production solver: it stays numerically stable through
//! singular configurations and always produces a step.

use std::collections::HashSet;
use std::f64::consts::{FRAC_PI_4, PI};

use nalgebra::{DMatrix, DVector};
use tracing::{debug, warn};

use crate::kinematic_traits::{FrameRef, Pose, SolveStatus};
use crate::robot::Robot;
use crate::utils::{clamp_mag, clamp_max_abs};

/// Iterations of strictly growing error tolerated before a solve is
/// abandoned as having no solution.
const DIVERGENCE_WINDOW: usize = 10;

/// Solver parameters, passed explicitly to every solve call.
#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// Convergence threshold on the 6-D error norm.
    pub tolerance: f64,
    /// Iteration cap; bounds wall time indirectly.
    pub max_iterations: usize,
    /// Damping lambda of the damped least-squares rule.
    pub damping: f64,
    /// Singular values at or below this magnitude are treated as zero.
    pub epsilon: f64,
    /// Per-component step bound of the selectively damped rule.
    pub gamma_max: f64,
    /// Error magnitude bound applied by the pseudoinverse rule.
    pub error_clamp: f64,
    /// Step magnitude bound applied by the pseudoinverse rule.
    pub delta_clamp: f64,
    /// Weight on the translation half of the error in the Jacobian
    /// transpose rule.
    pub translation_scale: f64,
    /// Weight on the rotation half of the error in the Jacobian transpose
    /// rule.
    pub rotation_scale: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            tolerance: 1e-3,
            max_iterations: 100,
            damping: 0.05,
            epsilon: 1e-10,
            gamma_max: FRAC_PI_4,
            error_clamp: 0.25,
            delta_clamp: FRAC_PI_4,
            translation_scale: 1.0,
            rotation_scale: 1.0,
        }
    }
}

impl SolverConfig {
    /// Defaults with the angular tolerance (one degree) used by the
    /// pseudoinverse, Jacobian transpose and selectively damped rules.
    pub fn angular() -> Self {
        SolverConfig {
            tolerance: PI / 180.0,
            ..SolverConfig::default()
        }
    }
}

/// A rule turning the Jacobian and the 6-D pose error into a joint
/// increment. Returns `None` when no finite step can be produced.
pub trait StepRule {
    fn name(&self) -> &'static str;

    fn compute_step(
        &self,
        jacobian: &DMatrix<f64>,
        error: &DVector<f64>,
        config: &SolverConfig,
    ) -> Option<DVector<f64>>;
}

/// Damped least-squares (Levenberg-Marquardt): solves
/// `(J J^T + lambda^2 I) f = err` by column-pivoted QR and steps
/// `J^T f`. Stable through singularities.
pub struct DampedLeastSquares;

impl StepRule for DampedLeastSquares {
    fn name(&self) -> &'static str {
        "damped_least_squares"
    }

    fn compute_step(
        &self,
        jacobian: &DMatrix<f64>,
        error: &DVector<f64>,
        config: &SolverConfig,
    ) -> Option<DVector<f64>> {
        let rows = jacobian.nrows();
        let normal = jacobian * jacobian.transpose()
            + DMatrix::identity(rows, rows) * (config.damping * config.damping);
        let f = normal.col_piv_qr().solve(error)?;
        Some(jacobian.transpose() * f)
    }
}

/// Moore-Penrose pseudoinverse via SVD, with singular values at or below
/// epsilon zeroed. The raw step of this rule is unbounded near
/// singularities, so both the error and the step are magnitude-clamped.
pub struct Pseudoinverse;

impl StepRule for Pseudoinverse {
    fn name(&self) -> &'static str {
        "pseudoinverse"
    }

    fn compute_step(
        &self,
        jacobian: &DMatrix<f64>,
        error: &DVector<f64>,
        config: &SolverConfig,
    ) -> Option<DVector<f64>> {
        let inverse = pseudoinverse(jacobian, config.epsilon)?;
        let mut clamped_error = error.clone();
        clamp_mag(&mut clamped_error, config.error_clamp);
        let mut delta = inverse * clamped_error;
        clamp_mag(&mut delta, config.delta_clamp);
        Some(delta)
    }
}

/// Jacobian transpose with the optimal scalar step size
/// `alpha = (e . g) / (g . g)` for `g = J J^T e`, over the error with the
/// translation and rotation halves independently weighted.
pub struct JacobianTranspose;

impl StepRule for JacobianTranspose {
    fn name(&self) -> &'static str {
        "jacobian_transpose"
    }

    fn compute_step(
        &self,
        jacobian: &DMatrix<f64>,
        error: &DVector<f64>,
        config: &SolverConfig,
    ) -> Option<DVector<f64>> {
        let mut weighted = error.clone();
        for i in 0..3 {
            weighted[i] *= config.translation_scale;
            weighted[i + 3] *= config.rotation_scale;
        }
        let gamma = jacobian * (jacobian.transpose() * &weighted);
        let denominator = gamma.dot(&gamma);
        if denominator <= 0.0 || !denominator.is_finite() {
            return None;
        }
        let alpha = weighted.dot(&gamma) / denominator;
        Some(jacobian.transpose() * weighted * alpha)
    }
}

/// Selectively damped least-squares after Buss and Kim: the contribution of
/// each singular direction is clamped by its own responsiveness bound
/// before the contributions are summed and clamped once more by
/// `gamma_max`.
pub struct SelectivelyDamped;

impl StepRule for SelectivelyDamped {
    fn name(&self) -> &'static str {
        "selectively_damped"
    }

    fn compute_step(
        &self,
        jacobian: &DMatrix<f64>,
        error: &DVector<f64>,
        config: &SolverConfig,
    ) -> Option<DVector<f64>> {
        let dof = jacobian.ncols();
        let svd = jacobian.clone().svd(true, true);
        let u = svd.u.as_ref()?;
        let v_t = svd.v_t.as_ref()?;

        let mut delta = DVector::zeros(dof);
        for i in 0..svd.singular_values.len() {
            let sigma = svd.singular_values[i];
            if sigma <= config.epsilon {
                continue;
            }
            let u_column = u.column(i);
            let alpha = u_column.dot(error);

            // How much end-effector motion this direction offers...
            let responsiveness =
                u_column.rows(0, 3).norm() + u_column.rows(3, 3).norm();
            // ...versus how much joint motion it costs.
            let mut cost = 0.0;
            for row in 0..jacobian.nrows() {
                let mut weighted_row = 0.0;
                for column in 0..dof {
                    weighted_row += v_t[(i, column)].abs() * jacobian[(row, column)].abs();
                }
                cost += weighted_row;
            }
            cost /= sigma;

            let gamma_i = if cost > 0.0 {
                (responsiveness / cost).min(1.0) * config.gamma_max
            } else {
                config.gamma_max
            };

            let mut phi = v_t.row(i).transpose() * (alpha / sigma);
            clamp_max_abs(&mut phi, gamma_i);
            delta += phi;
        }
        clamp_max_abs(&mut delta, config.gamma_max);
        Some(delta)
    }
}

/// Moore-Penrose pseudoinverse of a 6×K (or any) real matrix. The SVD is
/// taken of the taller orientation, decided on the dimensions of the input
/// itself, and the result is transposed back when the input was wide.
pub(crate) fn pseudoinverse(matrix: &DMatrix<f64>, epsilon: f64) -> Option<DMatrix<f64>> {
    let flip = matrix.nrows() < matrix.ncols();
    let tall = if flip {
        matrix.transpose()
    } else {
        matrix.clone()
    };

    let svd = tall.svd(true, true);
    let u = svd.u.as_ref()?;
    let v_t = svd.v_t.as_ref()?;

    // Replace every singular value above the cutoff by its reciprocal.
    let count = svd.singular_values.len();
    let mut sigma_inverse = DMatrix::zeros(count, count);
    for i in 0..count {
        let sigma = svd.singular_values[i];
        if sigma.abs() > epsilon {
            sigma_inverse[(i, i)] = 1.0 / sigma;
        }
    }

    let inverse = v_t.transpose() * sigma_inverse * u.transpose();
    Some(if flip { inverse.transpose() } else { inverse })
}

/// 6-D pose error between a target and the current pose, both expressed in
/// the same frame: translation difference stacked over the rotation vector
/// of the relative rotation. The rotation vector uses the shortest arc, so
/// its magnitude never exceeds pi and the axis does not flip between
/// adjacent iterates.
pub(crate) fn pose_error(target: &Pose, current: &Pose) -> DVector<f64> {
    let translation = target.translation.vector - current.translation.vector;
    let rotation = (target.rotation * current.rotation.inverse()).scaled_axis();
    DVector::from_column_slice(&[
        translation.x,
        translation.y,
        translation.z,
        rotation.x,
        rotation.y,
        rotation.z,
    ])
}

impl Robot {
    /// Drives the joints listed in `joint_ids` (an ordered chain, distal
    /// last) so that the distal joint's output frame, post-multiplied by
    /// `tool_offset`, reaches `target` (expressed in the robot base frame).
    ///
    /// `joint_values` seeds the iteration and is mutated in place to the
    /// last iterate, so a `Diverged` result can be warm-restarted. Joint
    /// limits clamp each iterate silently. On `InvalidJoint` the values are
    /// left untouched.
    pub fn ik_chain(
        &mut self,
        rule: &dyn StepRule,
        joint_ids: &[usize],
        joint_values: &mut DVector<f64>,
        target: &Pose,
        tool_offset: &Pose,
        config: &SolverConfig,
    ) -> SolveStatus {
        if self.ensure_finalized().is_err() {
            warn!("ik requested on a robot whose topology does not finalize");
            return SolveStatus::NoSolution;
        }
        if joint_ids.is_empty() || joint_values.len() != joint_ids.len() {
            return SolveStatus::InvalidJoint;
        }
        let mut seen = HashSet::with_capacity(joint_ids.len());
        for &id in joint_ids {
            if id >= self.n_joints() || !seen.insert(id) {
                return SolveStatus::InvalidJoint;
            }
        }
        let distal = *joint_ids.last().expect("chain is non-empty");

        let mut previous_error_norm = f64::INFINITY;
        let mut growth_streak = 0usize;

        for iteration in 0..=config.max_iterations {
            self.set_chain_values(joint_ids, joint_values);
            self.update_frames();
            let end_effector = self.joint(distal).expect("validated").world() * tool_offset;
            let current = self.base().world().inverse() * end_effector;
            let error = pose_error(target, &current);

            if error.iter().any(|e| !e.is_finite()) {
                warn!(solver = rule.name(), "pose error became non-finite");
                return SolveStatus::NoSolution;
            }
            let error_norm = error.norm();
            debug!(
                solver = rule.name(),
                iteration,
                error = error_norm,
                "ik iteration"
            );
            if error_norm <= config.tolerance {
                return SolveStatus::Solved;
            }
            if iteration == config.max_iterations {
                break;
            }
            if error_norm > previous_error_norm * (1.0 + 1e-12) {
                growth_streak += 1;
                if growth_streak >= DIVERGENCE_WINDOW {
                    warn!(
                        solver = rule.name(),
                        error = error_norm,
                        "error grew over the whole observation window"
                    );
                    return SolveStatus::NoSolution;
                }
            } else {
                growth_streak = 0;
            }
            previous_error_norm = error_norm;

            let point = end_effector.translation.vector;
            let jacobian = match self.jacobian(joint_ids, &point, FrameRef::Base) {
                Ok(jacobian) => jacobian,
                Err(error) => {
                    warn!(solver = rule.name(), %error, "jacobian assembly failed");
                    return SolveStatus::NoSolution;
                }
            };
            let delta = match rule.compute_step(&jacobian, &error, config) {
                Some(delta) if delta.iter().all(|d| d.is_finite()) => delta,
                _ => {
                    warn!(solver = rule.name(), "step rule produced no finite step");
                    return SolveStatus::NoSolution;
                }
            };
            *joint_values += delta;
        }
        SolveStatus::Diverged
    }

    /// [`ik_chain`](Robot::ik_chain) with the chain given by joint names.
    /// An unresolvable name returns `InvalidJoint` without touching
    /// `joint_values`.
    pub fn ik_chain_named(
        &mut self,
        rule: &dyn StepRule,
        joint_names: &[&str],
        joint_values: &mut DVector<f64>,
        target: &Pose,
        tool_offset: &Pose,
        config: &SolverConfig,
    ) -> SolveStatus {
        if self.ensure_finalized().is_err() {
            return SolveStatus::NoSolution;
        }
        let mut joint_ids = Vec::with_capacity(joint_names.len());
        for name in joint_names {
            match self.joint_index(name) {
                Some(id) => joint_ids.push(id),
                None => return SolveStatus::InvalidJoint,
            }
        }
        self.ik_chain(rule, &joint_ids, joint_values, target, tool_offset, config)
    }

    /// Solves for all joints of the named linkage in chain order, with the
    /// linkage's tool offset composed in front of `tool_offset`. An
    /// unknown linkage name (or the loader's "invalid" sentinel) returns
    /// `InvalidLinkage` without touching `joint_values`.
    pub fn ik_linkage(
        &mut self,
        rule: &dyn StepRule,
        linkage_name: &str,
        joint_values: &mut DVector<f64>,
        target: &Pose,
        tool_offset: &Pose,
        config: &SolverConfig,
    ) -> SolveStatus {
        if self.ensure_finalized().is_err() {
            return SolveStatus::NoSolution;
        }
        let linkage = match self.linkage_named(linkage_name) {
            Some(linkage) if linkage.name() != "invalid" => linkage,
            _ => return SolveStatus::InvalidLinkage,
        };
        let joint_ids: Vec<usize> = linkage.joints().iter().map(|j| j.id()).collect();
        let composed_offset = linkage.tool().local() * tool_offset;
        self.ik_chain(
            rule,
            &joint_ids,
            joint_values,
            target,
            &composed_offset,
            config,
        )
    }

    // ------------------------------------------------------------------
    // Per-rule entry points with their documented default parameters
    // ------------------------------------------------------------------

    pub fn damped_least_squares_ik_chain(
        &mut self,
        joint_ids: &[usize],
        joint_values: &mut DVector<f64>,
        target: &Pose,
        tool_offset: &Pose,
    ) -> SolveStatus {
        self.ik_chain(
            &DampedLeastSquares,
            joint_ids,
            joint_values,
            target,
            tool_offset,
            &SolverConfig::default(),
        )
    }

    pub fn damped_least_squares_ik_chain_named(
        &mut self,
        joint_names: &[&str],
        joint_values: &mut DVector<f64>,
        target: &Pose,
        tool_offset: &Pose,
    ) -> SolveStatus {
        self.ik_chain_named(
            &DampedLeastSquares,
            joint_names,
            joint_values,
            target,
            tool_offset,
            &SolverConfig::default(),
        )
    }

    pub fn damped_least_squares_ik_linkage(
        &mut self,
        linkage_name: &str,
        joint_values: &mut DVector<f64>,
        target: &Pose,
        tool_offset: &Pose,
    ) -> SolveStatus {
        self.ik_linkage(
            &DampedLeastSquares,
            linkage_name,
            joint_values,
            target,
            tool_offset,
            &SolverConfig::default(),
        )
    }

    pub fn pseudoinverse_ik_chain(
        &mut self,
        joint_ids: &[usize],
        joint_values: &mut DVector<f64>,
        target: &Pose,
        tool_offset: &Pose,
    ) -> SolveStatus {
        self.ik_chain(
            &Pseudoinverse,
            joint_ids,
            joint_values,
            target,
            tool_offset,
            &SolverConfig::angular(),
        )
    }

    pub fn pseudoinverse_ik_chain_named(
        &mut self,
        joint_names: &[&str],
        joint_values: &mut DVector<f64>,
        target: &Pose,
        tool_offset: &Pose,
    ) -> SolveStatus {
        self.ik_chain_named(
            &Pseudoinverse,
            joint_names,
            joint_values,
            target,
            tool_offset,
            &SolverConfig::angular(),
        )
    }

    pub fn pseudoinverse_ik_linkage(
        &mut self,
        linkage_name: &str,
        joint_values: &mut DVector<f64>,
        target: &Pose,
        tool_offset: &Pose,
    ) -> SolveStatus {
        self.ik_linkage(
            &Pseudoinverse,
            linkage_name,
            joint_values,
            target,
            tool_offset,
            &SolverConfig::angular(),
        )
    }

    pub fn jacobian_transpose_ik_chain(
        &mut self,
        joint_ids: &[usize],
        joint_values: &mut DVector<f64>,
        target: &Pose,
        tool_offset: &Pose,
    ) -> SolveStatus {
        self.ik_chain(
            &JacobianTranspose,
            joint_ids,
            joint_values,
            target,
            tool_offset,
            &SolverConfig::angular(),
        )
    }

    pub fn jacobian_transpose_ik_chain_named(
        &mut self,
        joint_names: &[&str],
        joint_values: &mut DVector<f64>,
        target: &Pose,
        tool_offset: &Pose,
    ) -> SolveStatus {
        self.ik_chain_named(
            &JacobianTranspose,
            joint_names,
            joint_values,
            target,
            tool_offset,
            &SolverConfig::angular(),
        )
    }

    pub fn jacobian_transpose_ik_linkage(
        &mut self,
        linkage_name: &str,
        joint_values: &mut DVector<f64>,
        target: &Pose,
        tool_offset: &Pose,
    ) -> SolveStatus {
        self.ik_linkage(
            &JacobianTranspose,
            linkage_name,
            joint_values,
            target,
            tool_offset,
            &SolverConfig::angular(),
        )
    }

    pub fn selectively_damped_ik_chain(
        &mut self,
        joint_ids: &[usize],
        joint_values: &mut DVector<f64>,
        target: &Pose,
        tool_offset: &Pose,
    ) -> SolveStatus {
        self.ik_chain(
            &SelectivelyDamped,
            joint_ids,
            joint_values,
            target,
            tool_offset,
            &SolverConfig::angular(),
        )
    }

    pub fn selectively_damped_ik_chain_named(
        &mut self,
        joint_names: &[&str],
        joint_values: &mut DVector<f64>,
        target: &Pose,
        tool_offset: &Pose,
    ) -> SolveStatus {
        self.ik_chain_named(
            &SelectivelyDamped,
            joint_names,
            joint_values,
            target,
            tool_offset,
            &SolverConfig::angular(),
        )
    }

    pub fn selectively_damped_ik_linkage(
        &mut self,
        linkage_name: &str,
        joint_values: &mut DVector<f64>,
        target: &Pose,
        tool_offset: &Pose,
    ) -> SolveStatus {
        self.ik_linkage(
            &SelectivelyDamped,
            linkage_name,
            joint_values,
            target,
            tool_offset,
            &SolverConfig::angular(),
        )
    }
}
