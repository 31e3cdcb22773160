//! The analytic Jacobian must agree with finite differences of the forward
//! kinematics: perturbing joint i by a small epsilon moves the distal frame
//! by (approximately) epsilon times column i.

use nalgebra::{DVector, Vector3};

use crate::kinematic_traits::FrameRef;
use crate::tests::test_utils::{planar_two_link, six_dof_arm};

const EPSILON: f64 = 1e-6;
const TOLERANCE: f64 = 1e-5;

fn check_against_finite_differences(
    robot: &mut crate::robot::Robot,
    values: &DVector<f64>,
    distal: usize,
) {
    let joint_ids: Vec<usize> = (0..robot.n_joints()).collect();
    robot.set_values(values).unwrap();
    let reference_pose = robot.world_pose(FrameRef::Joint(distal)).unwrap();
    let point = reference_pose.translation.vector;
    let jacobian = robot
        .jacobian(&joint_ids, &point, FrameRef::World)
        .unwrap();

    for (column, &id) in joint_ids.iter().enumerate() {
        let mut perturbed = values.clone();
        perturbed[id] += EPSILON;
        robot.set_values(&perturbed).unwrap();
        let perturbed_pose = robot.world_pose(FrameRef::Joint(distal)).unwrap();

        let linear = (perturbed_pose.translation.vector - point) / EPSILON;
        let angular =
            (perturbed_pose.rotation * reference_pose.rotation.inverse()).scaled_axis() / EPSILON;

        let analytic_linear = Vector3::new(
            jacobian[(0, column)],
            jacobian[(1, column)],
            jacobian[(2, column)],
        );
        let analytic_angular = Vector3::new(
            jacobian[(3, column)],
            jacobian[(4, column)],
            jacobian[(5, column)],
        );
        assert!(
            (linear - analytic_linear).norm() < TOLERANCE,
            "linear column {} disagrees: finite-difference {:?} vs analytic {:?}",
            column,
            linear,
            analytic_linear
        );
        assert!(
            (angular - analytic_angular).norm() < TOLERANCE,
            "angular column {} disagrees: finite-difference {:?} vs analytic {:?}",
            column,
            angular,
            analytic_angular
        );
    }
}

#[test]
fn planar_arm_jacobian_matches_finite_differences() {
    let mut robot = planar_two_link();
    let values = DVector::from_vec(vec![0.7, -0.4]);
    check_against_finite_differences(&mut robot, &values, 1);
}

#[test]
fn six_dof_jacobian_matches_finite_differences_at_several_poses() {
    let mut robot = six_dof_arm();
    let poses = [
        vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        vec![0.3, 0.4, -0.5, 0.2, 0.4, 0.1],
        vec![-0.8, 0.9, 0.7, -0.6, 0.5, -0.4],
    ];
    for values in poses {
        check_against_finite_differences(&mut robot, &DVector::from_vec(values), 5);
    }
}
