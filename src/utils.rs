//! Helper functions

use nalgebra::DVector;

/// Scales the vector down so its Euclidean norm does not exceed `clamp`.
pub fn clamp_mag(v: &mut DVector<f64>, clamp: f64) {
    let norm = v.norm();
    if norm > clamp {
        *v *= clamp / norm;
    }
}

/// Scales the vector down so its largest absolute component does not exceed
/// `clamp`.
pub fn clamp_max_abs(v: &mut DVector<f64>, clamp: f64) {
    if v.is_empty() {
        return;
    }
    let max_abs = v.amax();
    if max_abs > clamp {
        *v *= clamp / max_abs;
    }
}

/// Convert joint values given in degrees to a radian value vector.
pub fn values_from_degrees(degrees: &[f64]) -> DVector<f64> {
    DVector::from_iterator(degrees.len(), degrees.iter().map(|d| d.to_radians()))
}

/// Convert a radian value vector to degrees.
pub fn values_to_degrees(values: &DVector<f64>) -> Vec<f64> {
    values.iter().map(|v| v.to_degrees()).collect()
}

/// Print joint values, converting radians to degrees.
#[allow(dead_code)]
pub fn dump_values(values: &DVector<f64>) {
    let mut row = String::new();
    for value in values.iter() {
        row.push_str(&format!("{:5.2} ", value.to_degrees()));
    }
    println!("[{}]", row.trim_end());
}
