use nalgebra::{Matrix3, Rotation3, Vector3};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransformError {
    #[error("Invalid Euler sequence '{0}': expected 1-3 axes from 'xyz', all lowercase (extrinsic) or all uppercase (intrinsic)")]
    InvalidSequence(String),
    #[error("Euler sequence '{sequence}' needs {expected} angles, got {found}")]
    AngleCount {
        sequence: String,
        expected: usize,
        found: usize,
    },
}

/// Rotation by `angle` radians about one of the frame axes.
pub fn axis_rotation(axis: char, angle: f64) -> Option<Rotation3<f64>> {
    let unit = match axis.to_ascii_lowercase() {
        'x' => Vector3::x_axis(),
        'y' => Vector3::y_axis(),
        'z' => Vector3::z_axis(),
        _ => return None,
    };
    Some(Rotation3::from_axis_angle(&unit, angle))
}

/// Builds a rotation matrix from an Euler sequence.
///
/// Lowercase axes (`"xz"`) rotate about the fixed frame axes in order; uppercase axes
/// (`"ZYX"`) rotate about the moving body axes. Angles are in radians.
pub fn euler_rotation(sequence: &str, angles: &[f64]) -> Result<Matrix3<f64>, TransformError> {
    let axes: Vec<char> = sequence.chars().collect();
    let intrinsic = axes.iter().all(|c| c.is_ascii_uppercase());
    let extrinsic = axes.iter().all(|c| c.is_ascii_lowercase());
    if axes.is_empty() || axes.len() > 3 || !(intrinsic || extrinsic) {
        return Err(TransformError::InvalidSequence(sequence.to_string()));
    }
    if angles.len() != axes.len() {
        return Err(TransformError::AngleCount {
            sequence: sequence.to_string(),
            expected: axes.len(),
            found: angles.len(),
        });
    }

    let mut rotation = Rotation3::identity();
    for (&axis, &angle) in axes.iter().zip(angles) {
        let step = axis_rotation(axis, angle)
            .ok_or_else(|| TransformError::InvalidSequence(sequence.to_string()))?;
        rotation = if intrinsic {
            rotation * step
        } else {
            step * rotation
        };
    }
    Ok(rotation.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn single_axis_rotation_maps_y_to_z() {
        let r = euler_rotation("x", &[FRAC_PI_2]).unwrap();
        let v = r * Vector3::y();
        assert!((v - Vector3::z()).norm() < 1e-12);
    }

    #[test]
    fn intrinsic_and_extrinsic_orders_are_reversed() {
        let angles = [0.3, -1.1];
        let intrinsic = euler_rotation("ZX", &angles).unwrap();
        let extrinsic = euler_rotation("xz", &[angles[1], angles[0]]).unwrap();
        assert!((intrinsic - extrinsic).norm() < 1e-12);
    }

    #[test]
    fn malformed_sequences_are_rejected() {
        assert!(matches!(
            euler_rotation("xY", &[0.0, 0.0]),
            Err(TransformError::InvalidSequence(_))
        ));
        assert!(matches!(
            euler_rotation("xq", &[0.0, 0.0]),
            Err(TransformError::InvalidSequence(_))
        ));
        assert!(matches!(
            euler_rotation("xyz", &[0.0]),
            Err(TransformError::AngleCount { expected: 3, .. })
        ));
    }
}
