//! Vector and homogeneous matrix helpers shared by every pipeline stage

use nalgebra::{Matrix3, Matrix4, Unit, Vector3, Vector4};

pub type Vec3 = Vector3<f32>;
pub type Vec4 = Vector4<f32>;
pub type Mat4 = Matrix4<f32>;

pub fn cross(a: &Vec3, b: &Vec3) -> Vec3 {
    a.cross(b)
}

/// Angle in radians between two vectors, `None` if either has zero length.
pub fn angle_between(a: &Vec3, b: &Vec3) -> Option<f32> {
    let denom = a.norm() * b.norm();
    if denom == 0.0 || !denom.is_finite() {
        return None;
    }
    // Rounding can push the cosine just past +-1 for nearly parallel vectors
    let cos = (a.dot(b) / denom).clamp(-1.0, 1.0);
    Some(cos.acos())
}

/// Build a homogeneous rotation of `angle` radians about `axis`.
///
/// The 3x3 block is Rodrigues' formula `I + sin(t)K + (1 - cos(t))K^2`, where
/// `K` is the cross-product matrix of the unit axis. Returns `None` for a zero
/// angle or an axis that cannot be normalized, so callers never fold NaN into
/// an accumulated rotation.
pub fn axis_angle(angle: f32, axis: &Vec3) -> Option<Mat4> {
    if angle == 0.0 || !angle.is_finite() {
        return None;
    }
    let axis = Unit::try_new(*axis, f32::EPSILON)?;
    if !axis.iter().all(|c| c.is_finite()) {
        return None;
    }

    let k = axis.cross_matrix();
    let r = Matrix3::identity() + k * angle.sin() + k * k * (1.0 - angle.cos());

    let mut m = Mat4::identity();
    m.fixed_view_mut::<3, 3>(0, 0).copy_from(&r);
    Some(m)
}

/// Uniform scale on x, y, z with w left at 1.
pub fn uniform_scale(s: f32) -> Mat4 {
    Mat4::from_diagonal(&Vec4::new(s, s, s, 1.0))
}

/// True if the upper 3x3 block is orthonormal with determinant +1.
pub fn is_proper_rotation(m: &Mat4, tolerance: f32) -> bool {
    let r: Matrix3<f32> = m.fixed_view::<3, 3>(0, 0).into_owned();
    let orthonormal = (r * r.transpose() - Matrix3::identity()).norm() < tolerance;
    orthonormal && (r.determinant() - 1.0).abs() < tolerance
}

/// Gram-Schmidt the upper 3x3 block back to a proper rotation, keeping the
/// direction of the first column. Degenerate blocks are returned unchanged.
pub fn orthonormalize(m: &Mat4) -> Mat4 {
    let a: Vec3 = m.fixed_view::<3, 1>(0, 0).into_owned();
    let b: Vec3 = m.fixed_view::<3, 1>(0, 1).into_owned();
    let Some(x) = a.try_normalize(f32::EPSILON) else {
        return *m;
    };
    let Some(y) = (b - x * x.dot(&b)).try_normalize(f32::EPSILON) else {
        return *m;
    };
    let z = x.cross(&y);

    let mut out = *m;
    out.fixed_view_mut::<3, 1>(0, 0).copy_from(&x);
    out.fixed_view_mut::<3, 1>(0, 1).copy_from(&y);
    out.fixed_view_mut::<3, 1>(0, 2).copy_from(&z);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_angle_between_perpendicular() {
        let angle = angle_between(&Vec3::x(), &Vec3::z()).unwrap();
        assert!((angle - FRAC_PI_2).abs() < 1e-6);
    }

    #[test]
    fn test_angle_between_zero_vector() {
        assert!(angle_between(&Vec3::zeros(), &Vec3::z()).is_none());
    }

    #[test]
    fn test_angle_between_parallel_is_zero() {
        let a = Vec3::new(0.3, 0.4, 0.5);
        let angle = angle_between(&a, &(a * 2.0)).unwrap();
        assert!(angle.abs() < 1e-3);
    }

    #[test]
    fn test_axis_angle_is_proper_rotation() {
        let axes = [
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, -3.0, 0.0),
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(-0.2, 0.7, 5.0),
        ];
        let angles = [0.01, 0.5, FRAC_PI_2, PI, -2.3];
        for axis in &axes {
            for &angle in &angles {
                let m = axis_angle(angle, axis).unwrap();
                assert!(is_proper_rotation(&m, 1e-4), "axis {axis:?} angle {angle}");
                assert_eq!(m[(3, 3)], 1.0);
                assert_eq!(m[(0, 3)], 0.0);
                assert_eq!(m[(3, 0)], 0.0);
            }
        }
    }

    #[test]
    fn test_axis_angle_rotates_about_z() {
        let m = axis_angle(FRAC_PI_2, &Vec3::z()).unwrap();
        let p = m * Vec4::new(1.0, 0.0, 0.0, 1.0);
        assert!((p - Vec4::new(0.0, 1.0, 0.0, 1.0)).norm() < 1e-6);
    }

    #[test]
    fn test_axis_angle_degenerate_inputs() {
        assert!(axis_angle(0.0, &Vec3::x()).is_none());
        assert!(axis_angle(1.0, &Vec3::zeros()).is_none());
        assert!(axis_angle(f32::NAN, &Vec3::x()).is_none());
        assert!(axis_angle(1.0, &Vec3::new(f32::NAN, 0.0, 1.0)).is_none());
    }

    #[test]
    fn test_uniform_scale_keeps_w() {
        let p = uniform_scale(0.5) * Vec4::new(2.0, 4.0, -6.0, 1.0);
        assert_eq!(p, Vec4::new(1.0, 2.0, -3.0, 1.0));
    }

    #[test]
    fn test_orthonormalize_repairs_skewed_rotation() {
        let mut m = axis_angle(0.7, &Vec3::new(1.0, 2.0, 3.0)).unwrap();
        m[(0, 0)] += 1e-3;
        m[(1, 2)] -= 2e-3;
        assert!(!is_proper_rotation(&m, 1e-4));

        let fixed = orthonormalize(&m);
        assert!(is_proper_rotation(&fixed, 1e-5));
        assert!((fixed - m).norm() < 1e-2);
        assert_eq!(orthonormalize(&Mat4::zeros()), Mat4::zeros());
    }
}
