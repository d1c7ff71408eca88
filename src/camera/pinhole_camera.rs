//! Calibrated pinhole camera: a pose in the world plus an intrinsic calibration.

use super::traits::{Calibration, Projection};
use crate::error::TriangulationResult;
use crate::geometry::Pose3;
use nalgebra::{Matrix2x3, Matrix3, Vector2, Vector3};
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Pinhole camera over a generic calibration.
///
/// `pose` is the camera-to-world transform. The camera looks down its +Z axis;
/// points with non-positive depth cannot be projected.
///
/// # Example
///
/// ```
/// use triangulation_factor::camera::{PinholeCalibration, PinholeCamera};
/// use triangulation_factor::geometry::Pose3;
/// use nalgebra::Vector3;
///
/// let camera = PinholeCamera::new(Pose3::identity(), PinholeCalibration::default());
/// let uv = camera.project(&Vector3::new(1.0, 1.0, 5.0), false).pixel().unwrap();
/// assert!((uv.x - 0.2).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PinholeCamera<C: Calibration> {
    pose: Pose3,
    calibration: C,
}

impl<C: Calibration> PinholeCamera<C> {
    pub fn new(pose: Pose3, calibration: C) -> Self {
        Self { pose, calibration }
    }

    /// Camera at `eye` looking at `target`. See [`Pose3::look_at`].
    pub fn look_at(
        eye: &Vector3<f64>,
        target: &Vector3<f64>,
        up: &Vector3<f64>,
        calibration: C,
    ) -> TriangulationResult<Self> {
        Ok(Self::new(Pose3::look_at(eye, target, up)?, calibration))
    }

    pub fn pose(&self) -> &Pose3 {
        &self.pose
    }

    pub fn calibration(&self) -> &C {
        &self.calibration
    }

    /// Project a world point into the image.
    ///
    /// # Arguments
    ///
    /// * `point` - 3D point in world coordinates
    /// * `compute_jacobian` - Also compute ∂(pixel)/∂(point) (2×3)
    ///
    /// # Returns
    ///
    /// [`Projection::Visible`] with the pixel (and Jacobian when requested), or
    /// [`Projection::BehindCamera`] when the point's depth is not positive.
    pub fn project(&self, point: &Vector3<f64>, compute_jacobian: bool) -> Projection {
        let mut d_pc_d_point = Matrix3::zeros();
        let p_cam = self.pose.transform_to(
            point,
            if compute_jacobian {
                Some(&mut d_pc_d_point)
            } else {
                None
            },
        );

        if p_cam.z <= 0.0 {
            return Projection::BehindCamera { depth: p_cam.z };
        }

        let inv_z = 1.0 / p_cam.z;
        let normalized = Vector2::new(p_cam.x * inv_z, p_cam.y * inv_z);
        let (pixel, d_pixel_d_pn) = self.calibration.uncalibrate(&normalized);

        let jacobian = compute_jacobian.then(|| {
            // pn = (x/z, y/z)
            // ∂pn/∂pc = [1/z  0   -x/z²]
            //           [0   1/z  -y/z²]
            let d_pn_d_pc = Matrix2x3::new(
                inv_z,
                0.0,
                -normalized.x * inv_z,
                0.0,
                inv_z,
                -normalized.y * inv_z,
            );
            d_pixel_d_pn * d_pn_d_pc * d_pc_d_point
        });

        Projection::Visible { pixel, jacobian }
    }

    pub fn equals(&self, other: &Self, tol: f64) -> bool {
        self.pose.equals(&other.pose, tol) && self.calibration.equals(&other.calibration, tol)
    }
}

impl<C: Calibration> fmt::Display for PinholeCamera<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PinholeCamera(pose: {}, calibration: {})", self.pose, self.calibration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{BundlerCalibration, PinholeCalibration};
    use crate::core::numerical::{numerical_derivative, NUMERICAL_DERIVATIVE_DELTA};

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn assert_jacobian_matches_numerical<C: Calibration>(
        camera: &PinholeCamera<C>,
        point: &Vector3<f64>,
    ) -> TestResult {
        let analytical = match camera.project(point, true) {
            Projection::Visible {
                jacobian: Some(jac),
                ..
            } => jac,
            other => return Err(format!("unexpected projection {other:?}").into()),
        };
        let numerical = numerical_derivative(
            |p: &Vector3<f64>| {
                camera
                    .project(p, false)
                    .pixel()
                    .unwrap_or_else(|| Vector2::repeat(f64::NAN))
            },
            point,
            NUMERICAL_DERIVATIVE_DELTA,
        );

        for r in 0..2 {
            for c in 0..3 {
                let rel_error = (analytical[(r, c)] - numerical[(r, c)]).abs()
                    / (1.0 + numerical[(r, c)].abs());
                assert!(
                    rel_error < 1e-5,
                    "Jacobian mismatch at ({}, {}): analytical={}, numerical={}, rel_error={}",
                    r,
                    c,
                    analytical[(r, c)],
                    numerical[(r, c)],
                    rel_error
                );
            }
        }
        Ok(())
    }

    #[test]
    fn test_projection_on_optical_axis() -> TestResult {
        let camera = PinholeCamera::new(
            Pose3::identity(),
            PinholeCalibration::new(500.0, 500.0, 0.0, 320.0, 240.0),
        );
        let uv = camera
            .project(&Vector3::new(0.0, 0.0, 2.0), false)
            .pixel()
            .ok_or("Projection failed")?;

        assert!((uv - Vector2::new(320.0, 240.0)).norm() < 1e-10);
        Ok(())
    }

    #[test]
    fn test_projection_unit_camera() -> TestResult {
        let camera = PinholeCamera::new(Pose3::identity(), PinholeCalibration::default());
        let uv = camera
            .project(&Vector3::new(1.0, 1.0, 5.0), false)
            .pixel()
            .ok_or("Projection failed")?;

        assert!((uv - Vector2::new(0.2, 0.2)).norm() < 1e-12);
        Ok(())
    }

    #[test]
    fn test_projection_behind_camera() {
        let camera = PinholeCamera::new(Pose3::identity(), PinholeCalibration::default());

        let projection = camera.project(&Vector3::new(0.0, 0.0, -5.0), true);
        assert_eq!(projection, Projection::BehindCamera { depth: -5.0 });
        assert!(projection.is_behind_camera());
        assert!(projection.pixel().is_none());
    }

    #[test]
    fn test_point_on_image_plane_is_behind_camera() {
        let camera = PinholeCamera::new(Pose3::identity(), PinholeCalibration::default());
        assert!(camera
            .project(&Vector3::new(1.0, 0.0, 0.0), false)
            .is_behind_camera());
    }

    #[test]
    fn test_no_jacobian_unless_requested() {
        let camera = PinholeCamera::new(Pose3::identity(), PinholeCalibration::default());
        match camera.project(&Vector3::new(0.1, 0.2, 3.0), false) {
            Projection::Visible { jacobian, .. } => assert!(jacobian.is_none()),
            Projection::BehindCamera { .. } => panic!("point should be visible"),
        }
    }

    #[test]
    fn test_pinhole_jacobian_numerical() -> TestResult {
        let camera = PinholeCamera::new(
            Pose3::from_translation_euler(0.2, -0.1, -1.0, 0.05, -0.1, 0.2),
            PinholeCalibration::new(500.0, 480.0, 0.3, 320.0, 240.0),
        );
        assert_jacobian_matches_numerical(&camera, &Vector3::new(0.3, -0.2, 4.0))
    }

    #[test]
    fn test_bundler_jacobian_numerical() -> TestResult {
        let camera = PinholeCamera::new(
            Pose3::from_translation_euler(-0.3, 0.1, -2.0, -0.1, 0.15, 0.05),
            BundlerCalibration::new(600.0, -0.15, 0.02, 0.0, 0.0),
        );
        assert_jacobian_matches_numerical(&camera, &Vector3::new(0.5, 0.4, 3.0))
    }

    #[test]
    fn test_look_at_camera_sees_target_at_principal_point() -> TestResult {
        let calibration = PinholeCalibration::new(500.0, 500.0, 0.0, 320.0, 240.0);
        let camera = PinholeCamera::look_at(
            &Vector3::new(3.0, 1.0, -4.0),
            &Vector3::new(0.0, 0.0, 1.0),
            &Vector3::new(0.0, 0.0, 1.0).cross(&Vector3::new(1.0, 0.0, 0.0)),
            calibration,
        )?;
        let uv = camera
            .project(&Vector3::new(0.0, 0.0, 1.0), false)
            .pixel()
            .ok_or("target should be visible")?;

        assert!((uv - Vector2::new(320.0, 240.0)).norm() < 1e-9);
        Ok(())
    }

    #[test]
    fn test_camera_equals() {
        let a = PinholeCamera::new(Pose3::identity(), PinholeCalibration::default());
        let b = PinholeCamera::new(
            Pose3::from_translation_euler(0.0, 0.0, 1e-12, 0.0, 0.0, 0.0),
            PinholeCalibration::default(),
        );
        let c = PinholeCamera::new(
            Pose3::identity(),
            PinholeCalibration::new(2.0, 1.0, 0.0, 0.0, 0.0),
        );
        assert!(a.equals(&b, 1e-9));
        assert!(!a.equals(&c, 1e-9));
    }
}
