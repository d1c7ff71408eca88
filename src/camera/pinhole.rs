//! Pinhole calibration with skew (no distortion).

use super::traits::Calibration;
use crate::error::{TriangulationError, TriangulationResult};
use nalgebra::{Matrix2, Matrix3, Vector2};
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Pinhole calibration with 5 intrinsic parameters.
///
/// # Parameters
///
/// - `fx`, `fy`: Focal lengths in pixels
/// - `skew`: Axis skew
/// - `cx`, `cy`: Principal point coordinates in pixels
///
/// # Projection Model
///
/// For normalized coordinates `(x, y)`:
/// ```text
/// u = fx * x + skew * y + cx
/// v = fy * y + cy
/// ```
///
/// # Example
///
/// ```
/// use triangulation_factor::camera::{Calibration, PinholeCalibration};
/// use nalgebra::Vector2;
///
/// let calibration = PinholeCalibration::new(500.0, 500.0, 0.0, 320.0, 240.0);
/// let (uv, _) = calibration.uncalibrate(&Vector2::new(0.1, 0.2));
///
/// assert!((uv.x - 370.0).abs() < 1e-10);  // 500 * 0.1 + 320
/// assert!((uv.y - 340.0).abs() < 1e-10);  // 500 * 0.2 + 240
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PinholeCalibration {
    /// Focal length in x direction (pixels)
    pub fx: f64,
    /// Focal length in y direction (pixels)
    pub fy: f64,
    /// Skew between image axes
    pub skew: f64,
    /// Principal point x coordinate (pixels)
    pub cx: f64,
    /// Principal point y coordinate (pixels)
    pub cy: f64,
}

impl Default for PinholeCalibration {
    /// Unit focal length, no skew, principal point at the origin.
    fn default() -> Self {
        Self::new(1.0, 1.0, 0.0, 0.0, 0.0)
    }
}

impl PinholeCalibration {
    #[must_use]
    pub const fn new(fx: f64, fy: f64, skew: f64, cx: f64, cy: f64) -> Self {
        Self {
            fx,
            fy,
            skew,
            cx,
            cy,
        }
    }

    /// Calibration from a field of view (degrees) and image size, square pixels.
    pub fn from_fov(fov_degrees: f64, width: u32, height: u32) -> Self {
        let cx = f64::from(width) / 2.0;
        let cy = f64::from(height) / 2.0;
        let f = cx / (fov_degrees.to_radians() / 2.0).tan();
        Self::new(f, f, 0.0, cx, cy)
    }

    /// The 3×3 calibration matrix K.
    pub fn k(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.fx, self.skew, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        )
    }

    /// Convert pixels back to normalized coordinates.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if a focal length is zero.
    pub fn calibrate(&self, pixel: &Vector2<f64>) -> TriangulationResult<Vector2<f64>> {
        if self.fx == 0.0 || self.fy == 0.0 {
            return Err(TriangulationError::InvalidArgument(
                "cannot calibrate with a zero focal length".to_string(),
            ));
        }
        let y = (pixel.y - self.cy) / self.fy;
        let x = (pixel.x - self.cx - self.skew * y) / self.fx;
        Ok(Vector2::new(x, y))
    }
}

impl Calibration for PinholeCalibration {
    fn fx(&self) -> f64 {
        self.fx
    }

    fn uncalibrate(&self, normalized: &Vector2<f64>) -> (Vector2<f64>, Matrix2<f64>) {
        let (x, y) = (normalized.x, normalized.y);
        let pixel = Vector2::new(
            self.fx * x + self.skew * y + self.cx,
            self.fy * y + self.cy,
        );
        let jacobian = Matrix2::new(self.fx, self.skew, 0.0, self.fy);
        (pixel, jacobian)
    }

    fn equals(&self, other: &Self, tol: f64) -> bool {
        (self.fx - other.fx).abs() <= tol
            && (self.fy - other.fy).abs() <= tol
            && (self.skew - other.skew).abs() <= tol
            && (self.cx - other.cx).abs() <= tol
            && (self.cy - other.cy).abs() <= tol
    }
}

impl fmt::Display for PinholeCalibration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PinholeCalibration(fx: {}, fy: {}, s: {}, cx: {}, cy: {})",
            self.fx, self.fy, self.skew, self.cx, self.cy
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn assert_approx_eq(a: f64, b: f64, eps: f64) {
        assert!(
            (a - b).abs() < eps,
            "Values {} and {} differ by more than {}",
            a,
            b,
            eps
        );
    }

    #[test]
    fn test_uncalibrate_with_skew() {
        let calibration = PinholeCalibration::new(500.0, 400.0, 0.5, 320.0, 240.0);
        let (uv, jac) = calibration.uncalibrate(&Vector2::new(0.1, 0.2));

        assert_approx_eq(uv.x, 500.0 * 0.1 + 0.5 * 0.2 + 320.0, 1e-10);
        assert_approx_eq(uv.y, 400.0 * 0.2 + 240.0, 1e-10);
        assert_eq!(jac, Matrix2::new(500.0, 0.5, 0.0, 400.0));
    }

    #[test]
    fn test_calibrate_inverts_uncalibrate() -> TestResult {
        let calibration = PinholeCalibration::new(500.0, 400.0, 0.5, 320.0, 240.0);
        let normalized = Vector2::new(-0.3, 0.25);

        let (uv, _) = calibration.uncalibrate(&normalized);
        let back = calibration.calibrate(&uv)?;

        assert!((back - normalized).norm() < 1e-12);
        Ok(())
    }

    #[test]
    fn test_calibrate_rejects_zero_focal_length() {
        let calibration = PinholeCalibration::new(0.0, 1.0, 0.0, 0.0, 0.0);
        assert!(calibration.calibrate(&Vector2::new(1.0, 1.0)).is_err());
    }

    #[test]
    fn test_k_matrix() {
        let calibration = PinholeCalibration::new(500.0, 400.0, 0.5, 320.0, 240.0);
        let k = calibration.k();
        assert_eq!(k[(0, 1)], 0.5);
        assert_eq!(k[(1, 2)], 240.0);
        assert_eq!(k[(2, 2)], 1.0);
    }

    #[test]
    fn test_from_fov() {
        let calibration = PinholeCalibration::from_fov(90.0, 640, 480);
        assert_approx_eq(calibration.fx, 320.0, 1e-9);
        assert_approx_eq(calibration.cy, 240.0, 1e-12);
    }

    #[test]
    fn test_equals_tolerance() {
        let a = PinholeCalibration::new(500.0, 500.0, 0.0, 320.0, 240.0);
        let b = PinholeCalibration::new(500.0 + 1e-10, 500.0, 0.0, 320.0, 240.0);
        assert!(a.equals(&b, 1e-9));
        assert!(!a.equals(&b, 1e-12));
    }
}
