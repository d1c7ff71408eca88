//! Bundler-style calibration: single focal length with two radial distortion terms.
//!
//! This is the intrinsic model used by Bundler and the BAL datasets, expressed in the
//! standard convention (camera looks down +Z).

use super::traits::Calibration;
use nalgebra::{Matrix2, Vector2};
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Radial calibration with focal length `f`, distortion `k1`, `k2` and principal point.
///
/// # Projection Model
///
/// For normalized coordinates `(x, y)`:
/// ```text
/// r² = x² + y²
/// g = 1 + k1*r² + k2*r⁴
/// u = f * g * x + u0
/// v = f * g * y + v0
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BundlerCalibration {
    /// Focal length (pixels)
    pub f: f64,
    /// First radial distortion coefficient
    pub k1: f64,
    /// Second radial distortion coefficient
    pub k2: f64,
    /// Principal point x coordinate (pixels)
    pub u0: f64,
    /// Principal point y coordinate (pixels)
    pub v0: f64,
}

impl BundlerCalibration {
    #[must_use]
    pub const fn new(f: f64, k1: f64, k2: f64, u0: f64, v0: f64) -> Self {
        Self { f, k1, k2, u0, v0 }
    }

    /// Calibration without distortion (k1=0, k2=0).
    #[must_use]
    pub const fn new_no_distortion(f: f64, u0: f64, v0: f64) -> Self {
        Self::new(f, 0.0, 0.0, u0, v0)
    }
}

impl Calibration for BundlerCalibration {
    fn fx(&self) -> f64 {
        self.f
    }

    fn uncalibrate(&self, normalized: &Vector2<f64>) -> (Vector2<f64>, Matrix2<f64>) {
        let (x, y) = (normalized.x, normalized.y);
        let r2 = x * x + y * y;
        let g = 1.0 + (self.k1 + self.k2 * r2) * r2;

        let pixel = Vector2::new(self.f * g * x + self.u0, self.f * g * y + self.v0);

        // ∂g/∂x = 2x (k1 + 2 k2 r²), same for y
        let dg_dr2 = self.k1 + 2.0 * self.k2 * r2;
        let dg_dx = 2.0 * x * dg_dr2;
        let dg_dy = 2.0 * y * dg_dr2;

        let jacobian = Matrix2::new(
            self.f * (g + x * dg_dx),
            self.f * x * dg_dy,
            self.f * y * dg_dx,
            self.f * (g + y * dg_dy),
        );
        (pixel, jacobian)
    }

    fn equals(&self, other: &Self, tol: f64) -> bool {
        (self.f - other.f).abs() <= tol
            && (self.k1 - other.k1).abs() <= tol
            && (self.k2 - other.k2).abs() <= tol
            && (self.u0 - other.u0).abs() <= tol
            && (self.v0 - other.v0).abs() <= tol
    }
}

impl fmt::Display for BundlerCalibration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BundlerCalibration(f: {}, k1: {}, k2: {}, u0: {}, v0: {})",
            self.f, self.k1, self.k2, self.u0, self.v0
        )
    }
}
