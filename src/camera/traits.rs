//! Core traits and types for camera projection.

use nalgebra::{Matrix2, Matrix2x3, Vector2};
use std::fmt;

/// Outcome of projecting a world point through a camera.
///
/// Points on or behind the image plane are reported as a variant instead of an
/// error, so callers decide how to treat the degenerate geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    /// The point is in front of the camera.
    Visible {
        /// Image coordinates in pixels
        pixel: Vector2<f64>,
        /// ∂(pixel)/∂(world point), present when requested
        jacobian: Option<Matrix2x3<f64>>,
    },
    /// The point has non-positive depth in the camera frame.
    BehindCamera {
        /// Depth (z) of the point in the camera frame
        depth: f64,
    },
}

impl Projection {
    /// Pixel coordinates if the point is visible.
    pub fn pixel(&self) -> Option<Vector2<f64>> {
        match self {
            Projection::Visible { pixel, .. } => Some(*pixel),
            Projection::BehindCamera { .. } => None,
        }
    }

    pub fn is_behind_camera(&self) -> bool {
        matches!(self, Projection::BehindCamera { .. })
    }
}

/// Intrinsic calibration: maps normalized image coordinates to pixels.
///
/// Implementations must be `Send + Sync` so factors holding them can be shared
/// across optimizer threads.
pub trait Calibration: Clone + fmt::Debug + fmt::Display + Send + Sync + 'static {
    /// Focal length scale in x (pixels). Used to size the cheirality penalty.
    fn fx(&self) -> f64;

    /// Convert normalized coordinates `(x/z, y/z)` to pixels.
    ///
    /// # Returns
    ///
    /// Tuple of pixel coordinates and the 2×2 Jacobian ∂(pixel)/∂(normalized).
    fn uncalibrate(&self, normalized: &Vector2<f64>) -> (Vector2<f64>, Matrix2<f64>);

    /// Parameter-wise comparison within `tol`.
    fn equals(&self, other: &Self, tol: f64) -> bool;
}
