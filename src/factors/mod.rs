//! Factor implementations
//!
//! # Available Factors
//!
//! - [`TriangulationFactor`]: reprojection error of a landmark in a fixed, calibrated
//!   camera. Unary on the 3D point; the camera pose and calibration are constants.

pub mod triangulation;

pub use triangulation::{
    LinearizationWorkspace, TriangulationFactor, CHEIRALITY_PENALTY_SCALE, MEASUREMENT_DIM,
    POINT_DIM,
};
