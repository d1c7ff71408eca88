//! Camera projection for the triangulation factor.
//!
//! A [`PinholeCamera`] combines a [`Pose3`](crate::geometry::Pose3) with a
//! [`Calibration`]. Projection reports points behind the camera through the
//! [`Projection::BehindCamera`] variant instead of failing.
//!
//! # Available Calibrations
//!
//! - [`PinholeCalibration`]: fx, fy, skew, principal point
//! - [`BundlerCalibration`]: single focal length with radial distortion (k1, k2)

pub mod bundler;
pub mod pinhole;
pub mod pinhole_camera;
pub mod traits;

pub use bundler::BundlerCalibration;
pub use pinhole::PinholeCalibration;
pub use pinhole_camera::PinholeCamera;
pub use traits::{Calibration, Projection};
