//! # Triangulation Factor
//!
//! Reprojection residual for triangulating a 3D landmark from camera observations,
//! packaged as a factor for nonlinear least-squares (factor graph) optimizers.
//!
//! ## Features
//!
//! - **Fixed-camera residual**: `project(point) - measured` with its analytic 2×3 Jacobian
//! - **Generic calibration**: pinhole with skew, or Bundler-style radial distortion
//! - **Explicit cheirality handling**: points behind the camera yield a penalty residual,
//!   an optional warning, or an error, chosen per factor
//! - **Gaussian linearization**: whitened `[A | b]` emitted as a [`JacobianFactor`](core::JacobianFactor),
//!   built in per-factor scratch buffers reused across calls
//!
//! ## Example
//!
//! ```
//! use nalgebra::{Vector2, Vector3};
//! use triangulation_factor::camera::{PinholeCalibration, PinholeCamera};
//! use triangulation_factor::core::{NoiseModel, NonlinearFactor, Symbol, Values};
//! use triangulation_factor::geometry::Pose3;
//! use triangulation_factor::TriangulationFactor;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let camera = PinholeCamera::look_at(
//!     &Vector3::new(0.0, 0.0, -5.0),
//!     &Vector3::zeros(),
//!     &Vector3::new(0.0, -1.0, 0.0),
//!     PinholeCalibration::new(500.0, 500.0, 0.0, 320.0, 240.0),
//! )?;
//! let landmark = Symbol::new('l', 0);
//! let mut factor = TriangulationFactor::new(
//!     camera,
//!     Vector2::new(320.0, 240.0),
//!     Some(NoiseModel::isotropic(2, 1.0)?),
//!     landmark,
//! )?;
//!
//! let mut values = Values::new();
//! values.insert(landmark, Vector3::zeros())?;
//! assert!(factor.error(&values)? < 1e-12);
//! assert!(factor.linearize(&values)?.is_some());
//! # Ok(())
//! # }
//! ```

pub mod camera;
pub mod core;
pub mod error;
pub mod factors;
pub mod geometry;
pub mod logger;

// Re-export core types
pub use core::{JacobianFactor, Key, NoiseModel, NonlinearFactor, Symbol, ValueLookup, Values};
pub use error::{TriangulationError, TriangulationResult};

// Re-export factor types
pub use factors::{LinearizationWorkspace, TriangulationFactor};

// Re-export camera types
pub use camera::{BundlerCalibration, Calibration, PinholeCalibration, PinholeCamera, Projection};
pub use geometry::Pose3;

// Re-export logger
pub use logger::{init_logger, init_logger_with_level};
