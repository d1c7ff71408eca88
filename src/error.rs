//! Error types for the triangulation-factor library
//!
//! This module provides the main error and result types used throughout the library.
//! All errors use the `thiserror` crate for automatic trait implementations.

use crate::core::key::Key;
use thiserror::Error;

/// Main result type used throughout the triangulation-factor library
pub type TriangulationResult<T> = Result<T, TriangulationError>;

/// Main error type for the triangulation-factor library
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TriangulationError {
    /// Invalid construction parameters (wrong noise model dimension, bad sigmas, ...)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A landmark projected behind the image plane and the factor was asked to rethrow
    #[error("Cheirality exception: landmark {key} moved behind camera (depth {depth})")]
    Cheirality {
        /// Key of the offending landmark
        key: Key,
        /// Depth of the landmark in the camera frame (non-positive)
        depth: f64,
    },

    /// Requested key is not present in the values store
    #[error("Key {0} not found in values")]
    KeyNotFound(Key),

    /// Key is present but holds a value of another type
    #[error("Value at key {key} is not a {expected}")]
    TypeMismatch {
        /// Key that was looked up
        key: Key,
        /// Name of the expected value type
        expected: &'static str,
    },

    /// Insert into the values store with a key already in use
    #[error("Key {0} already exists in values")]
    KeyAlreadyExists(Key),

    /// Matrix or vector operands with incompatible sizes
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimension
        expected: usize,
        /// Actual dimension
        actual: usize,
    },
}
