//! Core factor-graph components for the triangulation factor
//!
//! This module contains the building blocks a factor needs to plug into a
//! nonlinear least-squares optimizer:
//! - Variable keys and value lookup
//! - Gaussian noise models and whitening
//! - Linearized factors handed to the sparse solver
//! - The nonlinear factor interface
//! - Numerical derivatives for validating analytic Jacobians

pub mod factor;
pub mod key;
pub mod linear;
pub mod noise_model;
pub mod numerical;
pub mod values;

pub use factor::{ActivityPredicate, NonlinearFactor, DEFAULT_TOLERANCE};
pub use key::{Key, Symbol};
pub use linear::{JacobianFactor, VerticalBlockMatrix};
pub use noise_model::NoiseModel;
pub use values::{ValueLookup, Values, VariableValue};
