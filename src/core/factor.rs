//! Nonlinear factor interface.
//!
//! This trait defines what an optimizer needs from a factor: its keys, its cost at
//! a values assignment, and a linearization around that assignment. Equality,
//! printing and cloning are part of the same capability set so heterogeneous
//! factors can live in one container as `Box<dyn NonlinearFactor>`.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::core::key::Key;
use crate::core::linear::JacobianFactor;
use crate::core::values::ValueLookup;
use crate::error::TriangulationResult;

/// Default tolerance for [`NonlinearFactor::equals`].
pub const DEFAULT_TOLERANCE: f64 = 1e-9;

/// Externally defined predicate deciding whether a factor takes part in a
/// linearization (e.g. a variable outside a trust region).
pub type ActivityPredicate = Arc<dyn Fn(&dyn ValueLookup) -> bool + Send + Sync>;

/// Factor in a nonlinear least-squares problem.
pub trait NonlinearFactor: fmt::Debug + fmt::Display + Send + Sync {
    /// Keys of the variables this factor constrains
    fn keys(&self) -> &[Key];

    /// Residual dimension
    fn dim(&self) -> usize;

    /// Whether the factor should be linearized for `values`. Active by default.
    fn is_active(&self, _values: &dyn ValueLookup) -> bool {
        true
    }

    /// Cost `0.5 ‖whitened residual‖²` at `values`; zero when inactive.
    fn error(&self, values: &dyn ValueLookup) -> TriangulationResult<f64>;

    /// Linearize around `values`.
    ///
    /// Takes `&mut self` because implementations reuse per-instance scratch
    /// buffers; concurrent callers clone the factor first.
    ///
    /// # Returns
    ///
    /// `Ok(None)` when the factor is inactive for `values`.
    fn linearize(
        &mut self,
        values: &dyn ValueLookup,
    ) -> TriangulationResult<Option<JacobianFactor>>;

    /// Structural and numeric equality within `tol`.
    fn equals(&self, other: &dyn NonlinearFactor, tol: f64) -> bool;

    /// Human-readable description prefixed with `label`.
    fn print(&self, label: &str) -> String {
        format!("{label}{self}")
    }

    /// Deep copy behind a trait object.
    fn clone_box(&self) -> Box<dyn NonlinearFactor>;

    fn as_any(&self) -> &dyn Any;
}

impl Clone for Box<dyn NonlinearFactor> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}
