//! Central-difference Jacobians.
//!
//! Used to validate analytic derivatives of projection and residual functions.

use nalgebra::{SMatrix, SVector};

/// Default perturbation for central differences.
pub const NUMERICAL_DERIVATIVE_DELTA: f64 = 1e-5;

/// Numerical Jacobian ∂f/∂x of `f: Rᴺ → Rᴹ` at `x`.
///
/// Column `i` is `(f(x + δ eᵢ) - f(x - δ eᵢ)) / 2δ`.
pub fn numerical_derivative<F, const M: usize, const N: usize>(
    f: F,
    x: &SVector<f64, N>,
    delta: f64,
) -> SMatrix<f64, M, N>
where
    F: Fn(&SVector<f64, N>) -> SVector<f64, M>,
{
    let mut jacobian = SMatrix::<f64, M, N>::zeros();
    for i in 0..N {
        let mut x_plus = *x;
        let mut x_minus = *x;
        x_plus[i] += delta;
        x_minus[i] -= delta;

        let column = (f(&x_plus) - f(&x_minus)) / (2.0 * delta);
        jacobian.set_column(i, &column);
    }
    jacobian
}
