//! Gaussian measurement noise models.
//!
//! A noise model whitens residuals and linear systems so that every factor
//! contributes in a unit-covariance frame. With square-root information `R`
//! (`RᵀR = Σ⁻¹`), whitening maps `e ↦ R e` and `(A, b) ↦ (R A, R b)`.
//!
//! Constrained (zero-sigma) models are not representable: every
//! constructor rejects non-positive sigmas.

use nalgebra::{DMatrix, DVector};
use std::fmt;

use crate::error::{TriangulationError, TriangulationResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Closed set of Gaussian noise models.
///
/// Deserialization goes through the validating constructors.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(try_from = "NoiseModelRepr")
)]
pub enum NoiseModel {
    /// Identity covariance
    Unit { dim: usize },
    /// Same standard deviation on every component
    Isotropic { dim: usize, sigma: f64 },
    /// Independent per-component standard deviations
    Diagonal { sigmas: DVector<f64> },
    /// Full covariance, stored as upper-triangular square-root information
    Gaussian { sqrt_information: DMatrix<f64> },
}

/// Unchecked wire form of [`NoiseModel`].
#[cfg(feature = "serde")]
#[derive(Deserialize)]
enum NoiseModelRepr {
    Unit { dim: usize },
    Isotropic { dim: usize, sigma: f64 },
    Diagonal { sigmas: DVector<f64> },
    Gaussian { sqrt_information: DMatrix<f64> },
}

#[cfg(feature = "serde")]
impl TryFrom<NoiseModelRepr> for NoiseModel {
    type Error = TriangulationError;

    fn try_from(repr: NoiseModelRepr) -> TriangulationResult<Self> {
        match repr {
            NoiseModelRepr::Unit { dim } => Ok(NoiseModel::unit(dim)),
            NoiseModelRepr::Isotropic { dim, sigma } => NoiseModel::isotropic(dim, sigma),
            NoiseModelRepr::Diagonal { sigmas } => NoiseModel::diagonal(sigmas),
            NoiseModelRepr::Gaussian { sqrt_information } => {
                NoiseModel::from_sqrt_information(sqrt_information)
            }
        }
    }
}

impl NoiseModel {
    pub fn unit(dim: usize) -> Self {
        NoiseModel::Unit { dim }
    }

    /// # Errors
    ///
    /// `InvalidArgument` unless `sigma` is finite and positive.
    pub fn isotropic(dim: usize, sigma: f64) -> TriangulationResult<Self> {
        if !(sigma.is_finite() && sigma > 0.0) {
            return Err(TriangulationError::InvalidArgument(format!(
                "isotropic noise model requires a positive sigma, got {sigma}"
            )));
        }
        Ok(NoiseModel::Isotropic { dim, sigma })
    }

    /// # Errors
    ///
    /// `InvalidArgument` unless every sigma is finite and positive.
    pub fn diagonal(sigmas: DVector<f64>) -> TriangulationResult<Self> {
        if let Some(bad) = sigmas.iter().find(|s| !(s.is_finite() && **s > 0.0)) {
            return Err(TriangulationError::InvalidArgument(format!(
                "diagonal noise model requires positive sigmas, got {bad}"
            )));
        }
        Ok(NoiseModel::Diagonal { sigmas })
    }

    /// Build from a covariance matrix.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `covariance` is not square or not positive definite.
    pub fn from_covariance(covariance: DMatrix<f64>) -> TriangulationResult<Self> {
        if !covariance.is_square() {
            return Err(TriangulationError::InvalidArgument(format!(
                "covariance must be square, got {}x{}",
                covariance.nrows(),
                covariance.ncols()
            )));
        }
        let not_positive_definite = || {
            TriangulationError::InvalidArgument(
                "covariance must be positive definite".to_string(),
            )
        };
        let information = covariance
            .cholesky()
            .ok_or_else(not_positive_definite)?
            .inverse();
        // information = L Lᵀ, so R = Lᵀ satisfies RᵀR = information
        let sqrt_information = information
            .cholesky()
            .ok_or_else(not_positive_definite)?
            .l()
            .transpose();
        Ok(NoiseModel::Gaussian { sqrt_information })
    }

    /// Build from a square-root information matrix `R`.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `R` is empty, not square, has non-finite entries or is
    /// numerically rank deficient (smallest singular value below `n·ε` times the largest).
    pub fn from_sqrt_information(sqrt_information: DMatrix<f64>) -> TriangulationResult<Self> {
        if !sqrt_information.is_square() || sqrt_information.is_empty() {
            return Err(TriangulationError::InvalidArgument(format!(
                "square-root information must be square and non-empty, got {}x{}",
                sqrt_information.nrows(),
                sqrt_information.ncols()
            )));
        }
        if sqrt_information.iter().any(|x| !x.is_finite()) {
            return Err(TriangulationError::InvalidArgument(
                "square-root information has non-finite entries".to_string(),
            ));
        }
        let singular_values = sqrt_information.singular_values();
        let largest = singular_values.max();
        let smallest = singular_values.min();
        let threshold = largest * f64::EPSILON * sqrt_information.nrows() as f64;
        if largest <= 0.0 || smallest <= threshold {
            return Err(TriangulationError::InvalidArgument(format!(
                "square-root information is singular (singular values in [{smallest:e}, {largest:e}])"
            )));
        }
        Ok(NoiseModel::Gaussian { sqrt_information })
    }

    pub fn dim(&self) -> usize {
        match self {
            NoiseModel::Unit { dim } | NoiseModel::Isotropic { dim, .. } => *dim,
            NoiseModel::Diagonal { sigmas } => sigmas.len(),
            NoiseModel::Gaussian { sqrt_information } => sqrt_information.nrows(),
        }
    }

    /// The square-root information matrix `R` as a dense matrix.
    pub fn sqrt_information(&self) -> DMatrix<f64> {
        match self {
            NoiseModel::Unit { dim } => DMatrix::identity(*dim, *dim),
            NoiseModel::Isotropic { dim, sigma } => {
                DMatrix::from_diagonal_element(*dim, *dim, 1.0 / sigma)
            }
            NoiseModel::Diagonal { sigmas } => DMatrix::from_diagonal(&sigmas.map(|s| 1.0 / s)),
            NoiseModel::Gaussian { sqrt_information } => sqrt_information.clone(),
        }
    }

    /// Per-component standard deviations, `sqrt(diag(Σ))`.
    pub fn sigmas(&self) -> DVector<f64> {
        match self {
            NoiseModel::Unit { dim } => DVector::from_element(*dim, 1.0),
            NoiseModel::Isotropic { dim, sigma } => DVector::from_element(*dim, *sigma),
            NoiseModel::Diagonal { sigmas } => sigmas.clone(),
            NoiseModel::Gaussian { sqrt_information } => {
                let dim = sqrt_information.nrows();
                match sqrt_information.clone().try_inverse() {
                    // Σ = R⁻¹ R⁻ᵀ
                    Some(r_inv) => (&r_inv * r_inv.transpose()).diagonal().map(f64::sqrt),
                    None => DVector::from_element(dim, f64::INFINITY),
                }
            }
        }
    }

    fn check_rows(&self, rows: usize) -> TriangulationResult<()> {
        if rows != self.dim() {
            return Err(TriangulationError::DimensionMismatch {
                expected: self.dim(),
                actual: rows,
            });
        }
        Ok(())
    }

    /// Whitened copy of a residual vector.
    pub fn whiten(&self, v: &DVector<f64>) -> TriangulationResult<DVector<f64>> {
        let mut whitened = v.clone();
        self.whiten_in_place(&mut whitened)?;
        Ok(whitened)
    }

    /// Whiten a residual vector in place.
    pub fn whiten_in_place(&self, v: &mut DVector<f64>) -> TriangulationResult<()> {
        self.check_rows(v.nrows())?;
        match self {
            NoiseModel::Unit { .. } => {}
            NoiseModel::Isotropic { sigma, .. } => *v /= *sigma,
            NoiseModel::Diagonal { sigmas } => v.component_div_assign(sigmas),
            NoiseModel::Gaussian { sqrt_information } => *v = sqrt_information * &*v,
        }
        Ok(())
    }

    /// Whiten the rows of a Jacobian in place.
    pub fn whiten_matrix(&self, a: &mut DMatrix<f64>) -> TriangulationResult<()> {
        self.check_rows(a.nrows())?;
        match self {
            NoiseModel::Unit { .. } => {}
            NoiseModel::Isotropic { sigma, .. } => *a /= *sigma,
            NoiseModel::Diagonal { sigmas } => {
                for (i, sigma) in sigmas.iter().enumerate() {
                    a.row_mut(i).unscale_mut(*sigma);
                }
            }
            NoiseModel::Gaussian { sqrt_information } => *a = sqrt_information * &*a,
        }
        Ok(())
    }

    /// Whiten a linear system `(A, b)` in place.
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` if either operand's row count differs from `dim()`.
    pub fn whiten_system(
        &self,
        a: &mut DMatrix<f64>,
        b: &mut DVector<f64>,
    ) -> TriangulationResult<()> {
        self.check_rows(b.nrows())?;
        self.whiten_matrix(a)?;
        self.whiten_in_place(b)
    }

    /// Mahalanobis distance squared: `‖R v‖²`.
    pub fn squared_mahalanobis_distance(&self, v: &DVector<f64>) -> TriangulationResult<f64> {
        Ok(self.whiten(v)?.norm_squared())
    }

    /// Same variant, same dimension and square-root information within `tol`.
    pub fn equals(&self, other: &NoiseModel, tol: f64) -> bool {
        if std::mem::discriminant(self) != std::mem::discriminant(other)
            || self.dim() != other.dim()
        {
            return false;
        }
        (self.sqrt_information() - other.sqrt_information()).amax() <= tol
    }
}

impl fmt::Display for NoiseModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoiseModel::Unit { dim } => write!(f, "unit (dim {dim})"),
            NoiseModel::Isotropic { dim, sigma } => {
                write!(f, "isotropic (dim {dim}, sigma {sigma})")
            }
            NoiseModel::Diagonal { sigmas } => {
                let sigmas: Vec<String> = sigmas.iter().map(|s| s.to_string()).collect();
                write!(f, "diagonal sigmas [{}]", sigmas.join(", "))
            }
            NoiseModel::Gaussian { sqrt_information } => {
                write!(f, "gaussian (dim {})", sqrt_information.nrows())
            }
        }
    }
}
