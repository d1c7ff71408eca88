//! Linearized (Gaussian) factors.
//!
//! Linearizing a nonlinear factor around the current estimate yields a small
//! system `A δ ≈ b`. The augmented matrix `[A₁ … Aₙ | b]` is stored column-block
//! wise in a [`VerticalBlockMatrix`], one block per variable plus the rhs block,
//! and wrapped with its keys in a [`JacobianFactor`] for the sparse solver.

use nalgebra::{DMatrix, DMatrixView, DMatrixViewMut, DVector};
use std::fmt;

use crate::core::key::Key;
use crate::error::{TriangulationError, TriangulationResult};

/// Dense matrix partitioned into column blocks that span all rows.
#[derive(Debug, Clone, PartialEq)]
pub struct VerticalBlockMatrix {
    /// Column offset of each block, plus the total column count at the end
    column_offsets: Vec<usize>,
    matrix: DMatrix<f64>,
}

impl VerticalBlockMatrix {
    /// Allocate a zero matrix with the given block widths.
    ///
    /// # Arguments
    /// * `block_dims` - Width of each variable block
    /// * `rows` - Number of rows
    /// * `append_one_dimension` - Add a trailing 1-column block for the rhs
    pub fn new(block_dims: &[usize], rows: usize, append_one_dimension: bool) -> Self {
        let mut column_offsets = Vec::with_capacity(block_dims.len() + 2);
        column_offsets.push(0);
        let mut offset = 0;
        for dim in block_dims
            .iter()
            .copied()
            .chain(append_one_dimension.then_some(1))
        {
            offset += dim;
            column_offsets.push(offset);
        }
        Self {
            column_offsets,
            matrix: DMatrix::zeros(rows, offset),
        }
    }

    pub fn n_blocks(&self) -> usize {
        self.column_offsets.len() - 1
    }

    pub fn rows(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn cols(&self) -> usize {
        self.matrix.ncols()
    }

    /// Width of block `block`.
    ///
    /// # Panics
    ///
    /// Panics if `block >= n_blocks()`.
    pub fn block_dim(&self, block: usize) -> usize {
        self.column_offsets[block + 1] - self.column_offsets[block]
    }

    /// View of block `block`.
    ///
    /// # Panics
    ///
    /// Panics if `block >= n_blocks()`.
    pub fn block(&self, block: usize) -> DMatrixView<'_, f64> {
        let start = self.column_offsets[block];
        self.matrix.columns(start, self.block_dim(block))
    }

    /// Mutable view of block `block`.
    ///
    /// # Panics
    ///
    /// Panics if `block >= n_blocks()`.
    pub fn block_mut(&mut self, block: usize) -> DMatrixViewMut<'_, f64> {
        let start = self.column_offsets[block];
        let dim = self.block_dim(block);
        self.matrix.columns_mut(start, dim)
    }

    /// The whole augmented matrix
    pub fn full(&self) -> &DMatrix<f64> {
        &self.matrix
    }
}

/// Linear factor `‖Σᵢ Aᵢ δᵢ - b‖²` over a set of keys.
#[derive(Debug, Clone, PartialEq)]
pub struct JacobianFactor {
    keys: Vec<Key>,
    ab: VerticalBlockMatrix,
}

impl JacobianFactor {
    /// Wrap an augmented matrix whose last block is the rhs.
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` unless `ab` has one block per key plus the rhs block
    /// and that last block is a single column.
    pub fn new(keys: Vec<Key>, ab: VerticalBlockMatrix) -> TriangulationResult<Self> {
        if ab.n_blocks() != keys.len() + 1 {
            return Err(TriangulationError::DimensionMismatch {
                expected: keys.len() + 1,
                actual: ab.n_blocks(),
            });
        }
        let rhs_dim = ab.block_dim(keys.len());
        if rhs_dim != 1 {
            return Err(TriangulationError::DimensionMismatch {
                expected: 1,
                actual: rhs_dim,
            });
        }
        Ok(Self { keys, ab })
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    pub fn rows(&self) -> usize {
        self.ab.rows()
    }

    /// Jacobian block for the key at `position`, or `None` if out of range.
    pub fn jacobian(&self, position: usize) -> Option<DMatrixView<'_, f64>> {
        (position < self.keys.len()).then(|| self.ab.block(position))
    }

    /// Jacobian block for `key`.
    pub fn jacobian_for(&self, key: Key) -> Option<DMatrixView<'_, f64>> {
        let position = self.keys.iter().position(|k| *k == key)?;
        self.jacobian(position)
    }

    /// The right-hand side `b`.
    pub fn rhs(&self) -> DVector<f64> {
        self.ab.block(self.keys.len()).column(0).into_owned()
    }

    pub fn augmented(&self) -> &VerticalBlockMatrix {
        &self.ab
    }

    /// Residual of the linear model, `Σᵢ Aᵢ δᵢ - b`.
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` if there is not one delta per key or a delta has the wrong size.
    pub fn error_vector(&self, deltas: &[DVector<f64>]) -> TriangulationResult<DVector<f64>> {
        if deltas.len() != self.keys.len() {
            return Err(TriangulationError::DimensionMismatch {
                expected: self.keys.len(),
                actual: deltas.len(),
            });
        }
        let mut residual = -self.rhs();
        for (position, delta) in deltas.iter().enumerate() {
            let block = self.ab.block(position);
            if delta.len() != block.ncols() {
                return Err(TriangulationError::DimensionMismatch {
                    expected: block.ncols(),
                    actual: delta.len(),
                });
            }
            residual += block * delta;
        }
        Ok(residual)
    }

    /// `0.5 ‖Σᵢ Aᵢ δᵢ - b‖²`
    pub fn error(&self, deltas: &[DVector<f64>]) -> TriangulationResult<f64> {
        Ok(0.5 * self.error_vector(deltas)?.norm_squared())
    }

    /// Information matrix `AᵀA` over all key blocks.
    pub fn information(&self) -> DMatrix<f64> {
        let a = self.ab.full().columns(0, self.ab.cols() - 1);
        a.transpose() * a
    }
}

impl fmt::Display for JacobianFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JacobianFactor(keys: [")?;
        for (i, key) in self.keys.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{key}")?;
        }
        write!(f, "], rows: {})", self.rows())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{dmatrix, dvector};

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn sample_factor() -> TriangulationResult<JacobianFactor> {
        let mut ab = VerticalBlockMatrix::new(&[3], 2, true);
        ab.block_mut(0)
            .copy_from(&dmatrix![1.0, 0.0, 2.0; 0.0, 1.0, 3.0]);
        ab.block_mut(1).copy_from(&dvector![1.0, -1.0]);
        JacobianFactor::new(vec![Key(7)], ab)
    }

    #[test]
    fn test_block_layout() {
        let ab = VerticalBlockMatrix::new(&[3, 6], 2, true);
        assert_eq!(ab.n_blocks(), 3);
        assert_eq!(ab.rows(), 2);
        assert_eq!(ab.cols(), 10);
        assert_eq!(ab.block_dim(1), 6);
        assert_eq!(ab.block(2).ncols(), 1);
    }

    #[test]
    fn test_block_without_rhs() {
        let ab = VerticalBlockMatrix::new(&[3], 2, false);
        assert_eq!(ab.n_blocks(), 1);
        assert_eq!(ab.cols(), 3);
    }

    #[test]
    fn test_accessors() -> TestResult {
        let factor = sample_factor()?;

        assert_eq!(factor.keys(), &[Key(7)]);
        assert_eq!(factor.rows(), 2);
        assert_eq!(factor.rhs(), dvector![1.0, -1.0]);
        let a = factor.jacobian_for(Key(7)).ok_or("missing block")?;
        assert_eq!(a[(1, 2)], 3.0);
        assert!(factor.jacobian(1).is_none());
        assert!(factor.jacobian_for(Key(8)).is_none());
        Ok(())
    }

    #[test]
    fn test_error_vector() -> TestResult {
        let factor = sample_factor()?;

        let at_zero = factor.error_vector(&[DVector::zeros(3)])?;
        assert_eq!(at_zero, dvector![-1.0, 1.0]);

        // A δ = b solves the system exactly
        let delta = dvector![1.0, -1.0, 0.0];
        assert!(factor.error(&[delta])? < 1e-15);
        Ok(())
    }

    #[test]
    fn test_error_vector_dimension_checks() -> TestResult {
        let factor = sample_factor()?;
        assert!(factor.error_vector(&[]).is_err());
        assert!(factor.error_vector(&[DVector::zeros(2)]).is_err());
        Ok(())
    }

    #[test]
    fn test_information() -> TestResult {
        let factor = sample_factor()?;
        let info = factor.information();
        let a = dmatrix![1.0, 0.0, 2.0; 0.0, 1.0, 3.0];
        assert!((info - a.transpose() * &a).amax() < 1e-12);
        Ok(())
    }

    #[test]
    fn test_new_rejects_wrong_block_count() {
        let ab = VerticalBlockMatrix::new(&[3], 2, true);
        assert!(JacobianFactor::new(vec![Key(1), Key(2)], ab).is_err());

        let no_rhs = VerticalBlockMatrix::new(&[3, 2], 2, false);
        assert!(JacobianFactor::new(vec![Key(1)], no_rhs).is_err());
    }

    #[test]
    fn test_display() -> TestResult {
        assert_eq!(sample_factor()?.to_string(), "JacobianFactor(keys: [7], rows: 2)");
        Ok(())
    }
}
