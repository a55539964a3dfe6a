//! Tensor Primitives
//!
//! This module provides the two fixed-shape containers the engine is built
//! on: [`Vector`] and [`Matrix`]. Both store `f32` values in a flat `Vec`
//! and every operation returns a fresh value, so no caller-owned buffer is
//! ever aliased or mutated behind its back.
//!
//! ## Core Concepts
//!
//! - **Vector**: ordered `f32` values, length fixed per context
//! - **Matrix**: `rows x cols` values in row-major order
//! - **Shape checks**: every binary operation validates dimensions first and
//!   returns [`NetError::ShapeMismatch`] instead of truncating
//!
//! ## Operations Used by Backpropagation
//!
//! ```text
//! matvec:           y = W · x            [rows]  (forward pass)
//! transpose_matvec: g = Wᵗ · d           [cols]  (gradient to previous layer)
//! outer:            G = d ⊗ x            [rows, cols] (weight gradient)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use touchstone::{Matrix, Vector};
//!
//! let w = Matrix::new(2, 3, vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0]).unwrap();
//! let x = Vector::from(vec![4.0, 5.0, 6.0]);
//! let y = w.matvec(&x).unwrap();
//! assert_eq!(y.as_slice(), &[4.0, 5.0]);
//! ```
//!
//! ## Performance
//!
//! Matrix-vector products switch to a Rayon parallel iterator over output
//! rows once the matrix is large enough to amortise the scheduling cost.
//! Each output element is still summed sequentially, so parallel and
//! sequential paths produce bit-identical results.

use crate::error::{NetError, Result};
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::ops::Index;

/// Number of multiply-adds above which matrix-vector products run in parallel
const PARALLEL_THRESHOLD: usize = 4_096;

/// A fixed-length vector of `f32` values
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector {
    /// Element storage
    pub data: Vec<f32>,
}

impl Vector {
    /// Vector of `len` zeros
    pub fn zeros(len: usize) -> Self {
        Self {
            data: vec![0.0; len],
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn iter(&self) -> impl Iterator<Item = &f32> {
        self.data.iter()
    }

    /// Element at `index`, if in range
    pub fn get(&self, index: usize) -> Option<f32> {
        self.data.get(index).copied()
    }

    fn check_len(&self, other: &Vector, context: &'static str) -> Result<()> {
        if self.len() != other.len() {
            return Err(NetError::length(context, self.len(), other.len()));
        }
        Ok(())
    }

    fn zip_with(&self, other: &Vector, f: impl Fn(f32, f32) -> f32) -> Vector {
        Vector {
            data: self
                .data
                .iter()
                .zip(&other.data)
                .map(|(&a, &b)| f(a, b))
                .collect(),
        }
    }

    /// Element-wise sum
    pub fn add(&self, other: &Vector) -> Result<Vector> {
        self.check_len(other, "vector add")?;
        Ok(self.zip_with(other, |a, b| a + b))
    }

    /// Element-wise difference `self - other`
    pub fn sub(&self, other: &Vector) -> Result<Vector> {
        self.check_len(other, "vector sub")?;
        Ok(self.zip_with(other, |a, b| a - b))
    }

    /// Element-wise (Hadamard) product
    pub fn hadamard(&self, other: &Vector) -> Result<Vector> {
        self.check_len(other, "vector hadamard")?;
        Ok(self.zip_with(other, |a, b| a * b))
    }

    /// Multiply every element by `factor`
    pub fn scale(&self, factor: f32) -> Vector {
        self.map(|v| v * factor)
    }

    /// Apply `f` to every element
    pub fn map(&self, f: impl Fn(f32) -> f32) -> Vector {
        Vector {
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }

    /// Dot product `Σ self[i] * other[i]`
    pub fn dot(&self, other: &Vector) -> Result<f32> {
        self.check_len(other, "dot product")?;
        Ok(self.data.iter().zip(&other.data).map(|(a, b)| a * b).sum())
    }

    /// Mean of the squared elements (0 for an empty vector)
    pub fn mean_square(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data.iter().map(|v| v * v).sum::<f32>() / self.data.len() as f32
    }

    /// Index of the largest element; the first one wins on ties
    pub fn argmax(&self) -> Option<usize> {
        let mut best: Option<(usize, f32)> = None;
        for (i, &v) in self.data.iter().enumerate() {
            match best {
                Some((_, b)) if v <= b => {}
                _ => best = Some((i, v)),
            }
        }
        best.map(|(i, _)| i)
    }

    /// True when no element is NaN or infinite
    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|v| v.is_finite())
    }
}

impl From<Vec<f32>> for Vector {
    fn from(data: Vec<f32>) -> Self {
        Self { data }
    }
}

impl From<&[f32]> for Vector {
    fn from(data: &[f32]) -> Self {
        Self {
            data: data.to_vec(),
        }
    }
}

impl Index<usize> for Vector {
    type Output = f32;

    fn index(&self, index: usize) -> &f32 {
        &self.data[index]
    }
}

/// A `rows x cols` matrix stored in row-major order
///
/// For a layer mapping `inputSize -> outputSize`, the weight matrix has
/// `rows == outputSize` and `cols == inputSize`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    pub rows: usize,
    pub cols: usize,
    /// Flat storage, `data[r * cols + c]`
    pub data: Vec<f32>,
}

impl Matrix {
    /// Create a matrix from row-major data
    ///
    /// # Errors
    ///
    /// `ShapeMismatch` if `data.len() != rows * cols`
    pub fn new(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(NetError::ShapeMismatch {
                context: "matrix construction",
                expected: format!("{} elements ({}x{})", rows * cols, rows, cols),
                actual: format!("{} elements", data.len()),
            });
        }
        Ok(Self { rows, cols, data })
    }

    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Matrix with every element drawn uniformly from `[-bound, bound]`
    pub fn random_uniform<R: Rng>(rows: usize, cols: usize, bound: f32, rng: &mut R) -> Self {
        let data = (0..rows * cols)
            .map(|_| rng.random_range(-bound..=bound))
            .collect();
        Self { rows, cols, data }
    }

    /// Shape as `(rows, cols)`
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.data.get(row * self.cols + col).copied()
    }

    /// Borrow one row as a slice
    pub fn row(&self, row: usize) -> Option<&[f32]> {
        if row >= self.rows {
            return None;
        }
        self.data.get(row * self.cols..(row + 1) * self.cols)
    }

    /// Outer product `a ⊗ b`, shape `[a.len(), b.len()]`
    ///
    /// This is the weight gradient of a dense layer: `a` is the local
    /// gradient at the layer's output and `b` is the layer's input.
    pub fn outer(a: &Vector, b: &Vector) -> Matrix {
        let mut data = Vec::with_capacity(a.len() * b.len());
        for &x in &a.data {
            data.extend(b.data.iter().map(|&y| x * y));
        }
        Matrix {
            rows: a.len(),
            cols: b.len(),
            data,
        }
    }

    /// Matrix-vector product `self · x`
    ///
    /// # Arguments
    ///
    /// * `x` - Vector of length `cols`
    ///
    /// # Returns
    ///
    /// Vector of length `rows`
    pub fn matvec(&self, x: &Vector) -> Result<Vector> {
        if x.len() != self.cols {
            return Err(NetError::length("matrix-vector product", self.cols, x.len()));
        }
        let cols = self.cols;
        let row_dot = |row: &[f32]| -> f32 { row.iter().zip(&x.data).map(|(w, v)| w * v).sum() };

        let data: Vec<f32> = if cols == 0 {
            vec![0.0; self.rows]
        } else if self.rows * cols >= PARALLEL_THRESHOLD {
            self.data.par_chunks(cols).map(row_dot).collect()
        } else {
            self.data.chunks(cols).map(row_dot).collect()
        };
        Ok(Vector { data })
    }

    /// Transposed product `selfᵗ · d`
    ///
    /// Used to push a gradient of length `rows` back to the layer input,
    /// giving a vector of length `cols`.
    pub fn transpose_matvec(&self, d: &Vector) -> Result<Vector> {
        if d.len() != self.rows {
            return Err(NetError::length("transposed matrix-vector product", self.rows, d.len()));
        }
        let rows = self.rows;
        let cols = self.cols;
        let column_dot = |c: usize| -> f32 {
            (0..rows).map(|r| self.data[r * cols + c] * d.data[r]).sum()
        };

        let data: Vec<f32> = if rows * cols >= PARALLEL_THRESHOLD {
            (0..cols).into_par_iter().map(column_dot).collect()
        } else {
            (0..cols).map(column_dot).collect()
        };
        Ok(Vector { data })
    }

    fn check_shape(&self, other: &Matrix, context: &'static str) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(NetError::ShapeMismatch {
                context,
                expected: format!("{}x{}", self.rows, self.cols),
                actual: format!("{}x{}", other.rows, other.cols),
            });
        }
        Ok(())
    }

    /// Element-wise sum
    pub fn add(&self, other: &Matrix) -> Result<Matrix> {
        self.check_shape(other, "matrix add")?;
        Ok(Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().zip(&other.data).map(|(a, b)| a + b).collect(),
        })
    }

    /// Element-wise difference `self - other`
    pub fn sub(&self, other: &Matrix) -> Result<Matrix> {
        self.check_shape(other, "matrix sub")?;
        Ok(Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().zip(&other.data).map(|(a, b)| a - b).collect(),
        })
    }

    pub fn scale(&self, factor: f32) -> Matrix {
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|v| v * factor).collect(),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|v| v.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_vector_arithmetic() {
        let a = Vector::from(vec![1.0, 2.0, 3.0]);
        let b = Vector::from(vec![4.0, 5.0, 6.0]);

        assert_eq!(a.add(&b).unwrap().as_slice(), &[5.0, 7.0, 9.0]);
        assert_eq!(b.sub(&a).unwrap().as_slice(), &[3.0, 3.0, 3.0]);
        assert_eq!(a.hadamard(&b).unwrap().as_slice(), &[4.0, 10.0, 18.0]);
        assert_eq!(a.scale(2.0).as_slice(), &[2.0, 4.0, 6.0]);
        assert_eq!(a.dot(&b).unwrap(), 32.0);
    }

    #[test]
    fn test_vector_ops_do_not_mutate_inputs() {
        let a = Vector::from(vec![1.0, 2.0]);
        let b = Vector::from(vec![3.0, 4.0]);
        let _ = a.add(&b).unwrap();
        let _ = a.scale(10.0);
        assert_eq!(a.as_slice(), &[1.0, 2.0]);
        assert_eq!(b.as_slice(), &[3.0, 4.0]);
    }

    #[test]
    fn test_length_mismatch_is_reported() {
        let a = Vector::from(vec![1.0, 2.0, 3.0]);
        let b = Vector::from(vec![1.0, 2.0]);
        match a.dot(&b) {
            Err(NetError::ShapeMismatch { expected, actual, .. }) => {
                assert_eq!(expected, "length 3");
                assert_eq!(actual, "length 2");
            }
            other => panic!("expected ShapeMismatch, got {:?}", other),
        }
        assert!(a.add(&b).is_err());
        assert!(a.sub(&b).is_err());
        assert!(a.hadamard(&b).is_err());
    }

    #[test]
    fn test_argmax_prefers_first_on_ties() {
        let v = Vector::from(vec![0.1, 0.9, 0.9, 0.2]);
        assert_eq!(v.argmax(), Some(1));
        assert_eq!(Vector::zeros(0).argmax(), None);
    }

    #[test]
    fn test_matrix_new_validates_length() {
        assert!(Matrix::new(2, 2, vec![1.0; 4]).is_ok());
        assert!(matches!(
            Matrix::new(2, 2, vec![1.0; 3]),
            Err(NetError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_matvec_and_transpose() {
        // [[1, 2, 3],
        //  [4, 5, 6]]
        let m = Matrix::new(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let x = Vector::from(vec![1.0, 0.0, -1.0]);
        assert_eq!(m.matvec(&x).unwrap().as_slice(), &[-2.0, -2.0]);

        let d = Vector::from(vec![1.0, 1.0]);
        assert_eq!(m.transpose_matvec(&d).unwrap().as_slice(), &[5.0, 7.0, 9.0]);

        assert!(m.matvec(&d).is_err());
        assert!(m.transpose_matvec(&x).is_err());
    }

    #[test]
    fn test_parallel_matvec_matches_sequential() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let big = Matrix::random_uniform(80, 64, 0.5, &mut rng);
        let x = Vector::from((0..64).map(|i| i as f32 * 0.01).collect::<Vec<_>>());

        let parallel = big.matvec(&x).unwrap();
        for r in 0..big.rows {
            let row = big.row(r).unwrap();
            let expected: f32 = row.iter().zip(x.iter()).map(|(w, v)| w * v).sum();
            assert_eq!(parallel[r], expected);
        }
    }

    #[test]
    fn test_outer_product_shape() {
        let a = Vector::from(vec![1.0, 2.0]);
        let b = Vector::from(vec![3.0, 4.0, 5.0]);
        let o = Matrix::outer(&a, &b);
        assert_eq!(o.shape(), (2, 3));
        assert_eq!(o.data, vec![3.0, 4.0, 5.0, 6.0, 8.0, 10.0]);
    }

    #[test]
    fn test_random_uniform_respects_bound() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let m = Matrix::random_uniform(10, 10, 0.5, &mut rng);
        assert!(m.data.iter().all(|v| (-0.5..=0.5).contains(v)));
    }

    #[test]
    fn test_matrix_sub_and_scale() {
        let a = Matrix::new(1, 2, vec![1.0, 2.0]).unwrap();
        let b = Matrix::new(1, 2, vec![0.5, 0.5]).unwrap();
        assert_eq!(a.sub(&b).unwrap().data, vec![0.5, 1.5]);
        assert_eq!(a.add(&b).unwrap().data, vec![1.5, 2.5]);
        assert_eq!(a.scale(3.0).data, vec![3.0, 6.0]);
        assert!(a.sub(&Matrix::zeros(2, 1)).is_err());
    }
}
