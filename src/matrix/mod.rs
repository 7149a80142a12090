//! Fixed-shape, column-major dense matrices.
//!
//! The shape is part of the type: `Matrix<f64, 16, 24>` is a 16×24 matrix
//! whose element (row, col) lives at offset `col * 16 + row`. Walking down a
//! column is therefore a walk over contiguous memory, which is what both
//! multiply kernels rely on.
//!
//! Shapes are validated when the program is built. Zero-sized dimensions
//! and shapes with more than 2^32 elements are rejected:
//!
//! ```compile_fail
//! use fixed_matmul::Matrix;
//!
//! let m = Matrix::<f32, 0, 4>::zeroed();
//! ```
//!
//! ```compile_fail
//! use fixed_matmul::Matrix;
//!
//! let m = Matrix::<i16, 65536, 65537>::zeroed();
//! ```

pub mod fill;

use std::fmt;

use crate::element::Element;
use crate::error::{MatmulError, Result};

/// Largest number of elements a single matrix may hold.
pub const MAX_ELEMENTS: u64 = 1 << 32;

/// Dense `ROWS × COLS` matrix stored column-major in one owned buffer.
///
/// Storage is allocated on construction and freed when the matrix is
/// dropped or passed to [`Matrix::release`].
#[derive(Clone, PartialEq)]
pub struct Matrix<T: Element, const ROWS: usize, const COLS: usize> {
    data: Box<[T]>,
}

impl<T: Element, const ROWS: usize, const COLS: usize> Matrix<T, ROWS, COLS> {
    const SHAPE_CHECK: () = {
        assert!(ROWS > 0 && COLS > 0, "matrix dimensions must be positive");
        assert!(
            (ROWS as u128) * (COLS as u128) <= MAX_ELEMENTS as u128,
            "matrix exceeds 2^32 elements"
        );
    };

    /// Allocates a matrix with every cell set to zero.
    ///
    /// # Errors
    ///
    /// Returns [`MatmulError::Allocation`] if the buffer cannot be obtained.
    pub fn zeroed() -> Result<Self> {
        let mut data = Self::allocate()?;
        data.resize(ROWS * COLS, T::zero());
        Ok(Self {
            data: data.into_boxed_slice(),
        })
    }

    /// Allocates a matrix and sets every cell (row, col) to `f(row, col)`.
    ///
    /// # Example
    ///
    /// ```
    /// use fixed_matmul::{Matrix, fill};
    ///
    /// let m = Matrix::<i32, 2, 3>::from_fn(fill::ascending(3)).unwrap();
    /// assert_eq!(m.at(0, 0), 1);
    /// assert_eq!(m.at(1, 2), 6);
    /// // column-major: column 0 is [1, 4]
    /// assert_eq!(m.column(0), &[1, 4]);
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`MatmulError::Allocation`] if the buffer cannot be obtained.
    pub fn from_fn<F>(f: F) -> Result<Self>
    where
        F: Fn(usize, usize) -> T,
    {
        let mut data = Self::allocate()?;
        for col in 0..COLS {
            for row in 0..ROWS {
                data.push(f(row, col));
            }
        }
        Ok(Self {
            data: data.into_boxed_slice(),
        })
    }

    fn allocate() -> Result<Vec<T>> {
        let () = Self::SHAPE_CHECK;

        let mut data = Vec::new();
        data.try_reserve_exact(ROWS * COLS)
            .map_err(|_| MatmulError::Allocation {
                rows: ROWS,
                cols: COLS,
                dtype: T::DTYPE,
            })?;
        Ok(data)
    }

    #[inline(always)]
    pub const fn rows(&self) -> usize {
        ROWS
    }

    #[inline(always)]
    pub const fn cols(&self) -> usize {
        COLS
    }

    /// Total number of elements, `ROWS * COLS`.
    #[inline(always)]
    pub const fn len(&self) -> usize {
        ROWS * COLS
    }

    /// Always false: shapes are positive by construction.
    #[inline(always)]
    pub const fn is_empty(&self) -> bool {
        false
    }

    #[inline(always)]
    fn offset(row: usize, col: usize) -> usize {
        debug_assert!(row < ROWS, "row {} out of range for {} rows", row, ROWS);
        debug_assert!(col < COLS, "col {} out of range for {} cols", col, COLS);
        col * ROWS + row
    }

    /// Reads cell (row, col).
    ///
    /// Callers must keep `row < ROWS` and `col < COLS`.
    #[inline(always)]
    pub fn at(&self, row: usize, col: usize) -> T {
        self.data[Self::offset(row, col)]
    }

    /// Writes cell (row, col). Same range precondition as [`Matrix::at`].
    #[inline(always)]
    pub fn set(&mut self, row: usize, col: usize, value: T) {
        self.data[Self::offset(row, col)] = value;
    }

    /// `len` contiguous elements of column `col`, starting at `row`.
    ///
    /// The run must stay inside one column: `row + len <= ROWS`.
    #[inline(always)]
    pub fn slice_at(&self, row: usize, col: usize, len: usize) -> &[T] {
        debug_assert!(row + len <= ROWS, "slice crosses a column boundary");
        let start = Self::offset(row, col);
        &self.data[start..start + len]
    }

    /// Mutable version of [`Matrix::slice_at`].
    #[inline(always)]
    pub fn slice_at_mut(&mut self, row: usize, col: usize, len: usize) -> &mut [T] {
        debug_assert!(row + len <= ROWS, "slice crosses a column boundary");
        let start = Self::offset(row, col);
        &mut self.data[start..start + len]
    }

    /// The whole of column `col`.
    #[inline(always)]
    pub fn column(&self, col: usize) -> &[T] {
        self.slice_at(0, col, ROWS)
    }

    #[inline(always)]
    pub fn column_mut(&mut self, col: usize) -> &mut [T] {
        self.slice_at_mut(0, col, ROWS)
    }

    /// The backing buffer in column-major order.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Resets every cell to zero, e.g. before reusing a destination.
    pub fn fill_zero(&mut self) {
        self.data.fill(T::zero());
    }

    /// Frees the storage. The matrix cannot be used afterwards.
    pub fn release(self) {
        drop(self);
    }
}

impl<T: Element, const ROWS: usize, const COLS: usize> fmt::Debug for Matrix<T, ROWS, COLS> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matrix")
            .field("rows", &ROWS)
            .field("cols", &COLS)
            .field("dtype", &T::DTYPE)
            .finish()
    }
}
