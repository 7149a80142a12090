//! Fixed-shape, column-major matrix multiplication.
//!
//! Matrices carry their shape in the type (`Matrix<f64, 16, 24>`), so a
//! mismatched multiply doesn't compile. Two kernels compute `C += A * B`
//! with the same j-kk-i loop order:
//!
//! - [`ScalarKernel`]: one element at a time
//! - [`VectorKernel`]: `W` lanes at a time plus a narrower remainder step,
//!   with an AVX2/FMA backend for `f32`/`f64` on x86_64
//!
//! Neither is "the" fast path. Benchmark both for your shapes.
//!
//! ## Usage
//!
//! ```
//! use fixed_matmul::{Matrix, fill, multiply};
//!
//! let a = Matrix::<f64, 16, 24>::from_fn(fill::constant(1.0)).unwrap();
//! let b = Matrix::<f64, 24, 20>::from_fn(fill::constant(1.0)).unwrap();
//! let mut c = Matrix::<f64, 16, 20>::zeroed().unwrap();
//!
//! multiply(&mut c, &a, &b);
//! assert_eq!(c.at(3, 7), 24.0);
//! ```
//!
//! Kernels accumulate into the destination. Re-zero it (or allocate a fresh
//! one) before computing a new product.
//!
//! ## Floating point
//!
//! Kernels default to [`FloatMode::Relaxed`], which allows fused
//! multiply-add. Results then differ from strict IEEE evaluation order in
//! the last bits. Use [`FloatMode::Strict`] when exact reproducibility of
//! `acc + a * b` matters:
//!
//! ```
//! use fixed_matmul::{FloatMode, MatmulKernel, Matrix, ScalarKernel, fill};
//!
//! let a = Matrix::<f32, 4, 4>::from_fn(fill::ascending(4)).unwrap();
//! let i = Matrix::<f32, 4, 4>::from_fn(fill::identity()).unwrap();
//! let mut c = Matrix::<f32, 4, 4>::zeroed().unwrap();
//!
//! ScalarKernel::new(FloatMode::Strict).multiply(&mut c, &a, &i);
//! assert_eq!(c, a);
//! ```

pub mod element;
pub mod error;
pub mod kernels;
pub mod matrix;

pub use element::{DEFAULT_LANES, DType, Element};
pub use error::{MatmulError, Result};
pub use kernels::{Backend, FloatMode, MatmulKernel, ScalarKernel, VectorKernel};
pub use matrix::{MAX_ELEMENTS, Matrix, fill};

/// Matrix multiply with the scalar kernel: `dest += a * b`.
pub fn multiply<T: Element, const M: usize, const K: usize, const N: usize>(
    dest: &mut Matrix<T, M, N>,
    a: &Matrix<T, M, K>,
    b: &Matrix<T, K, N>,
) {
    ScalarKernel::default().multiply(dest, a, b);
}

/// Same as [`multiply`] but with the vectorized kernel at
/// [`DEFAULT_LANES`] lanes.
pub fn multiply_vectorized<T: Element, const M: usize, const K: usize, const N: usize>(
    dest: &mut Matrix<T, M, N>,
    a: &Matrix<T, M, K>,
    b: &Matrix<T, K, N>,
) {
    VectorKernel::<DEFAULT_LANES>::default().multiply(dest, a, b);
}
