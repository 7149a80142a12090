//! Vectorized j-kk-i kernel with a remainder phase.

use std::array;

use tracing::debug;

use super::{FloatMode, MatmulKernel, fma, fuses, with_fma};
use crate::element::{DEFAULT_LANES, Element};
use crate::matrix::Matrix;

/// Which implementation a [`VectorKernel`] runs for a given element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Fixed-size array lanes, lowered to whatever SIMD the target allows.
    Portable,
    /// AVX2 + FMA intrinsics (x86_64, `f32` with 8 lanes or `f64` with 4).
    Avx2,
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Portable => "portable",
            Backend::Avx2 => "avx2",
        }
    }
}

/// Multiplication that processes `W` rows of a column per step.
///
/// For an `M`-row destination the inner loop runs `M / W` full-lane steps,
/// then one step of width `M % W` if anything is left. `W` is fixed when the
/// kernel type is named and must be positive:
///
/// ```compile_fail
/// use fixed_matmul::VectorKernel;
///
/// let k = VectorKernel::<0>::default();
/// ```
///
/// Pick `W = T::NATURAL_LANES` to match one 256-bit register:
///
/// ```
/// use fixed_matmul::{Element, Matrix, MatmulKernel, VectorKernel, fill};
///
/// let a = Matrix::<f32, 22, 24>::from_fn(fill::constant(1.0)).unwrap();
/// let b = Matrix::<f32, 24, 20>::from_fn(fill::constant(1.0)).unwrap();
/// let mut c = Matrix::<f32, 22, 20>::zeroed().unwrap();
///
/// VectorKernel::<{ <f32 as Element>::NATURAL_LANES }>::default().multiply(&mut c, &a, &b);
/// assert!(c.as_slice().iter().all(|&v| v == 24.0));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct VectorKernel<const W: usize = DEFAULT_LANES> {
    mode: FloatMode,
}

impl<const W: usize> VectorKernel<W> {
    const LANE_CHECK: () = assert!(W > 0, "lane width must be positive");

    pub const fn new(mode: FloatMode) -> Self {
        let () = Self::LANE_CHECK;
        Self { mode }
    }

    pub fn mode(&self) -> FloatMode {
        self.mode
    }

    pub const fn lanes(&self) -> usize {
        W
    }

    /// The implementation `multiply` will use for element type `T` on this
    /// machine.
    pub fn backend<T: Element>(&self) -> Backend {
        #[cfg(target_arch = "x86_64")]
        {
            if super::x86::supports::<T>(W) {
                return Backend::Avx2;
            }
        }
        Backend::Portable
    }
}

impl<const W: usize> Default for VectorKernel<W> {
    fn default() -> Self {
        Self::new(FloatMode::default())
    }
}

impl<const W: usize> MatmulKernel for VectorKernel<W> {
    fn name(&self) -> &'static str {
        "vector"
    }

    fn multiply<T: Element, const M: usize, const K: usize, const N: usize>(
        &self,
        dest: &mut Matrix<T, M, N>,
        a: &Matrix<T, M, K>,
        b: &Matrix<T, K, N>,
    ) {
        debug!(
            dtype = %T::DTYPE,
            lanes = W,
            m = M,
            k = K,
            n = N,
            backend = self.backend::<T>().name(),
            "vector multiply"
        );

        #[cfg(target_arch = "x86_64")]
        {
            if super::x86::supports::<T>(W)
                && super::x86::multiply(
                    dest.as_mut_slice(),
                    a.as_slice(),
                    b.as_slice(),
                    (M, K, N),
                    self.mode,
                )
            {
                return;
            }
        }

        multiply_portable::<T, W, M, K, N>(dest, a, b, self.mode);
    }
}

/// `W` values of `T` operated on together.
#[derive(Clone, Copy)]
struct Lanes<T, const W: usize>([T; W]);

impl<T: Element, const W: usize> Lanes<T, W> {
    #[inline(always)]
    fn splat(v: T) -> Self {
        Self([v; W])
    }

    /// Loads `W` elements; `src` must hold at least `W`.
    #[inline(always)]
    fn load(src: &[T]) -> Self {
        Self(array::from_fn(|i| src[i]))
    }

    /// Loads `src.len() < W` elements, zeroing the unused lanes.
    #[inline(always)]
    fn load_partial(src: &[T]) -> Self {
        Self(array::from_fn(|i| src.get(i).copied().unwrap_or_else(T::zero)))
    }

    /// Stores the first `dst.len()` lanes.
    #[inline(always)]
    fn store(self, dst: &mut [T]) {
        dst.copy_from_slice(&self.0[..dst.len()]);
    }

    /// Lane-wise `acc + self * s`.
    #[inline(always)]
    fn mul_add<const FUSED: bool>(self, s: Self, acc: Self) -> Self {
        Self(array::from_fn(|i| fma::<T, FUSED>(self.0[i], s.0[i], acc.0[i])))
    }
}

fn multiply_portable<T: Element, const W: usize, const M: usize, const K: usize, const N: usize>(
    dest: &mut Matrix<T, M, N>,
    a: &Matrix<T, M, K>,
    b: &Matrix<T, K, N>,
    mode: FloatMode,
) {
    if fuses::<T>(mode) {
        with_fma(|| portable_columns::<T, W, true, M, K, N>(dest, a, b));
    } else {
        portable_columns::<T, W, false, M, K, N>(dest, a, b);
    }
}

#[inline(always)]
fn portable_columns<
    T: Element,
    const W: usize,
    const FUSED: bool,
    const M: usize,
    const K: usize,
    const N: usize,
>(
    dest: &mut Matrix<T, M, N>,
    a: &Matrix<T, M, K>,
    b: &Matrix<T, K, N>,
) {
    // Rows [0, split) go through full lanes, [split, M) through the remainder
    let split = (M / W) * W;

    for j in 0..N {
        for kk in 0..K {
            let scalar = Lanes::<T, W>::splat(b.at(kk, j));
            let (a_main, a_tail) = a.column(kk).split_at(split);
            let (d_main, d_tail) = dest.column_mut(j).split_at_mut(split);

            for (d, x) in d_main.chunks_exact_mut(W).zip(a_main.chunks_exact(W)) {
                let acc = Lanes::<T, W>::load(d);
                Lanes::<T, W>::load(x)
                    .mul_add::<FUSED>(scalar, acc)
                    .store(d);
            }

            if !d_tail.is_empty() {
                let acc = Lanes::<T, W>::load_partial(d_tail);
                Lanes::<T, W>::load_partial(a_tail)
                    .mul_add::<FUSED>(scalar, acc)
                    .store(d_tail);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ScalarKernel;
    use crate::fill;

    #[test]
    fn test_lanes_partial_roundtrip() {
        let src = [1i32, 2, 3];
        let lanes = Lanes::<i32, 4>::load_partial(&src);
        assert_eq!(lanes.0, [1, 2, 3, 0]);

        let mut dst = [0i32; 3];
        lanes.store(&mut dst);
        assert_eq!(dst, src);
    }

    #[test]
    fn test_remainder_rows_are_touched_once() {
        // 7 rows with 4 lanes: one full step, one 3-wide remainder
        let a = Matrix::<i32, 7, 5>::from_fn(fill::constant(1)).unwrap();
        let b = Matrix::<i32, 5, 3>::from_fn(fill::constant(1)).unwrap();
        let mut c = Matrix::<i32, 7, 3>::zeroed().unwrap();

        multiply_portable::<i32, 4, 7, 5, 3>(&mut c, &a, &b, FloatMode::Strict);

        assert!(c.as_slice().iter().all(|&v| v == 5));
    }

    #[test]
    fn test_lane_width_wider_than_rows() {
        let a = Matrix::<i64, 3, 3>::from_fn(fill::ascending(3)).unwrap();
        let b = Matrix::<i64, 3, 3>::from_fn(fill::identity()).unwrap();
        let mut c = Matrix::<i64, 3, 3>::zeroed().unwrap();

        VectorKernel::<8>::default().multiply(&mut c, &a, &b);

        assert_eq!(c, a);
    }

    #[test]
    fn test_portable_matches_scalar_strict() {
        let a = Matrix::<f64, 13, 9>::from_fn(|r, c| (r as f64) * 0.5 - c as f64).unwrap();
        let b = Matrix::<f64, 9, 6>::from_fn(|r, c| (r + 2 * c) as f64 / 3.0).unwrap();
        let mut expected = Matrix::<f64, 13, 6>::zeroed().unwrap();
        let mut actual = Matrix::<f64, 13, 6>::zeroed().unwrap();

        ScalarKernel::new(FloatMode::Strict).multiply(&mut expected, &a, &b);
        multiply_portable::<f64, 4, 13, 9, 6>(&mut actual, &a, &b, FloatMode::Strict);

        // Same operations in the same order per element
        assert_eq!(expected, actual);
    }

    #[test]
    fn test_portable_matches_scalar_relaxed() {
        let a = Matrix::<f64, 11, 7>::from_fn(|r, c| (r * 3 + c) as f64 / 7.0).unwrap();
        let b = Matrix::<f64, 7, 5>::from_fn(|r, c| (r + c + 1) as f64 / 3.0).unwrap();
        let mut expected = Matrix::<f64, 11, 5>::zeroed().unwrap();
        let mut actual = Matrix::<f64, 11, 5>::zeroed().unwrap();

        ScalarKernel::new(FloatMode::Relaxed).multiply(&mut expected, &a, &b);
        multiply_portable::<f64, 4, 11, 7, 5>(&mut actual, &a, &b, FloatMode::Relaxed);

        // Both resolve to the same fused-or-not choice on this machine
        assert_eq!(expected, actual);
    }

    #[test]
    fn test_backend_for_integers_is_portable() {
        assert_eq!(VectorKernel::<4>::default().backend::<i32>(), Backend::Portable);
        assert_eq!(VectorKernel::<16>::default().backend::<i16>(), Backend::Portable);
    }
}
