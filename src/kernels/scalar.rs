//! Scalar j-kk-i kernel.

use super::{FloatMode, MatmulKernel, fma, fuses, with_fma};
use crate::element::Element;
use crate::matrix::Matrix;

/// Triple-loop multiplication, one element per step.
///
/// This is the baseline the vectorized kernel is checked against.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScalarKernel {
    mode: FloatMode,
}

impl ScalarKernel {
    pub const fn new(mode: FloatMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> FloatMode {
        self.mode
    }
}

impl MatmulKernel for ScalarKernel {
    fn name(&self) -> &'static str {
        "scalar"
    }

    fn multiply<T: Element, const M: usize, const K: usize, const N: usize>(
        &self,
        dest: &mut Matrix<T, M, N>,
        a: &Matrix<T, M, K>,
        b: &Matrix<T, K, N>,
    ) {
        if fuses::<T>(self.mode) {
            with_fma(|| multiply_columns::<T, true, M, K, N>(dest, a, b));
        } else {
            multiply_columns::<T, false, M, K, N>(dest, a, b);
        }
    }
}

#[inline(always)]
fn multiply_columns<T: Element, const FUSED: bool, const M: usize, const K: usize, const N: usize>(
    dest: &mut Matrix<T, M, N>,
    a: &Matrix<T, M, K>,
    b: &Matrix<T, K, N>,
) {
    for j in 0..N {
        for kk in 0..K {
            // Loop-invariant for the whole column walk
            let scalar = b.at(kk, j);
            let a_col = a.column(kk);
            let d_col = dest.column_mut(j);

            for (d, &x) in d_col.iter_mut().zip(a_col) {
                *d = fma::<T, FUSED>(x, scalar, *d);
            }
        }
    }
}
