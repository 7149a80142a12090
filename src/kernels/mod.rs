//! Multiply kernels: `dest += a × b` on column-major matrices.
//!
//! Both kernels use the same loop nest: output column `j` outermost,
//! reduction index `kk` in the middle, row `i` innermost. With column-major
//! storage, fixing `j` and `kk` makes the inner loop walk one contiguous
//! column of `a` and one of `dest`, while `b[kk, j]` stays in a register.
//!
//! Available kernels:
//! - `scalar`: one element per step
//! - `vector`: `W` lanes per step, with a narrower remainder step when the
//!   row count isn't a multiple of `W`
//!
//! Kernels *accumulate*. A true product needs a zeroed destination.

pub mod scalar;
pub mod vector;
#[cfg(target_arch = "x86_64")]
pub(crate) mod x86;

use crate::element::Element;
use crate::matrix::Matrix;

pub use scalar::ScalarKernel;
pub use vector::{Backend, VectorKernel};

/// Floating-point evaluation mode of a kernel.
///
/// `Relaxed` lets the kernel fuse the multiply and the add into one
/// operation with a single rounding, so float results may differ in the
/// last bits from a strict `acc + a * b`. Fusing only happens on CPUs with
/// a fused multiply-add instruction. Integer kernels ignore the mode and
/// always wrap on overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FloatMode {
    /// Multiply, round, add, round, in loop order.
    Strict,
    /// Fused multiply-add allowed.
    #[default]
    Relaxed,
}

/// A matrix multiplication strategy.
///
/// Shapes are checked by the type system: `dest` is `M × N`, `a` is
/// `M × K` and `b` is `K × N`.
pub trait MatmulKernel {
    fn name(&self) -> &'static str;

    /// Computes `dest += a × b`.
    fn multiply<T: Element, const M: usize, const K: usize, const N: usize>(
        &self,
        dest: &mut Matrix<T, M, N>,
        a: &Matrix<T, M, K>,
        b: &Matrix<T, K, N>,
    );
}

/// `acc + x * s`, fused when `FUSED`.
#[inline(always)]
pub(crate) fn fma<T: Element, const FUSED: bool>(x: T, s: T, acc: T) -> T {
    if FUSED {
        x.mul_add(s, acc)
    } else {
        x.mul_add_unfused(s, acc)
    }
}

/// True when this CPU executes a fused multiply-add as one instruction.
pub(crate) fn hardware_fma() -> bool {
    #[cfg(target_arch = "x86_64")]
    {
        cfg!(target_feature = "fma") || is_x86_feature_detected!("fma")
    }
    #[cfg(target_arch = "aarch64")]
    {
        true
    }
    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    {
        cfg!(target_feature = "fma")
    }
}

/// Whether a kernel in `mode` fuses for element type `T` on this machine.
///
/// `Relaxed` only fuses where fusing is a hardware instruction. Without
/// one, a fused multiply-add is a software routine and the separate
/// multiply and add is both allowed and much faster.
pub(crate) fn fuses<T: Element>(mode: FloatMode) -> bool {
    mode == FloatMode::Relaxed && T::DTYPE.is_float() && hardware_fma()
}

/// Runs `f` with the `fma` target feature enabled when the CPU has it, so
/// fused operations inlined into `f` lower to hardware instructions.
#[inline(always)]
pub(crate) fn with_fma<R>(f: impl FnOnce() -> R) -> R {
    #[cfg(target_arch = "x86_64")]
    {
        if !cfg!(target_feature = "fma") && is_x86_feature_detected!("fma") {
            // SAFETY: fma was detected on this CPU
            return unsafe { run_fma(f) };
        }
    }
    f()
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "fma")]
unsafe fn run_fma<R>(f: impl FnOnce() -> R) -> R {
    f()
}
