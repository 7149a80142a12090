//! AVX2 + FMA backend for the vectorized kernel.
//!
//! One `__m256d` holds 4 `f64`, one `__m256` holds 8 `f32`. The remainder
//! phase uses masked loads/stores so the tail is handled by the same vector
//! operation at a narrower effective width.

use std::arch::x86_64::*;

use super::FloatMode;
use crate::element::{DType, Element};

// Sliding windows: reading LANES entries starting at `LANES - rem` gives
// `rem` all-ones lanes followed by zero lanes.
static MASK_F64: [i64; 8] = [-1, -1, -1, -1, 0, 0, 0, 0];
static MASK_F32: [i32; 16] = [-1, -1, -1, -1, -1, -1, -1, -1, 0, 0, 0, 0, 0, 0, 0, 0];

fn available() -> bool {
    is_x86_feature_detected!("avx2") && is_x86_feature_detected!("fma")
}

/// True when this backend can run `T` at `lanes` width on this CPU.
pub(crate) fn supports<T: Element>(lanes: usize) -> bool {
    T::DTYPE.is_float() && lanes == T::NATURAL_LANES && available()
}

/// Runs `dest += a × b` on raw column-major buffers of shape
/// `(m, k, n)`. Returns false if `T` has no AVX2 path or the CPU lacks
/// AVX2/FMA, leaving `dest` untouched.
pub(crate) fn multiply<T: Element>(
    dest: &mut [T],
    a: &[T],
    b: &[T],
    dims: (usize, usize, usize),
    mode: FloatMode,
) -> bool {
    if !available() {
        return false;
    }
    match T::DTYPE {
        DType::F64 => {
            let (Ok(dest), Ok(a), Ok(b)) = (
                bytemuck::try_cast_slice_mut::<T, f64>(dest),
                bytemuck::try_cast_slice::<T, f64>(a),
                bytemuck::try_cast_slice::<T, f64>(b),
            ) else {
                return false;
            };
            // SAFETY: avx2 and fma were detected above
            unsafe { multiply_f64(dest, a, b, dims, mode) };
            true
        }
        DType::F32 => {
            let (Ok(dest), Ok(a), Ok(b)) = (
                bytemuck::try_cast_slice_mut::<T, f32>(dest),
                bytemuck::try_cast_slice::<T, f32>(a),
                bytemuck::try_cast_slice::<T, f32>(b),
            ) else {
                return false;
            };
            // SAFETY: as above
            unsafe { multiply_f32(dest, a, b, dims, mode) };
            true
        }
        DType::I16 | DType::I32 | DType::I64 => false,
    }
}

/// # Safety
///
/// Caller must ensure:
/// - CPU supports AVX2 and FMA
/// - `dest.len() == m * n`, `a.len() == m * k`, `b.len() == k * n`
#[target_feature(enable = "avx2,fma")]
#[allow(unsafe_op_in_unsafe_fn)]
unsafe fn multiply_f64(
    dest: &mut [f64],
    a: &[f64],
    b: &[f64],
    (m, k, n): (usize, usize, usize),
    mode: FloatMode,
) {
    debug_assert_eq!(dest.len(), m * n);
    debug_assert_eq!(a.len(), m * k);
    debug_assert_eq!(b.len(), k * n);

    let split = (m / 4) * 4;
    let rem = m - split;
    let mask = _mm256_loadu_si256(MASK_F64.as_ptr().add(4 - rem) as *const __m256i);
    let fused = mode == FloatMode::Relaxed;

    for j in 0..n {
        let d_col = dest.as_mut_ptr().add(j * m);
        for kk in 0..k {
            let s = _mm256_set1_pd(b[j * k + kk]);
            let a_col = a.as_ptr().add(kk * m);

            for i in (0..split).step_by(4) {
                let acc = _mm256_loadu_pd(d_col.add(i));
                let x = _mm256_loadu_pd(a_col.add(i));
                _mm256_storeu_pd(d_col.add(i), mul_add_pd(x, s, acc, fused));
            }

            if rem != 0 {
                let acc = _mm256_maskload_pd(d_col.add(split), mask);
                let x = _mm256_maskload_pd(a_col.add(split), mask);
                _mm256_maskstore_pd(d_col.add(split), mask, mul_add_pd(x, s, acc, fused));
            }
        }
    }
}

/// # Safety
///
/// Same contract as [`multiply_f64`].
#[target_feature(enable = "avx2,fma")]
#[allow(unsafe_op_in_unsafe_fn)]
unsafe fn multiply_f32(
    dest: &mut [f32],
    a: &[f32],
    b: &[f32],
    (m, k, n): (usize, usize, usize),
    mode: FloatMode,
) {
    debug_assert_eq!(dest.len(), m * n);
    debug_assert_eq!(a.len(), m * k);
    debug_assert_eq!(b.len(), k * n);

    let split = (m / 8) * 8;
    let rem = m - split;
    let mask = _mm256_loadu_si256(MASK_F32.as_ptr().add(8 - rem) as *const __m256i);
    let fused = mode == FloatMode::Relaxed;

    for j in 0..n {
        let d_col = dest.as_mut_ptr().add(j * m);
        for kk in 0..k {
            let s = _mm256_set1_ps(b[j * k + kk]);
            let a_col = a.as_ptr().add(kk * m);

            for i in (0..split).step_by(8) {
                let acc = _mm256_loadu_ps(d_col.add(i));
                let x = _mm256_loadu_ps(a_col.add(i));
                _mm256_storeu_ps(d_col.add(i), mul_add_ps(x, s, acc, fused));
            }

            if rem != 0 {
                let acc = _mm256_maskload_ps(d_col.add(split), mask);
                let x = _mm256_maskload_ps(a_col.add(split), mask);
                _mm256_maskstore_ps(d_col.add(split), mask, mul_add_ps(x, s, acc, fused));
            }
        }
    }
}

#[inline]
#[target_feature(enable = "avx2,fma")]
#[allow(unsafe_op_in_unsafe_fn)]
unsafe fn mul_add_pd(x: __m256d, s: __m256d, acc: __m256d, fused: bool) -> __m256d {
    if fused {
        _mm256_fmadd_pd(x, s, acc)
    } else {
        _mm256_add_pd(acc, _mm256_mul_pd(x, s))
    }
}

#[inline]
#[target_feature(enable = "avx2,fma")]
#[allow(unsafe_op_in_unsafe_fn)]
unsafe fn mul_add_ps(x: __m256, s: __m256, acc: __m256, fused: bool) -> __m256 {
    if fused {
        _mm256_fmadd_ps(x, s, acc)
    } else {
        _mm256_add_ps(acc, _mm256_mul_ps(x, s))
    }
}
