use std::time::{Duration, Instant};

use approx::assert_relative_eq;
use fixed_matmul::{
    Element, FloatMode, MatmulKernel, Matrix, ScalarKernel, VectorKernel, fill, multiply,
    multiply_vectorized,
};

fn assert_matrices_equal<T: Element, const R: usize, const C: usize>(
    expected: &Matrix<T, R, C>,
    actual: &Matrix<T, R, C>,
    name: &str,
) {
    for col in 0..C {
        for row in 0..R {
            assert_eq!(
                expected.at(row, col),
                actual.at(row, col),
                "{}: mismatch at ({}, {})",
                name,
                row,
                col
            );
        }
    }
}

fn assert_matrices_close<const R: usize, const C: usize>(
    expected: &Matrix<f32, R, C>,
    actual: &Matrix<f32, R, C>,
) {
    for (e, a) in expected.as_slice().iter().zip(actual.as_slice()) {
        assert_relative_eq!(*e, *a, max_relative = 1e-5);
    }
}

fn product<T, Kn, const M: usize, const K: usize, const N: usize>(
    kernel: &Kn,
    a: &Matrix<T, M, K>,
    b: &Matrix<T, K, N>,
) -> Matrix<T, M, N>
where
    T: Element,
    Kn: MatmulKernel,
{
    let mut c = Matrix::<T, M, N>::zeroed().unwrap();
    kernel.multiply(&mut c, a, b);
    c
}

// ============================================================
// Identity law
// ============================================================

fn check_identity<T: Element, const SIZE: usize>(name: &str) {
    let a = Matrix::<T, SIZE, SIZE>::from_fn(fill::ascending(SIZE)).unwrap();
    let i = Matrix::<T, SIZE, SIZE>::from_fn(fill::identity()).unwrap();

    let scalar = product(&ScalarKernel::default(), &a, &i);
    let vector4 = product(&VectorKernel::<4>::default(), &a, &i);
    let vector8 = product(&VectorKernel::<8>::default(), &a, &i);

    assert_matrices_equal(&a, &scalar, &format!("{}_scalar", name));
    assert_matrices_equal(&a, &vector4, &format!("{}_vector4", name));
    assert_matrices_equal(&a, &vector8, &format!("{}_vector8", name));
}

#[test]
fn test_identity_16() {
    check_identity::<f64, 16>("f64_16");
    check_identity::<f32, 16>("f32_16");
    check_identity::<i32, 16>("i32_16");
}

#[test]
fn test_identity_22_not_lane_multiple() {
    check_identity::<f64, 22>("f64_22");
    check_identity::<f32, 22>("f32_22");
    check_identity::<i64, 22>("i64_22");
    check_identity::<i16, 22>("i16_22");
}

// ============================================================
// Constant-fill reduction law
// ============================================================

fn check_all_ones<T: Element, const M: usize, const K: usize, const N: usize>() {
    let a = Matrix::<T, M, K>::from_fn(fill::constant(T::one())).unwrap();
    let b = Matrix::<T, K, N>::from_fn(fill::constant(T::one())).unwrap();
    let expected = T::from_index(K);

    let results = [
        ("scalar", product(&ScalarKernel::default(), &a, &b)),
        ("vector4", product(&VectorKernel::<4>::default(), &a, &b)),
        ("vector8", product(&VectorKernel::<8>::default(), &a, &b)),
        ("vector16", product(&VectorKernel::<16>::default(), &a, &b)),
    ];

    for (name, c) in &results {
        for (idx, &v) in c.as_slice().iter().enumerate() {
            assert_eq!(v, expected, "{} {}x{}x{}: cell {}", name, M, K, N, idx);
        }
    }
}

#[test]
fn test_all_ones_16x24x20() {
    check_all_ones::<f64, 16, 24, 20>();
    check_all_ones::<f32, 16, 24, 20>();
    check_all_ones::<i32, 16, 24, 20>();
}

#[test]
fn test_all_ones_22x24x20_remainder() {
    // 22 rows at 4 lanes leaves 2 remainder rows, at 8 lanes leaves 6
    check_all_ones::<f64, 22, 24, 20>();
    check_all_ones::<f32, 22, 24, 20>();
    check_all_ones::<i16, 22, 24, 20>();
    check_all_ones::<i64, 22, 24, 20>();
}

#[test]
fn test_all_ones_fewer_rows_than_lanes() {
    check_all_ones::<f32, 3, 5, 2>();
    check_all_ones::<i32, 1, 7, 1>();
}

// ============================================================
// Scalar/vector equivalence
// ============================================================

#[test]
fn test_integer_kernels_agree_exactly() {
    let a = Matrix::<i64, 37, 19>::from_fn(|r, c| (r as i64 * 7 - c as i64 * 3) % 11).unwrap();
    let b = Matrix::<i64, 19, 23>::from_fn(fill::ascending(23)).unwrap();

    let scalar = product(&ScalarKernel::default(), &a, &b);
    let vector = product(&VectorKernel::<4>::default(), &a, &b);
    let wide = product(&VectorKernel::<16>::default(), &a, &b);

    assert_matrices_equal(&scalar, &vector, "i64_vector4");
    assert_matrices_equal(&scalar, &wide, "i64_vector16");
}

#[test]
fn test_float_kernels_agree_within_tolerance() {
    let a = Matrix::<f32, 45, 31>::from_fn(|r, c| ((r * 13 + c * 7) % 17) as f32 * 0.37 + 0.25)
        .unwrap();
    let b = Matrix::<f32, 31, 29>::from_fn(|r, c| ((r * 5 + c * 11) % 19) as f32 * 0.21 + 0.5)
        .unwrap();

    let strict = product(&ScalarKernel::new(FloatMode::Strict), &a, &b);
    let relaxed = product(&ScalarKernel::new(FloatMode::Relaxed), &a, &b);
    let natural = product(&VectorKernel::<8>::new(FloatMode::Relaxed), &a, &b);
    let narrow = product(&VectorKernel::<4>::new(FloatMode::Relaxed), &a, &b);

    assert_matrices_close(&strict, &relaxed);
    assert_matrices_close(&strict, &natural);
    assert_matrices_close(&strict, &narrow);
}

#[test]
fn test_strict_kernels_agree_exactly() {
    // Same operations in the same order per cell, no fusing
    let a = Matrix::<f64, 30, 17>::from_fn(|r, c| (r as f64 + 0.1) / (c as f64 + 1.7)).unwrap();
    let b = Matrix::<f64, 17, 9>::from_fn(|r, c| (r as f64 - 4.2) * (c as f64 + 0.3)).unwrap();

    let scalar = product(&ScalarKernel::new(FloatMode::Strict), &a, &b);
    let vector = product(&VectorKernel::<4>::new(FloatMode::Strict), &a, &b);
    let odd = product(&VectorKernel::<3>::new(FloatMode::Strict), &a, &b);

    assert_matrices_equal(&scalar, &vector, "strict_vector4");
    assert_matrices_equal(&scalar, &odd, "strict_vector3");
}

#[test]
fn test_known_product() {
    // [1 2 3; 4 5 6] * [7 8; 9 10; 11 12] = [58 64; 139 154]
    let a = Matrix::<f64, 2, 3>::from_fn(fill::ascending(3)).unwrap();
    let b = Matrix::<f64, 3, 2>::from_fn(|r, c| (r * 2 + c + 7) as f64).unwrap();

    for c in [
        product(&ScalarKernel::default(), &a, &b),
        product(&VectorKernel::<4>::default(), &a, &b),
    ] {
        assert_eq!(c.as_slice(), &[58.0, 139.0, 64.0, 154.0]);
    }
}

// ============================================================
// Accumulation (C += A*B, not C = A*B)
// ============================================================

fn check_double_accumulation<Kn: MatmulKernel>(kernel: &Kn) {
    let a = Matrix::<f64, 22, 24>::from_fn(fill::ascending(24)).unwrap();
    let b = Matrix::<f64, 24, 20>::from_fn(|r, c| ((r + c) % 5) as f64).unwrap();

    let mut c = Matrix::<f64, 22, 20>::zeroed().unwrap();
    kernel.multiply(&mut c, &a, &b);
    let once = c.clone();
    kernel.multiply(&mut c, &a, &b);

    for (twice, once) in c.as_slice().iter().zip(once.as_slice()) {
        assert_eq!(*twice, 2.0 * once, "{}: second call must add", kernel.name());
    }
}

#[test]
fn test_second_call_doubles_result() {
    check_double_accumulation(&ScalarKernel::default());
    check_double_accumulation(&VectorKernel::<4>::default());
    check_double_accumulation(&VectorKernel::<3>::default());
}

#[test]
fn test_accumulates_onto_nonzero_dest() {
    let a = Matrix::<i32, 9, 4>::from_fn(fill::constant(1)).unwrap();
    let b = Matrix::<i32, 4, 6>::from_fn(fill::constant(2)).unwrap();

    let mut c_scalar = Matrix::<i32, 9, 6>::from_fn(fill::constant(5)).unwrap();
    let mut c_vector = c_scalar.clone();

    multiply(&mut c_scalar, &a, &b);
    multiply_vectorized(&mut c_vector, &a, &b);

    assert!(c_scalar.as_slice().iter().all(|&v| v == 13));
    assert_matrices_equal(&c_scalar, &c_vector, "accumulation");
}

#[test]
fn test_fill_zero_resets_between_products() {
    let a = Matrix::<f32, 10, 10>::from_fn(fill::diagonal(3.0)).unwrap();
    let b = Matrix::<f32, 10, 10>::from_fn(fill::ascending(10)).unwrap();
    let mut c = Matrix::<f32, 10, 10>::zeroed().unwrap();
    let kernel = VectorKernel::<8>::default();

    kernel.multiply(&mut c, &a, &b);
    let first = c.clone();
    c.fill_zero();
    kernel.multiply(&mut c, &a, &b);

    assert_eq!(first, c);
    assert_eq!(c.at(4, 7), 3.0 * 48.0);
}

// ============================================================
// Integer overflow
// ============================================================

#[test]
fn test_i16_products_wrap() {
    // 300 * 300 = 90000 does not fit in i16
    let a = Matrix::<i16, 6, 4>::from_fn(fill::constant(300)).unwrap();
    let b = Matrix::<i16, 4, 3>::from_fn(fill::constant(300)).unwrap();

    let mut expected = 0i16;
    for _ in 0..4 {
        expected = expected.wrapping_add(300i16.wrapping_mul(300));
    }

    let scalar = product(&ScalarKernel::default(), &a, &b);
    let vector4 = product(&VectorKernel::<4>::default(), &a, &b);
    let vector16 = product(&VectorKernel::<16>::default(), &a, &b);

    assert!(scalar.as_slice().iter().all(|&v| v == expected));
    assert_matrices_equal(&scalar, &vector4, "vector4");
    assert_matrices_equal(&scalar, &vector16, "vector16");
}

#[test]
fn test_i64_accumulator_wraps() {
    let a = Matrix::<i64, 5, 1>::from_fn(fill::constant(i64::MAX)).unwrap();
    let b = Matrix::<i64, 1, 2>::from_fn(fill::constant(2)).unwrap();
    let mut c = Matrix::<i64, 5, 2>::from_fn(fill::constant(2)).unwrap();

    multiply_vectorized(&mut c, &a, &b);

    assert!(c.as_slice().iter().all(|&v| v == 0));
}

// ============================================================
// Float mode cost
// ============================================================

fn fastest_run<Kn: MatmulKernel>(kernel: &Kn) -> Duration {
    let a = Matrix::<f64, 128, 128>::from_fn(|r, c| (r + c) as f64 / 128.0).unwrap();
    let b = Matrix::<f64, 128, 128>::from_fn(|r, c| (r * c % 7) as f64).unwrap();
    let mut c = Matrix::<f64, 128, 128>::zeroed().unwrap();

    (0..5)
        .map(|_| {
            c.fill_zero();
            let start = Instant::now();
            kernel.multiply(&mut c, &a, &b);
            start.elapsed()
        })
        .min()
        .unwrap()
}

#[test]
#[cfg_attr(debug_assertions, ignore = "timing needs an optimized build")]
fn test_relaxed_scalar_not_slower_than_strict() {
    let strict = fastest_run(&ScalarKernel::new(FloatMode::Strict));
    let relaxed = fastest_run(&ScalarKernel::new(FloatMode::Relaxed));

    assert!(
        relaxed <= strict * 3,
        "relaxed {:?} vs strict {:?}",
        relaxed,
        strict
    );
}

#[test]
#[cfg_attr(debug_assertions, ignore = "timing needs an optimized build")]
fn test_relaxed_portable_not_slower_than_strict() {
    // 3 lanes never matches an AVX2 width, so this stays on the portable path
    let strict = fastest_run(&VectorKernel::<3>::new(FloatMode::Strict));
    let relaxed = fastest_run(&VectorKernel::<3>::new(FloatMode::Relaxed));

    assert!(
        relaxed <= strict * 3,
        "relaxed {:?} vs strict {:?}",
        relaxed,
        strict
    );
}
