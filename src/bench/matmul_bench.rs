//! Criterion comparison of the scalar and vectorized kernels.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use fixed_matmul::{Element, FloatMode, MatmulKernel, Matrix, ScalarKernel, VectorKernel, fill};

fn bench_shape<T: Element, const M: usize, const K: usize, const N: usize>(
    c: &mut Criterion,
    label: &str,
) {
    let a = Matrix::<T, M, K>::from_fn(fill::ascending(K)).expect("alloc A");
    let b = Matrix::<T, K, N>::from_fn(fill::constant(T::one())).expect("alloc B");
    let mut dest = Matrix::<T, M, N>::zeroed().expect("alloc C");

    let mut group = c.benchmark_group(format!("{}/{}", label, T::DTYPE));
    group.throughput(Throughput::Elements((2 * M * K * N) as u64));

    group.bench_function(BenchmarkId::new("scalar", format!("{}x{}x{}", M, K, N)), |bench| {
        let kernel = ScalarKernel::default();
        bench.iter(|| {
            dest.fill_zero();
            kernel.multiply(&mut dest, black_box(&a), black_box(&b));
        })
    });

    group.bench_function(BenchmarkId::new("vector4", format!("{}x{}x{}", M, K, N)), |bench| {
        let kernel = VectorKernel::<4>::default();
        bench.iter(|| {
            dest.fill_zero();
            kernel.multiply(&mut dest, black_box(&a), black_box(&b));
        })
    });

    group.bench_function(BenchmarkId::new("vector8", format!("{}x{}x{}", M, K, N)), |bench| {
        let kernel = VectorKernel::<8>::default();
        bench.iter(|| {
            dest.fill_zero();
            kernel.multiply(&mut dest, black_box(&a), black_box(&b));
        })
    });

    group.finish();
}

/// Strict against relaxed evaluation of the same kernels. Relaxed should
/// never be the slower of the two.
fn bench_float_mode<const SIZE: usize>(c: &mut Criterion) {
    let a = Matrix::<f64, SIZE, SIZE>::from_fn(fill::ascending(SIZE)).expect("alloc A");
    let b = Matrix::<f64, SIZE, SIZE>::from_fn(fill::diagonal(0.5)).expect("alloc B");
    let mut dest = Matrix::<f64, SIZE, SIZE>::zeroed().expect("alloc C");
    let shape = format!("{}x{}x{}", SIZE, SIZE, SIZE);

    let mut group = c.benchmark_group("float_mode/f64");
    group.throughput(Throughput::Elements((2 * SIZE * SIZE * SIZE) as u64));

    for (label, mode) in [("strict", FloatMode::Strict), ("relaxed", FloatMode::Relaxed)] {
        group.bench_function(BenchmarkId::new(format!("scalar_{}", label), &shape), |bench| {
            let kernel = ScalarKernel::new(mode);
            bench.iter(|| {
                dest.fill_zero();
                kernel.multiply(&mut dest, black_box(&a), black_box(&b));
            })
        });

        group.bench_function(BenchmarkId::new(format!("vector3_{}", label), &shape), |bench| {
            let kernel = VectorKernel::<3>::new(mode);
            bench.iter(|| {
                dest.fill_zero();
                kernel.multiply(&mut dest, black_box(&a), black_box(&b));
            })
        });
    }

    group.finish();
}

fn matmul_benchmarks(c: &mut Criterion) {
    bench_shape::<f64, 128, 128, 128>(c, "square");
    bench_shape::<f64, 130, 128, 96>(c, "remainder");
    bench_shape::<f32, 256, 256, 256>(c, "square");
    bench_shape::<i32, 128, 128, 128>(c, "square");
    bench_float_mode::<128>(c);
}

criterion_group!(benches, matmul_benchmarks);
criterion_main!(benches);
