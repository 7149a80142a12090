//! Benchmark runner for the scalar and vectorized kernels.

use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use fixed_matmul::{
    DEFAULT_LANES, Element, FloatMode, MatmulError, MatmulKernel, Matrix, ScalarKernel,
    VectorKernel, fill,
};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, filter::LevelFilter, fmt, prelude::*};

type Elem = f64;

// 502 rows leaves a 2-row remainder at 4 lanes
const M: usize = 502;
const K: usize = 256;
const N: usize = 384;

const DEFAULT_REPETITIONS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum KernelChoice {
    Scalar,
    Vector,
    Both,
}

/// Times repeated fixed-shape matrix multiplications.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// How many times to repeat the multiplication.
    #[arg(allow_hyphen_values = true)]
    n: Option<String>,

    /// Which kernel(s) to time.
    #[arg(long, value_enum, default_value_t = KernelChoice::Both)]
    kernel: KernelChoice,

    /// Evaluate floats strictly instead of allowing fused multiply-add.
    #[arg(long)]
    strict: bool,
}

/// Parses the repetition count. Anything but a plain non-negative integer
/// is rejected.
fn parse_repetitions(raw: &str) -> Result<usize, MatmulError> {
    raw.trim()
        .parse::<usize>()
        .map_err(|_| MatmulError::InvalidRepetitions {
            value: raw.to_owned(),
        })
}

/// Resolves the optional argument, warning and falling back to the default
/// when it doesn't parse.
fn repetitions(arg: Option<&str>) -> usize {
    match arg.map(parse_repetitions) {
        None => DEFAULT_REPETITIONS,
        Some(Ok(n)) => n,
        Some(Err(err)) => {
            warn!("{}; using default of {}", err, DEFAULT_REPETITIONS);
            DEFAULT_REPETITIONS
        }
    }
}

/// Logs to stderr, respecting `RUST_LOG` (default `info`).
fn init_subscriber() {
    let fmt_layer = fmt::layer().with_target(true).with_writer(std::io::stderr);

    let filter_layer = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}

fn main() -> anyhow::Result<()> {
    init_subscriber();

    let args = Args::parse();
    let reps = repetitions(args.n.as_deref());
    let mode = if args.strict {
        FloatMode::Strict
    } else {
        FloatMode::Relaxed
    };

    info!(reps, ?mode, kernel = ?args.kernel, "starting");

    println!("=== Fixed-Shape Matrix Multiplication ===\n");
    println!("Element:     {}", Elem::DTYPE);
    println!("Shapes:      A {}×{}, B {}×{}, C {}×{}", M, K, K, N, M, N);
    println!("Repetitions: {}", reps);
    println!("Float mode:  {:?}\n", mode);

    let a = Matrix::<Elem, M, K>::from_fn(fill::ascending(K))?;
    let b = Matrix::<Elem, K, N>::from_fn(fill::diagonal(2.0))?;
    let mut c = Matrix::<Elem, M, N>::zeroed()?;

    if matches!(args.kernel, KernelChoice::Scalar | KernelChoice::Both) {
        let kernel = ScalarKernel::new(mode);
        let elapsed = time_kernel(&kernel, &mut c, &a, &b, reps);
        report(kernel.name(), "-", elapsed, reps);
    }

    if matches!(args.kernel, KernelChoice::Vector | KernelChoice::Both) {
        let kernel = VectorKernel::<DEFAULT_LANES>::new(mode);
        let elapsed = time_kernel(&kernel, &mut c, &a, &b, reps);
        report(kernel.name(), kernel.backend::<Elem>().name(), elapsed, reps);
    }

    c.release();
    b.release();
    a.release();

    Ok(())
}

/// Total wall time of `reps` products into a freshly zeroed `c`.
fn time_kernel<Kn: MatmulKernel>(
    kernel: &Kn,
    c: &mut Matrix<Elem, M, N>,
    a: &Matrix<Elem, M, K>,
    b: &Matrix<Elem, K, N>,
    reps: usize,
) -> Duration {
    // Warmup
    c.fill_zero();
    kernel.multiply(c, a, b);

    let mut total = Duration::ZERO;
    for _ in 0..reps {
        c.fill_zero();
        let start = Instant::now();
        kernel.multiply(c, a, b);
        total += start.elapsed();
    }
    total
}

/// Rate over `reps` products of the fixed shape. Counted in `f64` so large
/// repetition counts can't overflow.
fn gflops(elapsed: Duration, reps: usize) -> f64 {
    if reps == 0 || elapsed.is_zero() {
        return 0.0;
    }
    2.0 * (M * N * K) as f64 * reps as f64 / elapsed.as_secs_f64() / 1e9
}

fn report(name: &str, backend: &str, elapsed: Duration, reps: usize) {
    let secs = elapsed.as_secs();
    let millis = elapsed.subsec_millis();
    let rate = gflops(elapsed, reps);

    println!(
        "{:8} {:10} {:4}s {:4}ms  {:6.2} GFLOPS",
        name, backend, secs, millis, rate
    );
}
