//! kernelkit dispatch benchmarks
//!
//! Times full encode + submit + wait round trips for the bundled kernels.
//! Run with: cargo run -p kernelkit-benchmarks --release

use std::sync::Arc;
use std::time::Instant;

use kernelkit::prelude::*;
use kernelkit::backend::{kernels, ContextOptions, WgpuContext};

const WARMUP_ITERS: usize = 3;
const BENCH_ITERS: usize = 20;

fn main() {
    env_logger::init();

    println!("======================================================================");
    println!("                  KERNELKIT - DISPATCH BENCHMARKS                     ");
    println!("======================================================================");
    println!();

    let ctx = match pollster::block_on(WgpuContext::new(&ContextOptions::default())) {
        Ok(ctx) => Arc::new(ctx),
        Err(e) => {
            eprintln!("[ERROR] {}", e);
            std::process::exit(1);
        }
    };
    print_gpu_info(&ctx);
    println!();
    println!("----------------------------------------------------------------------");

    for size in [256u32, 512, 1024] {
        if let Err(e) = bench_monte_carlo(&ctx, size) {
            eprintln!("  monte carlo {}: {}", size, e);
        }
    }

    println!("----------------------------------------------------------------------");

    for n in [128u32, 256, 512] {
        if let Err(e) = bench_random(&ctx, n) {
            eprintln!("  random {}: {}", n, e);
        }
    }

    println!();
    println!("======================================================================");
    println!("                     BENCHMARK COMPLETE                               ");
    println!("======================================================================");
}

fn print_gpu_info(ctx: &WgpuContext) {
    let info = ctx.adapter.get_info();
    println!("[GPU] Information:");
    println!("      Name:    {}", info.name);
    println!("      Backend: {:?}", info.backend);
    println!("      Type:    {:?}", info.device_type);
    println!("      Limits:  {:?}", ctx.limits());
}

fn time_runs(m: &mut Runner) -> GpuResult<f64> {
    for _ in 0..WARMUP_ITERS {
        m.run()?;
    }
    let start = Instant::now();
    for _ in 0..BENCH_ITERS {
        m.run()?;
    }
    Ok(start.elapsed().as_secs_f64() * 1000.0 / BENCH_ITERS as f64)
}

fn bench_monte_carlo(ctx: &Arc<WgpuContext>, size: u32) -> GpuResult<()> {
    let mut m = Runner::with_context(
        ctx.clone(),
        KernelSource::Inline(kernels::MONTE_CARLO_WGSL.to_string()),
        None,
        &RunnerConfig::default(),
    )?;
    let n = size as u64 * size as u64;
    let points = m.float_buf(&random_f32(n as usize * 2));
    let counter = m.uint_buf(&[0]);
    let plan = m.set_buffers_with_iters(&[points, counter], None, Some(n))?;

    let avg_ms = time_runs(&mut m)?;
    println!(
        "  MonteCarlo [{:>8} pts] grid {:>12}:  {:>8.3} ms  |  {:>8.2} Mpts/s",
        n,
        plan.grid.to_string(),
        avg_ms,
        n as f64 / (avg_ms / 1000.0) / 1e6
    );
    Ok(())
}

fn bench_random(ctx: &Arc<WgpuContext>, n: u32) -> GpuResult<()> {
    let mut m = Runner::with_context(
        ctx.clone(),
        KernelSource::Inline(kernels::RANDOM_WGSL.to_string()),
        Some("randomf"),
        &RunnerConfig::default(),
    )?;
    let values = m.empty_float(n as usize * n as usize);
    let seeds = m.float_buf(&[1.0, 2.0, 3.0]);
    let dims = m.uint_buf(&[n, n]);
    let plan = m.set_buffers(&[values, seeds, dims], Some(&[n, n]))?;

    let avg_ms = time_runs(&mut m)?;
    println!(
        "  Random     [{:>4}x{:<4}] threads {:>12}:  {:>8.3} ms",
        n,
        n,
        plan.total_threads(),
        avg_ms
    );
    Ok(())
}
