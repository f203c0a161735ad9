//! Demo programs built on the runner.

use std::collections::HashSet;
use std::time::Instant;

use anyhow::{bail, Result};
use kernelkit::prelude::*;
use kernelkit_backend::kernels;
use rand::Rng;

fn compile(source: &str, name: &str, config: &RunnerConfig) -> Result<Runner> {
    let t0 = Instant::now();
    let runner = Runner::from_config(KernelSource::Inline(source.to_string()), Some(name), config)?;
    println!(
        "[INIT] {} compiled in {:.3}s on {}",
        name,
        t0.elapsed().as_secs_f64(),
        runner.context().adapter_info()
    );
    log::debug!("device limits: {:?}", runner.context().max_values());
    Ok(runner)
}

/// Mean and sample standard deviation.
pub fn stats(data: &[f32]) -> (f64, f64) {
    let n = data.len() as f64;
    if data.is_empty() {
        return (0.0, 0.0);
    }
    let (sum, sum_sq) = data.iter().fold((0.0f64, 0.0f64), |(s, sq), &x| {
        let x = x as f64;
        (s + x, sq + x * x)
    });
    let mean = sum / n;
    if data.len() < 2 {
        return (mean, 0.0);
    }
    let var = (sum_sq - sum * sum / n) / (n - 1.0);
    (mean, var.max(0.0).sqrt())
}

/// Pixel dimensions `640*scale x 480*scale` and their product.
pub fn frame(scale: u32) -> Result<(u32, u32, usize)> {
    let (Some(w), Some(h)) = (640u32.checked_mul(scale), 480u32.checked_mul(scale)) else {
        bail!("scale {} is too large", scale);
    };
    let Some(pixels) = w.checked_mul(h) else {
        bail!("{}x{} pixels do not fit in a u32 index", w, h);
    };
    Ok((w, h, pixels as usize))
}

/// Random seed points packed as `(x, y, color, count)`.
pub fn voronoi_points(count: u32, width: u32, height: u32) -> Vec<u32> {
    let mut rng = rand::thread_rng();
    (0..count)
        .flat_map(|_| {
            [
                rng.gen_range(0..width),
                rng.gen_range(0..height),
                rng.gen_range(0..0x00ff_ffff),
                count,
            ]
        })
        .collect()
}

pub fn run_fractal(config: &RunnerConfig, scale: u32) -> Result<()> {
    let mut m = compile(kernels::FRACTAL_WGSL, "fractal", config)?;
    let (w, h, total) = frame(scale)?;
    println!("[RUN]  fractal on {}x{} = {} pixels", w, h, total);

    let size = m.int_buf(&[w as i32, h as i32]);
    let center = m.float_buf(&[0.5, 0.0]);
    let span = m.float_buf(&[-2.0, 2.0]);
    let pix = m.empty_int(total);

    let plan = m.set_buffers(&[pix.clone(), size, center, span], Some(&[w, h]))?;
    log::info!("fractal plan: {:?}", plan);

    let t = Instant::now();
    m.run()?;
    let pixels = m.get_buffer::<i32>(&pix)?;
    println!("       done in {:.3}s", t.elapsed().as_secs_f64());

    let inside = pixels.iter().filter(|&&p| (p as u32 & 0x00ff_ffff) == 0).count();
    println!(
        "       {:.1}% of pixels inside the set",
        100.0 * inside as f64 / pixels.len() as f64
    );
    Ok(())
}

pub fn run_voronoi(config: &RunnerConfig, scale: u32) -> Result<()> {
    let mut m = compile(kernels::VORONOI_WGSL, "voronoi", config)?;
    let (w, h, total) = frame(scale)?;
    let n_points = w / 2;
    println!(
        "[RUN]  voronoi on {}x{} pixels, {} points, {} iterations",
        w,
        h,
        n_points,
        w as u64 * h as u64 * n_points as u64
    );

    let points = m.buffer(&HostData::UInt(voronoi_points(n_points, w, h)));
    let dims = m.uint_buf(&[w, h]);
    let pix = m.empty_int(total);

    m.set_buffers(&[pix.clone(), points, dims], Some(&[w, h]))?;

    let t = Instant::now();
    m.run()?;
    let pixels = m.get_buffer::<i32>(&pix)?;
    println!("       done in {:.3}s", t.elapsed().as_secs_f64());

    let regions: HashSet<i32> = pixels.iter().copied().collect();
    println!("       {} distinct regions visible", regions.len());
    Ok(())
}

pub fn run_monte_carlo(config: &RunnerConfig, size: u32) -> Result<()> {
    let mut m = compile(kernels::MONTE_CARLO_WGSL, "monte_carlo", config)?;
    let n = size as u64 * size as u64;
    println!("[RUN]  pi by monte carlo over {} points", n);

    let points = m.float_buf(&random_f32(n as usize * 2));
    let counter = m.uint_buf(&[0]);
    m.set_buffers_with_iters(&[points, counter.clone()], None, Some(n))?;

    let t = Instant::now();
    m.run()?;
    let count = m.get_buffer::<u32>(&counter)?[0];
    let pi = 4.0 * count as f64 / n as f64;
    println!("       done in {:.3}s", t.elapsed().as_secs_f64());
    println!("       pi={} diff={:e}", pi, (pi - std::f64::consts::PI).abs());
    Ok(())
}

pub fn run_random(config: &RunnerConfig, n: u32) -> Result<()> {
    let mut m = compile(kernels::RANDOM_WGSL, "randomf", config)?;
    let total = n as usize * n as usize;
    println!("[RUN]  random on {} values", total);

    let mut rng = rand::thread_rng();
    let seeds: Vec<f32> = (0..3).map(|_| rng.gen_range(0..1_000_000) as f32).collect();
    let values = m.empty_float(total);
    let seeds = m.float_buf(&seeds);
    let dims = m.uint_buf(&[n, n]);
    m.set_buffers(&[values.clone(), seeds, dims], Some(&[n, n]))?;

    let t = Instant::now();
    m.run()?;
    let gpu_time = t.elapsed().as_secs_f64();
    let rnd = m.get_buffer::<f32>(&values)?;
    let (mean, std) = stats(&rnd);
    println!("       gpu: {:.3}s mean={:.5} std={:.5}", gpu_time, mean, std);

    let t = Instant::now();
    let cpu = random_f32(total);
    let cpu_time = t.elapsed().as_secs_f64();
    let (mean, std) = stats(&cpu);
    println!("       cpu: {:.3}s mean={:.5} std={:.5}", cpu_time, mean, std);
    println!("       ratio cpu/gpu: {:.3}", cpu_time / gpu_time.max(f64::EPSILON));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats() {
        let (mean, std) = stats(&[1.0, 2.0, 3.0, 4.0]);
        assert!((mean - 2.5).abs() < 1e-12);
        assert!((std - 1.290_994_448_7).abs() < 1e-9);
        assert_eq!(stats(&[]), (0.0, 0.0));
        assert_eq!(stats(&[7.0]), (7.0, 0.0));
    }

    #[test]
    fn test_frame_checks_overflow() {
        assert_eq!(frame(1).unwrap(), (640, 480, 307_200));
        assert_eq!(frame(4).unwrap(), (2560, 1920, 4_915_200));
        assert!(frame(0).is_ok());
        assert!(frame(u32::MAX).is_err());
        assert!(frame(200).is_err());
    }

    #[test]
    fn test_voronoi_points_layout() {
        let points = voronoi_points(50, 64, 48);
        assert_eq!(points.len(), 200);
        for p in points.chunks_exact(4) {
            assert!(p[0] < 64);
            assert!(p[1] < 48);
            assert!(p[2] < 0x00ff_ffff);
            assert_eq!(p[3], 50);
        }
    }
}
