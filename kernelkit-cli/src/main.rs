//! kernelkit CLI - GPU compute demos
//!
//! Lists compute devices and runs the bundled demo kernels:
//! 1. fractal (explicit 2D dispatch)
//! 2. voronoi (explicit 2D dispatch)
//! 3. monte carlo pi (inferred 1D dispatch)
//! 4. random numbers (explicit 2D dispatch, compared with the CPU)

mod demos;

use std::path::Path;

use anyhow::{bail, Context, Result};
use kernelkit::RunnerConfig;

fn main() {
    env_logger::init();

    let mut args: Vec<String> = std::env::args().collect();
    let config = match take_config(&mut args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("[ERROR] {:#}", e);
            std::process::exit(2);
        }
    };

    if args.len() < 2 {
        print_usage();
        return;
    }

    let arg = |i: usize, default: u32| -> Result<u32> {
        match args.get(i) {
            Some(s) => s.parse().with_context(|| format!("invalid number: {}", s)),
            None => Ok(default),
        }
    };

    let result = match args[1].as_str() {
        "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        "--devices" | "devices" => {
            list_devices();
            Ok(())
        }
        "fractal" => arg(2, 1).and_then(|scale| demos::run_fractal(&config, scale)),
        "voronoi" => arg(2, 1).and_then(|scale| demos::run_voronoi(&config, scale)),
        "monte-carlo" => arg(2, 256).and_then(|size| demos::run_monte_carlo(&config, size)),
        "random" => arg(2, 512).and_then(|n| demos::run_random(&config, n)),
        other => Err(anyhow::anyhow!("unknown command: {}", other)),
    };

    if let Err(e) = result {
        eprintln!("[ERROR] {:#}", e);
        std::process::exit(1);
    }
}

/// Removes `--config <file>` from `args` and loads it.
fn take_config(args: &mut Vec<String>) -> Result<RunnerConfig> {
    let Some(pos) = args.iter().position(|a| a == "--config") else {
        return Ok(RunnerConfig::default());
    };
    if pos + 1 >= args.len() {
        bail!("--config needs a file argument");
    }
    let path = args.remove(pos + 1);
    args.remove(pos);
    RunnerConfig::from_file(Path::new(&path)).with_context(|| format!("loading {}", path))
}

fn list_devices() {
    let devices = kernelkit_backend::list_devices();
    if devices.is_empty() {
        println!("No compute devices found.");
        return;
    }
    for device in devices {
        for line in device.describe() {
            println!("{}", line);
        }
        println!();
    }
}

fn print_usage() {
    println!("======================================================================");
    println!("                    KERNELKIT GPU COMPUTE DEMOS                       ");
    println!("======================================================================");
    println!();
    println!("USAGE:");
    println!("  kernelkit [--config FILE] <COMMAND> [ARG]");
    println!();
    println!("COMMANDS:");
    println!("  --devices            List compute devices and their limits");
    println!("  fractal [SCALE]      Mandelbrot on 640*SCALE x 480*SCALE pixels");
    println!("  voronoi [SCALE]      Voronoi diagram on 640*SCALE x 480*SCALE pixels");
    println!("  monte-carlo [SIZE]   Estimate pi from SIZE*SIZE random points");
    println!("  random [N]           N*N uniform floats, GPU vs CPU");
    println!("  --help               Show this help");
    println!();
    println!("CONFIG FILE (JSON):");
    println!("  {{ \"device\": {{ \"name\": \"...\", \"preferred_group_width\": 32 }},");
    println!("    \"compile\": {{ \"label\": \"...\" }}, \"queue\": {{ \"label\": \"...\" }} }}");
    println!();
    println!("Set RUST_LOG=debug to trace every encode, submit and wait.");
}
