//! Runner tests against a real device; skipped when none is available.

use std::sync::Arc;

use kernelkit::backend::{kernels, ContextOptions, WgpuContext};
use kernelkit::prelude::*;

const INCREMENT_WGSL: &str = r#"
override group_width: u32 = 32u;
override group_height: u32 = 8u;

@group(0) @binding(0) var<storage, read_write> data: array<i32>;

@compute @workgroup_size(group_width, group_height, 1)
fn increment(@builtin(global_invocation_id) gid: vec3<u32>) {
    if (gid.y == 0u && gid.x < arrayLength(&data)) {
        data[gid.x] = data[gid.x] + 1;
    }
}
"#;

fn context() -> Option<Arc<WgpuContext>> {
    let _ = env_logger::builder().is_test(true).try_init();
    match pollster::block_on(WgpuContext::new(&ContextOptions::default())) {
        Ok(ctx) => Some(Arc::new(ctx)),
        Err(e) => {
            eprintln!("skipping, no device: {}", e);
            None
        }
    }
}

fn runner(source: &str, name: Option<&str>) -> Option<Runner> {
    let ctx = context()?;
    Some(
        Runner::with_context(ctx, KernelSource::detect(source), name, &RunnerConfig::default())
            .unwrap(),
    )
}

#[test]
fn test_run_reuses_buffers_across_calls() {
    let Some(mut m) = runner(INCREMENT_WGSL, None) else { return };
    assert_eq!(m.kernel().name(), "increment");

    let data = m.int_buf(&[1, 2, 3, 4]);
    m.set_buffers(&[data.clone()], None).unwrap();
    m.run().unwrap();
    assert_eq!(m.get_buffer::<i32>(&data).unwrap(), vec![2, 3, 4, 5]);

    m.run().unwrap();
    assert_eq!(m.get_buffer::<i32>(&data).unwrap(), vec![3, 4, 5, 6]);
}

#[test]
fn test_run_before_set_buffers_fails() {
    let Some(mut m) = runner(INCREMENT_WGSL, Some("increment")) else { return };
    assert!(matches!(m.run(), Err(GpuError::InvalidState { .. })));
}

#[test]
fn test_set_buffers_rejects_single_axis() {
    let Some(mut m) = runner(INCREMENT_WGSL, None) else { return };
    let data = m.int_buf(&[0]);
    assert!(m.set_buffers(&[data], Some(&[8])).is_err());
    assert!(matches!(m.run(), Err(GpuError::InvalidState { .. })));
}

#[test]
fn test_helper_buffers() {
    let Some(m) = runner(INCREMENT_WGSL, None) else { return };
    assert_eq!(m.empty_int(10).size(), 40);
    assert_eq!(m.empty_float(3).size(), 12);
    assert_eq!(m.empty(0).size(), 4);

    let scalar = m.buffer(&HostData::scalar_int(0));
    assert_eq!(m.get_buffer::<i32>(&scalar).unwrap(), vec![0]);
    let floats = m.buffer(&HostData::Float(vec![0.25, 0.5]));
    assert_eq!(m.get_buffer::<f32>(&floats).unwrap(), vec![0.25, 0.5]);
}

#[test]
fn test_random_kernel_stays_in_unit_interval() {
    let Some(mut m) = runner(kernels::RANDOM_WGSL, Some("randomf")) else { return };
    let n = 64u32;
    let values = m.empty_float((n * n) as usize);
    let seeds = m.float_buf(&[11.0, 222.0, 3333.0]);
    let dims = m.uint_buf(&[n, n]);
    m.set_buffers(&[values.clone(), seeds, dims], Some(&[n, n])).unwrap();
    m.run().unwrap();

    let out = m.get_buffer::<f32>(&values).unwrap();
    assert_eq!(out.len(), (n * n) as usize);
    assert!(out.iter().all(|v| (0.0..1.0).contains(v)));
    let mean = out.iter().sum::<f32>() / out.len() as f32;
    assert!((mean - 0.5).abs() < 0.05, "mean {}", mean);
}

#[test]
fn test_unknown_function_name() {
    let Some(ctx) = context() else { return };
    let err = Runner::with_context(
        ctx,
        KernelSource::Inline(INCREMENT_WGSL.to_string()),
        Some("decrement"),
        &RunnerConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, GpuError::KernelNotFound { .. }));
}
