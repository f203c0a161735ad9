use std::path::PathBuf;

use crate::command::CommandState;
use crate::plan::PlanError;

/// Errors raised by the driver shim.
#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    #[error("no such device: {} (available: {available:?})", .requested.as_deref().unwrap_or("<default>"))]
    DeviceUnavailable {
        requested: Option<String>,
        available: Vec<String>,
    },
    #[error("device request failed: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),
    #[error("kernel compile error: {0}")]
    Compile(String),
    #[error("source declares no @compute entry point")]
    NoKernel,
    #[error("kernel '{name}' not found (available: {available:?})")]
    KernelNotFound { name: String, available: Vec<String> },
    #[error("pipeline creation failed: {0}")]
    Pipeline(String),
    #[error("buffer binding rejected: {0}")]
    Binding(String),
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error("cannot {operation} a command buffer in state {state:?}")]
    InvalidState {
        operation: &'static str,
        state: CommandState,
    },
    #[error("buffer map failed: {0}")]
    Map(#[from] wgpu::BufferAsyncError),
    #[error("buffer map callback dropped before it ran")]
    MapCallbackDropped,
    #[error("readback cast failed: {0}")]
    Cast(String),
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type GpuResult<T> = Result<T, GpuError>;

/// Runs `f` inside a validation error scope and turns a captured error into `wrap(message)`.
pub(crate) fn validated<T>(
    device: &wgpu::Device,
    wrap: fn(String) -> GpuError,
    f: impl FnOnce() -> T,
) -> GpuResult<T> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = f();
    match pollster::block_on(device.pop_error_scope()) {
        Some(err) => Err(wrap(err.to_string())),
        None => Ok(value),
    }
}
