//! # kernelkit-backend
//!
//! Thin host-side shim over `wgpu` for running one compute kernel at a time:
//! open a device, compile a library, create buffers, plan and encode a
//! dispatch, submit, wait, read back.
//!
//! ```rust,no_run
//! use kernelkit_backend::*;
//!
//! # fn main() -> GpuResult<()> {
//! let ctx = pollster::block_on(WgpuContext::new(&ContextOptions::default()))?;
//! let lib = Library::from_source(&ctx, kernels::MONTE_CARLO_WGSL, &CompileOptions::default())?;
//! let kernel = lib.first_function()?;
//!
//! let points = DeviceBuffer::from_slice(&ctx, &[0.1f32, 0.2, 0.9, 0.9]);
//! let counter = DeviceBuffer::from_slice(&ctx, &[0u32]);
//!
//! let mut cmd = CommandBuffer::new(&ctx, &QueueOptions::default());
//! cmd.encode_compute(&ctx, &kernel, &[points, counter.clone()], None, None)?;
//! cmd.commit(&ctx)?;
//! cmd.wait(&ctx)?;
//!
//! let inside = pollster::block_on(counter.read::<u32>(&ctx))?;
//! # Ok(())
//! # }
//! ```

pub use wgpu; // Re-export wgpu for downstream crates

pub mod buffer;
pub mod command;
pub mod context;
pub mod error;
pub mod kernels;
pub mod library;
pub mod options;
pub mod plan;

pub use buffer::{DeviceBuffer, Element, ElementType, HostData};
pub use command::{CommandBuffer, CommandState};
pub use context::{list_devices, AdapterSummary, ContextOptions, WgpuContext};
pub use error::{GpuError, GpuResult};
pub use library::{first_kernel_name, Kernel, Library};
pub use options::{CompileOptions, Configurable, QueueOptions};
pub use plan::{plan_dispatch, DeviceLimits, DispatchMode, DispatchPlan, Extent3, PlanError};
