//! # kernelkit
//!
//! Run one GPU compute kernel from the host with as little ceremony as
//! possible: compile it, hand it buffers, dispatch, wait, read back.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kernelkit::prelude::*;
//!
//! let source = r#"
//!     override group_width: u32 = 32u;
//!     override group_height: u32 = 8u;
//!     @group(0) @binding(0) var<storage, read_write> data: array<f32>;
//!
//!     @compute @workgroup_size(group_width, group_height, 1)
//!     fn square(@builtin(global_invocation_id) gid: vec3<u32>) {
//!         if (gid.y == 0u && gid.x < arrayLength(&data)) {
//!             data[gid.x] = data[gid.x] * data[gid.x];
//!         }
//!     }
//! "#;
//!
//! let mut m = Runner::new(source, None).unwrap();
//! let data = m.float_buf(&[1.0, 2.0, 3.0]);
//! m.set_buffers_with_iters(&[data.clone()], None, Some(3)).unwrap();
//! m.run().unwrap();
//! let out: Vec<f32> = m.get_buffer(&data).unwrap();
//! ```

pub mod config;
pub mod random;
pub mod source;

mod runner;

pub use config::{ConfigError, RunnerConfig};
pub use runner::Runner;
pub use source::{file_replace, KernelSource};

pub use kernelkit_backend as backend;

/// Prelude module - import everything you need with `use kernelkit::prelude::*`
pub mod prelude {
    pub use crate::random::{random_f32, random_host};
    pub use crate::{KernelSource, Runner, RunnerConfig};
    pub use kernelkit_backend::{
        DeviceBuffer, DispatchPlan, Element, ElementType, GpuError, GpuResult, HostData,
    };
}
