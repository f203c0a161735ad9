use std::sync::Arc;

use kernelkit_backend::{
    CommandBuffer, CommandState, DeviceBuffer, DispatchPlan, Element, GpuError, GpuResult,
    HostData, Kernel, QueueOptions, WgpuContext,
};

use crate::config::RunnerConfig;
use crate::source::KernelSource;

/// Buffers and thread extents remembered for re-running.
#[derive(Debug, Clone)]
struct Binding {
    buffers: Vec<DeviceBuffer>,
    threads: Option<Vec<u32>>,
    iters: Option<u64>,
}

/// One kernel on one device.
///
/// # Example
/// ```rust,no_run
/// use kernelkit::Runner;
///
/// let mut m = Runner::new("fractal.wgsl", Some("fractal")).unwrap();
/// let size = m.int_buf(&[640, 480]);
/// let center = m.float_buf(&[0.5, 0.0]);
/// let span = m.float_buf(&[-2.0, 2.0]);
/// let pix = m.empty_int(640 * 480);
///
/// m.set_buffers(&[pix.clone(), size, center, span], Some(&[640, 480])).unwrap();
/// m.run().unwrap();
/// let pixels: Vec<i32> = m.get_buffer(&pix).unwrap();
/// ```
#[derive(Debug)]
pub struct Runner {
    ctx: Arc<WgpuContext>,
    kernel: Kernel,
    queue: QueueOptions,
    command: Option<CommandBuffer>,
    binding: Option<Binding>,
}

impl Runner {
    /// Opens the default device and compiles `source` (inline WGSL, a `.wgsl`
    /// path or a `.spv` path). Without `func_name` the first `@compute` entry
    /// point is used.
    pub fn new(source: &str, func_name: Option<&str>) -> GpuResult<Self> {
        Self::from_config(KernelSource::detect(source), func_name, &RunnerConfig::default())
    }

    pub fn from_config(
        source: KernelSource,
        func_name: Option<&str>,
        config: &RunnerConfig,
    ) -> GpuResult<Self> {
        let ctx = pollster::block_on(WgpuContext::new(&config.device))?;
        Self::with_context(Arc::new(ctx), source, func_name, config)
    }

    /// Compiles against an already opened device.
    pub fn with_context(
        ctx: Arc<WgpuContext>,
        source: KernelSource,
        func_name: Option<&str>,
        config: &RunnerConfig,
    ) -> GpuResult<Self> {
        let library = source.load(&ctx, &config.compile_options())?;
        let kernel = match func_name {
            Some(name) => library.function(name)?,
            None => library.first_function()?,
        };
        log::debug!(
            "kernel {} of {:?} on {}",
            kernel.name(),
            library.entries(),
            ctx.adapter_info()
        );
        Ok(Self {
            ctx,
            kernel,
            queue: config.queue_options(),
            command: None,
            binding: None,
        })
    }

    pub fn context(&self) -> &Arc<WgpuContext> {
        &self.ctx
    }

    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    pub fn buffer(&self, data: &HostData) -> DeviceBuffer {
        DeviceBuffer::from_host(&self.ctx, data)
    }

    pub fn int_buf(&self, data: &[i32]) -> DeviceBuffer {
        DeviceBuffer::from_slice(&self.ctx, data)
    }

    pub fn uint_buf(&self, data: &[u32]) -> DeviceBuffer {
        DeviceBuffer::from_slice(&self.ctx, data)
    }

    pub fn float_buf(&self, data: &[f32]) -> DeviceBuffer {
        DeviceBuffer::from_slice(&self.ctx, data)
    }

    /// Zero-filled buffer of `size` bytes.
    pub fn empty(&self, size: u64) -> DeviceBuffer {
        DeviceBuffer::empty(&self.ctx, size)
    }

    pub fn empty_int(&self, count: usize) -> DeviceBuffer {
        self.empty((count * std::mem::size_of::<i32>()) as u64)
    }

    pub fn empty_float(&self, count: usize) -> DeviceBuffer {
        self.empty((count * std::mem::size_of::<f32>()) as u64)
    }

    /// Binds `buffers` to slots `0..n` and encodes the dispatch.
    pub fn set_buffers(
        &mut self,
        buffers: &[DeviceBuffer],
        threads: Option<&[u32]>,
    ) -> GpuResult<DispatchPlan> {
        self.set_buffers_with_iters(buffers, threads, None)
    }

    /// Like [`set_buffers`](Self::set_buffers), with an explicit iteration
    /// count for inferred dispatches.
    pub fn set_buffers_with_iters(
        &mut self,
        buffers: &[DeviceBuffer],
        threads: Option<&[u32]>,
        iters: Option<u64>,
    ) -> GpuResult<DispatchPlan> {
        let binding = Binding {
            buffers: buffers.to_vec(),
            threads: threads.map(<[u32]>::to_vec),
            iters,
        };
        let (command, plan) = self.encode(&binding)?;
        self.command = Some(command);
        self.binding = Some(binding);
        Ok(plan)
    }

    fn encode(&self, binding: &Binding) -> GpuResult<(CommandBuffer, DispatchPlan)> {
        let mut command = CommandBuffer::new(&self.ctx, &self.queue);
        let plan = command.encode_compute(
            &self.ctx,
            &self.kernel,
            &binding.buffers,
            binding.threads.as_deref(),
            binding.iters,
        )?;
        Ok((command, plan))
    }

    /// Submits the encoded dispatch and blocks until it completes. Later calls
    /// re-run the last binding.
    pub fn run(&mut self) -> GpuResult<()> {
        let mut command = match self.command.take() {
            Some(command) => command,
            None => {
                let binding = self.binding.as_ref().ok_or(GpuError::InvalidState {
                    operation: "run",
                    state: CommandState::Created,
                })?;
                self.encode(binding)?.0
            }
        };
        command.commit(&self.ctx)?;
        command.wait(&self.ctx)
    }

    /// Reads `buffer` back as `T`.
    pub fn get_buffer<T: Element>(&self, buffer: &DeviceBuffer) -> GpuResult<Vec<T>> {
        pollster::block_on(buffer.read(&self.ctx))
    }
}
