//! One-shot command buffers.
//!
//! A [`CommandBuffer`] records one or more compute dispatches or copies,
//! is submitted once, and is waited on once:
//! `Created -> Encoded -> Submitted -> Completed`.

use wgpu::{CommandEncoder, SubmissionIndex};

use crate::buffer::DeviceBuffer;
use crate::context::WgpuContext;
use crate::error::{validated, GpuError, GpuResult};
use crate::library::Kernel;
use crate::options::QueueOptions;
use crate::plan::{plan_dispatch, validate_threads, DispatchPlan};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandState {
    Created,
    Encoded,
    Submitted,
    Completed,
}

impl CommandState {
    pub fn can_encode(self) -> bool {
        matches!(self, CommandState::Created | CommandState::Encoded)
    }
}

#[derive(Debug)]
pub struct CommandBuffer {
    state: CommandState,
    options: QueueOptions,
    encoder: Option<CommandEncoder>,
    submission: Option<SubmissionIndex>,
}

impl CommandBuffer {
    pub fn new(ctx: &WgpuContext, options: &QueueOptions) -> Self {
        let encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: options.label.as_deref(),
            });
        Self {
            state: CommandState::Created,
            options: options.clone(),
            encoder: Some(encoder),
            submission: None,
        }
    }

    pub fn state(&self) -> CommandState {
        self.state
    }

    fn ensure(&self, operation: &'static str, ok: bool) -> GpuResult<()> {
        if ok {
            Ok(())
        } else {
            Err(GpuError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    fn encoder(&mut self, operation: &'static str) -> GpuResult<&mut CommandEncoder> {
        let state = self.state;
        self.encoder
            .as_mut()
            .ok_or(GpuError::InvalidState { operation, state })
    }

    /// Plans and records one compute dispatch. `buffers[i]` is bound to
    /// `@group(0) @binding(i)`.
    pub fn encode_compute(
        &mut self,
        ctx: &WgpuContext,
        kernel: &Kernel,
        buffers: &[DeviceBuffer],
        threads: Option<&[u32]>,
        iters: Option<u64>,
    ) -> GpuResult<DispatchPlan> {
        if let Some(threads) = threads {
            validate_threads(threads)?;
        }
        self.ensure("encode", self.state.can_encode())?;

        let sizes: Vec<u64> = buffers.iter().map(DeviceBuffer::size).collect();
        let plan = plan_dispatch(ctx.limits(), threads, &sizes, iters)?;
        log::debug!("w,h={},{}, bufmax={:?}", plan.group.width, plan.group.height, sizes.iter().max());

        if !kernel.uses_planned_group() {
            log::warn!(
                "{} has a fixed workgroup size, planned group {} is not applied",
                kernel.name(),
                plan.group
            );
        }
        let pipeline = kernel.pipeline(ctx, plan.group)?;
        let layout = pipeline.get_bind_group_layout(0);
        let entries: Vec<wgpu::BindGroupEntry> = buffers
            .iter()
            .enumerate()
            .map(|(i, buf)| wgpu::BindGroupEntry {
                binding: i as u32,
                resource: buf.raw().as_entire_binding(),
            })
            .collect();
        let bind_group = validated(&ctx.device, GpuError::Binding, || {
            ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(kernel.name()),
                layout: &layout,
                entries: &entries,
            })
        })?;

        let pass_label = self.options.pass_label.clone();
        let encoder = self.encoder("encode")?;
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: pass_label.as_deref().or(Some(kernel.name())),
                timestamp_writes: None,
            });
            pass.set_pipeline(&pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(plan.grid.width, plan.grid.height, plan.grid.depth);
        }
        log::debug!("encode(compute) {}: grid={} group={}", kernel.name(), plan.grid, plan.group);

        self.state = CommandState::Encoded;
        Ok(plan)
    }

    /// Records a whole-buffer copy. The copy covers the smaller of the two sizes.
    pub fn encode_copy(&mut self, src: &DeviceBuffer, dst: &DeviceBuffer) -> GpuResult<()> {
        self.ensure("encode", self.state.can_encode())?;
        let size = src.size().min(dst.size());
        let encoder = self.encoder("encode")?;
        encoder.copy_buffer_to_buffer(src.raw(), 0, dst.raw(), 0, size);
        log::debug!("encode(copy) {} bytes", size);
        self.state = CommandState::Encoded;
        Ok(())
    }

    /// Submits the recorded work.
    pub fn commit(&mut self, ctx: &WgpuContext) -> GpuResult<()> {
        self.ensure("commit", self.state == CommandState::Encoded)?;
        let Some(encoder) = self.encoder.take() else {
            return Err(GpuError::InvalidState {
                operation: "commit",
                state: self.state,
            });
        };
        log::debug!("start compute");
        self.submission = Some(ctx.queue.submit(Some(encoder.finish())));
        self.state = CommandState::Submitted;
        Ok(())
    }

    /// Blocks until the submitted work has finished.
    pub fn wait(&mut self, ctx: &WgpuContext) -> GpuResult<()> {
        self.ensure("wait", self.state == CommandState::Submitted)?;
        log::debug!("wait");
        match self.submission.take() {
            Some(index) => ctx.device.poll(wgpu::Maintain::WaitForSubmissionIndex(index)),
            None => ctx.device.poll(wgpu::Maintain::Wait),
        };
        self.state = CommandState::Completed;
        log::debug!("finished");
        Ok(())
    }
}
