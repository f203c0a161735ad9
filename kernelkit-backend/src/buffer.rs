use std::sync::Arc;

use bytemuck::Pod;
use wgpu::util::DeviceExt;
use wgpu::Buffer;

use crate::context::WgpuContext;
use crate::error::{GpuError, GpuResult};

/// Host element types a buffer can be built from or read back as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    I32,
    U32,
    F32,
}

impl ElementType {
    /// Size of a single element in bytes
    pub fn size_bytes(&self) -> usize {
        match self {
            ElementType::I32 | ElementType::U32 | ElementType::F32 => 4,
        }
    }
}

/// Plain numeric types that map onto an [`ElementType`].
pub trait Element: Pod {
    const TYPE: ElementType;
}

impl Element for i32 {
    const TYPE: ElementType = ElementType::I32;
}

impl Element for u32 {
    const TYPE: ElementType = ElementType::U32;
}

impl Element for f32 {
    const TYPE: ElementType = ElementType::F32;
}

/// Host data tagged with its element type.
#[derive(Debug, Clone, PartialEq)]
pub enum HostData {
    Int(Vec<i32>),
    UInt(Vec<u32>),
    Float(Vec<f32>),
    Raw(Vec<u8>),
}

impl HostData {
    pub fn scalar_int(value: i32) -> Self {
        HostData::Int(vec![value])
    }

    pub fn scalar_uint(value: u32) -> Self {
        HostData::UInt(vec![value])
    }

    pub fn scalar_float(value: f32) -> Self {
        HostData::Float(vec![value])
    }

    /// `None` for raw bytes.
    pub fn element_type(&self) -> Option<ElementType> {
        match self {
            HostData::Int(_) => Some(ElementType::I32),
            HostData::UInt(_) => Some(ElementType::U32),
            HostData::Float(_) => Some(ElementType::F32),
            HostData::Raw(_) => None,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            HostData::Int(v) => bytemuck::cast_slice(v),
            HostData::UInt(v) => bytemuck::cast_slice(v),
            HostData::Float(v) => bytemuck::cast_slice(v),
            HostData::Raw(v) => v,
        }
    }
}

const STORAGE_USAGE: wgpu::BufferUsages = wgpu::BufferUsages::STORAGE
    .union(wgpu::BufferUsages::COPY_DST)
    .union(wgpu::BufferUsages::COPY_SRC);

/// Rounds a byte length up to a non-zero multiple of the copy alignment.
pub(crate) fn padded_size(len: u64) -> u64 {
    let align = wgpu::COPY_BUFFER_ALIGNMENT;
    len.max(1).div_ceil(align) * align
}

/// Storage buffer on the device. Clones share the same allocation.
#[derive(Debug, Clone)]
pub struct DeviceBuffer {
    buffer: Arc<Buffer>,
}

impl DeviceBuffer {
    /// Zero-filled buffer of at least `size` bytes.
    pub fn empty(ctx: &WgpuContext, size: u64) -> Self {
        Self::empty_labeled(ctx, size, None)
    }

    pub fn empty_labeled(ctx: &WgpuContext, size: u64, label: Option<&str>) -> Self {
        let buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label,
            size: padded_size(size),
            usage: STORAGE_USAGE,
            mapped_at_creation: false,
        });
        Self {
            buffer: Arc::new(buffer),
        }
    }

    pub fn from_bytes(ctx: &WgpuContext, data: &[u8]) -> Self {
        Self::from_bytes_labeled(ctx, data, None)
    }

    pub fn from_bytes_labeled(ctx: &WgpuContext, data: &[u8], label: Option<&str>) -> Self {
        let padded;
        let contents = if data.len() as u64 == padded_size(data.len() as u64) {
            data
        } else {
            let mut bytes = data.to_vec();
            bytes.resize(padded_size(data.len() as u64) as usize, 0);
            padded = bytes;
            &padded
        };
        let buffer = ctx
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label,
                contents,
                usage: STORAGE_USAGE,
            });
        Self {
            buffer: Arc::new(buffer),
        }
    }

    pub fn from_slice<T: Element>(ctx: &WgpuContext, data: &[T]) -> Self {
        Self::from_bytes(ctx, bytemuck::cast_slice(data))
    }

    pub fn from_host(ctx: &WgpuContext, data: &HostData) -> Self {
        Self::from_bytes(ctx, data.as_bytes())
    }

    /// Allocated length in bytes.
    pub fn size(&self) -> u64 {
        self.buffer.size()
    }

    pub fn raw(&self) -> &Buffer {
        &self.buffer
    }

    /// Copies `data` into the buffer at `offset`. Visible to the next submission.
    pub fn write(&self, ctx: &WgpuContext, offset: u64, data: &[u8]) {
        ctx.queue.write_buffer(&self.buffer, offset, data);
    }

    pub async fn read_bytes(&self, ctx: &WgpuContext) -> GpuResult<Vec<u8>> {
        let size = self.size();
        let staging = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Staging"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
        encoder.copy_buffer_to_buffer(&self.buffer, 0, &staging, 0, size);
        ctx.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = futures_intrusive::channel::shared::oneshot_channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        ctx.device.poll(wgpu::Maintain::Wait);
        map_outcome(rx.receive().await)?;

        let data = slice.get_mapped_range();
        let bytes = data.to_vec();
        drop(data);
        staging.unmap();
        Ok(bytes)
    }

    /// Reads the whole allocation back, reinterpreted as `T`.
    pub async fn read<T: Element>(&self, ctx: &WgpuContext) -> GpuResult<Vec<T>> {
        let bytes = self.read_bytes(ctx).await?;
        bytemuck::try_cast_slice::<u8, T>(&bytes)
            .map(|values| values.to_vec())
            .or_else(|_| {
                if bytes.len() % std::mem::size_of::<T>() != 0 {
                    return Err(GpuError::Cast(format!(
                        "{} bytes is not a whole number of {:?}",
                        bytes.len(),
                        T::TYPE
                    )));
                }
                Ok(bytes
                    .chunks_exact(std::mem::size_of::<T>())
                    .map(bytemuck::pod_read_unaligned)
                    .collect())
            })
    }
}

/// Result of a `map_async` callback as received on its channel.
fn map_outcome(received: Option<Result<(), wgpu::BufferAsyncError>>) -> GpuResult<()> {
    match received {
        Some(result) => Ok(result?),
        None => Err(GpuError::MapCallbackDropped),
    }
}
