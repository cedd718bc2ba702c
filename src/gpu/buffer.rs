//! GPU buffer allocation and host-visible updates.
//!
//! A `mapped_ptr` + `copy_nonoverlapping` update path. Like
//! [`super::memory::GpuImage`], this holds no `GpuContext` reference and
//! has no `Drop` impl — callers (warehouse teardown) call
//! [`GpuBuffer::destroy`] explicitly with the creating context, avoiding an
//! `Arc` cycle.

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;

use super::GpuContext;
use crate::error::{Error, Result};

pub struct GpuBuffer {
    pub buffer: vk::Buffer,
    pub allocation: Option<Allocation>,
    pub size: u64,
}

pub fn create_buffer(
    ctx: &GpuContext,
    size: u64,
    usage: vk::BufferUsageFlags,
    location: MemoryLocation,
) -> Result<GpuBuffer> {
    let info = vk::BufferCreateInfo::default().size(size).usage(usage).sharing_mode(vk::SharingMode::EXCLUSIVE);
    let buffer =
        unsafe { ctx.device.create_buffer(&info, None) }.map_err(|e| Error::BackendError(format!("create_buffer: {e}")))?;

    let requirements = unsafe { ctx.device.get_buffer_memory_requirements(buffer) };
    let allocation = ctx
        .allocator
        .lock()
        .map_err(|_| Error::BackendError("gpu allocator lock poisoned".into()))?
        .allocate(&AllocationCreateDesc {
            name: "gpu_buffer",
            requirements,
            location,
            linear: true,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        })
        .map_err(|_| Error::OutOfMemory)?;

    unsafe {
        ctx.device
            .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
            .map_err(|e| Error::BackendError(format!("bind_buffer_memory: {e}")))?;
    }

    Ok(GpuBuffer { buffer, allocation: Some(allocation), size })
}

/// Zero-initialized buffer of `size` bytes, used for the warehouse's dummy
/// skinning buffer (spec §4.3) and for any SSBO that must read as all-zero
/// before its first real upload.
pub fn create_zeroed_buffer(ctx: &GpuContext, size: u64, usage: vk::BufferUsageFlags) -> Result<GpuBuffer> {
    let buffer = create_buffer(ctx, size, usage, MemoryLocation::CpuToGpu)?;
    let zeros = vec![0u8; size as usize];
    buffer.update(ctx, 0, &zeros)?;
    Ok(buffer)
}

impl GpuBuffer {
    /// Copy `data` into the buffer at `offset`. Only valid for
    /// `CpuToGpu`/`GpuToCpu` allocations with a mapped pointer.
    pub fn update(&self, ctx: &GpuContext, offset: u64, data: &[u8]) -> Result<()> {
        let _ = ctx;
        let allocation = self.allocation.as_ref().ok_or(Error::BackendError("buffer has no allocation".into()))?;
        let mapped_ptr = allocation
            .mapped_ptr()
            .ok_or_else(|| Error::BackendError("buffer is not host-visible".to_string()))?
            .as_ptr() as *mut u8;
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), mapped_ptr.add(offset as usize), data.len());
        }
        Ok(())
    }

    /// Raw view of the buffer's mapped host memory, for subsystems (the
    /// particle engine's CPU recycle/spawn pass) that need to read back GPU
    /// writes rather than only push new ones. Safe to call once this
    /// frame's fence has been waited on (spec §5 frame-ownership invariant).
    pub fn mapped_slice_mut(&mut self) -> Option<&mut [u8]> {
        self.allocation.as_mut().and_then(|a| a.mapped_slice_mut())
    }

    pub fn destroy(mut self, ctx: &GpuContext) {
        unsafe {
            if let Some(allocation) = self.allocation.take() {
                if let Ok(mut allocator) = ctx.allocator.lock() {
                    let _ = allocator.free(allocation);
                }
            }
            ctx.device.destroy_buffer(self.buffer, None);
        }
    }
}
