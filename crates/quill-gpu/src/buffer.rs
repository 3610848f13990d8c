//! Buffers placed into a shared [`DeviceMemory`] block.

use crate::device::DeviceApi;
use crate::error::{GpuError, Result};
use crate::memory::{DeviceMemory, MemoryReservation};
use ash::vk;

/// A buffer that is bound at a reserved offset of a shared memory block.
///
/// Typical use packs several buffers into one block:
///
/// ```ignore
/// let mut vertices = Buffer::new(&device, 4096, vk::BufferUsageFlags::VERTEX_BUFFER)?;
/// let mut indices = Buffer::new(&device, 1024, vk::BufferUsageFlags::INDEX_BUFFER)?;
/// let mut reservation = MemoryReservation::new();
/// vertices.reserve(&mut reservation);
/// indices.reserve(&mut reservation);
/// let memory = reservation.allocate(&device, vk::MemoryPropertyFlags::HOST_VISIBLE)?;
/// vertices.bind(&device, &memory)?;
/// indices.bind(&device, &memory)?;
/// ```
#[derive(Debug)]
pub struct Buffer {
    buffer: vk::Buffer,
    size: vk::DeviceSize,
    requirements: vk::MemoryRequirements,
    offset: Option<vk::DeviceSize>,
}

impl Buffer {
    /// Create an exclusive buffer. No memory is attached yet.
    pub fn new(
        device: &impl DeviceApi,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
    ) -> Result<Self> {
        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.create_buffer(&buffer_info) }
            .map_err(GpuError::call("vkCreateBuffer"))?;
        let requirements = unsafe { device.buffer_memory_requirements(buffer) };

        Ok(Self {
            buffer,
            size,
            requirements,
            offset: None,
        })
    }

    /// Reserve space for this buffer and remember the offset.
    pub fn reserve(&mut self, reservation: &mut MemoryReservation) -> vk::DeviceSize {
        let offset = reservation.reserve(&self.requirements);
        self.offset = Some(offset);
        offset
    }

    /// Bind to the allocated block at the reserved offset.
    pub fn bind(&self, device: &impl DeviceApi, memory: &DeviceMemory) -> Result<()> {
        let offset = self
            .offset
            .ok_or_else(|| GpuError::Other("buffer bound before reserving memory".into()))?;
        memory.bind_buffer(device, self.buffer, offset)
    }

    pub const fn buffer(&self) -> vk::Buffer {
        self.buffer
    }

    pub const fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// Offset in the memory block, once reserved.
    pub const fn offset(&self) -> Option<vk::DeviceSize> {
        self.offset
    }

    pub const fn requirements(&self) -> &vk::MemoryRequirements {
        &self.requirements
    }

    /// Destroy the buffer. The memory block is freed separately.
    pub fn destroy(self, device: &impl DeviceApi) {
        unsafe { device.destroy_buffer(self.buffer) };
    }
}
