//! Device memory bump arena.
//!
//! Resources are placed into one native allocation in two phases. First every
//! buffer or image reports its requirements to a [`MemoryReservation`], which
//! hands back the offset it will be bound at. Then the reservation is turned
//! into an allocated [`DeviceMemory`] in a single `vkAllocateMemory` call and
//! the resources are bound at their offsets.
//!
//! The two phases are two types: reserving after allocation does not compile,
//! and binding before allocation has nothing to bind to.

use crate::device::DeviceApi;
use crate::error::{GpuError, Result};
use ash::vk;

/// Round `value` up to a multiple of `alignment`.
pub const fn align_to(value: vk::DeviceSize, alignment: vk::DeviceSize) -> vk::DeviceSize {
    if alignment <= 1 {
        return value;
    }
    value.div_ceil(alignment) * alignment
}

/// First memory type allowed by `type_bits` whose flags contain `properties`.
pub fn find_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    properties: vk::MemoryPropertyFlags,
) -> Option<u32> {
    memory_properties.memory_types[..memory_properties.memory_type_count as usize]
        .iter()
        .enumerate()
        .find(|&(i, memory_type)| {
            type_bits & (1 << i) != 0 && memory_type.property_flags.contains(properties)
        })
        .map(|(i, _)| i as u32)
}

/// Widen `[offset, offset + size)` to whole non-coherent atoms.
///
/// `vk::WHOLE_SIZE` passes through with only the offset aligned down.
pub const fn atom_aligned_range(
    offset: vk::DeviceSize,
    size: vk::DeviceSize,
    atom: vk::DeviceSize,
) -> (vk::DeviceSize, vk::DeviceSize) {
    if atom <= 1 {
        return (offset, size);
    }
    let start = offset - offset % atom;
    if size == vk::WHOLE_SIZE {
        return (start, vk::WHOLE_SIZE);
    }
    let end = align_to(offset + size, atom);
    (start, end - start)
}

/// Memory being planned: collects placements before anything is allocated.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MemoryReservation {
    size: vk::DeviceSize,
    type_bits: u32,
}

impl MemoryReservation {
    /// Create an empty reservation.
    pub const fn new() -> Self {
        Self {
            size: 0,
            type_bits: 0,
        }
    }

    /// Place a resource and return the offset it must be bound at.
    ///
    /// The first placement sets the allowed memory types and sits at offset 0.
    /// Later placements narrow the memory types and are aligned after the
    /// previous ones.
    pub fn reserve(&mut self, requirements: &vk::MemoryRequirements) -> vk::DeviceSize {
        if self.size == 0 {
            self.type_bits = requirements.memory_type_bits;
            self.size = requirements.size;
            return 0;
        }

        self.type_bits &= requirements.memory_type_bits;
        let offset = align_to(self.size, requirements.alignment);
        self.size = offset + requirements.size;
        offset
    }

    /// Total bytes reserved so far.
    pub const fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// Memory types compatible with every placement so far.
    pub const fn type_bits(&self) -> u32 {
        self.type_bits
    }

    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Allocate the whole reservation in one block.
    ///
    /// If `properties` asks for `LAZILY_ALLOCATED` and no compatible type has
    /// it, the request is retried without that bit.
    pub fn allocate(
        self,
        device: &impl DeviceApi,
        properties: vk::MemoryPropertyFlags,
    ) -> Result<DeviceMemory> {
        let memory_properties = device.memory_properties();
        let memory_type_index = find_memory_type(memory_properties, self.type_bits, properties)
            .or_else(|| {
                if !properties.contains(vk::MemoryPropertyFlags::LAZILY_ALLOCATED) {
                    return None;
                }
                tracing::debug!("No lazily allocated memory type, falling back to regular memory");
                find_memory_type(
                    memory_properties,
                    self.type_bits,
                    properties & !vk::MemoryPropertyFlags::LAZILY_ALLOCATED,
                )
            })
            .ok_or(GpuError::NoSuitableMemoryType {
                type_bits: self.type_bits,
                properties,
            })?;

        let alloc_info = vk::MemoryAllocateInfo::default()
            .allocation_size(self.size)
            .memory_type_index(memory_type_index);

        let memory = unsafe { device.allocate_memory(&alloc_info) }
            .map_err(GpuError::call("vkAllocateMemory"))?;

        tracing::trace!(
            size = self.size,
            memory_type_index,
            "Allocated device memory"
        );

        Ok(DeviceMemory {
            memory,
            size: self.size,
            type_bits: self.type_bits,
            memory_type_index,
            atom_size: device.non_coherent_atom_size(),
        })
    }
}

/// One allocated block of device memory.
///
/// Not freed on drop; call [`DeviceMemory::free`] before the device goes away.
#[derive(Debug)]
pub struct DeviceMemory {
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
    type_bits: u32,
    memory_type_index: u32,
    atom_size: vk::DeviceSize,
}

impl DeviceMemory {
    /// The native memory handle.
    pub const fn memory(&self) -> vk::DeviceMemory {
        self.memory
    }

    /// Size of the allocation in bytes.
    pub const fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// Index of the memory type the block was allocated from.
    pub const fn memory_type_index(&self) -> u32 {
        self.memory_type_index
    }

    /// Bind a buffer at an offset returned by [`MemoryReservation::reserve`].
    pub fn bind_buffer(
        &self,
        device: &impl DeviceApi,
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
    ) -> Result<()> {
        unsafe { device.bind_buffer_memory(buffer, self.memory, offset) }
            .map_err(GpuError::call("vkBindBufferMemory"))
    }

    /// Bind an image at an offset returned by [`MemoryReservation::reserve`].
    pub fn bind_image(
        &self,
        device: &impl DeviceApi,
        image: vk::Image,
        offset: vk::DeviceSize,
    ) -> Result<()> {
        unsafe { device.bind_image_memory(image, self.memory, offset) }
            .map_err(GpuError::call("vkBindImageMemory"))
    }

    /// Map a range for host access. The memory must be host-visible.
    pub fn map(
        &self,
        device: &impl DeviceApi,
        offset: vk::DeviceSize,
        size: vk::DeviceSize,
    ) -> Result<*mut u8> {
        let ptr = unsafe { device.map_memory(self.memory, offset, size) }
            .map_err(GpuError::call("vkMapMemory"))?;
        Ok(ptr.cast())
    }

    pub fn unmap(&self, device: &impl DeviceApi) {
        unsafe { device.unmap_memory(self.memory) };
    }

    /// Copy `data` into the block at `offset` (map, copy, unmap).
    pub fn write<T: bytemuck::Pod>(
        &self,
        device: &impl DeviceApi,
        offset: vk::DeviceSize,
        data: &[T],
    ) -> Result<()> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let len = bytes.len() as vk::DeviceSize;
        if !offset.checked_add(len).is_some_and(|end| end <= self.size) {
            return Err(GpuError::Other(format!(
                "write of {len} bytes at {offset} overflows {} byte block",
                self.size
            )));
        }

        let mapped = self.map(device, offset, len)?;
        unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), mapped, bytes.len()) };
        self.unmap(device);
        Ok(())
    }

    /// Make host writes in the range visible to the device.
    pub fn flush(
        &self,
        device: &impl DeviceApi,
        offset: vk::DeviceSize,
        size: vk::DeviceSize,
    ) -> Result<()> {
        let range = self.mapped_range(offset, size);
        unsafe { device.flush_mapped_memory_ranges(std::slice::from_ref(&range)) }
            .map_err(GpuError::call("vkFlushMappedMemoryRanges"))
    }

    /// Make device writes in the range visible to the host.
    pub fn invalidate(
        &self,
        device: &impl DeviceApi,
        offset: vk::DeviceSize,
        size: vk::DeviceSize,
    ) -> Result<()> {
        let range = self.mapped_range(offset, size);
        unsafe { device.invalidate_mapped_memory_ranges(std::slice::from_ref(&range)) }
            .map_err(GpuError::call("vkInvalidateMappedMemoryRanges"))
    }

    fn mapped_range(
        &self,
        offset: vk::DeviceSize,
        size: vk::DeviceSize,
    ) -> vk::MappedMemoryRange<'static> {
        let (offset, mut size) = atom_aligned_range(offset, size, self.atom_size);
        // A range rounded past the end must be expressed as "to the end".
        if size != vk::WHOLE_SIZE && offset + size > self.size {
            size = vk::WHOLE_SIZE;
        }
        vk::MappedMemoryRange::default()
            .memory(self.memory)
            .offset(offset)
            .size(size)
    }

    /// Release the block. The returned reservation is empty and reusable.
    pub fn free(self, device: &impl DeviceApi) -> MemoryReservation {
        unsafe { device.free_memory(self.memory) };
        tracing::trace!(size = self.size, type_bits = self.type_bits, "Freed device memory");
        MemoryReservation::new()
    }
}
