//! Descriptor pools and descriptor writes.

use crate::error::{GpuError, Result};
use ash::vk;
use parking_lot::Mutex;
use std::sync::Arc;

/// Per-type descriptor counts needed by one descriptor set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct DescriptorPoolSizes {
    sizes: Vec<(vk::DescriptorType, u32)>,
}

impl DescriptorPoolSizes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `count` descriptors of `ty`. Counts of the same type are merged;
    /// zero counts are ignored.
    pub fn add(&mut self, ty: vk::DescriptorType, count: u32) {
        if count == 0 {
            return;
        }
        if let Some((_, existing)) = self.sizes.iter_mut().find(|(t, _)| *t == ty) {
            *existing += count;
        } else {
            self.sizes.push((ty, count));
        }
    }

    #[must_use]
    pub fn with(mut self, ty: vk::DescriptorType, count: u32) -> Self {
        self.add(ty, count);
        self
    }

    /// Count for `ty`, zero if absent.
    pub fn count(&self, ty: vk::DescriptorType) -> u32 {
        self.sizes
            .iter()
            .find(|(t, _)| *t == ty)
            .map_or(0, |(_, count)| *count)
    }

    /// Number of distinct descriptor types.
    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (vk::DescriptorType, u32)> + '_ {
        self.sizes.iter().copied()
    }

    /// Native pool sizes for a pool holding `max_sets` such sets.
    pub fn vk_pool_sizes(&self, max_sets: u32) -> Vec<vk::DescriptorPoolSize> {
        self.sizes
            .iter()
            .map(|&(ty, count)| vk::DescriptorPoolSize {
                ty,
                descriptor_count: count.saturating_mul(max_sets),
            })
            .collect()
    }
}

/// Descriptor pool with a booking counter for shared use.
///
/// Users book set slots up front with [`DescriptorPool::book_capacity`] so
/// that allocation never exceeds `max_sets`.
#[derive(Debug)]
pub struct DescriptorPool {
    pool: vk::DescriptorPool,
    max_sets: u32,
    capacity: u32,
    sizes: DescriptorPoolSizes,
}

impl DescriptorPool {
    /// Create a pool for `max_sets` sets shaped like `sizes`.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn new(
        device: &ash::Device,
        max_sets: u32,
        sizes: DescriptorPoolSizes,
    ) -> Result<Self> {
        let pool_sizes = sizes.vk_pool_sizes(max_sets);
        let create_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(max_sets)
            .pool_sizes(&pool_sizes)
            .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET);

        let pool = device
            .create_descriptor_pool(&create_info, None)
            .map_err(GpuError::call("vkCreateDescriptorPool"))?;

        tracing::debug!(max_sets, types = sizes.len(), "Created descriptor pool");
        Ok(Self::from_raw(pool, max_sets, sizes))
    }

    pub(crate) const fn from_raw(
        pool: vk::DescriptorPool,
        max_sets: u32,
        sizes: DescriptorPoolSizes,
    ) -> Self {
        Self {
            pool,
            max_sets,
            capacity: max_sets,
            sizes,
        }
    }

    /// Get the raw pool handle.
    pub const fn handle(&self) -> vk::DescriptorPool {
        self.pool
    }

    pub const fn max_sets(&self) -> u32 {
        self.max_sets
    }

    pub const fn sizes(&self) -> &DescriptorPoolSizes {
        &self.sizes
    }

    /// Set slots not yet booked.
    pub const fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Reserve `count` set slots. Returns false if not enough are left.
    pub fn book_capacity(&mut self, count: u32) -> bool {
        if self.capacity < count {
            return false;
        }
        self.capacity -= count;
        true
    }

    /// Return slots previously booked.
    pub fn unbook_capacity(&mut self, count: u32) {
        self.capacity += count;
        debug_assert!(self.capacity <= self.max_sets, "unbooked more than booked");
    }

    /// Allocate one set per layout.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn allocate(
        &self,
        device: &ash::Device,
        layouts: &[vk::DescriptorSetLayout],
    ) -> Result<Vec<vk::DescriptorSet>> {
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.pool)
            .set_layouts(layouts);

        device
            .allocate_descriptor_sets(&alloc_info)
            .map_err(GpuError::call("vkAllocateDescriptorSets"))
    }

    /// Return sets to the pool.
    ///
    /// # Safety
    /// The sets must come from this pool and not be in use.
    pub unsafe fn free(&self, device: &ash::Device, sets: &[vk::DescriptorSet]) -> Result<()> {
        device
            .free_descriptor_sets(self.pool, sets)
            .map_err(GpuError::call("vkFreeDescriptorSets"))
    }

    /// Reset the pool, freeing all descriptor sets. Bookings are kept.
    ///
    /// # Safety
    /// The device must be valid and no descriptor sets must be in use.
    pub unsafe fn reset(&self, device: &ash::Device) -> Result<()> {
        device
            .reset_descriptor_pool(self.pool, vk::DescriptorPoolResetFlags::empty())
            .map_err(GpuError::call("vkResetDescriptorPool"))
    }

    /// Destroy the pool.
    ///
    /// # Safety
    /// The device must be valid and the pool must not be in use.
    pub unsafe fn destroy(&mut self, device: &ash::Device) {
        if self.pool != vk::DescriptorPool::null() {
            device.destroy_descriptor_pool(self.pool, None);
            self.pool = vk::DescriptorPool::null();
        }
    }
}

/// A booking of set slots in a pool shared between users.
///
/// The slots go back to the pool when the booking is dropped.
#[derive(Debug)]
pub struct SharedDescriptorPool {
    pool: Arc<Mutex<DescriptorPool>>,
    booked_sets: u32,
}

impl SharedDescriptorPool {
    /// Book `count` slots in `pool`, or `None` if it is full.
    pub fn book(pool: &Arc<Mutex<DescriptorPool>>, count: u32) -> Option<Self> {
        pool.lock().book_capacity(count).then(|| Self {
            pool: Arc::clone(pool),
            booked_sets: count,
        })
    }

    pub const fn booked_sets(&self) -> u32 {
        self.booked_sets
    }

    pub fn pool(&self) -> &Arc<Mutex<DescriptorPool>> {
        &self.pool
    }

    /// Allocate one set per layout from the shared pool.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn allocate(
        &self,
        device: &ash::Device,
        layouts: &[vk::DescriptorSetLayout],
    ) -> Result<Vec<vk::DescriptorSet>> {
        debug_assert!(layouts.len() as u32 <= self.booked_sets);
        self.pool.lock().allocate(device, layouts)
    }

    /// # Safety
    /// The sets must come from this pool and not be in use.
    pub unsafe fn free(&self, device: &ash::Device, sets: &[vk::DescriptorSet]) -> Result<()> {
        self.pool.lock().free(device, sets)
    }
}

impl Drop for SharedDescriptorPool {
    fn drop(&mut self) {
        if self.booked_sets > 0 {
            self.pool.lock().unbook_capacity(self.booked_sets);
        }
    }
}

/// Write a uniform buffer descriptor.
///
/// # Safety
/// Device and buffer must be valid.
pub unsafe fn write_uniform_buffer(
    device: &ash::Device,
    dst_set: vk::DescriptorSet,
    binding: u32,
    buffer: vk::Buffer,
    offset: u64,
    range: u64,
) {
    write_buffer(
        device,
        dst_set,
        binding,
        vk::DescriptorType::UNIFORM_BUFFER,
        buffer,
        offset,
        range,
    );
}

/// Write a dynamic uniform buffer descriptor. The offset is the base that
/// dynamic offsets are added to.
///
/// # Safety
/// Device and buffer must be valid.
pub unsafe fn write_dynamic_uniform_buffer(
    device: &ash::Device,
    dst_set: vk::DescriptorSet,
    binding: u32,
    buffer: vk::Buffer,
    offset: u64,
    range: u64,
) {
    write_buffer(
        device,
        dst_set,
        binding,
        vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
        buffer,
        offset,
        range,
    );
}

/// Write a storage buffer descriptor.
///
/// # Safety
/// Device and buffer must be valid.
pub unsafe fn write_storage_buffer(
    device: &ash::Device,
    dst_set: vk::DescriptorSet,
    binding: u32,
    buffer: vk::Buffer,
    offset: u64,
    range: u64,
) {
    write_buffer(
        device,
        dst_set,
        binding,
        vk::DescriptorType::STORAGE_BUFFER,
        buffer,
        offset,
        range,
    );
}

unsafe fn write_buffer(
    device: &ash::Device,
    dst_set: vk::DescriptorSet,
    binding: u32,
    ty: vk::DescriptorType,
    buffer: vk::Buffer,
    offset: u64,
    range: u64,
) {
    let buffer_info = vk::DescriptorBufferInfo::default()
        .buffer(buffer)
        .offset(offset)
        .range(range);

    let write = vk::WriteDescriptorSet::default()
        .dst_set(dst_set)
        .dst_binding(binding)
        .descriptor_type(ty)
        .buffer_info(std::slice::from_ref(&buffer_info));

    device.update_descriptor_sets(&[write], &[]);
}

/// Write a combined image sampler descriptor.
///
/// # Safety
/// Device, image view and sampler must be valid.
pub unsafe fn write_image_sampler(
    device: &ash::Device,
    dst_set: vk::DescriptorSet,
    binding: u32,
    image_view: vk::ImageView,
    sampler: vk::Sampler,
) {
    let image_info = vk::DescriptorImageInfo::default()
        .image_view(image_view)
        .sampler(sampler)
        .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);

    let write = vk::WriteDescriptorSet::default()
        .dst_set(dst_set)
        .dst_binding(binding)
        .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
        .image_info(std::slice::from_ref(&image_info));

    device.update_descriptor_sets(&[write], &[]);
}
