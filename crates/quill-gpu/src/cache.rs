//! Caches of immutable GPU objects keyed by their creation info.
//!
//! Nothing here is global: the [`Renderer`](crate::renderer::Renderer) owns
//! one [`GpuCaches`] and hands out shared references to the cached objects.

use crate::descriptor::{DescriptorPool, DescriptorPoolSizes, SharedDescriptorPool};
use crate::error::{GpuError, Result};
use crate::pipeline::{Pipeline, PipelineCreateInfo, PipelineLayout, PipelineLayoutCreateInfo};
use crate::sampler::{Sampler, SamplerCreateInfo};
use hashbrown::HashMap;
use parking_lot::Mutex;
use std::hash::Hash;
use std::sync::Arc;

/// Minimum number of sets in a newly created descriptor pool.
pub const MIN_DESCRIPTOR_POOL_SETS: u32 = 64;

/// Map from creation info to a shared object.
#[derive(Debug)]
pub struct ObjectCache<K, V> {
    entries: HashMap<K, Arc<V>>,
}

impl<K, V> Default for ObjectCache<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K: Hash + Eq, V> ObjectCache<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `key`, creating the object with `create` on a miss.
    ///
    /// A failed creation leaves the cache unchanged.
    pub fn get_or_try_insert_with<E>(
        &mut self,
        key: K,
        create: impl FnOnce(&K) -> std::result::Result<V, E>,
    ) -> std::result::Result<Arc<V>, E> {
        if let Some(value) = self.entries.get(&key) {
            return Ok(Arc::clone(value));
        }
        let value = Arc::new(create(&key)?);
        self.entries.insert(key, Arc::clone(&value));
        Ok(value)
    }

    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        self.entries.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every entry.
    pub fn drain(&mut self) -> impl Iterator<Item = (K, Arc<V>)> + '_ {
        self.entries.drain()
    }
}

/// Pipeline layouts, pipelines, samplers and descriptor pools.
#[derive(Debug, Default)]
pub struct GpuCaches {
    pipeline_layouts: ObjectCache<PipelineLayoutCreateInfo, PipelineLayout>,
    pipelines: ObjectCache<PipelineCreateInfo, Pipeline>,
    samplers: ObjectCache<SamplerCreateInfo, Sampler>,
    descriptor_pools: HashMap<DescriptorPoolSizes, Vec<Arc<Mutex<DescriptorPool>>>>,
}

impl GpuCaches {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Safety
    /// The device must be valid and outlive the cache.
    pub unsafe fn get_pipeline_layout(
        &mut self,
        device: &ash::Device,
        info: &PipelineLayoutCreateInfo,
    ) -> Result<Arc<PipelineLayout>> {
        self.pipeline_layouts
            .get_or_try_insert_with(info.clone(), |info| PipelineLayout::new(device, info))
    }

    /// # Safety
    /// The device and every handle in `info` must be valid.
    pub unsafe fn get_pipeline(
        &mut self,
        device: &ash::Device,
        info: &PipelineCreateInfo,
    ) -> Result<Arc<Pipeline>> {
        self.pipelines.get_or_try_insert_with(*info, |info| {
            tracing::debug!(
                vertex_format = ?info.vertex_format(),
                blend = ?info.blend_func(),
                "Creating pipeline"
            );
            Pipeline::new(device, info)
        })
    }

    /// # Safety
    /// The device must be valid and outlive the cache.
    pub unsafe fn get_sampler(
        &mut self,
        device: &ash::Device,
        info: &SamplerCreateInfo,
    ) -> Result<Arc<Sampler>> {
        self.samplers
            .get_or_try_insert_with(*info, |info| Sampler::new(device, info))
    }

    /// Book `reserved_sets` slots in a pool shaped like `sizes`.
    ///
    /// # Safety
    /// The device must be valid and outlive the cache.
    pub unsafe fn get_descriptor_pool(
        &mut self,
        device: &ash::Device,
        reserved_sets: u32,
        sizes: &DescriptorPoolSizes,
    ) -> Result<SharedDescriptorPool> {
        self.book_descriptor_pool(reserved_sets, sizes, |max_sets, sizes| {
            DescriptorPool::new(device, max_sets, sizes)
        })
    }

    /// Book from the first pool with room, or make a new pool with `create`.
    pub(crate) fn book_descriptor_pool(
        &mut self,
        reserved_sets: u32,
        sizes: &DescriptorPoolSizes,
        create: impl FnOnce(u32, DescriptorPoolSizes) -> Result<DescriptorPool>,
    ) -> Result<SharedDescriptorPool> {
        let pools = self.descriptor_pools.entry(sizes.clone()).or_default();
        if let Some(booking) = pools
            .iter()
            .find_map(|pool| SharedDescriptorPool::book(pool, reserved_sets))
        {
            return Ok(booking);
        }

        let max_sets = reserved_sets.max(MIN_DESCRIPTOR_POOL_SETS);
        let pool = Arc::new(Mutex::new(create(max_sets, sizes.clone())?));
        pools.push(Arc::clone(&pool));
        tracing::debug!(max_sets, pools = pools.len(), "Added descriptor pool");

        SharedDescriptorPool::book(&pool, reserved_sets).ok_or_else(|| {
            GpuError::Other(format!("new descriptor pool cannot hold {reserved_sets} sets"))
        })
    }

    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    pub fn pipeline_layout_count(&self) -> usize {
        self.pipeline_layouts.len()
    }

    pub fn sampler_count(&self) -> usize {
        self.samplers.len()
    }

    pub fn descriptor_pool_count(&self) -> usize {
        self.descriptor_pools.values().map(Vec::len).sum()
    }

    /// Destroy cached pipelines, which reference the old render pass.
    ///
    /// # Safety
    /// The pipelines must not be in use by the GPU.
    pub unsafe fn clear_pipelines(&mut self, device: &ash::Device) {
        for (_, pipeline) in self.pipelines.drain() {
            warn_if_shared("pipeline", &pipeline);
            pipeline.destroy(device);
        }
    }

    /// Destroy everything.
    ///
    /// # Safety
    /// None of the objects may be in use by the GPU.
    pub unsafe fn destroy(&mut self, device: &ash::Device) {
        self.clear_pipelines(device);
        for (_, layout) in self.pipeline_layouts.drain() {
            warn_if_shared("pipeline layout", &layout);
            layout.destroy(device);
        }
        for (_, sampler) in self.samplers.drain() {
            warn_if_shared("sampler", &sampler);
            sampler.destroy(device);
        }
        for (_, pools) in self.descriptor_pools.drain() {
            for pool in pools {
                pool.lock().destroy(device);
            }
        }
    }
}

fn warn_if_shared<T>(kind: &'static str, object: &Arc<T>) {
    let users = Arc::strong_count(object) - 1;
    if users > 0 {
        tracing::warn!(kind, users, "Destroying cached object that is still referenced");
    }
}
