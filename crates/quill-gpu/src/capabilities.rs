//! GPU capability detection.

use ash::vk;

/// GPU vendor identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuVendor {
    Nvidia,
    Amd,
    Intel,
    Apple,
    Arm,
    Qualcomm,
    Other(u32),
}

impl GpuVendor {
    /// Identify vendor from PCI vendor ID.
    pub const fn from_vendor_id(id: u32) -> Self {
        match id {
            0x10DE => Self::Nvidia,
            0x1002 => Self::Amd,
            0x8086 => Self::Intel,
            0x106B => Self::Apple,
            0x13B5 => Self::Arm,
            0x5143 => Self::Qualcomm,
            other => Self::Other(other),
        }
    }
}

/// Detected GPU capabilities.
#[derive(Debug, Clone)]
pub struct GpuCapabilities {
    /// GPU vendor
    pub vendor: GpuVendor,
    /// Device name
    pub device_name: String,
    pub device_type: vk::PhysicalDeviceType,
    /// Vulkan API version
    pub api_version: u32,
    /// Driver version
    pub driver_version: u32,

    /// Device-local memory in MB
    pub device_local_memory_mb: u64,
    /// Maximum number of live memory allocations
    pub max_memory_allocation_count: u32,
    /// Granularity of flush/invalidate on non-coherent memory
    pub non_coherent_atom_size: vk::DeviceSize,

    /// Anisotropic filtering support
    pub sampler_anisotropy: bool,
    pub max_sampler_anisotropy: f32,

    /// Sample counts usable for color attachments
    pub framebuffer_color_sample_counts: vk::SampleCountFlags,
    /// Sample counts usable for depth attachments
    pub framebuffer_depth_sample_counts: vk::SampleCountFlags,
}

impl GpuCapabilities {
    /// Query capabilities from a physical device.
    ///
    /// # Safety
    /// The instance and physical device must be valid.
    pub unsafe fn query(instance: &ash::Instance, physical_device: vk::PhysicalDevice) -> Self {
        let properties = instance.get_physical_device_properties(physical_device);
        let features = instance.get_physical_device_features(physical_device);
        let memory_properties = instance.get_physical_device_memory_properties(physical_device);

        let device_name = properties
            .device_name_as_c_str()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let device_local_memory_mb: u64 = memory_properties
            .memory_heaps
            .iter()
            .take(memory_properties.memory_heap_count as usize)
            .filter(|heap| heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
            .map(|heap| heap.size / (1024 * 1024))
            .sum();

        let limits = &properties.limits;
        Self {
            vendor: GpuVendor::from_vendor_id(properties.vendor_id),
            device_name,
            device_type: properties.device_type,
            api_version: properties.api_version,
            driver_version: properties.driver_version,

            device_local_memory_mb,
            max_memory_allocation_count: limits.max_memory_allocation_count,
            non_coherent_atom_size: limits.non_coherent_atom_size,

            sampler_anisotropy: features.sampler_anisotropy == vk::TRUE,
            max_sampler_anisotropy: limits.max_sampler_anisotropy,

            framebuffer_color_sample_counts: limits.framebuffer_color_sample_counts,
            framebuffer_depth_sample_counts: limits.framebuffer_depth_sample_counts,
        }
    }

    /// Largest MSAA sample count usable for both color and depth.
    pub fn max_msaa_samples(&self) -> u8 {
        max_sample_count(
            self.framebuffer_color_sample_counts & self.framebuffer_depth_sample_counts,
        )
    }

    /// Anisotropy to request for samplers, 0 if unsupported.
    pub fn anisotropy(&self) -> f32 {
        if self.sampler_anisotropy {
            self.max_sampler_anisotropy
        } else {
            0.0
        }
    }

    /// Get a human-readable summary of capabilities.
    pub fn summary(&self) -> String {
        format!(
            "{} ({:?}) - Vulkan {}.{}.{} - {} MB VRAM - up to {}x MSAA",
            self.device_name,
            self.vendor,
            vk::api_version_major(self.api_version),
            vk::api_version_minor(self.api_version),
            vk::api_version_patch(self.api_version),
            self.device_local_memory_mb,
            self.max_msaa_samples(),
        )
    }
}

/// Highest sample count in `counts`, 1 if none is set.
pub fn max_sample_count(counts: vk::SampleCountFlags) -> u8 {
    [
        (vk::SampleCountFlags::TYPE_64, 64),
        (vk::SampleCountFlags::TYPE_32, 32),
        (vk::SampleCountFlags::TYPE_16, 16),
        (vk::SampleCountFlags::TYPE_8, 8),
        (vk::SampleCountFlags::TYPE_4, 4),
        (vk::SampleCountFlags::TYPE_2, 2),
    ]
    .into_iter()
    .find(|(flag, _)| counts.contains(*flag))
    .map_or(1, |(_, count)| count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(color: vk::SampleCountFlags, depth: vk::SampleCountFlags) -> GpuCapabilities {
        GpuCapabilities {
            vendor: GpuVendor::Other(0),
            device_name: "test".into(),
            device_type: vk::PhysicalDeviceType::DISCRETE_GPU,
            api_version: vk::API_VERSION_1_1,
            driver_version: 0,
            device_local_memory_mb: 4096,
            max_memory_allocation_count: 4096,
            non_coherent_atom_size: 64,
            sampler_anisotropy: false,
            max_sampler_anisotropy: 16.0,
            framebuffer_color_sample_counts: color,
            framebuffer_depth_sample_counts: depth,
        }
    }

    #[test]
    fn vendor_identification() {
        assert_eq!(GpuVendor::from_vendor_id(0x10DE), GpuVendor::Nvidia);
        assert_eq!(GpuVendor::from_vendor_id(0x1002), GpuVendor::Amd);
        assert_eq!(GpuVendor::from_vendor_id(0x8086), GpuVendor::Intel);
        assert_eq!(GpuVendor::from_vendor_id(0x1234), GpuVendor::Other(0x1234));
    }

    #[test]
    fn msaa_limited_by_color_and_depth() {
        let all = vk::SampleCountFlags::TYPE_1
            | vk::SampleCountFlags::TYPE_2
            | vk::SampleCountFlags::TYPE_4
            | vk::SampleCountFlags::TYPE_8;
        let depth = vk::SampleCountFlags::TYPE_1 | vk::SampleCountFlags::TYPE_4;
        assert_eq!(caps(all, depth).max_msaa_samples(), 4);
        assert_eq!(caps(all, all).max_msaa_samples(), 8);
        assert_eq!(
            caps(vk::SampleCountFlags::TYPE_1, all).max_msaa_samples(),
            1
        );
    }

    #[test]
    fn anisotropy_requires_feature() {
        let mut caps = caps(vk::SampleCountFlags::TYPE_1, vk::SampleCountFlags::TYPE_1);
        assert_eq!(caps.anisotropy(), 0.0);
        caps.sampler_anisotropy = true;
        assert_eq!(caps.anisotropy(), 16.0);
    }
}
