//! Texture samplers.

use crate::error::{GpuError, Result};
use ash::vk;
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SamplerAddressMode {
    #[default]
    Repeat,
    MirroredRepeat,
    ClampToEdge,
    ClampToBorder,
}

impl SamplerAddressMode {
    pub const fn to_vk(self) -> vk::SamplerAddressMode {
        match self {
            Self::Repeat => vk::SamplerAddressMode::REPEAT,
            Self::MirroredRepeat => vk::SamplerAddressMode::MIRRORED_REPEAT,
            Self::ClampToEdge => vk::SamplerAddressMode::CLAMP_TO_EDGE,
            Self::ClampToBorder => vk::SamplerAddressMode::CLAMP_TO_BORDER,
        }
    }
}

/// Linear-filtered sampler description. Anisotropy 0 disables anisotropic
/// filtering.
#[derive(Debug, Clone, Copy, Default)]
pub struct SamplerCreateInfo {
    pub address_mode: SamplerAddressMode,
    pub anisotropy: f32,
}

impl SamplerCreateInfo {
    pub const fn new(address_mode: SamplerAddressMode, anisotropy: f32) -> Self {
        Self {
            address_mode,
            anisotropy,
        }
    }

    pub fn vk(&self) -> vk::SamplerCreateInfo<'static> {
        let address_mode = self.address_mode.to_vk();
        vk::SamplerCreateInfo::default()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .address_mode_u(address_mode)
            .address_mode_v(address_mode)
            .address_mode_w(address_mode)
            .anisotropy_enable(self.anisotropy != 0.0)
            .max_anisotropy(self.anisotropy)
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS)
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .unnormalized_coordinates(false)
    }
}

// Anisotropy is compared bit for bit so Eq and Hash agree.
impl PartialEq for SamplerCreateInfo {
    fn eq(&self, other: &Self) -> bool {
        self.address_mode == other.address_mode
            && self.anisotropy.to_bits() == other.anisotropy.to_bits()
    }
}

impl Eq for SamplerCreateInfo {}

impl Hash for SamplerCreateInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address_mode.hash(state);
        self.anisotropy.to_bits().hash(state);
    }
}

#[derive(Debug)]
pub struct Sampler {
    sampler: vk::Sampler,
}

impl Sampler {
    /// # Safety
    /// The device must be valid. Anisotropy requires the device feature.
    pub unsafe fn new(device: &ash::Device, info: &SamplerCreateInfo) -> Result<Self> {
        let sampler = device
            .create_sampler(&info.vk(), None)
            .map_err(GpuError::call("vkCreateSampler"))?;
        Ok(Self { sampler })
    }

    pub const fn sampler(&self) -> vk::Sampler {
        self.sampler
    }

    /// # Safety
    /// The device must be valid and the sampler must not be in use.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        device.destroy_sampler(self.sampler, None);
    }
}
