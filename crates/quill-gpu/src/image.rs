//! Images and image views.

use crate::device::DeviceApi;
use crate::error::{GpuError, Result};
use crate::memory::{DeviceMemory, MemoryReservation};
use ash::vk;

/// Parameters of a 2D, single-mip, single-layer image with optimal tiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageCreateInfo {
    pub extent: vk::Extent2D,
    pub format: vk::Format,
    pub usage: vk::ImageUsageFlags,
    pub samples: vk::SampleCountFlags,
}

impl ImageCreateInfo {
    pub const fn new(extent: vk::Extent2D, format: vk::Format, usage: vk::ImageUsageFlags) -> Self {
        Self {
            extent,
            format,
            usage,
            samples: vk::SampleCountFlags::TYPE_1,
        }
    }

    /// Set the sample count for multisampled targets.
    #[must_use]
    pub const fn with_samples(mut self, samples: vk::SampleCountFlags) -> Self {
        self.samples = samples;
        self
    }

    /// The native create info.
    pub fn vk(&self) -> vk::ImageCreateInfo<'static> {
        vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(self.format)
            .extent(vk::Extent3D {
                width: self.extent.width,
                height: self.extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(self.samples)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(self.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
    }
}

/// Create an image and reserve memory for it without binding.
pub(crate) fn create_reserved(
    device: &impl DeviceApi,
    info: &ImageCreateInfo,
    reservation: &mut MemoryReservation,
) -> Result<(vk::Image, vk::DeviceSize)> {
    let image =
        unsafe { device.create_image(&info.vk()) }.map_err(GpuError::call("vkCreateImage"))?;
    let requirements = unsafe { device.image_memory_requirements(image) };
    Ok((image, reservation.reserve(&requirements)))
}

/// An image with its own dedicated memory block.
#[derive(Debug)]
pub struct Image {
    image: vk::Image,
    memory: DeviceMemory,
    info: ImageCreateInfo,
}

impl Image {
    pub fn new(
        device: &impl DeviceApi,
        info: &ImageCreateInfo,
        properties: vk::MemoryPropertyFlags,
    ) -> Result<Self> {
        let mut reservation = MemoryReservation::new();
        let (image, offset) = create_reserved(device, info, &mut reservation)?;

        let memory = match reservation.allocate(device, properties) {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.destroy_image(image) };
                return Err(e);
            }
        };
        if let Err(e) = memory.bind_image(device, image, offset) {
            unsafe { device.destroy_image(image) };
            memory.free(device);
            return Err(e);
        }

        Ok(Self {
            image,
            memory,
            info: *info,
        })
    }

    pub const fn image(&self) -> vk::Image {
        self.image
    }

    pub const fn info(&self) -> &ImageCreateInfo {
        &self.info
    }

    pub const fn memory(&self) -> &DeviceMemory {
        &self.memory
    }

    pub fn destroy(self, device: &impl DeviceApi) {
        unsafe { device.destroy_image(self.image) };
        self.memory.free(device);
    }
}

/// A 2D view of a whole image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageView {
    view: vk::ImageView,
}

impl ImageView {
    pub fn new(
        device: &impl DeviceApi,
        image: vk::Image,
        format: vk::Format,
        aspect_mask: vk::ImageAspectFlags,
    ) -> Result<Self> {
        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .components(vk::ComponentMapping::default())
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(aspect_mask)
                    .base_mip_level(0)
                    .level_count(1)
                    .base_array_layer(0)
                    .layer_count(1),
            );

        let view = unsafe { device.create_image_view(&view_info) }
            .map_err(GpuError::call("vkCreateImageView"))?;
        Ok(Self { view })
    }

    pub const fn view(&self) -> vk::ImageView {
        self.view
    }

    pub fn destroy(self, device: &impl DeviceApi) {
        unsafe { device.destroy_image_view(self.view) };
    }
}
