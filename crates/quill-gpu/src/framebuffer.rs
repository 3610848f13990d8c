//! Concrete images, views and framebuffers backing an [`Attachments`] shape.

use crate::attachments::Attachments;
use crate::device::DeviceApi;
use crate::error::{GpuError, Result};
use crate::image::{create_reserved, ImageCreateInfo, ImageView};
use crate::memory::{DeviceMemory, MemoryReservation};
use ash::vk;

/// Upper bound on images per attachment (one per swapchain image).
pub const MAX_IMAGE_COUNT: u32 = 8;

/// Indices into the view array, in render-pass attachment order, for one
/// swap index.
///
/// Views are laid out as `color_count * image_count` color views, then one
/// depth/stencil view, then `color_count` MSAA views. With MSAA each MSAA view
/// takes its color attachment's slot and the plain view moves to the resolve
/// slot at the end.
pub fn attachment_view_order(
    color_count: usize,
    depth_stencil: bool,
    msaa: bool,
    image_count: usize,
    index: usize,
) -> Vec<usize> {
    let mut order = Vec::with_capacity(2 * color_count + 1);
    let mut base = 0;
    for _ in 0..color_count {
        order.push(base + index);
        base += image_count;
    }
    if depth_stencil {
        order.push(base);
        base += 1;
    }
    if msaa {
        for r in 0..color_count {
            order.push(order[r]);
            order[r] = base + r;
        }
    }
    order
}

/// Images and framebuffers for every swap index.
///
/// Image order: `C * N` color images (attachment-major), one depth/stencil
/// image, `C` MSAA color images. The first `borrowed_count` images belong to
/// the swapchain and are never destroyed here.
#[derive(Debug, Default)]
pub struct Framebuffer {
    framebuffers: Vec<vk::Framebuffer>,
    images: Vec<vk::Image>,
    image_views: Vec<ImageView>,
    memory: Option<DeviceMemory>,
    image_count: u32,
    borrowed_count: usize,
}

impl Framebuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create images, views and one framebuffer per swap index.
    ///
    /// When `swapchain_images` is given, the first color attachment uses those
    /// images instead of allocating its own. Anything created earlier is
    /// destroyed first. On error the partially created objects stay owned by
    /// `self` and are released by the next `create` or `destroy`.
    pub fn create(
        &mut self,
        device: &impl DeviceApi,
        attachments: &Attachments,
        extent: vk::Extent2D,
        image_count: u32,
        swapchain_images: Option<&[vk::Image]>,
    ) -> Result<()> {
        self.destroy(device);

        if image_count > MAX_IMAGE_COUNT {
            return Err(GpuError::TooManySwapchainImages(image_count));
        }
        if let Some(images) = swapchain_images {
            if images.len() < image_count as usize {
                return Err(GpuError::Other(format!(
                    "{} swapchain images provided for {image_count} framebuffers",
                    images.len()
                )));
            }
        }

        self.image_count = image_count;
        let count = image_count as usize;
        let samples = attachments.msaa_samples_flag();

        let mut reservation = MemoryReservation::new();
        let mut deferred_bind = Vec::new();
        let mut deferred_views = Vec::new();
        // Lazily allocated memory is only valid when every owned image is transient.
        let mut all_transient = true;
        let mut borrow = swapchain_images;

        for color in attachments.color_attachments() {
            if let Some(images) = borrow.take() {
                self.borrowed_count = count;
                for &image in &images[..count] {
                    self.images.push(image);
                    deferred_views.push((image, color.format, vk::ImageAspectFlags::COLOR));
                }
                continue;
            }
            all_transient = false;
            let info = ImageCreateInfo::new(
                extent,
                color.format,
                vk::ImageUsageFlags::COLOR_ATTACHMENT | color.usage,
            );
            for _ in 0..count {
                let (image, offset) = create_reserved(device, &info, &mut reservation)?;
                self.images.push(image);
                deferred_bind.push((image, offset));
                deferred_views.push((image, color.format, vk::ImageAspectFlags::COLOR));
            }
        }

        if attachments.has_depth_stencil() {
            let format = attachments.depth_stencil_format();
            let info = ImageCreateInfo::new(
                extent,
                format,
                vk::ImageUsageFlags::TRANSIENT_ATTACHMENT
                    | vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            )
            .with_samples(samples);
            let (image, offset) = create_reserved(device, &info, &mut reservation)?;
            self.images.push(image);
            deferred_bind.push((image, offset));
            deferred_views.push((image, format, attachments.depth_stencil_aspect()));
        }

        if attachments.has_msaa() {
            for color in attachments.color_attachments() {
                let info = ImageCreateInfo::new(
                    extent,
                    color.format,
                    vk::ImageUsageFlags::TRANSIENT_ATTACHMENT
                        | vk::ImageUsageFlags::COLOR_ATTACHMENT,
                )
                .with_samples(samples);
                let (image, offset) = create_reserved(device, &info, &mut reservation)?;
                self.images.push(image);
                deferred_bind.push((image, offset));
                deferred_views.push((image, color.format, vk::ImageAspectFlags::COLOR));
            }
        }

        if !reservation.is_empty() {
            let mut properties = vk::MemoryPropertyFlags::DEVICE_LOCAL;
            if all_transient {
                properties |= vk::MemoryPropertyFlags::LAZILY_ALLOCATED;
            }
            let memory = self.memory.insert(reservation.allocate(device, properties)?);
            for (image, offset) in deferred_bind {
                memory.bind_image(device, image, offset)?;
            }
        }

        self.image_views.reserve(deferred_views.len());
        for (image, format, aspect) in deferred_views {
            self.image_views
                .push(ImageView::new(device, image, format, aspect)?);
        }

        for index in 0..count {
            let views: Vec<vk::ImageView> = attachment_view_order(
                attachments.color_attachment_count(),
                attachments.has_depth_stencil(),
                attachments.has_msaa(),
                count,
                index,
            )
            .into_iter()
            .map(|i| self.image_views[i].view())
            .collect();

            let framebuffer_info = vk::FramebufferCreateInfo::default()
                .render_pass(attachments.render_pass())
                .attachments(&views)
                .width(extent.width)
                .height(extent.height)
                .layers(1);

            let framebuffer = unsafe { device.create_framebuffer(&framebuffer_info) }
                .map_err(GpuError::call("vkCreateFramebuffer"))?;
            self.framebuffers.push(framebuffer);
        }

        tracing::debug!(
            image_count,
            images = self.images.len(),
            borrowed = self.borrowed_count,
            width = extent.width,
            height = extent.height,
            "Created framebuffers"
        );
        Ok(())
    }

    /// Release framebuffers, views, owned images and memory, in that order.
    pub fn destroy(&mut self, device: &impl DeviceApi) {
        for framebuffer in self.framebuffers.drain(..) {
            unsafe { device.destroy_framebuffer(framebuffer) };
        }
        self.image_count = 0;
        for view in self.image_views.drain(..) {
            view.destroy(device);
        }
        for image in self.images.drain(..).skip(self.borrowed_count) {
            unsafe { device.destroy_image(image) };
        }
        self.borrowed_count = 0;
        if let Some(memory) = self.memory.take() {
            memory.free(device);
        }
    }

    pub fn framebuffer(&self, index: u32) -> vk::Framebuffer {
        self.framebuffers[index as usize]
    }

    /// Image of color attachment `attachment` for swap index `index`.
    pub fn color_image(&self, attachment: u32, index: u32) -> vk::Image {
        self.images[(attachment * self.image_count + index) as usize]
    }

    pub fn color_image_view(&self, attachment: u32, index: u32) -> vk::ImageView {
        self.image_views[(attachment * self.image_count + index) as usize].view()
    }

    pub const fn image_count(&self) -> u32 {
        self.image_count
    }

    pub fn is_created(&self) -> bool {
        !self.framebuffers.is_empty()
    }
}
