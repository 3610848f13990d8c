//! Swapchain management.
//!
//! The [`Swapchain`] owns the presentable images plus the [`Attachments`] and
//! [`Framebuffer`] rendered into them. Recreation (resize, present mode or
//! sample count change) always tears down framebuffers before the swapchain
//! handle is replaced and rebuilds them afterwards.

use crate::attachments::Attachments;
use crate::device::DeviceApi;
use crate::error::{GpuError, Result};
use crate::framebuffer::{Framebuffer, MAX_IMAGE_COUNT};
use ash::vk;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Surface format every device must offer.
pub const PREFERRED_SURFACE_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_UNORM,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// Presentation timing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PresentMode {
    /// No vsync, may tear.
    Immediate,
    /// Vsync, a newer frame replaces the queued one.
    Mailbox,
    /// Vsync, frames are queued.
    #[default]
    Fifo,
    /// Vsync, a late frame is shown immediately.
    FifoRelaxed,
}

impl PresentMode {
    pub const ALL: [Self; 4] = [Self::Immediate, Self::Mailbox, Self::Fifo, Self::FifoRelaxed];

    pub const fn to_vk(self) -> vk::PresentModeKHR {
        match self {
            Self::Immediate => vk::PresentModeKHR::IMMEDIATE,
            Self::Mailbox => vk::PresentModeKHR::MAILBOX,
            Self::Fifo => vk::PresentModeKHR::FIFO,
            Self::FifoRelaxed => vk::PresentModeKHR::FIFO_RELAXED,
        }
    }

    pub fn from_vk(mode: vk::PresentModeKHR) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.to_vk() == mode)
    }

    /// The next mode in [`Self::ALL`], wrapping around.
    #[must_use]
    pub fn next(self) -> Self {
        let i = Self::ALL.iter().position(|m| *m == self).unwrap_or(0);
        Self::ALL[(i + 1) % Self::ALL.len()]
    }
}

impl fmt::Display for PresentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Immediate => "Immediate",
            Self::Mailbox => "Mailbox",
            Self::Fifo => "Fifo",
            Self::FifoRelaxed => "FifoRelaxed",
        };
        f.write_str(name)
    }
}

/// Lifecycle of a [`Swapchain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapchainState {
    Uninitialized,
    Created,
    Destroyed,
}

/// Outcome of acquiring an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireStatus {
    Ready(u32),
    /// Usable, but the swapchain should be recreated after presenting.
    Suboptimal(u32),
    /// No image was acquired; recreate and try again next frame.
    OutOfDate,
}

/// Outcome of presenting an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentStatus {
    Presented,
    Suboptimal,
    OutOfDate,
}

impl PresentStatus {
    pub const fn needs_reset(self) -> bool {
        !matches!(self, Self::Presented)
    }
}

/// The preferred surface format, if offered.
pub fn select_surface_format(available: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    available.iter().copied().find(|f| {
        f.format == PREFERRED_SURFACE_FORMAT.format
            && f.color_space == PREFERRED_SURFACE_FORMAT.color_space
    })
}

/// The requested present mode if available, else the first supported one.
///
/// Returns the chosen mode and whether it is a fallback. `None` if the device
/// offers no present mode we know.
pub fn select_present_mode(
    available: &[vk::PresentModeKHR],
    requested: PresentMode,
) -> Option<(PresentMode, bool)> {
    if available.contains(&requested.to_vk()) {
        return Some((requested, false));
    }
    available
        .iter()
        .find_map(|&mode| PresentMode::from_vk(mode))
        .map(|mode| (mode, true))
}

/// Pick the swapchain extent and image count for the surface capabilities.
///
/// The surface's current extent wins; if it is undefined (`u32::MAX`) the
/// requested size is used, and failing that the previous extent. The result
/// is clamped to the allowed range. At least three images are requested.
pub fn negotiate_surface(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    previous: vk::Extent2D,
    new_size: vk::Extent2D,
) -> (vk::Extent2D, u32) {
    let mut extent = previous;
    if capabilities.current_extent.width != u32::MAX {
        extent = capabilities.current_extent;
    } else if new_size.width != u32::MAX {
        extent = new_size;
    }

    let extent = vk::Extent2D {
        width: extent.width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: extent.height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    };

    let mut image_count = capabilities.min_image_count.max(3);
    if capabilities.max_image_count > 0 {
        image_count = image_count.min(capabilities.max_image_count);
    }

    (extent, image_count)
}

/// Swapchain plus the render target built on it.
pub struct Swapchain {
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    surface_format: vk::SurfaceFormatKHR,
    present_mode: PresentMode,
    extent: vk::Extent2D,
    image_count: u32,
    pre_transform: vk::SurfaceTransformFlagsKHR,
    attachments: Attachments,
    render_pass_dirty: bool,
    framebuffer: Framebuffer,
    state: SwapchainState,
}

impl Swapchain {
    pub fn new(present_mode: PresentMode) -> Self {
        Self {
            swapchain: vk::SwapchainKHR::null(),
            images: Vec::new(),
            surface_format: PREFERRED_SURFACE_FORMAT,
            present_mode,
            extent: vk::Extent2D::default(),
            image_count: 0,
            pre_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
            attachments: Attachments::new(),
            render_pass_dirty: true,
            framebuffer: Framebuffer::new(),
            state: SwapchainState::Uninitialized,
        }
    }

    /// Check the surface format and present mode support.
    ///
    /// Returns `Ok(false)` if the surface cannot be used with this device.
    /// An unsupported present mode is replaced by the first supported one.
    pub fn query(&mut self, device: &impl DeviceApi) -> Result<bool> {
        let formats = unsafe { device.surface_formats() }
            .map_err(GpuError::call("vkGetPhysicalDeviceSurfaceFormatsKHR"))?;
        let modes = unsafe { device.surface_present_modes() }
            .map_err(GpuError::call("vkGetPhysicalDeviceSurfacePresentModesKHR"))?;

        if formats.is_empty() || modes.is_empty() {
            return Ok(false);
        }

        let Some(surface_format) = select_surface_format(&formats) else {
            tracing::error!(
                format = ?PREFERRED_SURFACE_FORMAT.format,
                color_space = ?PREFERRED_SURFACE_FORMAT.color_space,
                "Surface format not supported"
            );
            return Ok(false);
        };
        self.surface_format = surface_format;

        let Some((mode, fell_back)) = select_present_mode(&modes, self.present_mode) else {
            return Ok(false);
        };
        if fell_back {
            tracing::warn!(
                requested = %self.present_mode,
                selected = %mode,
                "Requested present mode not supported, falling back"
            );
        }
        self.present_mode = mode;

        if self.attachments.color_attachment_count() == 0 {
            self.attachments
                .add_color_attachment(surface_format.format, vk::ImageLayout::PRESENT_SRC_KHR);
        } else {
            self.attachments.set_color_attachment(
                0,
                surface_format.format,
                vk::ImageLayout::PRESENT_SRC_KHR,
            );
        }

        Ok(true)
    }

    /// Negotiate extent and image count with the surface.
    pub fn query_surface_capabilities(
        &mut self,
        device: &impl DeviceApi,
        new_size: vk::Extent2D,
    ) -> Result<()> {
        let capabilities = unsafe { device.surface_capabilities() }
            .map_err(GpuError::call("vkGetPhysicalDeviceSurfaceCapabilitiesKHR"))?;
        let (extent, image_count) = negotiate_surface(&capabilities, self.extent, new_size);
        self.extent = extent;
        self.image_count = image_count;
        self.pre_transform = capabilities.current_transform;
        Ok(())
    }

    /// Create the swapchain, retiring the previous one if any.
    pub fn create(&mut self, device: &impl DeviceApi) -> Result<()> {
        let old_swapchain = self.swapchain;
        let pre_transform = if self.pre_transform.is_empty() {
            vk::SurfaceTransformFlagsKHR::IDENTITY
        } else {
            self.pre_transform
        };

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(device.surface())
            .min_image_count(self.image_count)
            .image_format(self.surface_format.format)
            .image_color_space(self.surface_format.color_space)
            .image_extent(self.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_SRC)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(self.present_mode.to_vk())
            .clipped(true)
            .old_swapchain(old_swapchain);

        let swapchain = unsafe { device.create_swapchain(&create_info) }
            .map_err(GpuError::call("vkCreateSwapchainKHR"))?;
        // Retired by the create call whether or not the new one is usable
        if old_swapchain != vk::SwapchainKHR::null() {
            unsafe { device.destroy_swapchain(old_swapchain) };
        }
        self.swapchain = vk::SwapchainKHR::null();
        self.images.clear();
        if self.state == SwapchainState::Created {
            self.state = SwapchainState::Destroyed;
        }

        let images = unsafe { device.swapchain_images(swapchain) }
            .map_err(GpuError::call("vkGetSwapchainImagesKHR"))
            .and_then(|images| match images.len() as u32 {
                count if count > MAX_IMAGE_COUNT => Err(GpuError::TooManySwapchainImages(count)),
                _ => Ok(images),
            });
        let images = match images {
            Ok(images) => images,
            Err(e) => {
                unsafe { device.destroy_swapchain(swapchain) };
                return Err(e);
            }
        };
        let count = images.len() as u32;
        self.swapchain = swapchain;
        self.images = images;
        self.image_count = count;
        self.state = SwapchainState::Created;

        tracing::info!(
            width = self.extent.width,
            height = self.extent.height,
            image_count = count,
            present_mode = %self.present_mode,
            "Created swapchain"
        );
        Ok(())
    }

    /// Build framebuffers over the swapchain images, rebuilding the render
    /// pass first if its shape changed.
    pub fn create_framebuffers(&mut self, device: &impl DeviceApi) -> Result<()> {
        if self.render_pass_dirty || self.attachments.render_pass() == vk::RenderPass::null() {
            self.attachments.create_renderpass(device)?;
            self.render_pass_dirty = false;
        }
        self.framebuffer.create(
            device,
            &self.attachments,
            self.extent,
            self.image_count,
            Some(&self.images),
        )
    }

    pub fn destroy_framebuffers(&mut self, device: &impl DeviceApi) {
        self.framebuffer.destroy(device);
    }

    /// Framebuffers, then swapchain, then framebuffers again.
    fn recreate(&mut self, device: &impl DeviceApi) -> Result<()> {
        self.destroy_framebuffers(device);
        self.create(device)?;
        self.create_framebuffers(device)
    }

    /// Resize protocol: wait idle, renegotiate, recreate.
    pub fn reset_framebuffer(&mut self, device: &impl DeviceApi, new_size: vk::Extent2D) -> Result<()> {
        unsafe { device.device_wait_idle() }.map_err(GpuError::call("vkDeviceWaitIdle"))?;

        self.query_surface_capabilities(device, new_size)?;
        if !self.query(device)? {
            return Err(GpuError::DeviceUnusable);
        }
        self.recreate(device)?;

        tracing::debug!(
            width = self.extent.width,
            height = self.extent.height,
            "Framebuffer resized"
        );
        Ok(())
    }

    /// Change the present mode, recreating the swapchain if it exists.
    pub fn set_present_mode(&mut self, device: &impl DeviceApi, mode: PresentMode) -> Result<()> {
        self.present_mode = mode;

        if self.state != SwapchainState::Created {
            return Ok(());
        }

        unsafe { device.device_wait_idle() }.map_err(GpuError::call("vkDeviceWaitIdle"))?;
        if !self.query(device)? {
            return Err(GpuError::DeviceUnusable);
        }
        self.recreate(device)
    }

    /// Takes effect on the next framebuffer reset.
    pub fn set_sample_count(&mut self, count: u8) {
        if self.attachments.msaa_samples() != count.max(1) {
            self.attachments.set_msaa_samples(count);
            self.render_pass_dirty = true;
        }
    }

    /// Takes effect on the next framebuffer reset.
    pub fn set_depth_bits(&mut self, bits: u8) {
        if self.attachments.depth_bits() != bits {
            self.attachments.set_depth_bits(bits);
            self.render_pass_dirty = true;
        }
    }

    /// Takes effect on the next framebuffer reset.
    pub fn set_stencil_bits(&mut self, bits: u8) {
        if self.attachments.stencil_bits() != bits {
            self.attachments.set_stencil_bits(bits);
            self.render_pass_dirty = true;
        }
    }

    /// Acquire the next image, signalling `semaphore` when it is ready.
    pub fn acquire_next_image(
        &self,
        device: &impl DeviceApi,
        semaphore: vk::Semaphore,
    ) -> Result<AcquireStatus> {
        match unsafe { device.acquire_next_image(self.swapchain, u64::MAX, semaphore) } {
            Ok((index, false)) => Ok(AcquireStatus::Ready(index)),
            Ok((index, true)) => Ok(AcquireStatus::Suboptimal(index)),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireStatus::OutOfDate),
            Err(e) => Err(GpuError::call("vkAcquireNextImageKHR")(e)),
        }
    }

    /// Queue `index` for presentation after `wait_semaphore`.
    pub fn present(
        &self,
        device: &impl DeviceApi,
        wait_semaphore: vk::Semaphore,
        index: u32,
    ) -> Result<PresentStatus> {
        let swapchains = [self.swapchain];
        let image_indices = [index];
        let wait_semaphores = [wait_semaphore];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        match unsafe { device.queue_present(&present_info) } {
            Ok(false) => Ok(PresentStatus::Presented),
            Ok(true) => Ok(PresentStatus::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentStatus::OutOfDate),
            Err(e) => Err(GpuError::call("vkQueuePresentKHR")(e)),
        }
    }

    /// Release framebuffers, render pass and swapchain.
    pub fn destroy(&mut self, device: &impl DeviceApi) {
        self.destroy_framebuffers(device);
        self.attachments.destroy_renderpass(device);
        self.render_pass_dirty = true;
        if self.swapchain != vk::SwapchainKHR::null() {
            unsafe { device.destroy_swapchain(self.swapchain) };
            self.swapchain = vk::SwapchainKHR::null();
        }
        self.images.clear();
        if self.state == SwapchainState::Created {
            self.state = SwapchainState::Destroyed;
        }
    }

    pub const fn swapchain(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    pub const fn surface_format(&self) -> vk::SurfaceFormatKHR {
        self.surface_format
    }

    pub const fn present_mode(&self) -> PresentMode {
        self.present_mode
    }

    pub const fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub const fn image_count(&self) -> u32 {
        self.image_count
    }

    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    pub const fn state(&self) -> SwapchainState {
        self.state
    }

    pub const fn render_pass(&self) -> vk::RenderPass {
        self.attachments.render_pass()
    }

    pub fn framebuffer(&self, index: u32) -> vk::Framebuffer {
        self.framebuffer.framebuffer(index)
    }

    pub const fn framebuffers(&self) -> &Framebuffer {
        &self.framebuffer
    }

    pub const fn attachments(&self) -> &Attachments {
        &self.attachments
    }

    /// Shape changes made here take effect on the next framebuffer reset.
    pub fn attachments_mut(&mut self) -> &mut Attachments {
        self.render_pass_dirty = true;
        &mut self.attachments
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockDevice;

    const UNDEFINED_EXTENT: vk::Extent2D = vk::Extent2D {
        width: u32::MAX,
        height: u32::MAX,
    };

    fn extent(width: u32, height: u32) -> vk::Extent2D {
        vk::Extent2D { width, height }
    }

    fn created(device: &MockDevice) -> Swapchain {
        let mut swapchain = Swapchain::new(PresentMode::Fifo);
        assert!(swapchain.query(device).unwrap());
        swapchain
            .query_surface_capabilities(device, extent(800, 600))
            .unwrap();
        swapchain.create(device).unwrap();
        swapchain.create_framebuffers(device).unwrap();
        swapchain
    }

    #[test]
    fn undefined_current_extent_uses_requested_size() {
        let caps = vk::SurfaceCapabilitiesKHR {
            min_image_count: 1,
            max_image_count: 0,
            current_extent: UNDEFINED_EXTENT,
            min_image_extent: extent(1, 1),
            max_image_extent: extent(4096, 4096),
            ..Default::default()
        };
        let (negotiated, count) = negotiate_surface(&caps, extent(800, 600), extent(1024, 768));
        assert_eq!(negotiated, extent(1024, 768));
        assert_eq!(count, 3);
    }

    #[test]
    fn current_extent_wins_and_everything_is_clamped() {
        let caps = vk::SurfaceCapabilitiesKHR {
            min_image_count: 4,
            max_image_count: 5,
            current_extent: extent(640, 480),
            min_image_extent: extent(1, 1),
            max_image_extent: extent(4096, 4096),
            ..Default::default()
        };
        assert_eq!(
            negotiate_surface(&caps, extent(1, 1), extent(1024, 768)),
            (extent(640, 480), 4)
        );

        let caps = vk::SurfaceCapabilitiesKHR {
            min_image_count: 1,
            max_image_count: 2,
            current_extent: UNDEFINED_EXTENT,
            min_image_extent: extent(100, 100),
            max_image_extent: extent(500, 500),
            ..Default::default()
        };
        assert_eq!(
            negotiate_surface(&caps, extent(300, 300), extent(1024, 50)),
            (extent(500, 100), 2)
        );
        // undefined request keeps the previous extent
        assert_eq!(
            negotiate_surface(&caps, extent(300, 200), UNDEFINED_EXTENT).0,
            extent(300, 200)
        );
    }

    #[test]
    fn unsupported_present_mode_falls_back_to_first() {
        let modes = [vk::PresentModeKHR::FIFO_RELAXED, vk::PresentModeKHR::FIFO];
        assert_eq!(
            select_present_mode(&modes, PresentMode::Mailbox),
            Some((PresentMode::FifoRelaxed, true))
        );
        assert_eq!(
            select_present_mode(&modes, PresentMode::Fifo),
            Some((PresentMode::Fifo, false))
        );
        assert_eq!(select_present_mode(&[], PresentMode::Fifo), None);
    }

    #[test]
    fn surface_format_must_be_offered() {
        let srgb = vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        assert_eq!(select_surface_format(&[srgb]), None);
        assert_eq!(
            select_surface_format(&[srgb, PREFERRED_SURFACE_FORMAT]),
            Some(PREFERRED_SURFACE_FORMAT)
        );
    }

    #[test]
    fn query_rejects_missing_format_and_adopts_fallback_mode() {
        let device = MockDevice::new();
        let mut swapchain = Swapchain::new(PresentMode::Immediate);
        assert!(swapchain.query(&device).unwrap());
        assert_eq!(swapchain.present_mode(), PresentMode::Fifo);
        assert_eq!(swapchain.attachments().color_attachment_count(), 1);

        device.formats.borrow_mut()[0].format = vk::Format::R8G8B8A8_SRGB;
        assert!(!swapchain.query(&device).unwrap());
    }

    #[test]
    fn recreate_orders_framebuffers_around_swapchain() {
        let device = MockDevice::new();
        let mut swapchain = created(&device);
        let old = swapchain.swapchain();
        device.clear_calls();

        swapchain
            .reset_framebuffer(&device, extent(1024, 768))
            .unwrap();

        let wait = device.position_after("vkDeviceWaitIdle", 0).unwrap();
        let destroy_fb = device.position_after("vkDestroyFramebuffer", wait).unwrap();
        let create_sc = device.position_after("vkCreateSwapchainKHR", 0).unwrap();
        let destroy_sc = device.position_after("vkDestroySwapchainKHR", 0).unwrap();
        let create_fb = device.position_after("vkCreateFramebuffer", 0).unwrap();
        let last_destroy_fb = device
            .calls()
            .iter()
            .rposition(|c| *c == "vkDestroyFramebuffer")
            .unwrap();

        assert!(destroy_fb < create_sc);
        assert!(last_destroy_fb < create_sc);
        assert!(create_sc < destroy_sc);
        assert!(destroy_sc < create_fb);
        assert_ne!(swapchain.swapchain(), old);
        assert_eq!(device.count("vkDestroyFramebuffer"), 3);
        assert_eq!(device.count("vkCreateFramebuffer"), 3);
    }

    #[test]
    fn set_present_mode_before_creation_is_deferred() {
        let device = MockDevice::new();
        let mut swapchain = Swapchain::new(PresentMode::Fifo);
        swapchain
            .set_present_mode(&device, PresentMode::Mailbox)
            .unwrap();
        assert!(device.calls().is_empty());
        assert_eq!(swapchain.present_mode(), PresentMode::Mailbox);
        assert_eq!(swapchain.state(), SwapchainState::Uninitialized);
    }

    #[test]
    fn set_present_mode_recreates_live_swapchain() {
        let device = MockDevice::new();
        let mut swapchain = created(&device);
        device.clear_calls();

        swapchain
            .set_present_mode(&device, PresentMode::Mailbox)
            .unwrap();
        assert_eq!(device.count("vkDeviceWaitIdle"), 1);
        assert_eq!(device.count("vkCreateSwapchainKHR"), 1);
        assert_eq!(swapchain.present_mode(), PresentMode::Mailbox);
    }

    #[test]
    fn lost_surface_format_after_resize_is_fatal() {
        let device = MockDevice::new();
        let mut swapchain = created(&device);
        device.formats.borrow_mut().clear();

        let err = swapchain
            .reset_framebuffer(&device, extent(100, 100))
            .unwrap_err();
        assert!(matches!(err, GpuError::DeviceUnusable));
    }

    #[test]
    fn too_many_images_are_rejected() {
        let device = MockDevice::new();
        device.swapchain_image_count.set(MAX_IMAGE_COUNT + 1);
        let mut swapchain = Swapchain::new(PresentMode::Fifo);
        swapchain.query(&device).unwrap();
        swapchain
            .query_surface_capabilities(&device, extent(800, 600))
            .unwrap();
        assert!(matches!(
            swapchain.create(&device),
            Err(GpuError::TooManySwapchainImages(9))
        ));
        assert_eq!(swapchain.swapchain(), vk::SwapchainKHR::null());
        assert!(swapchain.images().is_empty());
        assert_ne!(swapchain.state(), SwapchainState::Created);
        assert_eq!(
            device.live("vkCreateSwapchainKHR", "vkDestroySwapchainKHR"),
            0
        );
    }

    #[test]
    fn failed_recreate_leaves_no_half_built_swapchain() {
        let device = MockDevice::new();
        let mut swapchain = created(&device);
        device.swapchain_image_count.set(MAX_IMAGE_COUNT + 1);

        assert!(swapchain.reset_framebuffer(&device, extent(640, 480)).is_err());
        assert_eq!(swapchain.swapchain(), vk::SwapchainKHR::null());
        assert!(swapchain.images().is_empty());
        assert_eq!(swapchain.state(), SwapchainState::Destroyed);
        assert_eq!(
            device.live("vkCreateSwapchainKHR", "vkDestroySwapchainKHR"),
            0
        );

        swapchain.destroy(&device);
        assert_eq!(device.live("vkCreateFramebuffer", "vkDestroyFramebuffer"), 0);
    }

    #[test]
    fn sample_count_change_rebuilds_render_pass_on_reset() {
        let device = MockDevice::new();
        let mut swapchain = created(&device);
        let before = swapchain.render_pass();

        swapchain.set_sample_count(4);
        swapchain
            .reset_framebuffer(&device, extent(800, 600))
            .unwrap();
        assert_ne!(swapchain.render_pass(), before);
        assert_eq!(device.live("vkCreateRenderPass", "vkDestroyRenderPass"), 1);

        swapchain.destroy(&device);
        assert_eq!(swapchain.state(), SwapchainState::Destroyed);
        assert_eq!(device.live("vkCreateRenderPass", "vkDestroyRenderPass"), 0);
        assert_eq!(device.live("vkCreateSwapchainKHR", "vkDestroySwapchainKHR"), 0);
        assert_eq!(device.live("vkCreateImage", "vkDestroyImage"), 0);
        assert_eq!(device.live_memory(), 0);
    }

    #[test]
    fn out_of_date_is_a_status_not_an_error() {
        let device = MockDevice::new();
        let swapchain = created(&device);

        device
            .acquire_result
            .set(Err(vk::Result::ERROR_OUT_OF_DATE_KHR));
        assert_eq!(
            swapchain
                .acquire_next_image(&device, vk::Semaphore::null())
                .unwrap(),
            AcquireStatus::OutOfDate
        );

        device.acquire_result.set(Ok((1, true)));
        assert_eq!(
            swapchain
                .acquire_next_image(&device, vk::Semaphore::null())
                .unwrap(),
            AcquireStatus::Suboptimal(1)
        );

        device
            .present_result
            .set(Err(vk::Result::ERROR_OUT_OF_DATE_KHR));
        let status = swapchain
            .present(&device, vk::Semaphore::null(), 1)
            .unwrap();
        assert!(status.needs_reset());

        device
            .present_result
            .set(Err(vk::Result::ERROR_DEVICE_LOST));
        assert!(swapchain
            .present(&device, vk::Semaphore::null(), 1)
            .is_err());
    }

    #[test]
    fn present_mode_round_trips_through_vk() {
        for mode in PresentMode::ALL {
            assert_eq!(PresentMode::from_vk(mode.to_vk()), Some(mode));
        }
        assert_eq!(PresentMode::Fifo.to_string(), "Fifo");
        assert_eq!(PresentMode::FifoRelaxed.next(), PresentMode::Immediate);
    }
}
