//! Window surfaces.
//!
//! Hides the raw-window-handle plumbing from application code and answers
//! whether a physical device can drive a swapchain on a surface.

use crate::error::{GpuError, Result};
use crate::swapchain::{select_present_mode, select_surface_format, PresentMode};
use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

/// Create a Vulkan surface for `window`.
///
/// # Safety
/// The instance must have the extensions from
/// [`required_instance_extensions`](crate::instance::required_instance_extensions)
/// enabled, and the window must outlive the surface.
pub unsafe fn create_surface<W>(
    entry: &ash::Entry,
    instance: &ash::Instance,
    window: &W,
) -> Result<vk::SurfaceKHR>
where
    W: HasDisplayHandle + HasWindowHandle,
{
    let display = window
        .display_handle()
        .map_err(|e| GpuError::SurfaceCreation(format!("Failed to get display handle: {e}")))?;
    let window_handle = window
        .window_handle()
        .map_err(|e| GpuError::SurfaceCreation(format!("Failed to get window handle: {e}")))?;

    ash_window::create_surface(
        entry,
        instance,
        display.as_raw(),
        window_handle.as_raw(),
        None,
    )
    .map_err(|e| GpuError::SurfaceCreation(e.to_string()))
}

/// What a physical device offers for a surface.
#[derive(Debug, Clone, Default)]
pub struct SurfaceSupport {
    /// Supported surface formats.
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported present modes.
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SurfaceSupport {
    /// # Safety
    /// All handles must be valid.
    pub unsafe fn query(
        loader: &ash::khr::surface::Instance,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<Self> {
        let formats = loader
            .get_physical_device_surface_formats(physical_device, surface)
            .map_err(GpuError::call("vkGetPhysicalDeviceSurfaceFormatsKHR"))?;
        let present_modes = loader
            .get_physical_device_surface_present_modes(physical_device, surface)
            .map_err(GpuError::call("vkGetPhysicalDeviceSurfacePresentModesKHR"))?;
        Ok(Self {
            formats,
            present_modes,
        })
    }

    /// Whether a swapchain with the preferred format and some present mode
    /// can be built. The requested mode may still fall back.
    pub fn is_adequate(&self, requested: PresentMode) -> bool {
        select_surface_format(&self.formats).is_some()
            && select_present_mode(&self.present_modes, requested).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swapchain::PREFERRED_SURFACE_FORMAT;

    #[test]
    fn adequate_needs_format_and_mode() {
        let mut support = SurfaceSupport {
            formats: vec![PREFERRED_SURFACE_FORMAT],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };
        assert!(support.is_adequate(PresentMode::Mailbox));

        support.present_modes.clear();
        assert!(!support.is_adequate(PresentMode::Fifo));

        support.present_modes.push(vk::PresentModeKHR::FIFO);
        support.formats = vec![vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }];
        assert!(!support.is_adequate(PresentMode::Fifo));
    }
}
