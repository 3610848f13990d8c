//! GPU error types.

use ash::vk;
use thiserror::Error;

/// GPU-related errors.
#[derive(Error, Debug)]
pub enum GpuError {
    /// Vulkan error.
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] vk::Result),

    /// A named Vulkan call returned a non-success status.
    #[error("{call} failed: {result}")]
    Call {
        call: &'static str,
        result: vk::Result,
    },

    /// No suitable GPU found.
    #[error("No suitable GPU found")]
    NoSuitableDevice,

    /// Required extension not supported.
    #[error("Required extension not supported: {0}")]
    ExtensionNotSupported(String),

    /// Surface creation failed.
    #[error("Surface creation failed: {0}")]
    SurfaceCreation(String),

    /// The surface does not offer the required format or any present mode.
    #[error("Unsupported surface: {0}")]
    UnsupportedSurface(String),

    /// The physical device can no longer present to the surface.
    #[error("Physical device no longer usable")]
    DeviceUnusable,

    /// No memory type satisfies the accumulated requirements.
    #[error("No suitable memory type (type bits {type_bits:#x}, properties {properties:?})")]
    NoSuitableMemoryType {
        type_bits: u32,
        properties: vk::MemoryPropertyFlags,
    },

    /// The driver returned more swapchain images than we can track.
    #[error("Too many swapchain images: {0}")]
    TooManySwapchainImages(u32),

    /// Pipeline creation failed.
    #[error("Pipeline creation failed: {0}")]
    PipelineCreation(String),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl GpuError {
    /// Adaptor for `map_err` that tags a `vk::Result` with the failing call.
    ///
    /// ```ignore
    /// device.create_image(&info).map_err(GpuError::call("vkCreateImage"))?;
    /// ```
    pub fn call(call: &'static str) -> impl FnOnce(vk::Result) -> Self {
        move |result| Self::Call { call, result }
    }

    /// The underlying Vulkan status, if this error came from a Vulkan call.
    pub fn vk_result(&self) -> Option<vk::Result> {
        match self {
            Self::Vulkan(result) | Self::Call { result, .. } => Some(*result),
            _ => None,
        }
    }
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, GpuError>;
