//! Renderer configuration.

use crate::error::{GpuError, Result};
use crate::swapchain::PresentMode;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Renderer configuration, loadable from TOML.
///
/// ```toml
/// app_name = "viewer"
/// present_mode = "Mailbox"
/// msaa_samples = 4
/// depth_bits = 24
/// stencil_bits = 8
/// clear_color = [0.1, 0.1, 0.1, 1.0]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Application name reported to the driver.
    pub app_name: String,
    /// Enable Vulkan validation layers (default: debug builds only).
    pub validation: bool,
    /// Requested presentation mode. Falls back if unsupported.
    pub present_mode: PresentMode,
    /// MSAA sample count, 1 disables multisampling.
    pub msaa_samples: u8,
    /// Depth buffer bits, 0 for none.
    pub depth_bits: u8,
    /// Stencil buffer bits, 0 for none.
    pub stencil_bits: u8,
    /// Clear color of the swapchain attachment.
    pub clear_color: [f32; 4],
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            app_name: "quill".to_string(),
            validation: cfg!(debug_assertions),
            present_mode: PresentMode::Fifo,
            msaa_samples: 1,
            depth_bits: 0,
            stencil_bits: 0,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

impl RendererConfig {
    /// Create a new config with the given application name.
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            ..Default::default()
        }
    }

    /// Enable or disable validation layers.
    #[must_use]
    pub fn with_validation(mut self, validation: bool) -> Self {
        self.validation = validation;
        self
    }

    #[must_use]
    pub fn with_present_mode(mut self, present_mode: PresentMode) -> Self {
        self.present_mode = present_mode;
        self
    }

    #[must_use]
    pub fn with_msaa_samples(mut self, samples: u8) -> Self {
        self.msaa_samples = samples;
        self
    }

    #[must_use]
    pub fn with_depth_bits(mut self, bits: u8) -> Self {
        self.depth_bits = bits;
        self
    }

    #[must_use]
    pub fn with_stencil_bits(mut self, bits: u8) -> Self {
        self.stencil_bits = bits;
        self
    }

    #[must_use]
    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| GpuError::Config(e.to_string()))
    }

    /// Load from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| GpuError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| GpuError::Config(e.to_string()))
    }
}
