//! The window renderer: device, frame loop and object caches.

use crate::cache::GpuCaches;
use crate::command::{CommandBuffer, CommandBuffers};
use crate::config::RendererConfig;
use crate::context::Device;
use crate::descriptor::{DescriptorPoolSizes, SharedDescriptorPool};
use crate::error::Result;
use crate::frame::{Frame, FrameLoop};
use crate::pipeline::{Pipeline, PipelineCreateInfo, PipelineLayout, PipelineLayoutCreateInfo};
use crate::sampler::{Sampler, SamplerCreateInfo};
use crate::swapchain::{PresentMode, Swapchain};
use ash::vk;
use std::sync::Arc;

/// Largest power of two not above `requested`, clamped to `[1, max]`.
pub fn clamp_sample_count(requested: u8, max: u8) -> u8 {
    let clamped = requested.clamp(1, max.max(1));
    1 << (7 - clamped.leading_zeros())
}

/// Owns the device, the frame loop over its swapchain and the pipeline
/// object caches.
pub struct Renderer {
    frames: FrameLoop,
    caches: GpuCaches,
    max_samples: u8,
    device: Device,
}

impl Renderer {
    /// Build the swapchain and frame resources for a window of `size`.
    pub fn new(device: Device, config: &RendererConfig, size: vk::Extent2D) -> Result<Self> {
        let max_samples = device.capabilities().max_msaa_samples();
        let mut renderer = Self {
            frames: FrameLoop::new(Swapchain::new(config.present_mode)),
            caches: GpuCaches::new(),
            max_samples,
            device,
        };
        // On error, Drop releases whatever was created
        renderer.init(config, size)?;
        Ok(renderer)
    }

    fn init(&mut self, config: &RendererConfig, size: vk::Extent2D) -> Result<()> {
        let samples = clamp_sample_count(config.msaa_samples, self.max_samples);
        if samples != config.msaa_samples {
            tracing::warn!(
                requested = config.msaa_samples,
                selected = samples,
                "MSAA sample count not supported"
            );
        }
        let swapchain = self.frames.swapchain_mut();
        swapchain.set_sample_count(samples);
        swapchain.set_depth_bits(config.depth_bits);
        swapchain.set_stencil_bits(config.stencil_bits);
        swapchain
            .attachments_mut()
            .set_clear_color(0, config.clear_color);

        self.frames.create(&self.device, size)?;

        tracing::info!(
            width = self.extent().width,
            height = self.extent().height,
            samples,
            present_mode = %self.present_mode(),
            "Renderer ready"
        );
        Ok(())
    }

    /// Drop cached pipelines if a rebuild replaced the render pass they
    /// were created for.
    fn drop_stale_pipelines(&mut self, previous: vk::RenderPass) {
        if self.render_pass() != previous {
            // Framebuffer resets wait for idle first
            unsafe { self.caches.clear_pipelines(self.device.device()) };
        }
    }

    /// Wait for the slot, acquire an image and start recording into it.
    ///
    /// Returns `None` when the swapchain was out of date; it has been
    /// rebuilt and the caller should skip this frame.
    pub fn begin_frame(&mut self) -> Result<Option<Frame>> {
        let previous = self.render_pass();
        let frame = self.frames.begin_frame(&self.device);
        self.drop_stale_pipelines(previous);
        frame
    }

    /// Device and command buffer of `frame`, for recording draws.
    pub fn frame_commands(&mut self, frame: &Frame) -> (&Device, &mut CommandBuffer) {
        (&self.device, self.frames.command_buffer_mut(frame))
    }

    /// Finish recording, submit and present `frame`.
    pub fn end_frame(&mut self, frame: Frame) -> Result<()> {
        let previous = self.render_pass();
        let result = self.frames.end_frame(&self.device, frame);
        self.drop_stale_pipelines(previous);
        result
    }

    /// Rebuild the framebuffer at `size` before the next frame.
    pub fn resize(&mut self, size: vk::Extent2D) {
        self.frames.resize(size);
    }

    /// Switch the present mode. Must not be called during a frame.
    pub fn set_present_mode(&mut self, mode: PresentMode) -> Result<()> {
        debug_assert!(!self.frames.is_frame_active());
        self.frames
            .swapchain_mut()
            .set_present_mode(&self.device, mode)?;
        tracing::info!(present_mode = %self.present_mode(), "Present mode changed");
        Ok(())
    }

    /// Change MSAA, rebuilding the render pass, the framebuffers and
    /// dropping every cached pipeline. Returns the count actually used.
    pub fn set_sample_count(&mut self, count: u8) -> Result<u8> {
        debug_assert!(!self.frames.is_frame_active());
        let samples = clamp_sample_count(count, self.max_samples);
        if samples == self.sample_count() {
            return Ok(samples);
        }
        self.frames.swapchain_mut().set_sample_count(samples);
        let previous = self.render_pass();
        let extent = self.extent();
        let result = self.frames.reset_framebuffer(&self.device, extent);
        self.drop_stale_pipelines(previous);
        result?;
        tracing::info!(samples, "Sample count changed");
        Ok(samples)
    }

    /// Clear color of the swapchain image, applied from the next frame.
    pub fn set_clear_color(&mut self, color: [f32; 4]) {
        self.frames
            .swapchain_mut()
            .attachments_mut()
            .set_clear_color(0, color);
    }

    pub const fn present_mode(&self) -> PresentMode {
        self.frames.swapchain().present_mode()
    }

    pub fn sample_count(&self) -> u8 {
        self.frames.swapchain().attachments().msaa_samples()
    }

    pub const fn render_pass(&self) -> vk::RenderPass {
        self.frames.swapchain().render_pass()
    }

    pub fn framebuffer(&self, index: u32) -> vk::Framebuffer {
        self.frames.swapchain().framebuffer(index)
    }

    pub const fn extent(&self) -> vk::Extent2D {
        self.frames.swapchain().extent()
    }

    pub const fn swapchain(&self) -> &Swapchain {
        self.frames.swapchain()
    }

    pub const fn device(&self) -> &Device {
        &self.device
    }

    pub fn command_buffers_mut(&mut self) -> &mut CommandBuffers {
        self.frames.command_buffers_mut()
    }

    /// Cached pipeline for `info`.
    ///
    /// # Safety
    /// The shader modules and layout in `info` must be valid, and
    /// `info.render_pass()` must be compatible with [`Self::render_pass`].
    pub unsafe fn get_pipeline(&mut self, info: &PipelineCreateInfo) -> Result<Arc<Pipeline>> {
        self.caches.get_pipeline(self.device.device(), info)
    }

    pub fn get_pipeline_layout(
        &mut self,
        info: &PipelineLayoutCreateInfo,
    ) -> Result<Arc<PipelineLayout>> {
        unsafe { self.caches.get_pipeline_layout(self.device.device(), info) }
    }

    pub fn get_sampler(&mut self, info: &SamplerCreateInfo) -> Result<Arc<Sampler>> {
        unsafe { self.caches.get_sampler(self.device.device(), info) }
    }

    /// Book `reserved_sets` descriptor sets shaped like `sizes`.
    pub fn get_descriptor_pool(
        &mut self,
        reserved_sets: u32,
        sizes: &DescriptorPoolSizes,
    ) -> Result<SharedDescriptorPool> {
        unsafe {
            self.caches
                .get_descriptor_pool(self.device.device(), reserved_sets, sizes)
        }
    }

    pub const fn caches(&self) -> &GpuCaches {
        &self.caches
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            tracing::error!(error = %e, "Wait idle failed during renderer teardown");
        }
        unsafe { self.caches.destroy(self.device.device()) };
        self.frames.destroy(&self.device);
        tracing::debug!("Renderer destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_count_rounds_down_to_power_of_two() {
        assert_eq!(clamp_sample_count(0, 8), 1);
        assert_eq!(clamp_sample_count(1, 8), 1);
        assert_eq!(clamp_sample_count(3, 8), 2);
        assert_eq!(clamp_sample_count(4, 8), 4);
        assert_eq!(clamp_sample_count(6, 8), 4);
        assert_eq!(clamp_sample_count(16, 8), 8);
        assert_eq!(clamp_sample_count(4, 1), 1);
        assert_eq!(clamp_sample_count(64, 64), 64);
    }
}
