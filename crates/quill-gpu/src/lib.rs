//! Vulkan resource and pipeline layer for the quill renderer.
//!
//! This crate provides:
//! - Instance, surface and device setup ([`DeviceBuilder`], [`Device`])
//! - A bump allocator for device memory ([`MemoryReservation`], [`DeviceMemory`])
//! - Render pass shape, framebuffers and the swapchain ([`Attachments`],
//!   [`Framebuffer`], [`Swapchain`])
//! - Cached pipelines, pipeline layouts, samplers and descriptor pools
//!   ([`GpuCaches`])
//! - Command buffers with deferred resource release ([`CommandBuffer`],
//!   [`CommandBuffers`])
//! - The per-frame loop ([`FrameLoop`]) and the renderer tying it together
//!   ([`Renderer`])

pub mod attachments;
pub mod buffer;
pub mod cache;
pub mod capabilities;
pub mod command;
pub mod config;
pub mod context;
pub mod debug;
pub mod descriptor;
pub mod device;
pub mod error;
pub mod frame;
pub mod framebuffer;
pub mod image;
pub mod instance;
pub mod memory;
pub mod pipeline;
pub mod renderer;
pub mod sampler;
pub mod surface;
pub mod swapchain;
pub mod sync;

#[cfg(test)]
mod testing;

pub use attachments::{Attachments, ColorAttachment, RenderPassLayout};
pub use buffer::Buffer;
pub use cache::{GpuCaches, ObjectCache};
pub use capabilities::{GpuCapabilities, GpuVendor};
pub use command::{
    CleanupQueue, CommandBuffer, CommandBufferState, CommandBuffers, CommandPool, Event,
    ImageTransition, OwnerId,
};
pub use config::RendererConfig;
pub use context::{Device, DeviceBuilder};
pub use descriptor::{
    write_dynamic_uniform_buffer, write_image_sampler, write_storage_buffer,
    write_uniform_buffer, DescriptorPool, DescriptorPoolSizes, SharedDescriptorPool,
};
pub use device::DeviceApi;
pub use error::{GpuError, Result};
pub use frame::{Frame, FrameLoop};
pub use framebuffer::Framebuffer;
pub use image::{Image, ImageCreateInfo, ImageView};
pub use memory::{DeviceMemory, MemoryReservation};
pub use pipeline::{
    BlendFunc, DepthTest, DescriptorKind, Pipeline, PipelineCreateInfo, PipelineLayout,
    PipelineLayoutCreateInfo, VertexFormat,
};
pub use renderer::Renderer;
pub use sampler::{Sampler, SamplerAddressMode, SamplerCreateInfo};
pub use swapchain::{AcquireStatus, PresentMode, PresentStatus, Swapchain, SwapchainState};
pub use sync::{create_fence, create_semaphore, FrameSync, FrameSyncManager};
