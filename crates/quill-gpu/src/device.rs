//! The slice of the Vulkan API driven by the memory, render-target and frame layer.
//!
//! [`DeviceMemory`](crate::memory::DeviceMemory), [`Framebuffer`](crate::framebuffer::Framebuffer),
//! [`Attachments`](crate::attachments::Attachments), [`Swapchain`](crate::swapchain::Swapchain),
//! the command buffers in [`command`](crate::command), the objects in [`sync`](crate::sync)
//! and [`FrameLoop`](crate::frame::FrameLoop) talk to the GPU exclusively through this trait. [`Device`](crate::context::Device)
//! implements it over `ash`; tests implement it with a recording mock.
//!
//! Every method is a thin forward to the Vulkan entry point of the same name,
//! so the safety contract of each is the one of the wrapped call: handles
//! must be valid and belong to this device, and objects must not be in use
//! by the GPU when destroyed.

use ash::prelude::VkResult;
use ash::vk;
use std::ffi::c_void;

/// Native device operations used by the resource layer.
pub trait DeviceApi {
    /// Memory heaps and types of the physical device.
    fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties;

    /// `VkPhysicalDeviceLimits::nonCoherentAtomSize`.
    fn non_coherent_atom_size(&self) -> vk::DeviceSize;

    /// The presentation surface this device was selected for.
    fn surface(&self) -> vk::SurfaceKHR;

    /// The graphics queue, also used for presentation.
    fn graphics_queue(&self) -> vk::Queue;

    fn graphics_queue_family(&self) -> u32;

    // -- memory ---------------------------------------------------------------

    /// # Safety
    /// See module docs.
    unsafe fn allocate_memory(&self, info: &vk::MemoryAllocateInfo<'_>)
        -> VkResult<vk::DeviceMemory>;

    /// # Safety
    /// See module docs.
    unsafe fn free_memory(&self, memory: vk::DeviceMemory);

    /// # Safety
    /// See module docs.
    unsafe fn bind_buffer_memory(
        &self,
        buffer: vk::Buffer,
        memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
    ) -> VkResult<()>;

    /// # Safety
    /// See module docs.
    unsafe fn bind_image_memory(
        &self,
        image: vk::Image,
        memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
    ) -> VkResult<()>;

    /// # Safety
    /// See module docs. The memory must be host-visible and not already mapped.
    unsafe fn map_memory(
        &self,
        memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
        size: vk::DeviceSize,
    ) -> VkResult<*mut c_void>;

    /// # Safety
    /// See module docs.
    unsafe fn unmap_memory(&self, memory: vk::DeviceMemory);

    /// # Safety
    /// See module docs.
    unsafe fn flush_mapped_memory_ranges(
        &self,
        ranges: &[vk::MappedMemoryRange<'_>],
    ) -> VkResult<()>;

    /// # Safety
    /// See module docs.
    unsafe fn invalidate_mapped_memory_ranges(
        &self,
        ranges: &[vk::MappedMemoryRange<'_>],
    ) -> VkResult<()>;

    // -- buffers and images ---------------------------------------------------

    /// # Safety
    /// See module docs.
    unsafe fn create_buffer(&self, info: &vk::BufferCreateInfo<'_>) -> VkResult<vk::Buffer>;

    /// # Safety
    /// See module docs.
    unsafe fn destroy_buffer(&self, buffer: vk::Buffer);

    /// # Safety
    /// See module docs.
    unsafe fn buffer_memory_requirements(&self, buffer: vk::Buffer) -> vk::MemoryRequirements;

    /// # Safety
    /// See module docs.
    unsafe fn create_image(&self, info: &vk::ImageCreateInfo<'_>) -> VkResult<vk::Image>;

    /// # Safety
    /// See module docs.
    unsafe fn destroy_image(&self, image: vk::Image);

    /// # Safety
    /// See module docs.
    unsafe fn image_memory_requirements(&self, image: vk::Image) -> vk::MemoryRequirements;

    /// # Safety
    /// See module docs.
    unsafe fn create_image_view(
        &self,
        info: &vk::ImageViewCreateInfo<'_>,
    ) -> VkResult<vk::ImageView>;

    /// # Safety
    /// See module docs.
    unsafe fn destroy_image_view(&self, view: vk::ImageView);

    // -- render passes and framebuffers ---------------------------------------

    /// # Safety
    /// See module docs.
    unsafe fn create_render_pass(
        &self,
        info: &vk::RenderPassCreateInfo<'_>,
    ) -> VkResult<vk::RenderPass>;

    /// # Safety
    /// See module docs.
    unsafe fn destroy_render_pass(&self, render_pass: vk::RenderPass);

    /// # Safety
    /// See module docs.
    unsafe fn create_framebuffer(
        &self,
        info: &vk::FramebufferCreateInfo<'_>,
    ) -> VkResult<vk::Framebuffer>;

    /// # Safety
    /// See module docs.
    unsafe fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer);

    // -- surface and swapchain ------------------------------------------------

    /// # Safety
    /// See module docs.
    unsafe fn surface_capabilities(&self) -> VkResult<vk::SurfaceCapabilitiesKHR>;

    /// # Safety
    /// See module docs.
    unsafe fn surface_formats(&self) -> VkResult<Vec<vk::SurfaceFormatKHR>>;

    /// # Safety
    /// See module docs.
    unsafe fn surface_present_modes(&self) -> VkResult<Vec<vk::PresentModeKHR>>;

    /// # Safety
    /// See module docs.
    unsafe fn create_swapchain(
        &self,
        info: &vk::SwapchainCreateInfoKHR<'_>,
    ) -> VkResult<vk::SwapchainKHR>;

    /// # Safety
    /// See module docs.
    unsafe fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR);

    /// # Safety
    /// See module docs.
    unsafe fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>>;

    /// Returns the image index and whether the swapchain is suboptimal.
    ///
    /// # Safety
    /// See module docs.
    unsafe fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        timeout_ns: u64,
        semaphore: vk::Semaphore,
    ) -> VkResult<(u32, bool)>;

    /// Presents on the graphics queue. Returns whether the swapchain is suboptimal.
    ///
    /// # Safety
    /// See module docs.
    unsafe fn queue_present(&self, info: &vk::PresentInfoKHR<'_>) -> VkResult<bool>;

    /// # Safety
    /// See module docs.
    unsafe fn device_wait_idle(&self) -> VkResult<()>;

    // -- synchronization ------------------------------------------------------

    /// # Safety
    /// See module docs.
    unsafe fn create_semaphore(
        &self,
        info: &vk::SemaphoreCreateInfo<'_>,
    ) -> VkResult<vk::Semaphore>;

    /// # Safety
    /// See module docs.
    unsafe fn destroy_semaphore(&self, semaphore: vk::Semaphore);

    /// # Safety
    /// See module docs.
    unsafe fn create_fence(&self, info: &vk::FenceCreateInfo<'_>) -> VkResult<vk::Fence>;

    /// # Safety
    /// See module docs.
    unsafe fn destroy_fence(&self, fence: vk::Fence);

    /// # Safety
    /// See module docs.
    unsafe fn wait_for_fences(
        &self,
        fences: &[vk::Fence],
        wait_all: bool,
        timeout_ns: u64,
    ) -> VkResult<()>;

    /// # Safety
    /// See module docs.
    unsafe fn reset_fences(&self, fences: &[vk::Fence]) -> VkResult<()>;

    // -- command pools and submission -----------------------------------------

    /// # Safety
    /// See module docs.
    unsafe fn create_command_pool(
        &self,
        info: &vk::CommandPoolCreateInfo<'_>,
    ) -> VkResult<vk::CommandPool>;

    /// # Safety
    /// See module docs.
    unsafe fn destroy_command_pool(&self, pool: vk::CommandPool);

    /// # Safety
    /// See module docs.
    unsafe fn reset_command_pool(
        &self,
        pool: vk::CommandPool,
        flags: vk::CommandPoolResetFlags,
    ) -> VkResult<()>;

    /// # Safety
    /// See module docs.
    unsafe fn allocate_command_buffers(
        &self,
        info: &vk::CommandBufferAllocateInfo<'_>,
    ) -> VkResult<Vec<vk::CommandBuffer>>;

    /// # Safety
    /// See module docs.
    unsafe fn free_command_buffers(&self, pool: vk::CommandPool, buffers: &[vk::CommandBuffer]);

    /// # Safety
    /// See module docs.
    unsafe fn reset_command_buffer(
        &self,
        cmd: vk::CommandBuffer,
        flags: vk::CommandBufferResetFlags,
    ) -> VkResult<()>;

    /// # Safety
    /// See module docs.
    unsafe fn begin_command_buffer(
        &self,
        cmd: vk::CommandBuffer,
        info: &vk::CommandBufferBeginInfo<'_>,
    ) -> VkResult<()>;

    /// # Safety
    /// See module docs.
    unsafe fn end_command_buffer(&self, cmd: vk::CommandBuffer) -> VkResult<()>;

    /// # Safety
    /// See module docs.
    unsafe fn queue_submit(
        &self,
        queue: vk::Queue,
        submits: &[vk::SubmitInfo<'_>],
        fence: vk::Fence,
    ) -> VkResult<()>;

    /// # Safety
    /// See module docs.
    unsafe fn queue_wait_idle(&self, queue: vk::Queue) -> VkResult<()>;

    // -- recording ------------------------------------------------------------

    /// # Safety
    /// See module docs. The buffer must be recording.
    unsafe fn cmd_begin_render_pass(
        &self,
        cmd: vk::CommandBuffer,
        info: &vk::RenderPassBeginInfo<'_>,
        contents: vk::SubpassContents,
    );

    /// # Safety
    /// See module docs.
    unsafe fn cmd_end_render_pass(&self, cmd: vk::CommandBuffer);

    /// # Safety
    /// See module docs.
    unsafe fn cmd_set_viewport(
        &self,
        cmd: vk::CommandBuffer,
        first_viewport: u32,
        viewports: &[vk::Viewport],
    );

    /// # Safety
    /// See module docs.
    unsafe fn cmd_set_scissor(
        &self,
        cmd: vk::CommandBuffer,
        first_scissor: u32,
        scissors: &[vk::Rect2D],
    );

    /// # Safety
    /// See module docs.
    unsafe fn cmd_bind_pipeline(
        &self,
        cmd: vk::CommandBuffer,
        bind_point: vk::PipelineBindPoint,
        pipeline: vk::Pipeline,
    );

    /// # Safety
    /// See module docs.
    unsafe fn cmd_bind_descriptor_sets(
        &self,
        cmd: vk::CommandBuffer,
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        first_set: u32,
        sets: &[vk::DescriptorSet],
        dynamic_offsets: &[u32],
    );

    /// # Safety
    /// See module docs.
    unsafe fn cmd_bind_vertex_buffers(
        &self,
        cmd: vk::CommandBuffer,
        first_binding: u32,
        buffers: &[vk::Buffer],
        offsets: &[vk::DeviceSize],
    );

    /// # Safety
    /// See module docs.
    unsafe fn cmd_bind_index_buffer(
        &self,
        cmd: vk::CommandBuffer,
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        index_type: vk::IndexType,
    );

    /// # Safety
    /// See module docs.
    unsafe fn cmd_draw(
        &self,
        cmd: vk::CommandBuffer,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    );

    /// # Safety
    /// See module docs.
    unsafe fn cmd_draw_indexed(
        &self,
        cmd: vk::CommandBuffer,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    );

    /// # Safety
    /// See module docs.
    #[allow(clippy::too_many_arguments)]
    unsafe fn cmd_pipeline_barrier(
        &self,
        cmd: vk::CommandBuffer,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        dependency_flags: vk::DependencyFlags,
        memory_barriers: &[vk::MemoryBarrier<'_>],
        buffer_barriers: &[vk::BufferMemoryBarrier<'_>],
        image_barriers: &[vk::ImageMemoryBarrier<'_>],
    );

    /// # Safety
    /// See module docs.
    unsafe fn cmd_copy_buffer_to_image(
        &self,
        cmd: vk::CommandBuffer,
        buffer: vk::Buffer,
        image: vk::Image,
        image_layout: vk::ImageLayout,
        regions: &[vk::BufferImageCopy],
    );

    /// # Safety
    /// See module docs.
    unsafe fn cmd_copy_image_to_buffer(
        &self,
        cmd: vk::CommandBuffer,
        image: vk::Image,
        image_layout: vk::ImageLayout,
        buffer: vk::Buffer,
        regions: &[vk::BufferImageCopy],
    );
}
