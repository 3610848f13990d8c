//! Recording device used by unit tests.
//!
//! Hands out fake handles, logs every native call by name and backs mapped
//! memory with a plain byte vector so host writes can be inspected.
//!
//! Fences are modelled: they signal as soon as the submission they guard is
//! queued, and waiting on an unsignaled fence fails with `TIMEOUT` instead of
//! blocking forever.

use crate::device::DeviceApi;
use ash::prelude::VkResult;
use ash::vk::{self, Handle};
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::ffi::c_void;

pub const DEVICE_LOCAL: u32 = 0;
pub const HOST_VISIBLE: u32 = 1;
pub const LAZILY_ALLOCATED: u32 = 2;

pub struct MockDevice {
    next_handle: Cell<u64>,
    calls: RefCell<Vec<&'static str>>,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    pub non_coherent_atom_size: vk::DeviceSize,
    pub image_requirements: Cell<vk::MemoryRequirements>,
    pub buffer_requirements: Cell<vk::MemoryRequirements>,
    pub capabilities: Cell<vk::SurfaceCapabilitiesKHR>,
    pub formats: RefCell<Vec<vk::SurfaceFormatKHR>>,
    pub present_modes: RefCell<Vec<vk::PresentModeKHR>>,
    /// Number of images the fake driver hands back for any swapchain.
    pub swapchain_image_count: Cell<u32>,
    pub acquire_result: Cell<VkResult<(u32, bool)>>,
    pub present_result: Cell<VkResult<bool>>,
    allocation_sizes: RefCell<Vec<vk::DeviceSize>>,
    host_memory: RefCell<Vec<u8>>,
    flushed: RefCell<Vec<(vk::DeviceSize, vk::DeviceSize)>>,
    framebuffer_attachments: RefCell<Vec<Vec<vk::ImageView>>>,
    signaled_fences: RefCell<HashSet<vk::Fence>>,
    submit_signals: RefCell<Vec<vk::Semaphore>>,
    present_waits: RefCell<Vec<vk::Semaphore>>,
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDevice {
    /// Three memory types: device-local, host-visible+coherent, device-local+lazy.
    pub fn new() -> Self {
        let mut memory_properties = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: 3,
            memory_heap_count: 1,
            ..Default::default()
        };
        memory_properties.memory_types[DEVICE_LOCAL as usize].property_flags =
            vk::MemoryPropertyFlags::DEVICE_LOCAL;
        memory_properties.memory_types[HOST_VISIBLE as usize].property_flags =
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
        memory_properties.memory_types[LAZILY_ALLOCATED as usize].property_flags =
            vk::MemoryPropertyFlags::DEVICE_LOCAL | vk::MemoryPropertyFlags::LAZILY_ALLOCATED;

        let capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 8,
            current_extent: vk::Extent2D {
                width: 800,
                height: 600,
            },
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            ..Default::default()
        };

        Self {
            next_handle: Cell::new(1),
            calls: RefCell::new(Vec::new()),
            memory_properties,
            non_coherent_atom_size: 64,
            image_requirements: Cell::new(vk::MemoryRequirements {
                size: 1000,
                alignment: 256,
                memory_type_bits: 0b111,
            }),
            buffer_requirements: Cell::new(vk::MemoryRequirements {
                size: 512,
                alignment: 16,
                memory_type_bits: 0b010,
            }),
            capabilities: Cell::new(capabilities),
            formats: RefCell::new(vec![vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            }]),
            present_modes: RefCell::new(vec![
                vk::PresentModeKHR::FIFO,
                vk::PresentModeKHR::MAILBOX,
            ]),
            swapchain_image_count: Cell::new(3),
            acquire_result: Cell::new(Ok((0, false))),
            present_result: Cell::new(Ok(false)),
            allocation_sizes: RefCell::new(Vec::new()),
            host_memory: RefCell::new(Vec::new()),
            flushed: RefCell::new(Vec::new()),
            framebuffer_attachments: RefCell::new(Vec::new()),
            signaled_fences: RefCell::new(HashSet::new()),
            submit_signals: RefCell::new(Vec::new()),
            present_waits: RefCell::new(Vec::new()),
        }
    }

    fn handle<H: Handle>(&self) -> H {
        let raw = self.next_handle.get();
        self.next_handle.set(raw + 1);
        H::from_raw(raw)
    }

    fn record(&self, call: &'static str) {
        self.calls.borrow_mut().push(call);
    }

    /// Every native call so far, in order.
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.borrow().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.borrow().iter().filter(|c| **c == call).count()
    }

    /// Position of the first occurrence of `call` at or after `from`.
    pub fn position_after(&self, call: &str, from: usize) -> Option<usize> {
        self.calls
            .borrow()
            .iter()
            .skip(from)
            .position(|c| *c == call)
            .map(|p| p + from)
    }

    /// Objects created minus objects destroyed for a `vkCreateX`/`vkDestroyX` pair.
    pub fn live(&self, create: &str, destroy: &str) -> isize {
        self.count(create) as isize - self.count(destroy) as isize
    }

    pub fn live_memory(&self) -> isize {
        self.live("vkAllocateMemory", "vkFreeMemory")
    }

    pub fn allocation_sizes(&self) -> Vec<vk::DeviceSize> {
        self.allocation_sizes.borrow().clone()
    }

    pub fn host_bytes(&self, offset: usize, len: usize) -> Vec<u8> {
        self.host_memory.borrow()[offset..offset + len].to_vec()
    }

    pub fn flushed(&self) -> Vec<(vk::DeviceSize, vk::DeviceSize)> {
        self.flushed.borrow().clone()
    }

    /// Semaphores signaled by each queue submission, in order.
    pub fn submit_signals(&self) -> Vec<vk::Semaphore> {
        self.submit_signals.borrow().clone()
    }

    /// Semaphores waited on by each present, in order.
    pub fn present_waits(&self) -> Vec<vk::Semaphore> {
        self.present_waits.borrow().clone()
    }

    /// Attachment views of every framebuffer created so far.
    pub fn framebuffer_attachments(&self) -> Vec<Vec<vk::ImageView>> {
        self.framebuffer_attachments.borrow().clone()
    }
}

impl DeviceApi for MockDevice {
    fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.memory_properties
    }

    fn non_coherent_atom_size(&self) -> vk::DeviceSize {
        self.non_coherent_atom_size
    }

    fn surface(&self) -> vk::SurfaceKHR {
        vk::SurfaceKHR::from_raw(0xface)
    }

    fn graphics_queue(&self) -> vk::Queue {
        vk::Queue::from_raw(0x9000)
    }

    fn graphics_queue_family(&self) -> u32 {
        0
    }

    unsafe fn allocate_memory(
        &self,
        info: &vk::MemoryAllocateInfo<'_>,
    ) -> VkResult<vk::DeviceMemory> {
        self.record("vkAllocateMemory");
        self.allocation_sizes.borrow_mut().push(info.allocation_size);
        self.host_memory
            .borrow_mut()
            .resize(info.allocation_size as usize, 0);
        Ok(self.handle())
    }

    unsafe fn free_memory(&self, _memory: vk::DeviceMemory) {
        self.record("vkFreeMemory");
    }

    unsafe fn bind_buffer_memory(
        &self,
        _buffer: vk::Buffer,
        _memory: vk::DeviceMemory,
        _offset: vk::DeviceSize,
    ) -> VkResult<()> {
        self.record("vkBindBufferMemory");
        Ok(())
    }

    unsafe fn bind_image_memory(
        &self,
        _image: vk::Image,
        _memory: vk::DeviceMemory,
        _offset: vk::DeviceSize,
    ) -> VkResult<()> {
        self.record("vkBindImageMemory");
        Ok(())
    }

    unsafe fn map_memory(
        &self,
        _memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
        _size: vk::DeviceSize,
    ) -> VkResult<*mut c_void> {
        self.record("vkMapMemory");
        let mut host = self.host_memory.borrow_mut();
        Ok(host.as_mut_ptr().add(offset as usize).cast())
    }

    unsafe fn unmap_memory(&self, _memory: vk::DeviceMemory) {
        self.record("vkUnmapMemory");
    }

    unsafe fn flush_mapped_memory_ranges(
        &self,
        ranges: &[vk::MappedMemoryRange<'_>],
    ) -> VkResult<()> {
        self.record("vkFlushMappedMemoryRanges");
        self.flushed
            .borrow_mut()
            .extend(ranges.iter().map(|r| (r.offset, r.size)));
        Ok(())
    }

    unsafe fn invalidate_mapped_memory_ranges(
        &self,
        ranges: &[vk::MappedMemoryRange<'_>],
    ) -> VkResult<()> {
        self.record("vkInvalidateMappedMemoryRanges");
        self.flushed
            .borrow_mut()
            .extend(ranges.iter().map(|r| (r.offset, r.size)));
        Ok(())
    }

    unsafe fn create_buffer(&self, _info: &vk::BufferCreateInfo<'_>) -> VkResult<vk::Buffer> {
        self.record("vkCreateBuffer");
        Ok(self.handle())
    }

    unsafe fn destroy_buffer(&self, _buffer: vk::Buffer) {
        self.record("vkDestroyBuffer");
    }

    unsafe fn buffer_memory_requirements(&self, _buffer: vk::Buffer) -> vk::MemoryRequirements {
        self.buffer_requirements.get()
    }

    unsafe fn create_image(&self, _info: &vk::ImageCreateInfo<'_>) -> VkResult<vk::Image> {
        self.record("vkCreateImage");
        Ok(self.handle())
    }

    unsafe fn destroy_image(&self, _image: vk::Image) {
        self.record("vkDestroyImage");
    }

    unsafe fn image_memory_requirements(&self, _image: vk::Image) -> vk::MemoryRequirements {
        self.image_requirements.get()
    }

    unsafe fn create_image_view(
        &self,
        _info: &vk::ImageViewCreateInfo<'_>,
    ) -> VkResult<vk::ImageView> {
        self.record("vkCreateImageView");
        Ok(self.handle())
    }

    unsafe fn destroy_image_view(&self, _view: vk::ImageView) {
        self.record("vkDestroyImageView");
    }

    unsafe fn create_render_pass(
        &self,
        _info: &vk::RenderPassCreateInfo<'_>,
    ) -> VkResult<vk::RenderPass> {
        self.record("vkCreateRenderPass");
        Ok(self.handle())
    }

    unsafe fn destroy_render_pass(&self, _render_pass: vk::RenderPass) {
        self.record("vkDestroyRenderPass");
    }

    unsafe fn create_framebuffer(
        &self,
        info: &vk::FramebufferCreateInfo<'_>,
    ) -> VkResult<vk::Framebuffer> {
        self.record("vkCreateFramebuffer");
        let views =
            std::slice::from_raw_parts(info.p_attachments, info.attachment_count as usize);
        self.framebuffer_attachments
            .borrow_mut()
            .push(views.to_vec());
        Ok(self.handle())
    }

    unsafe fn destroy_framebuffer(&self, _framebuffer: vk::Framebuffer) {
        self.record("vkDestroyFramebuffer");
    }

    unsafe fn surface_capabilities(&self) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        self.record("vkGetPhysicalDeviceSurfaceCapabilitiesKHR");
        Ok(self.capabilities.get())
    }

    unsafe fn surface_formats(&self) -> VkResult<Vec<vk::SurfaceFormatKHR>> {
        self.record("vkGetPhysicalDeviceSurfaceFormatsKHR");
        Ok(self.formats.borrow().clone())
    }

    unsafe fn surface_present_modes(&self) -> VkResult<Vec<vk::PresentModeKHR>> {
        self.record("vkGetPhysicalDeviceSurfacePresentModesKHR");
        Ok(self.present_modes.borrow().clone())
    }

    unsafe fn create_swapchain(
        &self,
        _info: &vk::SwapchainCreateInfoKHR<'_>,
    ) -> VkResult<vk::SwapchainKHR> {
        self.record("vkCreateSwapchainKHR");
        Ok(self.handle())
    }

    unsafe fn destroy_swapchain(&self, _swapchain: vk::SwapchainKHR) {
        self.record("vkDestroySwapchainKHR");
    }

    unsafe fn swapchain_images(
        &self,
        _swapchain: vk::SwapchainKHR,
    ) -> VkResult<Vec<vk::Image>> {
        self.record("vkGetSwapchainImagesKHR");
        Ok((0..self.swapchain_image_count.get())
            .map(|_| self.handle())
            .collect())
    }

    unsafe fn acquire_next_image(
        &self,
        _swapchain: vk::SwapchainKHR,
        _timeout_ns: u64,
        _semaphore: vk::Semaphore,
    ) -> VkResult<(u32, bool)> {
        self.record("vkAcquireNextImageKHR");
        self.acquire_result.get()
    }

    unsafe fn queue_present(&self, info: &vk::PresentInfoKHR<'_>) -> VkResult<bool> {
        self.record("vkQueuePresentKHR");
        self.present_waits
            .borrow_mut()
            .extend_from_slice(raw_slice(info.p_wait_semaphores, info.wait_semaphore_count));
        self.present_result.get()
    }

    unsafe fn device_wait_idle(&self) -> VkResult<()> {
        self.record("vkDeviceWaitIdle");
        Ok(())
    }

    unsafe fn create_semaphore(
        &self,
        _info: &vk::SemaphoreCreateInfo<'_>,
    ) -> VkResult<vk::Semaphore> {
        self.record("vkCreateSemaphore");
        Ok(self.handle())
    }

    unsafe fn destroy_semaphore(&self, _semaphore: vk::Semaphore) {
        self.record("vkDestroySemaphore");
    }

    unsafe fn create_fence(&self, info: &vk::FenceCreateInfo<'_>) -> VkResult<vk::Fence> {
        self.record("vkCreateFence");
        let fence = self.handle();
        if info.flags.contains(vk::FenceCreateFlags::SIGNALED) {
            self.signaled_fences.borrow_mut().insert(fence);
        }
        Ok(fence)
    }

    unsafe fn destroy_fence(&self, fence: vk::Fence) {
        self.record("vkDestroyFence");
        self.signaled_fences.borrow_mut().remove(&fence);
    }

    unsafe fn wait_for_fences(
        &self,
        fences: &[vk::Fence],
        _wait_all: bool,
        _timeout_ns: u64,
    ) -> VkResult<()> {
        self.record("vkWaitForFences");
        let signaled = self.signaled_fences.borrow();
        if fences.iter().all(|f| signaled.contains(f)) {
            Ok(())
        } else {
            Err(vk::Result::TIMEOUT)
        }
    }

    unsafe fn reset_fences(&self, fences: &[vk::Fence]) -> VkResult<()> {
        self.record("vkResetFences");
        let mut signaled = self.signaled_fences.borrow_mut();
        for fence in fences {
            signaled.remove(fence);
        }
        Ok(())
    }

    unsafe fn create_command_pool(
        &self,
        _info: &vk::CommandPoolCreateInfo<'_>,
    ) -> VkResult<vk::CommandPool> {
        self.record("vkCreateCommandPool");
        Ok(self.handle())
    }

    unsafe fn destroy_command_pool(&self, _pool: vk::CommandPool) {
        self.record("vkDestroyCommandPool");
    }

    unsafe fn reset_command_pool(
        &self,
        _pool: vk::CommandPool,
        _flags: vk::CommandPoolResetFlags,
    ) -> VkResult<()> {
        self.record("vkResetCommandPool");
        Ok(())
    }

    unsafe fn allocate_command_buffers(
        &self,
        info: &vk::CommandBufferAllocateInfo<'_>,
    ) -> VkResult<Vec<vk::CommandBuffer>> {
        self.record("vkAllocateCommandBuffers");
        Ok((0..info.command_buffer_count).map(|_| self.handle()).collect())
    }

    unsafe fn free_command_buffers(&self, _pool: vk::CommandPool, _buffers: &[vk::CommandBuffer]) {
        self.record("vkFreeCommandBuffers");
    }

    unsafe fn reset_command_buffer(
        &self,
        _cmd: vk::CommandBuffer,
        _flags: vk::CommandBufferResetFlags,
    ) -> VkResult<()> {
        self.record("vkResetCommandBuffer");
        Ok(())
    }

    unsafe fn begin_command_buffer(
        &self,
        _cmd: vk::CommandBuffer,
        _info: &vk::CommandBufferBeginInfo<'_>,
    ) -> VkResult<()> {
        self.record("vkBeginCommandBuffer");
        Ok(())
    }

    unsafe fn end_command_buffer(&self, _cmd: vk::CommandBuffer) -> VkResult<()> {
        self.record("vkEndCommandBuffer");
        Ok(())
    }

    unsafe fn queue_submit(
        &self,
        _queue: vk::Queue,
        submits: &[vk::SubmitInfo<'_>],
        fence: vk::Fence,
    ) -> VkResult<()> {
        self.record("vkQueueSubmit");
        for submit in submits {
            self.submit_signals.borrow_mut().extend_from_slice(raw_slice(
                submit.p_signal_semaphores,
                submit.signal_semaphore_count,
            ));
        }
        // The fake GPU finishes instantly
        if fence != vk::Fence::null() {
            self.signaled_fences.borrow_mut().insert(fence);
        }
        Ok(())
    }

    unsafe fn queue_wait_idle(&self, _queue: vk::Queue) -> VkResult<()> {
        self.record("vkQueueWaitIdle");
        Ok(())
    }

    unsafe fn cmd_begin_render_pass(
        &self,
        _cmd: vk::CommandBuffer,
        _info: &vk::RenderPassBeginInfo<'_>,
        _contents: vk::SubpassContents,
    ) {
        self.record("vkCmdBeginRenderPass");
    }

    unsafe fn cmd_end_render_pass(&self, _cmd: vk::CommandBuffer) {
        self.record("vkCmdEndRenderPass");
    }

    unsafe fn cmd_set_viewport(
        &self,
        _cmd: vk::CommandBuffer,
        _first_viewport: u32,
        _viewports: &[vk::Viewport],
    ) {
        self.record("vkCmdSetViewport");
    }

    unsafe fn cmd_set_scissor(
        &self,
        _cmd: vk::CommandBuffer,
        _first_scissor: u32,
        _scissors: &[vk::Rect2D],
    ) {
        self.record("vkCmdSetScissor");
    }

    unsafe fn cmd_bind_pipeline(
        &self,
        _cmd: vk::CommandBuffer,
        _bind_point: vk::PipelineBindPoint,
        _pipeline: vk::Pipeline,
    ) {
        self.record("vkCmdBindPipeline");
    }

    unsafe fn cmd_bind_descriptor_sets(
        &self,
        _cmd: vk::CommandBuffer,
        _bind_point: vk::PipelineBindPoint,
        _layout: vk::PipelineLayout,
        _first_set: u32,
        _sets: &[vk::DescriptorSet],
        _dynamic_offsets: &[u32],
    ) {
        self.record("vkCmdBindDescriptorSets");
    }

    unsafe fn cmd_bind_vertex_buffers(
        &self,
        _cmd: vk::CommandBuffer,
        _first_binding: u32,
        _buffers: &[vk::Buffer],
        _offsets: &[vk::DeviceSize],
    ) {
        self.record("vkCmdBindVertexBuffers");
    }

    unsafe fn cmd_bind_index_buffer(
        &self,
        _cmd: vk::CommandBuffer,
        _buffer: vk::Buffer,
        _offset: vk::DeviceSize,
        _index_type: vk::IndexType,
    ) {
        self.record("vkCmdBindIndexBuffer");
    }

    unsafe fn cmd_draw(
        &self,
        _cmd: vk::CommandBuffer,
        _vertex_count: u32,
        _instance_count: u32,
        _first_vertex: u32,
        _first_instance: u32,
    ) {
        self.record("vkCmdDraw");
    }

    unsafe fn cmd_draw_indexed(
        &self,
        _cmd: vk::CommandBuffer,
        _index_count: u32,
        _instance_count: u32,
        _first_index: u32,
        _vertex_offset: i32,
        _first_instance: u32,
    ) {
        self.record("vkCmdDrawIndexed");
    }

    unsafe fn cmd_pipeline_barrier(
        &self,
        _cmd: vk::CommandBuffer,
        _src_stage: vk::PipelineStageFlags,
        _dst_stage: vk::PipelineStageFlags,
        _dependency_flags: vk::DependencyFlags,
        _memory_barriers: &[vk::MemoryBarrier<'_>],
        _buffer_barriers: &[vk::BufferMemoryBarrier<'_>],
        _image_barriers: &[vk::ImageMemoryBarrier<'_>],
    ) {
        self.record("vkCmdPipelineBarrier");
    }

    unsafe fn cmd_copy_buffer_to_image(
        &self,
        _cmd: vk::CommandBuffer,
        _buffer: vk::Buffer,
        _image: vk::Image,
        _image_layout: vk::ImageLayout,
        _regions: &[vk::BufferImageCopy],
    ) {
        self.record("vkCmdCopyBufferToImage");
    }

    unsafe fn cmd_copy_image_to_buffer(
        &self,
        _cmd: vk::CommandBuffer,
        _image: vk::Image,
        _image_layout: vk::ImageLayout,
        _buffer: vk::Buffer,
        _regions: &[vk::BufferImageCopy],
    ) {
        self.record("vkCmdCopyImageToBuffer");
    }
}

/// View a Vulkan `(pointer, count)` pair, tolerating a null pointer when empty.
unsafe fn raw_slice<'a, T>(ptr: *const T, count: u32) -> &'a [T] {
    if count == 0 || ptr.is_null() {
        &[]
    } else {
        std::slice::from_raw_parts(ptr, count as usize)
    }
}

/// Deterministic pseudo-random sequence for property-style loops.
pub struct Lcg(u64);

impl Lcg {
    pub const fn new(seed: u64) -> Self {
        Self(seed)
    }

    pub fn next_u64(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        self.0 >> 33
    }

    /// Uniform-ish value in `0..bound`.
    pub fn below(&mut self, bound: u64) -> u64 {
        self.next_u64() % bound
    }
}
