//! GPU context: instance, surface, physical and logical device.

use crate::capabilities::GpuCapabilities;
use crate::config::RendererConfig;
use crate::debug::DebugMessenger;
use crate::device::DeviceApi;
use crate::error::{GpuError, Result};
use crate::instance::{create_instance, device_type_score};
use crate::surface::{create_surface, SurfaceSupport};
use crate::swapchain::PresentMode;
use ash::prelude::VkResult;
use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::{c_char, c_void, CStr};

/// Device extensions every candidate must support.
fn required_device_extensions() -> [&'static CStr; 1] {
    [ash::khr::swapchain::NAME]
}

/// First queue family with graphics support that can also present.
pub fn find_graphics_present_family(
    families: &[vk::QueueFamilyProperties],
    mut can_present: impl FnMut(u32) -> bool,
) -> Option<u32> {
    families
        .iter()
        .enumerate()
        .filter(|(_, family)| {
            family.queue_count > 0 && family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
        })
        .map(|(index, _)| index as u32)
        .find(|&index| can_present(index))
}

/// A physical device that passed selection.
struct Candidate {
    physical_device: vk::PhysicalDevice,
    queue_family: u32,
    score: u32,
}

/// The GPU context.
///
/// Owns every instance- and device-level object. All other resources are
/// created from it and must be destroyed before it is dropped.
pub struct Device {
    // Keeps the loaded library alive
    #[allow(dead_code)]
    entry: ash::Entry,
    instance: ash::Instance,
    debug_messenger: Option<DebugMessenger>,
    surface_loader: ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
    physical_device: vk::PhysicalDevice,
    device: ash::Device,
    swapchain_loader: ash::khr::swapchain::Device,
    queue_family: u32,
    queue: vk::Queue,
    capabilities: GpuCapabilities,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
}

impl Device {
    /// The `ash` device, for pipelines, samplers, descriptors and commands.
    pub const fn device(&self) -> &ash::Device {
        &self.device
    }

    pub const fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    pub const fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// The graphics queue, also used for presentation.
    pub const fn queue(&self) -> vk::Queue {
        self.queue
    }

    pub const fn queue_family(&self) -> u32 {
        self.queue_family
    }

    pub const fn capabilities(&self) -> &GpuCapabilities {
        &self.capabilities
    }

    /// Wait for the device to be idle.
    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.device_wait_idle() }.map_err(GpuError::call("vkDeviceWaitIdle"))
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("device_name", &self.capabilities.device_name)
            .field("queue_family", &self.queue_family)
            .field("validation", &self.debug_messenger.is_some())
            .finish_non_exhaustive()
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                tracing::warn!(error = %e, "Wait idle failed during device teardown");
            }
            self.device.destroy_device(None);
            self.surface_loader.destroy_surface(self.surface, None);
            if let Some(messenger) = self.debug_messenger.take() {
                messenger.destroy();
            }
            self.instance.destroy_instance(None);
        }
        tracing::debug!("Destroyed GPU context");
    }
}

impl DeviceApi for Device {
    fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.memory_properties
    }

    fn non_coherent_atom_size(&self) -> vk::DeviceSize {
        self.capabilities.non_coherent_atom_size
    }

    fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    fn graphics_queue(&self) -> vk::Queue {
        self.queue
    }

    fn graphics_queue_family(&self) -> u32 {
        self.queue_family
    }

    unsafe fn allocate_memory(
        &self,
        info: &vk::MemoryAllocateInfo<'_>,
    ) -> VkResult<vk::DeviceMemory> {
        self.device.allocate_memory(info, None)
    }

    unsafe fn free_memory(&self, memory: vk::DeviceMemory) {
        self.device.free_memory(memory, None);
    }

    unsafe fn bind_buffer_memory(
        &self,
        buffer: vk::Buffer,
        memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
    ) -> VkResult<()> {
        self.device.bind_buffer_memory(buffer, memory, offset)
    }

    unsafe fn bind_image_memory(
        &self,
        image: vk::Image,
        memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
    ) -> VkResult<()> {
        self.device.bind_image_memory(image, memory, offset)
    }

    unsafe fn map_memory(
        &self,
        memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
        size: vk::DeviceSize,
    ) -> VkResult<*mut c_void> {
        self.device
            .map_memory(memory, offset, size, vk::MemoryMapFlags::empty())
    }

    unsafe fn unmap_memory(&self, memory: vk::DeviceMemory) {
        self.device.unmap_memory(memory);
    }

    unsafe fn flush_mapped_memory_ranges(
        &self,
        ranges: &[vk::MappedMemoryRange<'_>],
    ) -> VkResult<()> {
        self.device.flush_mapped_memory_ranges(ranges)
    }

    unsafe fn invalidate_mapped_memory_ranges(
        &self,
        ranges: &[vk::MappedMemoryRange<'_>],
    ) -> VkResult<()> {
        self.device.invalidate_mapped_memory_ranges(ranges)
    }

    unsafe fn create_buffer(&self, info: &vk::BufferCreateInfo<'_>) -> VkResult<vk::Buffer> {
        self.device.create_buffer(info, None)
    }

    unsafe fn destroy_buffer(&self, buffer: vk::Buffer) {
        self.device.destroy_buffer(buffer, None);
    }

    unsafe fn buffer_memory_requirements(&self, buffer: vk::Buffer) -> vk::MemoryRequirements {
        self.device.get_buffer_memory_requirements(buffer)
    }

    unsafe fn create_image(&self, info: &vk::ImageCreateInfo<'_>) -> VkResult<vk::Image> {
        self.device.create_image(info, None)
    }

    unsafe fn destroy_image(&self, image: vk::Image) {
        self.device.destroy_image(image, None);
    }

    unsafe fn image_memory_requirements(&self, image: vk::Image) -> vk::MemoryRequirements {
        self.device.get_image_memory_requirements(image)
    }

    unsafe fn create_image_view(
        &self,
        info: &vk::ImageViewCreateInfo<'_>,
    ) -> VkResult<vk::ImageView> {
        self.device.create_image_view(info, None)
    }

    unsafe fn destroy_image_view(&self, view: vk::ImageView) {
        self.device.destroy_image_view(view, None);
    }

    unsafe fn create_render_pass(
        &self,
        info: &vk::RenderPassCreateInfo<'_>,
    ) -> VkResult<vk::RenderPass> {
        self.device.create_render_pass(info, None)
    }

    unsafe fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        self.device.destroy_render_pass(render_pass, None);
    }

    unsafe fn create_framebuffer(
        &self,
        info: &vk::FramebufferCreateInfo<'_>,
    ) -> VkResult<vk::Framebuffer> {
        self.device.create_framebuffer(info, None)
    }

    unsafe fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        self.device.destroy_framebuffer(framebuffer, None);
    }

    unsafe fn surface_capabilities(&self) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        self.surface_loader
            .get_physical_device_surface_capabilities(self.physical_device, self.surface)
    }

    unsafe fn surface_formats(&self) -> VkResult<Vec<vk::SurfaceFormatKHR>> {
        self.surface_loader
            .get_physical_device_surface_formats(self.physical_device, self.surface)
    }

    unsafe fn surface_present_modes(&self) -> VkResult<Vec<vk::PresentModeKHR>> {
        self.surface_loader
            .get_physical_device_surface_present_modes(self.physical_device, self.surface)
    }

    unsafe fn create_swapchain(
        &self,
        info: &vk::SwapchainCreateInfoKHR<'_>,
    ) -> VkResult<vk::SwapchainKHR> {
        self.swapchain_loader.create_swapchain(info, None)
    }

    unsafe fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        self.swapchain_loader.destroy_swapchain(swapchain, None);
    }

    unsafe fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        self.swapchain_loader.get_swapchain_images(swapchain)
    }

    unsafe fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        timeout_ns: u64,
        semaphore: vk::Semaphore,
    ) -> VkResult<(u32, bool)> {
        self.swapchain_loader
            .acquire_next_image(swapchain, timeout_ns, semaphore, vk::Fence::null())
    }

    unsafe fn queue_present(&self, info: &vk::PresentInfoKHR<'_>) -> VkResult<bool> {
        self.swapchain_loader.queue_present(self.queue, info)
    }

    unsafe fn device_wait_idle(&self) -> VkResult<()> {
        self.device.device_wait_idle()
    }

    unsafe fn create_semaphore(
        &self,
        info: &vk::SemaphoreCreateInfo<'_>,
    ) -> VkResult<vk::Semaphore> {
        self.device.create_semaphore(info, None)
    }

    unsafe fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        self.device.destroy_semaphore(semaphore, None);
    }

    unsafe fn create_fence(&self, info: &vk::FenceCreateInfo<'_>) -> VkResult<vk::Fence> {
        self.device.create_fence(info, None)
    }

    unsafe fn destroy_fence(&self, fence: vk::Fence) {
        self.device.destroy_fence(fence, None);
    }

    unsafe fn wait_for_fences(
        &self,
        fences: &[vk::Fence],
        wait_all: bool,
        timeout_ns: u64,
    ) -> VkResult<()> {
        self.device.wait_for_fences(fences, wait_all, timeout_ns)
    }

    unsafe fn reset_fences(&self, fences: &[vk::Fence]) -> VkResult<()> {
        self.device.reset_fences(fences)
    }

    unsafe fn create_command_pool(
        &self,
        info: &vk::CommandPoolCreateInfo<'_>,
    ) -> VkResult<vk::CommandPool> {
        self.device.create_command_pool(info, None)
    }

    unsafe fn destroy_command_pool(&self, pool: vk::CommandPool) {
        self.device.destroy_command_pool(pool, None);
    }

    unsafe fn reset_command_pool(
        &self,
        pool: vk::CommandPool,
        flags: vk::CommandPoolResetFlags,
    ) -> VkResult<()> {
        self.device.reset_command_pool(pool, flags)
    }

    unsafe fn allocate_command_buffers(
        &self,
        info: &vk::CommandBufferAllocateInfo<'_>,
    ) -> VkResult<Vec<vk::CommandBuffer>> {
        self.device.allocate_command_buffers(info)
    }

    unsafe fn free_command_buffers(&self, pool: vk::CommandPool, buffers: &[vk::CommandBuffer]) {
        self.device.free_command_buffers(pool, buffers);
    }

    unsafe fn reset_command_buffer(
        &self,
        cmd: vk::CommandBuffer,
        flags: vk::CommandBufferResetFlags,
    ) -> VkResult<()> {
        self.device.reset_command_buffer(cmd, flags)
    }

    unsafe fn begin_command_buffer(
        &self,
        cmd: vk::CommandBuffer,
        info: &vk::CommandBufferBeginInfo<'_>,
    ) -> VkResult<()> {
        self.device.begin_command_buffer(cmd, info)
    }

    unsafe fn end_command_buffer(&self, cmd: vk::CommandBuffer) -> VkResult<()> {
        self.device.end_command_buffer(cmd)
    }

    unsafe fn queue_submit(
        &self,
        queue: vk::Queue,
        submits: &[vk::SubmitInfo<'_>],
        fence: vk::Fence,
    ) -> VkResult<()> {
        self.device.queue_submit(queue, submits, fence)
    }

    unsafe fn queue_wait_idle(&self, queue: vk::Queue) -> VkResult<()> {
        self.device.queue_wait_idle(queue)
    }

    unsafe fn cmd_begin_render_pass(
        &self,
        cmd: vk::CommandBuffer,
        info: &vk::RenderPassBeginInfo<'_>,
        contents: vk::SubpassContents,
    ) {
        self.device.cmd_begin_render_pass(cmd, info, contents);
    }

    unsafe fn cmd_end_render_pass(&self, cmd: vk::CommandBuffer) {
        self.device.cmd_end_render_pass(cmd);
    }

    unsafe fn cmd_set_viewport(
        &self,
        cmd: vk::CommandBuffer,
        first_viewport: u32,
        viewports: &[vk::Viewport],
    ) {
        self.device.cmd_set_viewport(cmd, first_viewport, viewports);
    }

    unsafe fn cmd_set_scissor(
        &self,
        cmd: vk::CommandBuffer,
        first_scissor: u32,
        scissors: &[vk::Rect2D],
    ) {
        self.device.cmd_set_scissor(cmd, first_scissor, scissors);
    }

    unsafe fn cmd_bind_pipeline(
        &self,
        cmd: vk::CommandBuffer,
        bind_point: vk::PipelineBindPoint,
        pipeline: vk::Pipeline,
    ) {
        self.device.cmd_bind_pipeline(cmd, bind_point, pipeline);
    }

    unsafe fn cmd_bind_descriptor_sets(
        &self,
        cmd: vk::CommandBuffer,
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        first_set: u32,
        sets: &[vk::DescriptorSet],
        dynamic_offsets: &[u32],
    ) {
        self.device
            .cmd_bind_descriptor_sets(cmd, bind_point, layout, first_set, sets, dynamic_offsets);
    }

    unsafe fn cmd_bind_vertex_buffers(
        &self,
        cmd: vk::CommandBuffer,
        first_binding: u32,
        buffers: &[vk::Buffer],
        offsets: &[vk::DeviceSize],
    ) {
        self.device
            .cmd_bind_vertex_buffers(cmd, first_binding, buffers, offsets);
    }

    unsafe fn cmd_bind_index_buffer(
        &self,
        cmd: vk::CommandBuffer,
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        index_type: vk::IndexType,
    ) {
        self.device
            .cmd_bind_index_buffer(cmd, buffer, offset, index_type);
    }

    unsafe fn cmd_draw(
        &self,
        cmd: vk::CommandBuffer,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) {
        self.device
            .cmd_draw(cmd, vertex_count, instance_count, first_vertex, first_instance);
    }

    unsafe fn cmd_draw_indexed(
        &self,
        cmd: vk::CommandBuffer,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) {
        self.device.cmd_draw_indexed(
            cmd,
            index_count,
            instance_count,
            first_index,
            vertex_offset,
            first_instance,
        );
    }

    unsafe fn cmd_pipeline_barrier(
        &self,
        cmd: vk::CommandBuffer,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        dependency_flags: vk::DependencyFlags,
        memory_barriers: &[vk::MemoryBarrier<'_>],
        buffer_barriers: &[vk::BufferMemoryBarrier<'_>],
        image_barriers: &[vk::ImageMemoryBarrier<'_>],
    ) {
        self.device.cmd_pipeline_barrier(
            cmd,
            src_stage,
            dst_stage,
            dependency_flags,
            memory_barriers,
            buffer_barriers,
            image_barriers,
        );
    }

    unsafe fn cmd_copy_buffer_to_image(
        &self,
        cmd: vk::CommandBuffer,
        buffer: vk::Buffer,
        image: vk::Image,
        image_layout: vk::ImageLayout,
        regions: &[vk::BufferImageCopy],
    ) {
        self.device
            .cmd_copy_buffer_to_image(cmd, buffer, image, image_layout, regions);
    }

    unsafe fn cmd_copy_image_to_buffer(
        &self,
        cmd: vk::CommandBuffer,
        image: vk::Image,
        image_layout: vk::ImageLayout,
        buffer: vk::Buffer,
        regions: &[vk::BufferImageCopy],
    ) {
        self.device
            .cmd_copy_image_to_buffer(cmd, image, image_layout, buffer, regions);
    }
}

/// Builder for a [`Device`].
pub struct DeviceBuilder {
    app_name: String,
    enable_validation: bool,
    present_mode: PresentMode,
}

impl Default for DeviceBuilder {
    fn default() -> Self {
        Self {
            app_name: "quill".to_string(),
            enable_validation: cfg!(debug_assertions),
            present_mode: PresentMode::Fifo,
        }
    }
}

impl DeviceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take name, validation and present mode from a renderer config.
    pub fn from_config(config: &RendererConfig) -> Self {
        Self {
            app_name: config.app_name.clone(),
            enable_validation: config.validation,
            present_mode: config.present_mode,
        }
    }

    /// Set the application name.
    #[must_use]
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Enable or disable validation layers.
    #[must_use]
    pub fn validation(mut self, enable: bool) -> Self {
        self.enable_validation = enable;
        self
    }

    /// Present mode the surface is checked against during device selection.
    #[must_use]
    pub fn present_mode(mut self, mode: PresentMode) -> Self {
        self.present_mode = mode;
        self
    }

    /// Build the GPU context presenting to `window`.
    ///
    /// The window must outlive the returned device.
    pub fn build<W>(self, window: &W) -> Result<Device>
    where
        W: HasDisplayHandle + HasWindowHandle,
    {
        let entry = unsafe { ash::Entry::load() }
            .map_err(|e| GpuError::Other(format!("Failed to load Vulkan: {e}")))?;

        let display = window
            .display_handle()
            .map_err(|e| GpuError::SurfaceCreation(format!("Failed to get display handle: {e}")))?
            .as_raw();

        let instance =
            unsafe { create_instance(&entry, &self.app_name, self.enable_validation, display) }?;

        let debug_messenger = if self.enable_validation {
            match unsafe { DebugMessenger::new(&entry, &instance) } {
                Ok(messenger) => Some(messenger),
                Err(e) => {
                    tracing::warn!(error = %e, "Debug messenger unavailable");
                    None
                }
            }
        } else {
            None
        };

        let destroy_instance = |messenger: Option<DebugMessenger>| unsafe {
            if let Some(messenger) = messenger {
                messenger.destroy();
            }
            instance.destroy_instance(None);
        };

        let surface = match unsafe { create_surface(&entry, &instance, window) } {
            Ok(surface) => surface,
            Err(e) => {
                destroy_instance(debug_messenger);
                return Err(e);
            }
        };
        let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);

        let opened = unsafe { self.open_device(&instance, &surface_loader, surface) };
        let (candidate, device) = match opened {
            Ok(selected) => selected,
            Err(e) => {
                unsafe { surface_loader.destroy_surface(surface, None) };
                destroy_instance(debug_messenger);
                return Err(e);
            }
        };

        let physical_device = candidate.physical_device;
        let queue_family = candidate.queue_family;
        let queue = unsafe { device.get_device_queue(queue_family, 0) };
        let swapchain_loader = ash::khr::swapchain::Device::new(&instance, &device);
        let capabilities = unsafe { GpuCapabilities::query(&instance, physical_device) };
        let memory_properties =
            unsafe { instance.get_physical_device_memory_properties(physical_device) };

        tracing::info!(queue_family, "Selected GPU: {}", capabilities.summary());

        Ok(Device {
            entry,
            instance,
            debug_messenger,
            surface_loader,
            surface,
            physical_device,
            device,
            swapchain_loader,
            queue_family,
            queue,
            capabilities,
            memory_properties,
        })
    }

    /// Select a physical device and create the logical device on it.
    unsafe fn open_device(
        &self,
        instance: &ash::Instance,
        surface_loader: &ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
    ) -> Result<(Candidate, ash::Device)> {
        let candidate = self.select_physical_device(instance, surface_loader, surface)?;
        let device = create_logical_device(instance, &candidate)?;
        Ok((candidate, device))
    }

    /// Pick the best device that can present to `surface`.
    ///
    /// # Safety
    /// All handles must be valid.
    unsafe fn select_physical_device(
        &self,
        instance: &ash::Instance,
        surface_loader: &ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
    ) -> Result<Candidate> {
        let physical_devices = instance
            .enumerate_physical_devices()
            .map_err(GpuError::call("vkEnumeratePhysicalDevices"))?;

        let mut best: Option<Candidate> = None;
        for physical_device in physical_devices {
            let Some(candidate) =
                self.evaluate_device(instance, surface_loader, surface, physical_device)
            else {
                continue;
            };
            if best.as_ref().map_or(true, |b| candidate.score > b.score) {
                best = Some(candidate);
            }
        }

        best.ok_or(GpuError::NoSuitableDevice)
    }

    /// `None` when the device cannot drive a swapchain on `surface`.
    unsafe fn evaluate_device(
        &self,
        instance: &ash::Instance,
        surface_loader: &ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
        physical_device: vk::PhysicalDevice,
    ) -> Option<Candidate> {
        let properties = instance.get_physical_device_properties(physical_device);
        let name = properties
            .device_name_as_c_str()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let extensions = instance
            .enumerate_device_extension_properties(physical_device)
            .ok()?;
        for required in required_device_extensions() {
            let found = extensions
                .iter()
                .any(|ext| ext.extension_name_as_c_str().ok() == Some(required));
            if !found {
                tracing::debug!(device = %name, extension = ?required, "Missing device extension");
                return None;
            }
        }

        let families = instance.get_physical_device_queue_family_properties(physical_device);
        let queue_family = find_graphics_present_family(&families, |index| {
            surface_loader
                .get_physical_device_surface_support(physical_device, index, surface)
                .unwrap_or(false)
        });
        let Some(queue_family) = queue_family else {
            tracing::debug!(device = %name, "No queue family can present");
            return None;
        };

        let support = SurfaceSupport::query(surface_loader, physical_device, surface).ok()?;
        if !support.is_adequate(self.present_mode) {
            tracing::debug!(device = %name, "Surface format or present modes unsupported");
            return None;
        }

        let score = device_type_score(properties.device_type);
        tracing::debug!(device = %name, score, "Candidate GPU");
        Some(Candidate {
            physical_device,
            queue_family,
            score,
        })
    }
}

/// # Safety
/// The instance and physical device must be valid.
unsafe fn create_logical_device(
    instance: &ash::Instance,
    candidate: &Candidate,
) -> Result<ash::Device> {
    let queue_priority = [1.0_f32];
    let queue_create_info = vk::DeviceQueueCreateInfo::default()
        .queue_family_index(candidate.queue_family)
        .queue_priorities(&queue_priority);

    let extension_names: Vec<*const c_char> = required_device_extensions()
        .iter()
        .map(|ext| ext.as_ptr())
        .collect();

    let supported = instance.get_physical_device_features(candidate.physical_device);
    let features =
        vk::PhysicalDeviceFeatures::default().sampler_anisotropy(supported.sampler_anisotropy == vk::TRUE);

    let create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(std::slice::from_ref(&queue_create_info))
        .enabled_extension_names(&extension_names)
        .enabled_features(&features);

    instance
        .create_device(candidate.physical_device, &create_info, None)
        .map_err(GpuError::call("vkCreateDevice"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    #[test]
    fn graphics_family_must_present() {
        let families = [
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
            family(vk::QueueFlags::GRAPHICS),
        ];
        assert_eq!(find_graphics_present_family(&families, |_| true), Some(1));
        assert_eq!(find_graphics_present_family(&families, |i| i == 2), Some(2));
        // A presenting family without graphics is not enough
        assert_eq!(find_graphics_present_family(&families, |i| i == 0), None);
    }

    #[test]
    fn empty_families_are_skipped() {
        let mut empty = family(vk::QueueFlags::GRAPHICS);
        empty.queue_count = 0;
        assert_eq!(find_graphics_present_family(&[empty], |_| true), None);
    }

    #[test]
    fn builder_takes_config() {
        let config = RendererConfig::new("viewer")
            .with_validation(false)
            .with_present_mode(PresentMode::Mailbox);
        let builder = DeviceBuilder::from_config(&config);
        assert_eq!(builder.app_name, "viewer");
        assert!(!builder.enable_validation);
        assert_eq!(builder.present_mode, PresentMode::Mailbox);
    }

    #[test]
    fn swapchain_extension_is_required() {
        assert_eq!(required_device_extensions(), [ash::khr::swapchain::NAME]);
    }
}
