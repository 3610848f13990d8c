//! Command pools, command buffers and deferred resource release.
//!
//! Resources referenced by a recorded command buffer must outlive its
//! execution. They are attached to the buffer with
//! [`CommandBuffer::add_resource`] or [`CommandBuffer::add_cleanup`] and
//! released in [`CommandBuffer::release_resources`], which the owner calls
//! once the GPU is known to be done with the buffer (after a fence wait).

use crate::device::DeviceApi;
use crate::error::{GpuError, Result};
use ash::vk;
use std::any::Any;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Pool owning the frame command buffers and one-time upload buffers of a
/// single queue family.
#[derive(Debug)]
pub struct CommandPool {
    pool: vk::CommandPool,
    queue_family: u32,
}

impl CommandPool {
    /// Pool for `queue_family`. The frame loop passes
    /// `RESET_COMMAND_BUFFER` so each slot's buffer can be reset on its own.
    ///
    /// # Safety
    /// The device must be valid and the queue family must exist.
    pub unsafe fn new(
        device: &impl DeviceApi,
        queue_family: u32,
        flags: vk::CommandPoolCreateFlags,
    ) -> Result<Self> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family)
            .flags(flags);

        let pool = device
            .create_command_pool(&create_info)
            .map_err(GpuError::call("vkCreateCommandPool"))?;

        Ok(Self { pool, queue_family })
    }

    pub const fn handle(&self) -> vk::CommandPool {
        self.pool
    }

    /// Family the pool's buffers must be submitted to.
    pub const fn queue_family(&self) -> u32 {
        self.queue_family
    }

    /// Allocate primary command buffers.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn allocate(&self, device: &impl DeviceApi, count: u32) -> Result<Vec<CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        let buffers = device
            .allocate_command_buffers(&alloc_info)
            .map_err(GpuError::call("vkAllocateCommandBuffers"))?;
        Ok(buffers.into_iter().map(CommandBuffer::from_raw).collect())
    }

    /// Record and run a command buffer, blocking until the queue is idle.
    ///
    /// Used for uploads and other setup work outside the frame loop.
    ///
    /// # Safety
    /// All handles must be valid.
    pub unsafe fn execute_one_time<F>(
        &self,
        device: &impl DeviceApi,
        queue: vk::Queue,
        record: F,
    ) -> Result<()>
    where
        F: FnOnce(&mut CommandBuffer) -> Result<()>,
    {
        let mut buffers = self.allocate(device, 1)?;
        let Some(mut cmd) = buffers.pop() else {
            return Err(GpuError::Other("no command buffer allocated".into()));
        };

        let result = record_and_submit(device, queue, &mut cmd, record);

        cmd.release_resources();
        device.free_command_buffers(self.pool, &[cmd.handle()]);
        result
    }

    /// Return every buffer allocated from the pool to the initial state.
    ///
    /// # Safety
    /// No buffer of the pool may be pending on the GPU.
    pub unsafe fn reset(&self, device: &impl DeviceApi, flags: vk::CommandPoolResetFlags) -> Result<()> {
        device
            .reset_command_pool(self.pool, flags)
            .map_err(GpuError::call("vkResetCommandPool"))
    }

    /// Frees the buffers still allocated from the pool along with it.
    ///
    /// # Safety
    /// No buffer of the pool may be pending on the GPU.
    pub unsafe fn destroy(&self, device: &impl DeviceApi) {
        device.destroy_command_pool(self.pool);
    }
}

unsafe fn record_and_submit<F>(
    device: &impl DeviceApi,
    queue: vk::Queue,
    cmd: &mut CommandBuffer,
    record: F,
) -> Result<()>
where
    F: FnOnce(&mut CommandBuffer) -> Result<()>,
{
    cmd.begin(device)?;
    record(cmd)?;
    cmd.end(device)?;
    cmd.submit(device, queue)
}

/// FIFO of disposers, each run exactly once.
#[derive(Default)]
pub struct CleanupQueue {
    pending: VecDeque<Box<dyn FnOnce()>>,
}

impl CleanupQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, cleanup: impl FnOnce() + 'static) {
        self.pending.push_back(Box::new(cleanup));
    }

    /// Run and remove every queued disposer, oldest first.
    pub fn run_all(&mut self) {
        while let Some(cleanup) = self.pending.pop_front() {
            cleanup();
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl std::fmt::Debug for CleanupQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CleanupQueue")
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl Drop for CleanupQueue {
    fn drop(&mut self) {
        if !self.pending.is_empty() {
            tracing::debug!(pending = self.pending.len(), "Running leftover cleanups");
            self.run_all();
        }
    }
}

/// Recording state of a command buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandBufferState {
    #[default]
    Idle,
    Recording,
    Recorded,
    Submitted,
}

/// Image layout transition parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageTransition {
    pub src_access: vk::AccessFlags,
    pub dst_access: vk::AccessFlags,
    pub src_stage: vk::PipelineStageFlags,
    pub dst_stage: vk::PipelineStageFlags,
    pub old_layout: vk::ImageLayout,
    pub new_layout: vk::ImageLayout,
}

impl ImageTransition {
    /// Fresh image about to receive a transfer.
    pub const UPLOAD: Self = Self {
        src_access: vk::AccessFlags::empty(),
        dst_access: vk::AccessFlags::TRANSFER_WRITE,
        src_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
        dst_stage: vk::PipelineStageFlags::TRANSFER,
        old_layout: vk::ImageLayout::UNDEFINED,
        new_layout: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
    };

    /// Transferred image about to be sampled in fragment shaders.
    pub const SHADER_READ: Self = Self {
        src_access: vk::AccessFlags::TRANSFER_WRITE,
        dst_access: vk::AccessFlags::SHADER_READ,
        src_stage: vk::PipelineStageFlags::TRANSFER,
        dst_stage: vk::PipelineStageFlags::FRAGMENT_SHADER,
        old_layout: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        new_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
    };

    /// Color barrier over the whole single-mip, single-layer image.
    pub fn barrier(&self, image: vk::Image) -> vk::ImageMemoryBarrier<'static> {
        vk::ImageMemoryBarrier::default()
            .src_access_mask(self.src_access)
            .dst_access_mask(self.dst_access)
            .old_layout(self.old_layout)
            .new_layout(self.new_layout)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(color_subresource_range())
    }
}

const fn color_subresource_range() -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    }
}

/// Copy region between a buffer and the color aspect of an image.
///
/// `row_length` is in texels, zero meaning tightly packed.
pub fn buffer_image_copy(
    buffer_offset: vk::DeviceSize,
    row_length: u32,
    region: vk::Rect2D,
) -> vk::BufferImageCopy {
    vk::BufferImageCopy {
        buffer_offset,
        buffer_row_length: row_length,
        buffer_image_height: 0,
        image_subresource: vk::ImageSubresourceLayers {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            mip_level: 0,
            base_array_layer: 0,
            layer_count: 1,
        },
        image_offset: vk::Offset3D {
            x: region.offset.x,
            y: region.offset.y,
            z: 0,
        },
        image_extent: vk::Extent3D {
            width: region.extent.width,
            height: region.extent.height,
            depth: 1,
        },
    }
}

/// A primary command buffer with its recording state and the resources
/// its recorded commands keep alive.
#[derive(Debug)]
pub struct CommandBuffer {
    cmd: vk::CommandBuffer,
    state: CommandBufferState,
    cleanups: CleanupQueue,
}

impl CommandBuffer {
    pub(crate) fn from_raw(cmd: vk::CommandBuffer) -> Self {
        Self {
            cmd,
            state: CommandBufferState::Idle,
            cleanups: CleanupQueue::new(),
        }
    }

    pub const fn handle(&self) -> vk::CommandBuffer {
        self.cmd
    }

    pub const fn state(&self) -> CommandBufferState {
        self.state
    }

    fn transition(&mut self, expected: CommandBufferState, next: CommandBufferState) {
        debug_assert_eq!(self.state, expected, "command buffer in wrong state");
        self.state = next;
    }

    /// Begin one-time-submit recording.
    ///
    /// # Safety
    /// The device must be valid and the buffer idle on the GPU.
    pub unsafe fn begin(&mut self, device: &impl DeviceApi) -> Result<()> {
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        device
            .begin_command_buffer(self.cmd, &begin_info)
            .map_err(GpuError::call("vkBeginCommandBuffer"))?;
        self.transition(CommandBufferState::Idle, CommandBufferState::Recording);
        Ok(())
    }

    /// # Safety
    /// The device must be valid.
    pub unsafe fn end(&mut self, device: &impl DeviceApi) -> Result<()> {
        device
            .end_command_buffer(self.cmd)
            .map_err(GpuError::call("vkEndCommandBuffer"))?;
        self.transition(CommandBufferState::Recording, CommandBufferState::Recorded);
        Ok(())
    }

    /// Submit and block until the queue is idle. Attached resources are
    /// released once the queue drains.
    ///
    /// # Safety
    /// The device and queue must be valid.
    pub unsafe fn submit(&mut self, device: &impl DeviceApi, queue: vk::Queue) -> Result<()> {
        self.submit_with_fence(device, queue, vk::Fence::null())?;
        device
            .queue_wait_idle(queue)
            .map_err(GpuError::call("vkQueueWaitIdle"))?;
        self.release_resources();
        Ok(())
    }

    /// Submit without waiting. `fence` is signaled on completion.
    ///
    /// # Safety
    /// The device, queue and fence must be valid.
    pub unsafe fn submit_with_fence(
        &mut self,
        device: &impl DeviceApi,
        queue: vk::Queue,
        fence: vk::Fence,
    ) -> Result<()> {
        let cmds = [self.cmd];
        let submit_info = vk::SubmitInfo::default().command_buffers(&cmds);
        device
            .queue_submit(queue, &[submit_info], fence)
            .map_err(GpuError::call("vkQueueSubmit"))?;
        self.transition(CommandBufferState::Recorded, CommandBufferState::Submitted);
        Ok(())
    }

    /// Per-frame submission: wait for `wait_semaphore` at `wait_stage`,
    /// signal `signal_semaphore` and `fence` when done.
    ///
    /// # Safety
    /// All handles must be valid.
    pub unsafe fn submit_frame(
        &mut self,
        device: &impl DeviceApi,
        queue: vk::Queue,
        wait_semaphore: vk::Semaphore,
        wait_stage: vk::PipelineStageFlags,
        signal_semaphore: vk::Semaphore,
        fence: vk::Fence,
    ) -> Result<()> {
        let cmds = [self.cmd];
        let wait_semaphores = [wait_semaphore];
        let wait_stages = [wait_stage];
        let signal_semaphores = [signal_semaphore];
        let submit_info = vk::SubmitInfo::default()
            .command_buffers(&cmds)
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .signal_semaphores(&signal_semaphores);

        device
            .queue_submit(queue, &[submit_info], fence)
            .map_err(GpuError::call("vkQueueSubmit"))?;
        self.transition(CommandBufferState::Recorded, CommandBufferState::Submitted);
        Ok(())
    }

    /// Reset for re-recording and release attached resources.
    ///
    /// # Safety
    /// The device must be valid, the pool must allow individual resets and
    /// the GPU must be done with the buffer.
    pub unsafe fn reset(&mut self, device: &impl DeviceApi) -> Result<()> {
        device
            .reset_command_buffer(self.cmd, vk::CommandBufferResetFlags::empty())
            .map_err(GpuError::call("vkResetCommandBuffer"))?;
        self.release_resources();
        self.state = CommandBufferState::Idle;
        Ok(())
    }

    /// Run all attached cleanups. Call only when the GPU is done with the
    /// buffer.
    pub fn release_resources(&mut self) {
        if !self.cleanups.is_empty() {
            tracing::trace!(count = self.cleanups.len(), "Releasing command buffer resources");
        }
        self.cleanups.run_all();
    }

    /// Keep `resource` alive until the next release.
    pub fn add_resource(&mut self, resource: Arc<dyn Any>) {
        self.cleanups.push(move || drop(resource));
    }

    /// Run `cleanup` at the next release.
    pub fn add_cleanup(&mut self, cleanup: impl FnOnce() + 'static) {
        self.cleanups.push(cleanup);
    }

    pub fn pending_cleanups(&self) -> usize {
        self.cleanups.len()
    }

    /// # Safety
    /// The device must be valid and the buffer recording.
    pub unsafe fn begin_render_pass(
        &self,
        device: &impl DeviceApi,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        clear_values: &[vk::ClearValue],
    ) {
        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .clear_values(clear_values);
        device.cmd_begin_render_pass(self.cmd, &begin_info, vk::SubpassContents::INLINE);
    }

    /// # Safety
    /// The device must be valid and a render pass begun.
    pub unsafe fn end_render_pass(&self, device: &impl DeviceApi) {
        device.cmd_end_render_pass(self.cmd);
    }

    /// # Safety
    /// The device and pipeline must be valid.
    pub unsafe fn bind_pipeline(&self, device: &impl DeviceApi, pipeline: vk::Pipeline) {
        device.cmd_bind_pipeline(self.cmd, vk::PipelineBindPoint::GRAPHICS, pipeline);
    }

    /// # Safety
    /// All handles must be valid.
    pub unsafe fn bind_descriptor_sets(
        &self,
        device: &impl DeviceApi,
        layout: vk::PipelineLayout,
        first_set: u32,
        sets: &[vk::DescriptorSet],
        dynamic_offsets: &[u32],
    ) {
        device.cmd_bind_descriptor_sets(
            self.cmd,
            vk::PipelineBindPoint::GRAPHICS,
            layout,
            first_set,
            sets,
            dynamic_offsets,
        );
    }

    /// # Safety
    /// The device and buffer must be valid.
    pub unsafe fn bind_vertex_buffer(
        &self,
        device: &impl DeviceApi,
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
    ) {
        device.cmd_bind_vertex_buffers(self.cmd, 0, &[buffer], &[offset]);
    }

    /// # Safety
    /// The device and buffer must be valid.
    pub unsafe fn bind_index_buffer(
        &self,
        device: &impl DeviceApi,
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        index_type: vk::IndexType,
    ) {
        device.cmd_bind_index_buffer(self.cmd, buffer, offset, index_type);
    }

    /// # Safety
    /// The device must be valid with a pipeline bound.
    pub unsafe fn draw(&self, device: &impl DeviceApi, vertex_count: u32, first_vertex: u32) {
        device.cmd_draw(self.cmd, vertex_count, 1, first_vertex, 0);
    }

    /// # Safety
    /// The device must be valid with a pipeline and index buffer bound.
    pub unsafe fn draw_indexed(
        &self,
        device: &impl DeviceApi,
        index_count: u32,
        first_index: u32,
        vertex_offset: i32,
    ) {
        device.cmd_draw_indexed(self.cmd, index_count, 1, first_index, vertex_offset, 0);
    }

    /// Viewport covering `extent`, depth range 0..1.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn set_viewport(&self, device: &impl DeviceApi, extent: vk::Extent2D) {
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        device.cmd_set_viewport(self.cmd, 0, &[viewport]);
    }

    /// # Safety
    /// The device must be valid.
    pub unsafe fn set_scissor(&self, device: &impl DeviceApi, scissor: vk::Rect2D) {
        device.cmd_set_scissor(self.cmd, 0, &[scissor]);
    }

    /// # Safety
    /// The device and image must be valid.
    pub unsafe fn transition_image_layout(
        &self,
        device: &impl DeviceApi,
        image: vk::Image,
        transition: &ImageTransition,
    ) {
        device.cmd_pipeline_barrier(
            self.cmd,
            transition.src_stage,
            transition.dst_stage,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            &[transition.barrier(image)],
        );
    }

    /// Barrier over the first `size` bytes of `buffer`.
    ///
    /// # Safety
    /// The device and buffer must be valid.
    #[allow(clippy::too_many_arguments)]
    pub unsafe fn transition_buffer(
        &self,
        device: &impl DeviceApi,
        buffer: vk::Buffer,
        size: vk::DeviceSize,
        src_access: vk::AccessFlags,
        dst_access: vk::AccessFlags,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
    ) {
        let barrier = vk::BufferMemoryBarrier::default()
            .src_access_mask(src_access)
            .dst_access_mask(dst_access)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .buffer(buffer)
            .offset(0)
            .size(size);
        device.cmd_pipeline_barrier(
            self.cmd,
            src_stage,
            dst_stage,
            vk::DependencyFlags::empty(),
            &[],
            &[barrier],
            &[],
        );
    }

    /// Copy into `region` of an image in `TRANSFER_DST_OPTIMAL` layout.
    ///
    /// # Safety
    /// The device, buffer and image must be valid.
    pub unsafe fn copy_buffer_to_image(
        &self,
        device: &impl DeviceApi,
        buffer: vk::Buffer,
        buffer_offset: vk::DeviceSize,
        row_length: u32,
        image: vk::Image,
        region: vk::Rect2D,
    ) {
        let copy = buffer_image_copy(buffer_offset, row_length, region);
        device.cmd_copy_buffer_to_image(
            self.cmd,
            buffer,
            image,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            &[copy],
        );
    }

    /// Copy `region` of an image in `TRANSFER_SRC_OPTIMAL` layout into a
    /// tightly packed buffer.
    ///
    /// # Safety
    /// The device, buffer and image must be valid.
    pub unsafe fn copy_image_to_buffer(
        &self,
        device: &impl DeviceApi,
        image: vk::Image,
        region: vk::Rect2D,
        buffer: vk::Buffer,
        buffer_offset: vk::DeviceSize,
    ) {
        let copy = buffer_image_copy(buffer_offset, 0, region);
        device.cmd_copy_image_to_buffer(
            self.cmd,
            image,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            buffer,
            &[copy],
        );
    }
}

/// Points in a frame at which registered callbacks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    /// After the render pass begins.
    Init,
    /// Before the render pass ends.
    Finish,
}

/// Identifies the registrant of frame callbacks so it can remove them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerId(u64);

impl OwnerId {
    /// A fresh id, distinct from every other id in the process.
    pub fn new() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for OwnerId {
    fn default() -> Self {
        Self::new()
    }
}

/// Callback run with the command buffer of the frame slot and its index.
pub type FrameCallback = Box<dyn FnMut(&mut CommandBuffer, usize)>;

/// The per-frame command buffers, one per frame in flight.
#[derive(Default)]
pub struct CommandBuffers {
    pool: vk::CommandPool,
    buffers: Vec<CommandBuffer>,
    callbacks: Vec<(Event, OwnerId, FrameCallback)>,
}

impl CommandBuffers {
    /// Frames in flight.
    pub const MAX_COUNT: usize = 2;

    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate `count` buffers from `pool`.
    ///
    /// # Safety
    /// The device must be valid and `pool` must allow individual resets.
    pub unsafe fn create(
        &mut self,
        device: &impl DeviceApi,
        pool: &CommandPool,
        count: usize,
    ) -> Result<()> {
        assert!(count <= Self::MAX_COUNT, "too many command buffers: {count}");
        assert!(self.buffers.is_empty(), "command buffers already created");
        self.buffers = pool.allocate(device, count as u32)?;
        self.pool = pool.handle();
        tracing::debug!(count, "Allocated frame command buffers");
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn from_raw(handles: &[vk::CommandBuffer]) -> Self {
        Self {
            pool: vk::CommandPool::null(),
            buffers: handles.iter().copied().map(CommandBuffer::from_raw).collect(),
            callbacks: Vec::new(),
        }
    }

    /// Release resources and free the buffers.
    ///
    /// # Safety
    /// The device must be valid and the buffers idle on the GPU.
    pub unsafe fn destroy(&mut self, device: &impl DeviceApi) {
        if self.buffers.is_empty() {
            return;
        }
        for buffer in &mut self.buffers {
            buffer.release_resources();
        }
        let handles: Vec<_> = self.buffers.iter().map(CommandBuffer::handle).collect();
        device.free_command_buffers(self.pool, &handles);
        self.buffers.clear();
        self.pool = vk::CommandPool::null();
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn get(&self, index: usize) -> &CommandBuffer {
        &self.buffers[index]
    }

    pub fn get_mut(&mut self, index: usize) -> &mut CommandBuffer {
        &mut self.buffers[index]
    }

    /// Register `callback` for `event`, owned by `owner`.
    pub fn add_callback(
        &mut self,
        event: Event,
        owner: OwnerId,
        callback: impl FnMut(&mut CommandBuffer, usize) + 'static,
    ) {
        self.callbacks.push((event, owner, Box::new(callback)));
    }

    /// Remove every callback registered by `owner`.
    pub fn remove_callbacks(&mut self, owner: OwnerId) {
        self.callbacks.retain(|(_, o, _)| *o != owner);
    }

    pub fn callback_count(&self) -> usize {
        self.callbacks.len()
    }

    /// Run the callbacks for `event` on buffer `index`, in registration order.
    pub fn trigger(&mut self, event: Event, index: usize) {
        let buffer = &mut self.buffers[index];
        for (_, _, callback) in self.callbacks.iter_mut().filter(|(e, _, _)| *e == event) {
            callback(buffer, index);
        }
    }
}

impl std::fmt::Debug for CommandBuffers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandBuffers")
            .field("buffers", &self.buffers)
            .field("callbacks", &self.callbacks.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockDevice;
    use ash::vk::Handle;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn cleanups_run_once_in_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut queue = CleanupQueue::new();
        for i in 0..3 {
            let log = Rc::clone(&log);
            queue.push(move || log.borrow_mut().push(i));
        }
        assert_eq!(queue.len(), 3);
        queue.run_all();
        queue.run_all();
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
        assert!(queue.is_empty());
    }

    #[test]
    fn dropping_queue_runs_leftovers() {
        let ran = Rc::new(RefCell::new(false));
        {
            let mut queue = CleanupQueue::new();
            let ran = Rc::clone(&ran);
            queue.push(move || *ran.borrow_mut() = true);
        }
        assert!(*ran.borrow());
    }

    #[test]
    fn resources_live_until_release() {
        let resource: Arc<dyn Any> = Arc::new(vec![1u8, 2, 3]);
        let weak = Arc::downgrade(&resource);
        let mut cmd = CommandBuffer::from_raw(vk::CommandBuffer::from_raw(1));

        cmd.add_resource(resource);
        assert!(weak.upgrade().is_some());
        assert_eq!(cmd.pending_cleanups(), 1);

        cmd.release_resources();
        assert!(weak.upgrade().is_none());
        assert_eq!(cmd.pending_cleanups(), 0);
    }

    #[test]
    fn state_follows_recording_lifecycle() {
        let mut cmd = CommandBuffer::from_raw(vk::CommandBuffer::from_raw(1));
        assert_eq!(cmd.state(), CommandBufferState::Idle);
        cmd.transition(CommandBufferState::Idle, CommandBufferState::Recording);
        cmd.transition(CommandBufferState::Recording, CommandBufferState::Recorded);
        cmd.transition(CommandBufferState::Recorded, CommandBufferState::Submitted);
        assert_eq!(cmd.state(), CommandBufferState::Submitted);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "wrong state")]
    fn ending_an_idle_buffer_panics() {
        let mut cmd = CommandBuffer::from_raw(vk::CommandBuffer::from_raw(1));
        cmd.transition(CommandBufferState::Recording, CommandBufferState::Recorded);
    }

    #[test]
    fn upload_transition_barrier() {
        let image = vk::Image::from_raw(42);
        let barrier = ImageTransition::UPLOAD.barrier(image);
        assert_eq!(barrier.old_layout, vk::ImageLayout::UNDEFINED);
        assert_eq!(barrier.new_layout, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
        assert_eq!(barrier.dst_access_mask, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(barrier.src_queue_family_index, vk::QUEUE_FAMILY_IGNORED);
        assert_eq!(barrier.image, image);
        assert_eq!(barrier.subresource_range.layer_count, 1);
    }

    #[test]
    fn copy_region_maps_rect() {
        let copy = buffer_image_copy(
            256,
            64,
            vk::Rect2D {
                offset: vk::Offset2D { x: 8, y: 4 },
                extent: vk::Extent2D {
                    width: 32,
                    height: 16,
                },
            },
        );
        assert_eq!(copy.buffer_offset, 256);
        assert_eq!(copy.buffer_row_length, 64);
        assert_eq!(copy.image_offset.x, 8);
        assert_eq!(copy.image_offset.y, 4);
        assert_eq!(copy.image_extent.width, 32);
        assert_eq!(copy.image_extent.depth, 1);
    }

    #[test]
    fn callbacks_fire_per_event_and_owner() {
        let mut buffers = CommandBuffers::from_raw(&[
            vk::CommandBuffer::from_raw(1),
            vk::CommandBuffer::from_raw(2),
        ]);
        let log = Rc::new(RefCell::new(Vec::new()));
        let a = OwnerId::new();
        let b = OwnerId::new();
        assert_ne!(a, b);

        {
            let log = Rc::clone(&log);
            buffers.add_callback(Event::Init, a, move |cmd, index| {
                log.borrow_mut().push(("a-init", cmd.handle().as_raw(), index));
            });
        }
        {
            let log = Rc::clone(&log);
            buffers.add_callback(Event::Finish, a, move |_, index| {
                log.borrow_mut().push(("a-finish", 0, index));
            });
        }
        {
            let log = Rc::clone(&log);
            buffers.add_callback(Event::Init, b, move |_, index| {
                log.borrow_mut().push(("b-init", 0, index));
            });
        }

        buffers.trigger(Event::Init, 1);
        assert_eq!(*log.borrow(), vec![("a-init", 2, 1), ("b-init", 0, 1)]);

        log.borrow_mut().clear();
        buffers.remove_callbacks(a);
        assert_eq!(buffers.callback_count(), 1);
        buffers.trigger(Event::Init, 0);
        buffers.trigger(Event::Finish, 0);
        assert_eq!(*log.borrow(), vec![("b-init", 0, 0)]);
    }

    #[test]
    fn callbacks_can_attach_cleanups() {
        let mut buffers = CommandBuffers::from_raw(&[vk::CommandBuffer::from_raw(7)]);
        let owner = OwnerId::new();
        buffers.add_callback(Event::Finish, owner, |cmd, _| cmd.add_cleanup(|| {}));
        buffers.trigger(Event::Finish, 0);
        assert_eq!(buffers.get(0).pending_cleanups(), 1);
        buffers.get_mut(0).release_resources();
        assert_eq!(buffers.get(0).pending_cleanups(), 0);
    }

    fn pool(device: &MockDevice) -> CommandPool {
        unsafe {
            CommandPool::new(
                device,
                device.graphics_queue_family(),
                vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            )
        }
        .unwrap()
    }

    #[test]
    fn fenced_submit_keeps_resources_until_reset() {
        let device = MockDevice::new();
        let pool = pool(&device);
        let mut cmd = unsafe { pool.allocate(&device, 1) }.unwrap().remove(0);
        let fence = unsafe { crate::sync::create_fence(&device, false) }.unwrap();

        let resource: Arc<dyn Any> = Arc::new(0u32);
        let weak = Arc::downgrade(&resource);
        unsafe {
            cmd.begin(&device).unwrap();
            cmd.add_resource(resource);
            cmd.end(&device).unwrap();
            cmd.submit_with_fence(&device, device.graphics_queue(), fence)
                .unwrap();
        }
        assert_eq!(cmd.state(), CommandBufferState::Submitted);
        assert!(weak.upgrade().is_some());

        unsafe {
            crate::sync::wait_for_fence(&device, fence, u64::MAX).unwrap();
            cmd.reset(&device).unwrap();
        }
        assert!(weak.upgrade().is_none());
        assert_eq!(cmd.state(), CommandBufferState::Idle);
        assert!(
            device.position_after("vkWaitForFences", 0)
                < device.position_after("vkResetCommandBuffer", 0)
        );
    }

    #[test]
    fn blocking_submit_releases_after_queue_idle() {
        let device = MockDevice::new();
        let pool = pool(&device);
        let cleaned = Rc::new(RefCell::new(false));

        {
            let cleaned = Rc::clone(&cleaned);
            unsafe {
                pool.execute_one_time(&device, device.graphics_queue(), |cmd| {
                    cmd.add_cleanup(move || *cleaned.borrow_mut() = true);
                    Ok(())
                })
            }
            .unwrap();
        }
        assert!(*cleaned.borrow());

        let calls = device.calls();
        let submit = calls.iter().position(|c| *c == "vkQueueSubmit").unwrap();
        assert_eq!(calls[submit + 1], "vkQueueWaitIdle");
        assert_eq!(
            device.live("vkAllocateCommandBuffers", "vkFreeCommandBuffers"),
            0
        );
        unsafe { pool.destroy(&device) };
    }

    #[test]
    fn failed_recording_still_frees_buffer() {
        let device = MockDevice::new();
        let pool = pool(&device);
        let result = unsafe {
            pool.execute_one_time(&device, device.graphics_queue(), |_| {
                Err(GpuError::Other("nothing to upload".into()))
            })
        };
        assert!(result.is_err());
        assert_eq!(device.count("vkQueueSubmit"), 0);
        assert_eq!(
            device.live("vkAllocateCommandBuffers", "vkFreeCommandBuffers"),
            0
        );
    }
}
