//! The per-frame cycle over a swapchain: wait, acquire, record, submit,
//! present.
//!
//! [`FrameLoop`] owns the swapchain together with one command buffer and one
//! set of synchronization objects per frame in flight. Each frame slot is
//! reused only after its fence reports the previous submission complete, so
//! resources attached to a slot's command buffer are released exactly then.

use crate::command::{CommandBuffer, CommandBuffers, CommandPool, Event};
use crate::device::DeviceApi;
use crate::error::{GpuError, Result};
use crate::swapchain::{AcquireStatus, PresentStatus, Swapchain};
use crate::sync::FrameSyncManager;
use ash::vk;

/// An acquired swapchain image being recorded.
///
/// Returned by [`FrameLoop::begin_frame`] and consumed by
/// [`FrameLoop::end_frame`].
#[derive(Debug)]
#[must_use = "a begun frame must be passed to end_frame"]
pub struct Frame {
    image_index: u32,
    slot: usize,
    suboptimal: bool,
}

impl Frame {
    /// Index of the swapchain image.
    pub const fn image_index(&self) -> u32 {
        self.image_index
    }

    /// Frame-in-flight slot, also the command buffer index.
    pub const fn slot(&self) -> usize {
        self.slot
    }
}

/// Extent to rebuild the framebuffer at after presenting, if any.
pub fn framebuffer_reset_target(
    present: PresentStatus,
    acquired_suboptimal: bool,
    pending_resize: Option<vk::Extent2D>,
    current: vk::Extent2D,
) -> Option<vk::Extent2D> {
    if let Some(size) = pending_resize {
        return Some(size);
    }
    (present.needs_reset() || acquired_suboptimal).then_some(current)
}

/// Swapchain plus the per-slot command buffers and synchronization objects
/// driving it.
pub struct FrameLoop {
    swapchain: Swapchain,
    command_pool: Option<CommandPool>,
    command_buffers: CommandBuffers,
    frame_sync: Option<FrameSyncManager>,
    pending_resize: Option<vk::Extent2D>,
    frame_active: bool,
}

impl FrameLoop {
    /// Wrap a configured but not yet created swapchain.
    pub fn new(swapchain: Swapchain) -> Self {
        Self {
            swapchain,
            command_pool: None,
            command_buffers: CommandBuffers::new(),
            frame_sync: None,
            pending_resize: None,
            frame_active: false,
        }
    }

    /// Create the swapchain, its framebuffers, the command buffers and the
    /// synchronization objects for a window of `size`.
    ///
    /// On error the objects created so far stay owned by `self` and are
    /// released by [`Self::destroy`].
    pub fn create(&mut self, device: &impl DeviceApi, size: vk::Extent2D) -> Result<()> {
        if !self.swapchain.query(device)? {
            return Err(GpuError::UnsupportedSurface(
                "no usable surface format or present mode".into(),
            ));
        }
        self.swapchain.query_surface_capabilities(device, size)?;
        self.swapchain.create(device)?;
        self.swapchain.create_framebuffers(device)?;

        let pool = unsafe {
            CommandPool::new(
                device,
                device.graphics_queue_family(),
                vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            )
        }?;
        let pool = self.command_pool.insert(pool);
        unsafe {
            self.command_buffers
                .create(device, pool, CommandBuffers::MAX_COUNT)
        }?;
        self.frame_sync =
            Some(unsafe { FrameSyncManager::new(device, self.swapchain.image_count()) }?);
        Ok(())
    }

    fn frame_sync(&self) -> Result<&FrameSyncManager> {
        self.frame_sync
            .as_ref()
            .ok_or_else(|| GpuError::Other("frame loop not created".into()))
    }

    /// Wait for the slot, acquire an image and start recording into it.
    ///
    /// Returns `None` when the swapchain was out of date; it has been
    /// rebuilt, the slot's fence is left signaled and the caller should skip
    /// this frame.
    pub fn begin_frame(&mut self, device: &impl DeviceApi) -> Result<Option<Frame>> {
        debug_assert!(!self.frame_active, "begin_frame called twice");

        if let Some(size) = self.pending_resize.take() {
            self.reset_framebuffer(device, size)?;
        }

        let frame_sync = self.frame_sync()?;
        let slot = frame_sync.current_frame();
        let sync = *frame_sync.current();

        unsafe { sync.wait(device) }?;

        let (image_index, suboptimal) =
            match self.swapchain.acquire_next_image(device, sync.image_available)? {
                AcquireStatus::Ready(index) => (index, false),
                AcquireStatus::Suboptimal(index) => (index, true),
                AcquireStatus::OutOfDate => {
                    tracing::debug!("Swapchain out of date on acquire");
                    self.reset_framebuffer(device, self.swapchain.extent())?;
                    return Ok(None);
                }
            };

        let render_pass = self.swapchain.render_pass();
        let framebuffer = self.swapchain.framebuffer(image_index);
        let extent = self.swapchain.extent();
        let clear_values = self.swapchain.attachments().vk_clear_values();

        let cmd = self.command_buffers.get_mut(slot);
        unsafe {
            // Fence waited: the GPU is done with this slot
            cmd.reset(device)?;
            cmd.begin(device)?;
            cmd.begin_render_pass(device, render_pass, framebuffer, extent, &clear_values);
            cmd.set_viewport(device, extent);
            cmd.set_scissor(
                device,
                vk::Rect2D {
                    offset: vk::Offset2D::default(),
                    extent,
                },
            );
        }
        self.command_buffers.trigger(Event::Init, slot);
        self.frame_active = true;

        Ok(Some(Frame {
            image_index,
            slot,
            suboptimal,
        }))
    }

    /// Command buffer `frame` is recorded into.
    pub fn command_buffer_mut(&mut self, frame: &Frame) -> &mut CommandBuffer {
        self.command_buffers.get_mut(frame.slot)
    }

    /// Finish recording, submit and present `frame`.
    ///
    /// The slot's fence is reset only here, immediately before the submit
    /// that signals it again.
    pub fn end_frame(&mut self, device: &impl DeviceApi, frame: Frame) -> Result<()> {
        debug_assert!(self.frame_active, "end_frame without begin_frame");
        self.frame_active = false;

        self.command_buffers.trigger(Event::Finish, frame.slot);

        let frame_sync = self.frame_sync()?;
        let sync = *frame_sync.current();
        let render_finished = frame_sync.render_finished(frame.image_index)?;
        let cmd = self.command_buffers.get_mut(frame.slot);
        unsafe {
            cmd.end_render_pass(device);
            cmd.end(device)?;
            sync.reset(device)?;
            cmd.submit_frame(
                device,
                device.graphics_queue(),
                sync.image_available,
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                render_finished,
                sync.in_flight,
            )?;
        }

        let status = self
            .swapchain
            .present(device, render_finished, frame.image_index)?;
        if let Some(frame_sync) = self.frame_sync.as_mut() {
            frame_sync.advance();
        }

        if let Some(size) = framebuffer_reset_target(
            status,
            frame.suboptimal,
            self.pending_resize.take(),
            self.swapchain.extent(),
        ) {
            tracing::debug!(?status, suboptimal = frame.suboptimal, "Resetting framebuffer");
            self.reset_framebuffer(device, size)?;
        }
        Ok(())
    }

    /// Rebuild the framebuffer at `size` before the next frame.
    pub fn resize(&mut self, size: vk::Extent2D) {
        self.pending_resize = Some(size);
    }

    /// Rebuild the swapchain and framebuffers now, growing the per-image
    /// semaphores if the image count went up.
    pub fn reset_framebuffer(&mut self, device: &impl DeviceApi, size: vk::Extent2D) -> Result<()> {
        debug_assert!(!self.frame_active, "framebuffer reset during a frame");
        self.swapchain.reset_framebuffer(device, size)?;
        if let Some(frame_sync) = self.frame_sync.as_mut() {
            unsafe { frame_sync.ensure_image_count(device, self.swapchain.image_count()) }?;
        }
        Ok(())
    }

    pub const fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    pub fn swapchain_mut(&mut self) -> &mut Swapchain {
        &mut self.swapchain
    }

    pub const fn command_buffers(&self) -> &CommandBuffers {
        &self.command_buffers
    }

    pub fn command_buffers_mut(&mut self) -> &mut CommandBuffers {
        &mut self.command_buffers
    }

    pub const fn is_frame_active(&self) -> bool {
        self.frame_active
    }

    /// Slot the next frame will use.
    pub fn current_slot(&self) -> Option<usize> {
        self.frame_sync.as_ref().map(FrameSyncManager::current_frame)
    }

    /// Release everything. The device must be idle.
    pub fn destroy(&mut self, device: &impl DeviceApi) {
        unsafe {
            self.command_buffers.destroy(device);
            if let Some(mut frame_sync) = self.frame_sync.take() {
                frame_sync.destroy(device);
            }
            if let Some(pool) = self.command_pool.take() {
                pool.destroy(device);
            }
        }
        self.swapchain.destroy(device);
        self.pending_resize = None;
        self.frame_active = false;
    }
}

impl std::fmt::Debug for FrameLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameLoop")
            .field("extent", &self.swapchain.extent())
            .field("state", &self.swapchain.state())
            .field("command_buffers", &self.command_buffers)
            .field("frame_sync", &self.frame_sync)
            .field("frame_active", &self.frame_active)
            .finish_non_exhaustive()
    }
}
