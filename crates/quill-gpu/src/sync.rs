//! Fences and semaphores of the frame loop.

use crate::command::CommandBuffers;
use crate::device::DeviceApi;
use crate::error::{GpuError, Result};
use ash::vk;

/// # Safety
/// The device must be valid.
pub unsafe fn create_semaphore(device: &impl DeviceApi) -> Result<vk::Semaphore> {
    let create_info = vk::SemaphoreCreateInfo::default();
    device
        .create_semaphore(&create_info)
        .map_err(GpuError::call("vkCreateSemaphore"))
}

/// Create a fence, optionally already signaled.
///
/// # Safety
/// The device must be valid.
pub unsafe fn create_fence(device: &impl DeviceApi, signaled: bool) -> Result<vk::Fence> {
    let flags = if signaled {
        vk::FenceCreateFlags::SIGNALED
    } else {
        vk::FenceCreateFlags::empty()
    };

    let create_info = vk::FenceCreateInfo::default().flags(flags);
    device
        .create_fence(&create_info)
        .map_err(GpuError::call("vkCreateFence"))
}

/// # Safety
/// The device and fence must be valid.
pub unsafe fn wait_for_fence(
    device: &impl DeviceApi,
    fence: vk::Fence,
    timeout_ns: u64,
) -> Result<()> {
    device
        .wait_for_fences(&[fence], true, timeout_ns)
        .map_err(GpuError::call("vkWaitForFences"))
}

/// # Safety
/// The device and fence must be valid, and the fence not pending.
pub unsafe fn reset_fence(device: &impl DeviceApi, fence: vk::Fence) -> Result<()> {
    device
        .reset_fences(&[fence])
        .map_err(GpuError::call("vkResetFences"))
}

/// Synchronization objects of one frame slot.
#[derive(Debug, Clone, Copy)]
pub struct FrameSync {
    /// Signaled when the acquired swapchain image is ready
    pub image_available: vk::Semaphore,
    /// Signaled when the slot's command buffer may be re-recorded
    pub in_flight: vk::Fence,
}

impl FrameSync {
    /// The fence starts signaled so the first wait returns at once.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn new(device: &impl DeviceApi) -> Result<Self> {
        let image_available = create_semaphore(device)?;
        let in_flight = match create_fence(device, true) {
            Ok(fence) => fence,
            Err(e) => {
                device.destroy_semaphore(image_available);
                return Err(e);
            }
        };
        Ok(Self {
            image_available,
            in_flight,
        })
    }

    /// Wait until the slot's previous submission has finished.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn wait(&self, device: &impl DeviceApi) -> Result<()> {
        wait_for_fence(device, self.in_flight, u64::MAX)
    }

    /// Reset the fence right before submitting.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn reset(&self, device: &impl DeviceApi) -> Result<()> {
        reset_fence(device, self.in_flight)
    }

    /// # Safety
    /// The device must be valid and the objects not in use.
    pub unsafe fn destroy(&self, device: &impl DeviceApi) {
        device.destroy_semaphore(self.image_available);
        device.destroy_fence(self.in_flight);
    }
}

/// Round-robin frame slots plus one render-finished semaphore per
/// swapchain image.
///
/// The presentation engine holds the render-finished semaphore of an image
/// until that image is acquired again, so those are indexed by image rather
/// than by slot.
#[derive(Debug)]
pub struct FrameSyncManager {
    frame_syncs: Vec<FrameSync>,
    render_finished: Vec<vk::Semaphore>,
    current_frame: usize,
}

impl FrameSyncManager {
    /// One slot per command buffer in [`CommandBuffers`] and one
    /// render-finished semaphore per swapchain image.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn new(device: &impl DeviceApi, image_count: u32) -> Result<Self> {
        let mut manager = Self::from_syncs(Vec::with_capacity(CommandBuffers::MAX_COUNT));
        for _ in 0..CommandBuffers::MAX_COUNT {
            match FrameSync::new(device) {
                Ok(sync) => manager.frame_syncs.push(sync),
                Err(e) => {
                    manager.destroy(device);
                    return Err(e);
                }
            }
        }
        if let Err(e) = manager.ensure_image_count(device, image_count) {
            manager.destroy(device);
            return Err(e);
        }
        Ok(manager)
    }

    fn from_syncs(frame_syncs: Vec<FrameSync>) -> Self {
        Self {
            frame_syncs,
            render_finished: Vec::new(),
            current_frame: 0,
        }
    }

    /// Grow the per-image semaphores to cover `image_count` images.
    /// Never shrinks; extra semaphores stay unused.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn ensure_image_count(
        &mut self,
        device: &impl DeviceApi,
        image_count: u32,
    ) -> Result<()> {
        while self.render_finished.len() < image_count as usize {
            self.render_finished.push(create_semaphore(device)?);
        }
        Ok(())
    }

    /// Get the current frame's sync resources.
    pub fn current(&self) -> &FrameSync {
        &self.frame_syncs[self.current_frame]
    }

    /// Semaphore signaled when rendering into `image_index` has finished.
    pub fn render_finished(&self, image_index: u32) -> Result<vk::Semaphore> {
        self.render_finished
            .get(image_index as usize)
            .copied()
            .ok_or_else(|| {
                GpuError::Other(format!("no render-finished semaphore for image {image_index}"))
            })
    }

    /// Advance to the next frame.
    pub fn advance(&mut self) {
        self.current_frame = (self.current_frame + 1) % self.frame_syncs.len();
    }

    pub const fn current_frame(&self) -> usize {
        self.current_frame
    }

    pub fn frames_in_flight(&self) -> usize {
        self.frame_syncs.len()
    }

    /// Wait for every slot's fence.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn wait_all(&self, device: &impl DeviceApi) -> Result<()> {
        let fences: Vec<_> = self.frame_syncs.iter().map(|s| s.in_flight).collect();
        device
            .wait_for_fences(&fences, true, u64::MAX)
            .map_err(GpuError::call("vkWaitForFences"))
    }

    /// # Safety
    /// The device must be valid and no object in use.
    pub unsafe fn destroy(&mut self, device: &impl DeviceApi) {
        for sync in self.frame_syncs.drain(..) {
            sync.destroy(device);
        }
        for semaphore in self.render_finished.drain(..) {
            device.destroy_semaphore(semaphore);
        }
        self.current_frame = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockDevice;
    use ash::vk::Handle;

    fn fake_sync(n: u64) -> FrameSync {
        FrameSync {
            image_available: vk::Semaphore::from_raw(n * 10 + 1),
            in_flight: vk::Fence::from_raw(n * 10 + 3),
        }
    }

    #[test]
    fn frames_rotate_round_robin() {
        let mut manager = FrameSyncManager::from_syncs(vec![fake_sync(0), fake_sync(1)]);
        assert_eq!(manager.frames_in_flight(), CommandBuffers::MAX_COUNT);
        assert_eq!(manager.current_frame(), 0);
        manager.advance();
        assert_eq!(manager.current_frame(), 1);
        assert_eq!(manager.current().in_flight, vk::Fence::from_raw(13));
        manager.advance();
        assert_eq!(manager.current_frame(), 0);
    }

    #[test]
    fn render_finished_semaphores_follow_image_count() {
        let device = MockDevice::new();
        let mut manager = unsafe { FrameSyncManager::new(&device, 3) }.unwrap();
        assert_eq!(device.count("vkCreateFence"), CommandBuffers::MAX_COUNT);
        // One image-available per slot, one render-finished per image
        assert_eq!(
            device.count("vkCreateSemaphore"),
            CommandBuffers::MAX_COUNT + 3
        );

        let per_image: Vec<_> = (0..3).map(|i| manager.render_finished(i).unwrap()).collect();
        assert_ne!(per_image[0], per_image[1]);
        assert_ne!(per_image[1], per_image[2]);
        assert!(manager.render_finished(3).is_err());

        unsafe { manager.ensure_image_count(&device, 4) }.unwrap();
        assert_eq!(manager.render_finished(0).unwrap(), per_image[0]);
        assert!(manager.render_finished(3).is_ok());
        unsafe { manager.ensure_image_count(&device, 2) }.unwrap();
        assert!(manager.render_finished(3).is_ok());

        unsafe { manager.destroy(&device) };
        assert_eq!(device.live("vkCreateSemaphore", "vkDestroySemaphore"), 0);
        assert_eq!(device.live("vkCreateFence", "vkDestroyFence"), 0);
    }

    #[test]
    fn fences_start_signaled() {
        let device = MockDevice::new();
        let sync = unsafe { FrameSync::new(&device) }.unwrap();
        unsafe { sync.wait(&device) }.unwrap();
        unsafe { sync.reset(&device) }.unwrap();
        assert!(unsafe { sync.wait(&device) }.is_err());
        unsafe { sync.destroy(&device) };
    }
}
