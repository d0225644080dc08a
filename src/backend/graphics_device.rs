// Graphics device - everything a sample needs to put pixels on screen
//
// FRAME FLOW (render_frame):
// 1. Wait for the fence of this frame slot
// 2. Acquire a swapchain image
// 3. Re-record the slot's command buffer through the sample's draw callback
// 4. Submit, signalling the slot's fence
// 5. Present and advance the slot

use super::shader;
use super::sync::{next_frame_index, FrameSync};
use super::{Swapchain, VulkanDevice};
use crate::config::Config;
use anyhow::{Context, Result};
use ash::vk;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use std::sync::Arc;

/// What the draw callback records into
#[derive(Debug, Clone, Copy)]
pub struct Frame {
    pub command_buffer: vk::CommandBuffer,
    pub framebuffer: vk::Framebuffer,
    pub render_pass: vk::RenderPass,
    pub extent: vk::Extent2D,
}

impl Frame {
    pub fn render_area(&self) -> vk::Rect2D {
        vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: self.extent,
        }
    }
}

pub struct GraphicsDevice {
    // Fields drop top to bottom: swapchain before the device it borrows from
    swapchain: Option<Swapchain>,
    device: Arc<VulkanDevice>,

    command_pool: vk::CommandPool,
    /// One command buffer per frame in flight, re-recorded every frame
    command_buffers: Vec<vk::CommandBuffer>,
    frame_sync: Vec<FrameSync>,
    current_frame: usize,

    present_mode: vk::PresentModeKHR,
    width: u32,
    height: u32,
    needs_resize: bool,
}

impl GraphicsDevice {
    /// # Safety
    /// The window behind the handles must outlive the returned device.
    pub unsafe fn new(
        app_name: &str,
        config: &Config,
        display: RawDisplayHandle,
        window: RawWindowHandle,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        // Validation only in debug builds
        let enable_validation = cfg!(debug_assertions) && config.debug.validation_layers;
        let device = VulkanDevice::new(app_name, enable_validation, display, window)?;

        let pool_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(device.graphics_queue_family)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let command_pool = device.device.create_command_pool(&pool_info, None)?;

        let frames_in_flight = config.graphics.max_frames_in_flight.max(1);
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(frames_in_flight as u32);
        let command_buffers = device.device.allocate_command_buffers(&alloc_info)?;

        let frame_sync = (0..frames_in_flight)
            .map(|_| FrameSync::new(&device.device))
            .collect::<Result<Vec<_>>>()?;

        let mut graphics = Self {
            swapchain: None,
            device,
            command_pool,
            command_buffers,
            frame_sync,
            current_frame: 0,
            present_mode: config.present_mode(),
            width,
            height,
            needs_resize: false,
        };
        graphics.create_swapchain()?;

        log::info!("Graphics device ready ({} frames in flight)", frames_in_flight);
        Ok(graphics)
    }

    pub fn vulkan(&self) -> &Arc<VulkanDevice> {
        &self.device
    }

    pub fn device(&self) -> &ash::Device {
        &self.device.device
    }

    /// Render pass of the current swapchain
    pub fn render_pass(&self) -> Result<vk::RenderPass> {
        self.swapchain
            .as_ref()
            .map(|s| s.render_pass)
            .context("Swapchain not created")
    }

    pub fn is_minimized(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Record a new window size; the swapchain is rebuilt before the next frame
    pub fn resize(&mut self, width: u32, height: u32) {
        log::debug!("Window resized to {}x{}", width, height);
        self.width = width;
        self.height = height;
        self.needs_resize = true;
    }

    fn create_swapchain(&mut self) -> Result<()> {
        if self.is_minimized() {
            return Ok(());
        }

        // The surface can only have one swapchain at a time
        self.swapchain = None;
        self.swapchain = Some(Swapchain::new(
            self.device.clone(),
            self.width,
            self.height,
            self.present_mode,
        )?);
        self.needs_resize = false;
        Ok(())
    }

    fn recreate_swapchain(&mut self) -> Result<()> {
        self.wait_idle()?;
        self.create_swapchain()
    }

    /// Render a single frame, letting `draw` record the commands.
    ///
    /// Returns `false` when nothing was rendered (minimised window or a
    /// swapchain that had to be rebuilt first).
    pub fn render_frame<F>(&mut self, mut draw: F) -> Result<bool>
    where
        F: FnMut(&ash::Device, &Frame) -> Result<()>,
    {
        if self.is_minimized() {
            return Ok(false);
        }

        if self.needs_resize || self.swapchain.is_none() {
            self.recreate_swapchain()?;
        }

        let device = &self.device.device;
        let swapchain = self.swapchain.as_ref().context("Swapchain not initialized")?;
        let sync = &self.frame_sync[self.current_frame];

        // Wait until the GPU is done with this slot's command buffer
        unsafe { device.wait_for_fences(&[sync.in_flight_fence], true, u64::MAX) }?;

        let image_index = match swapchain.acquire_next_image(u64::MAX, sync.image_available)? {
            Some((index, suboptimal)) => {
                if suboptimal {
                    self.needs_resize = true;
                }
                index
            }
            None => {
                self.needs_resize = true;
                return Ok(false);
            }
        };

        // Only reset once we know work will be submitted with this fence
        unsafe { device.reset_fences(&[sync.in_flight_fence]) }?;

        let cmd = self.command_buffers[self.current_frame];
        let frame = Frame {
            command_buffer: cmd,
            framebuffer: swapchain.framebuffers[image_index as usize],
            render_pass: swapchain.render_pass,
            extent: swapchain.extent,
        };

        unsafe {
            device.reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())?;
            let begin_info = vk::CommandBufferBeginInfo::builder()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            device.begin_command_buffer(cmd, &begin_info)?;
        }

        draw(device, &frame)?;

        unsafe { device.end_command_buffer(cmd) }?;

        let wait_semaphores = [sync.image_available];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [swapchain.render_finished(image_index)?];
        let command_buffers = [cmd];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            device.queue_submit(
                self.device.graphics_queue,
                &[submit_info.build()],
                sync.in_flight_fence,
            )
        }
        .context("Failed to submit frame")?;

        if swapchain.present(self.device.graphics_queue, image_index, &signal_semaphores)? {
            self.needs_resize = true;
        }

        self.current_frame = next_frame_index(self.current_frame, self.frame_sync.len());

        Ok(true)
    }

    /// Allocate a one-shot primary command buffer, optionally already begun
    pub fn get_command_buffer(&self, begin: bool) -> Result<vk::CommandBuffer> {
        let device = &self.device.device;
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let cmd = unsafe { device.allocate_command_buffers(&alloc_info) }?
            .into_iter()
            .next()
            .context("No command buffer allocated")?;

        if begin {
            let begin_info = vk::CommandBufferBeginInfo::builder()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            unsafe { device.begin_command_buffer(cmd, &begin_info) }?;
        }

        Ok(cmd)
    }

    /// End `cmd`, submit it, block until it has executed, then free it
    pub fn flush_command_buffer(&self, cmd: vk::CommandBuffer) -> Result<()> {
        let device = &self.device.device;

        unsafe {
            device.end_command_buffer(cmd)?;

            let fence = device.create_fence(&vk::FenceCreateInfo::default(), None)?;
            let command_buffers = [cmd];
            let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers);

            let result = device
                .queue_submit(self.device.graphics_queue, &[submit_info.build()], fence)
                .and_then(|_| device.wait_for_fences(&[fence], true, u64::MAX));

            device.destroy_fence(fence, None);
            device.free_command_buffers(self.command_pool, &command_buffers);
            result.context("Failed to flush command buffer")?;
        }

        Ok(())
    }

    pub fn create_shader_module(&self, code: &[u8]) -> Result<vk::ShaderModule> {
        shader::create_shader_module(&self.device.device, code)
    }

    pub fn wait_idle(&self) -> Result<()> {
        self.device.wait_idle()
    }
}

impl Drop for GraphicsDevice {
    fn drop(&mut self) {
        log::info!("Cleaning up Vulkan resources...");

        // Wait for GPU to finish before destroying anything
        let _ = self.device.wait_idle();

        unsafe {
            for sync in &self.frame_sync {
                sync.destroy(&self.device.device);
            }

            // Also frees command buffers
            self.device.device.destroy_command_pool(self.command_pool, None);
        }

        // Swapchain and device are dropped with the fields
    }
}
