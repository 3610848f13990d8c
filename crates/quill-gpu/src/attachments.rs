//! Render-pass shape: color, depth/stencil and MSAA resolve attachments.

use crate::device::DeviceApi;
use crate::error::{GpuError, Result};
use ash::vk;

/// One color attachment slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorAttachment {
    pub format: vk::Format,
    /// Layout the final (resolved) image is left in.
    pub final_layout: vk::ImageLayout,
    /// Extra usage for self-allocated images, e.g. `TRANSFER_SRC` for readback.
    pub usage: vk::ImageUsageFlags,
    pub clear_color: [f32; 4],
}

impl ColorAttachment {
    pub const fn new(format: vk::Format, final_layout: vk::ImageLayout) -> Self {
        Self {
            format,
            final_layout,
            usage: vk::ImageUsageFlags::empty(),
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

/// Everything `vkCreateRenderPass` is fed, before it is fed.
#[derive(Debug, Clone)]
pub struct RenderPassLayout {
    /// Color, then depth/stencil, then resolve descriptions.
    pub attachments: Vec<vk::AttachmentDescription>,
    pub color_refs: Vec<vk::AttachmentReference>,
    pub depth_ref: Option<vk::AttachmentReference>,
    pub resolve_refs: Vec<vk::AttachmentReference>,
    pub dependencies: [vk::SubpassDependency; 3],
}

/// Shape of the render pass plus the render pass built from it.
#[derive(Debug, Clone)]
pub struct Attachments {
    color_attachments: Vec<ColorAttachment>,
    depth_bits: u8,
    stencil_bits: u8,
    msaa_samples: u8,
    render_pass: vk::RenderPass,
}

impl Default for Attachments {
    fn default() -> Self {
        Self {
            color_attachments: Vec::new(),
            depth_bits: 0,
            stencil_bits: 0,
            msaa_samples: 1,
            render_pass: vk::RenderPass::null(),
        }
    }
}

impl Attachments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a color attachment and return its location (0-based).
    pub fn add_color_attachment(&mut self, format: vk::Format, final_layout: vk::ImageLayout) -> u32 {
        self.color_attachments
            .push(ColorAttachment::new(format, final_layout));
        (self.color_attachments.len() - 1) as u32
    }

    pub fn set_color_attachment(
        &mut self,
        location: u32,
        format: vk::Format,
        final_layout: vk::ImageLayout,
    ) {
        let attachment = &mut self.color_attachments[location as usize];
        attachment.format = format;
        attachment.final_layout = final_layout;
    }

    /// Add usage flags to the images backing a color attachment.
    pub fn add_color_usage(&mut self, location: u32, usage: vk::ImageUsageFlags) {
        self.color_attachments[location as usize].usage |= usage;
    }

    pub fn set_clear_color(&mut self, location: u32, color: [f32; 4]) {
        self.color_attachments[location as usize].clear_color = color;
    }

    pub fn clear_color_attachments(&mut self) {
        self.color_attachments.clear();
    }

    pub fn color_attachments(&self) -> &[ColorAttachment] {
        &self.color_attachments
    }

    pub fn color_attachment_count(&self) -> usize {
        self.color_attachments.len()
    }

    /// 1 disables multisampling; 2, 4, 8, ... enable it.
    pub fn set_msaa_samples(&mut self, count: u8) {
        self.msaa_samples = count.max(1);
    }

    pub const fn msaa_samples(&self) -> u8 {
        self.msaa_samples
    }

    pub fn msaa_samples_flag(&self) -> vk::SampleCountFlags {
        vk::SampleCountFlags::from_raw(u32::from(self.msaa_samples))
    }

    pub const fn has_msaa(&self) -> bool {
        self.msaa_samples > 1
    }

    /// 0 (disabled), 16, 24 or 32.
    pub fn set_depth_bits(&mut self, bits: u8) {
        self.depth_bits = bits;
    }

    pub const fn depth_bits(&self) -> u8 {
        self.depth_bits
    }

    pub const fn has_depth(&self) -> bool {
        self.depth_bits > 0
    }

    /// 0 (disabled) or 8.
    pub fn set_stencil_bits(&mut self, bits: u8) {
        self.stencil_bits = bits;
    }

    pub const fn stencil_bits(&self) -> u8 {
        self.stencil_bits
    }

    pub const fn has_stencil(&self) -> bool {
        self.stencil_bits > 0
    }

    pub const fn has_depth_stencil(&self) -> bool {
        self.has_depth() || self.has_stencil()
    }

    /// Native format for the configured depth/stencil bits.
    ///
    /// Combinations without a matching format fall back to `D32_SFLOAT_S8_UINT`.
    pub fn depth_stencil_format(&self) -> vk::Format {
        match (self.depth_bits, self.stencil_bits) {
            (32, 0) => vk::Format::D32_SFLOAT,
            (32, 8) => vk::Format::D32_SFLOAT_S8_UINT,
            (0, 8) => vk::Format::S8_UINT,
            (16, 0) => vk::Format::D16_UNORM,
            (16, 8) => vk::Format::D16_UNORM_S8_UINT,
            (24, 8) => vk::Format::D24_UNORM_S8_UINT,
            (depth, stencil) => {
                tracing::warn!(
                    depth,
                    stencil,
                    "Unsupported depth/stencil combination, using D32_SFLOAT_S8_UINT"
                );
                vk::Format::D32_SFLOAT_S8_UINT
            }
        }
    }

    /// Aspects present in [`Self::depth_stencil_format`].
    pub fn depth_stencil_aspect(&self) -> vk::ImageAspectFlags {
        let format = self.depth_stencil_format();
        let mut aspect = vk::ImageAspectFlags::empty();
        if format != vk::Format::S8_UINT {
            aspect |= vk::ImageAspectFlags::DEPTH;
        }
        if matches!(
            format,
            vk::Format::S8_UINT
                | vk::Format::D16_UNORM_S8_UINT
                | vk::Format::D24_UNORM_S8_UINT
                | vk::Format::D32_SFLOAT_S8_UINT
        ) {
            aspect |= vk::ImageAspectFlags::STENCIL;
        }
        aspect
    }

    /// Compute attachment descriptions, references and dependencies.
    pub fn render_pass_layout(&self) -> RenderPassLayout {
        let samples = self.msaa_samples_flag();
        let msaa = self.has_msaa();
        let mut attachments = Vec::new();

        for color in &self.color_attachments {
            attachments.push(
                vk::AttachmentDescription::default()
                    .format(color.format)
                    .samples(samples)
                    .load_op(vk::AttachmentLoadOp::CLEAR)
                    // With MSAA the resolve attachment carries the result.
                    .store_op(if msaa {
                        vk::AttachmentStoreOp::DONT_CARE
                    } else {
                        vk::AttachmentStoreOp::STORE
                    })
                    .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                    .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                    .initial_layout(vk::ImageLayout::UNDEFINED)
                    .final_layout(if msaa {
                        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL
                    } else {
                        color.final_layout
                    }),
            );
        }

        if self.has_depth_stencil() {
            attachments.push(
                vk::AttachmentDescription::default()
                    .format(self.depth_stencil_format())
                    .samples(samples)
                    .load_op(vk::AttachmentLoadOp::CLEAR)
                    .store_op(vk::AttachmentStoreOp::DONT_CARE)
                    .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                    .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                    .initial_layout(vk::ImageLayout::UNDEFINED)
                    .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
            );
        }

        if msaa {
            for color in &self.color_attachments {
                attachments.push(
                    vk::AttachmentDescription::default()
                        .format(color.format)
                        .samples(vk::SampleCountFlags::TYPE_1)
                        .load_op(vk::AttachmentLoadOp::DONT_CARE)
                        .store_op(vk::AttachmentStoreOp::STORE)
                        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                        .initial_layout(vk::ImageLayout::UNDEFINED)
                        .final_layout(color.final_layout),
                );
            }
        }

        let mut index = 0u32;
        let mut next_ref = |layout| {
            let reference = vk::AttachmentReference::default()
                .attachment(index)
                .layout(layout);
            index += 1;
            reference
        };

        let color_refs: Vec<_> = self
            .color_attachments
            .iter()
            .map(|_| next_ref(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL))
            .collect();
        let depth_ref = self
            .has_depth_stencil()
            .then(|| next_ref(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL));
        let resolve_refs: Vec<_> = if msaa {
            self.color_attachments
                .iter()
                .map(|_| next_ref(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL))
                .collect()
        } else {
            Vec::new()
        };

        RenderPassLayout {
            attachments,
            color_refs,
            depth_ref,
            resolve_refs,
            dependencies: subpass_dependencies(),
        }
    }

    /// Build the render pass, replacing any previous one.
    pub fn create_renderpass(&mut self, device: &impl DeviceApi) -> Result<()> {
        self.destroy_renderpass(device);

        let layout = self.render_pass_layout();
        let mut subpass = vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&layout.color_refs);
        if !layout.resolve_refs.is_empty() {
            subpass = subpass.resolve_attachments(&layout.resolve_refs);
        }
        if let Some(depth_ref) = layout.depth_ref.as_ref() {
            subpass = subpass.depth_stencil_attachment(depth_ref);
        }

        let render_pass_info = vk::RenderPassCreateInfo::default()
            .attachments(&layout.attachments)
            .subpasses(std::slice::from_ref(&subpass))
            .dependencies(&layout.dependencies);

        self.render_pass = unsafe { device.create_render_pass(&render_pass_info) }
            .map_err(GpuError::call("vkCreateRenderPass"))?;

        tracing::debug!(
            colors = self.color_attachments.len(),
            depth_stencil = self.has_depth_stencil(),
            msaa_samples = self.msaa_samples,
            "Created render pass"
        );
        Ok(())
    }

    pub fn destroy_renderpass(&mut self, device: &impl DeviceApi) {
        if self.render_pass != vk::RenderPass::null() {
            unsafe { device.destroy_render_pass(self.render_pass) };
            self.render_pass = vk::RenderPass::null();
        }
    }

    pub const fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    /// Clear values in attachment order, ready for `vkCmdBeginRenderPass`.
    ///
    /// Resolve attachments are never cleared and get no entry.
    pub fn vk_clear_values(&self) -> Vec<vk::ClearValue> {
        let mut clear_values: Vec<_> = self
            .color_attachments
            .iter()
            .map(|color| vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: color.clear_color,
                },
            })
            .collect();
        if self.has_depth_stencil() {
            clear_values.push(vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            });
        }
        clear_values
    }
}

fn subpass_dependencies() -> [vk::SubpassDependency; 3] {
    [
        // color attachment
        vk::SubpassDependency::default()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(vk::PipelineStageFlags::BOTTOM_OF_PIPE)
            .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .src_access_mask(vk::AccessFlags::MEMORY_READ)
            .dst_access_mask(
                vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            )
            .dependency_flags(vk::DependencyFlags::BY_REGION),
        // depth attachment
        vk::SubpassDependency::default()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(vk::PipelineStageFlags::BOTTOM_OF_PIPE)
            .dst_stage_mask(
                vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS
                    | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
            )
            .src_access_mask(vk::AccessFlags::empty())
            .dst_access_mask(vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE)
            .dependency_flags(vk::DependencyFlags::BY_REGION),
        // color attachment read back by transfer
        vk::SubpassDependency::default()
            .src_subpass(0)
            .dst_subpass(vk::SUBPASS_EXTERNAL)
            .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .dst_stage_mask(vk::PipelineStageFlags::TRANSFER)
            .src_access_mask(
                vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            )
            .dst_access_mask(vk::AccessFlags::TRANSFER_READ)
            .dependency_flags(vk::DependencyFlags::BY_REGION),
    ]
}
