//! Pipeline layouts and graphics pipelines.

use crate::descriptor::DescriptorPoolSizes;
use crate::error::{GpuError, Result};
use ash::vk;

/// Kind of resource bound at a descriptor binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorKind {
    Uniform,
    DynamicUniform,
    ImageSampler,
    StorageBuffer,
}

impl DescriptorKind {
    pub const fn to_vk(self) -> vk::DescriptorType {
        match self {
            Self::Uniform => vk::DescriptorType::UNIFORM_BUFFER,
            Self::DynamicUniform => vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
            Self::ImageSampler => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            Self::StorageBuffer => vk::DescriptorType::STORAGE_BUFFER,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct LayoutBinding {
    binding: u32,
    kind: DescriptorKind,
    stages: vk::ShaderStageFlags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PushConstantRange {
    stages: vk::ShaderStageFlags,
    offset: u32,
    size: u32,
}

/// Description of a pipeline layout with a single descriptor set.
///
/// Equality and hashing are order-sensitive over bindings and push
/// constant ranges, so the value can key a cache directly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PipelineLayoutCreateInfo {
    bindings: Vec<LayoutBinding>,
    push_constants: Vec<PushConstantRange>,
}

impl PipelineLayoutCreateInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_uniform_binding(&mut self, binding: u32, stages: vk::ShaderStageFlags) -> &mut Self {
        self.add_binding(binding, DescriptorKind::Uniform, stages)
    }

    pub fn add_dynamic_uniform_binding(
        &mut self,
        binding: u32,
        stages: vk::ShaderStageFlags,
    ) -> &mut Self {
        self.add_binding(binding, DescriptorKind::DynamicUniform, stages)
    }

    pub fn add_texture_binding(&mut self, binding: u32, stages: vk::ShaderStageFlags) -> &mut Self {
        self.add_binding(binding, DescriptorKind::ImageSampler, stages)
    }

    pub fn add_storage_binding(&mut self, binding: u32, stages: vk::ShaderStageFlags) -> &mut Self {
        self.add_binding(binding, DescriptorKind::StorageBuffer, stages)
    }

    fn add_binding(
        &mut self,
        binding: u32,
        kind: DescriptorKind,
        stages: vk::ShaderStageFlags,
    ) -> &mut Self {
        debug_assert!(
            self.bindings.iter().all(|b| b.binding != binding),
            "binding {binding} declared twice"
        );
        self.bindings.push(LayoutBinding {
            binding,
            kind,
            stages,
        });
        self
    }

    pub fn add_push_constant_range(
        &mut self,
        stages: vk::ShaderStageFlags,
        offset: u32,
        size: u32,
    ) -> &mut Self {
        self.push_constants.push(PushConstantRange {
            stages,
            offset,
            size,
        });
        self
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    pub fn vk_layout_bindings(&self) -> Vec<vk::DescriptorSetLayoutBinding<'static>> {
        self.bindings
            .iter()
            .map(|b| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(b.binding)
                    .descriptor_type(b.kind.to_vk())
                    .descriptor_count(1)
                    .stage_flags(b.stages)
            })
            .collect()
    }

    pub fn vk_push_constant_ranges(&self) -> Vec<vk::PushConstantRange> {
        self.push_constants
            .iter()
            .map(|r| vk::PushConstantRange {
                stage_flags: r.stages,
                offset: r.offset,
                size: r.size,
            })
            .collect()
    }

    /// Per-type descriptor counts for one set of this layout.
    pub fn descriptor_pool_sizes(&self) -> DescriptorPoolSizes {
        let mut sizes = DescriptorPoolSizes::new();
        for binding in &self.bindings {
            sizes.add(binding.kind.to_vk(), 1);
        }
        sizes
    }
}

/// A descriptor set layout and the pipeline layout built on it.
#[derive(Debug)]
pub struct PipelineLayout {
    descriptor_set_layout: vk::DescriptorSetLayout,
    layout: vk::PipelineLayout,
}

impl PipelineLayout {
    /// # Safety
    /// The device must be valid.
    pub unsafe fn new(device: &ash::Device, info: &PipelineLayoutCreateInfo) -> Result<Self> {
        let bindings = info.vk_layout_bindings();
        let set_layout_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
        let descriptor_set_layout = device
            .create_descriptor_set_layout(&set_layout_info, None)
            .map_err(GpuError::call("vkCreateDescriptorSetLayout"))?;

        let push_constant_ranges = info.vk_push_constant_ranges();
        let set_layouts = [descriptor_set_layout];
        let layout_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(&set_layouts)
            .push_constant_ranges(&push_constant_ranges);

        let layout = match device.create_pipeline_layout(&layout_info, None) {
            Ok(layout) => layout,
            Err(e) => {
                device.destroy_descriptor_set_layout(descriptor_set_layout, None);
                return Err(GpuError::call("vkCreatePipelineLayout")(e));
            }
        };

        Ok(Self {
            descriptor_set_layout,
            layout,
        })
    }

    pub const fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }

    pub const fn descriptor_set_layout(&self) -> vk::DescriptorSetLayout {
        self.descriptor_set_layout
    }

    /// # Safety
    /// The device must be valid and no pipeline using the layout may be in use.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        device.destroy_pipeline_layout(self.layout, None);
        device.destroy_descriptor_set_layout(self.descriptor_set_layout, None);
    }
}

/// Vertex layouts. Every attribute is 32-bit float.
///
/// Naming: `V2` two position coords, `c4` RGBA color, `t2` texture coords,
/// `n3` normal. `t22` is two sets of texture coords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VertexFormat {
    V2,
    #[default]
    V2t2,
    V2t22,
    V2c4t2,
    V2c4t22,
    V3n3,
    V3n3t2,
}

impl VertexFormat {
    /// Component counts of the attributes, in location order.
    pub const fn fields(self) -> &'static [u32] {
        match self {
            Self::V2 => &[2],
            Self::V2t2 => &[2, 2],
            Self::V2t22 => &[2, 2, 2],
            Self::V2c4t2 => &[2, 4, 2],
            Self::V2c4t22 => &[2, 4, 2, 2],
            Self::V3n3 => &[3, 3],
            Self::V3n3t2 => &[3, 3, 2],
        }
    }

    /// Stride in floats.
    pub fn stride_floats(self) -> u32 {
        self.fields().iter().sum()
    }

    /// Stride in bytes.
    pub fn stride(self) -> u32 {
        self.stride_floats() * FLOAT_SIZE
    }

    pub fn vk_binding_description(self) -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: self.stride(),
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    pub fn vk_attribute_descriptions(self) -> Vec<vk::VertexInputAttributeDescription> {
        let mut offset = 0;
        self.fields()
            .iter()
            .zip(0u32..)
            .map(|(&components, location)| {
                let attr = vk::VertexInputAttributeDescription {
                    location,
                    binding: 0,
                    format: float_format(components),
                    offset,
                };
                offset += components * FLOAT_SIZE;
                attr
            })
            .collect()
    }
}

const FLOAT_SIZE: u32 = std::mem::size_of::<f32>() as u32;

const fn float_format(components: u32) -> vk::Format {
    match components {
        1 => vk::Format::R32_SFLOAT,
        2 => vk::Format::R32G32_SFLOAT,
        3 => vk::Format::R32G32B32_SFLOAT,
        _ => vk::Format::R32G32B32A32_SFLOAT,
    }
}

/// Color blending presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendFunc {
    /// Opaque overwrite.
    #[default]
    Off,
    /// Source over destination by source alpha.
    AlphaBlend,
    /// Inverts the destination color where drawn.
    InverseVideo,
}

impl BlendFunc {
    pub fn vk_color_blend(self) -> vk::PipelineColorBlendAttachmentState {
        let state = vk::PipelineColorBlendAttachmentState::default()
            .color_write_mask(vk::ColorComponentFlags::RGBA);
        match self {
            Self::Off => state.blend_enable(false),
            Self::AlphaBlend => state
                .blend_enable(true)
                .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
                .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
                .color_blend_op(vk::BlendOp::ADD)
                .src_alpha_blend_factor(vk::BlendFactor::SRC_ALPHA)
                .dst_alpha_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
                .alpha_blend_op(vk::BlendOp::ADD),
            Self::InverseVideo => state
                .blend_enable(true)
                .src_color_blend_factor(vk::BlendFactor::ONE_MINUS_DST_COLOR)
                .dst_color_blend_factor(vk::BlendFactor::ZERO)
                .color_blend_op(vk::BlendOp::ADD)
                .src_alpha_blend_factor(vk::BlendFactor::ONE)
                .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
                .alpha_blend_op(vk::BlendOp::ADD),
        }
    }
}

/// Depth test presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DepthTest {
    #[default]
    Off,
    Less,
    LessOrEqual,
}

impl DepthTest {
    pub fn vk_depth_stencil(self) -> vk::PipelineDepthStencilStateCreateInfo<'static> {
        let state = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);
        match self {
            Self::Off => state.depth_test_enable(false).depth_write_enable(false),
            Self::Less => state
                .depth_test_enable(true)
                .depth_write_enable(true)
                .depth_compare_op(vk::CompareOp::LESS),
            Self::LessOrEqual => state
                .depth_test_enable(true)
                .depth_write_enable(true)
                .depth_compare_op(vk::CompareOp::LESS_OR_EQUAL),
        }
    }
}

/// Description of a graphics pipeline.
///
/// Fixed state: triangle list, back-face culling, counter-clockwise front
/// face, no depth clamp, dynamic viewport and scissor. Two pipelines built
/// from equal infos are interchangeable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineCreateInfo {
    vertex_module: vk::ShaderModule,
    fragment_module: vk::ShaderModule,
    layout: vk::PipelineLayout,
    render_pass: vk::RenderPass,
    vertex_format: VertexFormat,
    blend_func: BlendFunc,
    depth_test: DepthTest,
    samples: vk::SampleCountFlags,
}

impl PipelineCreateInfo {
    pub fn new(
        vertex_module: vk::ShaderModule,
        fragment_module: vk::ShaderModule,
        layout: vk::PipelineLayout,
        render_pass: vk::RenderPass,
    ) -> Self {
        Self {
            vertex_module,
            fragment_module,
            layout,
            render_pass,
            vertex_format: VertexFormat::default(),
            blend_func: BlendFunc::default(),
            depth_test: DepthTest::default(),
            samples: vk::SampleCountFlags::TYPE_1,
        }
    }

    pub fn set_vertex_format(&mut self, format: VertexFormat) -> &mut Self {
        self.vertex_format = format;
        self
    }

    pub fn set_color_blend(&mut self, blend_func: BlendFunc) -> &mut Self {
        self.blend_func = blend_func;
        self
    }

    pub fn set_depth_test(&mut self, depth_test: DepthTest) -> &mut Self {
        self.depth_test = depth_test;
        self
    }

    /// Must match the sample count of the render pass.
    pub fn set_sample_count(&mut self, samples: vk::SampleCountFlags) -> &mut Self {
        self.samples = samples;
        self
    }

    pub const fn vertex_format(&self) -> VertexFormat {
        self.vertex_format
    }

    pub const fn blend_func(&self) -> BlendFunc {
        self.blend_func
    }

    pub const fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    pub const fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }
}

/// The one pipeline of a single-info `vkCreateGraphicsPipelines` call.
fn single_pipeline(
    result: std::result::Result<Vec<vk::Pipeline>, (Vec<vk::Pipeline>, vk::Result)>,
) -> Result<vk::Pipeline> {
    let pipelines =
        result.map_err(|(_, e)| GpuError::call("vkCreateGraphicsPipelines")(e))?;
    pipelines
        .first()
        .copied()
        .ok_or_else(|| GpuError::PipelineCreation("no pipeline returned".into()))
}

/// A graphics pipeline.
#[derive(Debug)]
pub struct Pipeline {
    pipeline: vk::Pipeline,
}

impl Pipeline {
    /// # Safety
    /// The device must be valid and the shader modules, layout and render
    /// pass in `info` must be alive.
    pub unsafe fn new(device: &ash::Device, info: &PipelineCreateInfo) -> Result<Self> {
        let shader_stages = [
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(info.vertex_module)
                .name(c"main"),
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(info.fragment_module)
                .name(c"main"),
        ];

        let vertex_bindings = [info.vertex_format.vk_binding_description()];
        let vertex_attributes = info.vertex_format.vk_attribute_descriptions();
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&vertex_bindings)
            .vertex_attribute_descriptions(&vertex_attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        // Viewport and scissor are dynamic
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .cull_mode(vk::CullModeFlags::BACK)
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .depth_bias_enable(false)
            .line_width(1.0);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(info.samples)
            .sample_shading_enable(false);

        let depth_stencil = info.depth_test.vk_depth_stencil();

        let color_blend_attachments = [info.blend_func.vk_color_blend()];
        let color_blending = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .logic_op(vk::LogicOp::COPY)
            .attachments(&color_blend_attachments);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisampling)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blending)
            .dynamic_state(&dynamic_state)
            .layout(info.layout)
            .render_pass(info.render_pass)
            .subpass(0);

        let pipeline = single_pipeline(device.create_graphics_pipelines(
            vk::PipelineCache::null(),
            &[pipeline_info],
            None,
        ))?;

        tracing::debug!(
            vertex_format = ?info.vertex_format,
            blend = ?info.blend_func,
            "Created graphics pipeline"
        );
        Ok(Self { pipeline })
    }

    pub const fn pipeline(&self) -> vk::Pipeline {
        self.pipeline
    }

    /// # Safety
    /// The device must be valid and the pipeline must not be in use.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        device.destroy_pipeline(self.pipeline, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Lcg;
    use ash::vk::Handle;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    fn hash_of<T: Hash>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn pool_sizes_count_uniforms_and_samplers() {
        let mut info = PipelineLayoutCreateInfo::new();
        for binding in 0..3 {
            info.add_uniform_binding(binding, vk::ShaderStageFlags::VERTEX);
        }
        info.add_texture_binding(3, vk::ShaderStageFlags::FRAGMENT)
            .add_texture_binding(4, vk::ShaderStageFlags::FRAGMENT);

        let sizes = info.descriptor_pool_sizes();
        assert_eq!(sizes.len(), 2);
        assert_eq!(sizes.count(vk::DescriptorType::UNIFORM_BUFFER), 3);
        assert_eq!(sizes.count(vk::DescriptorType::COMBINED_IMAGE_SAMPLER), 2);
    }

    #[test]
    fn pool_sizes_omit_unused_types() {
        let mut info = PipelineLayoutCreateInfo::new();
        info.add_uniform_binding(0, vk::ShaderStageFlags::VERTEX);
        let sizes = info.descriptor_pool_sizes();
        assert_eq!(sizes.len(), 1);
        assert_eq!(sizes.count(vk::DescriptorType::COMBINED_IMAGE_SAMPLER), 0);
    }

    #[test]
    fn layout_bindings_keep_declaration_order() {
        let mut info = PipelineLayoutCreateInfo::new();
        info.add_storage_binding(2, vk::ShaderStageFlags::FRAGMENT)
            .add_dynamic_uniform_binding(0, vk::ShaderStageFlags::VERTEX)
            .add_push_constant_range(vk::ShaderStageFlags::VERTEX, 0, 64);

        let bindings = info.vk_layout_bindings();
        assert_eq!(bindings[0].binding, 2);
        assert_eq!(bindings[0].descriptor_type, vk::DescriptorType::STORAGE_BUFFER);
        assert_eq!(
            bindings[1].descriptor_type,
            vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC
        );
        assert_eq!(info.vk_push_constant_ranges()[0].size, 64);
    }

    #[test]
    fn layout_info_equality_is_order_sensitive() {
        let mut a = PipelineLayoutCreateInfo::new();
        a.add_uniform_binding(0, vk::ShaderStageFlags::VERTEX)
            .add_texture_binding(1, vk::ShaderStageFlags::FRAGMENT);
        let mut b = PipelineLayoutCreateInfo::new();
        b.add_texture_binding(1, vk::ShaderStageFlags::FRAGMENT)
            .add_uniform_binding(0, vk::ShaderStageFlags::VERTEX);
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        assert_eq!(hash_of(&a), hash_of(&a.clone()));
    }

    #[test]
    fn vertex_stride_matches_attribute_offsets() {
        let formats = [
            VertexFormat::V2,
            VertexFormat::V2t2,
            VertexFormat::V2t22,
            VertexFormat::V2c4t2,
            VertexFormat::V2c4t22,
            VertexFormat::V3n3,
            VertexFormat::V3n3t2,
        ];
        for format in formats {
            let attrs = format.vk_attribute_descriptions();
            let last = attrs.last().unwrap();
            let last_size = format.fields().last().unwrap() * 4;
            assert_eq!(last.offset + last_size, format.stride(), "{format:?}");
            assert_eq!(format.vk_binding_description().stride, format.stride());
            for (i, attr) in attrs.iter().enumerate() {
                assert_eq!(attr.location as usize, i);
            }
        }
    }

    #[test]
    fn vertex_formats_have_known_layouts() {
        assert_eq!(VertexFormat::V2t2.stride_floats(), 4);
        assert_eq!(VertexFormat::V2t22.stride_floats(), 6);
        assert_eq!(VertexFormat::V2c4t2.stride_floats(), 8);
        assert_eq!(VertexFormat::V2c4t22.stride_floats(), 10);

        let attrs = VertexFormat::V2c4t22.vk_attribute_descriptions();
        assert_eq!(attrs[1].format, vk::Format::R32G32B32A32_SFLOAT);
        assert_eq!(attrs[1].offset, 8);
        assert_eq!(attrs[2].offset, 24);
        assert_eq!(attrs[3].offset, 32);
    }

    #[test]
    fn blend_presets() {
        assert_eq!(BlendFunc::Off.vk_color_blend().blend_enable, vk::FALSE);

        let alpha = BlendFunc::AlphaBlend.vk_color_blend();
        assert_eq!(alpha.src_color_blend_factor, vk::BlendFactor::SRC_ALPHA);
        assert_eq!(
            alpha.dst_color_blend_factor,
            vk::BlendFactor::ONE_MINUS_SRC_ALPHA
        );

        let inverse = BlendFunc::InverseVideo.vk_color_blend();
        assert_eq!(
            inverse.src_color_blend_factor,
            vk::BlendFactor::ONE_MINUS_DST_COLOR
        );
        assert_eq!(inverse.dst_color_blend_factor, vk::BlendFactor::ZERO);
        assert_eq!(inverse.color_write_mask, vk::ColorComponentFlags::RGBA);
    }

    #[test]
    fn pipeline_info_equal_implies_equal_hash() {
        let formats = [VertexFormat::V2t2, VertexFormat::V2c4t2, VertexFormat::V3n3];
        let blends = [BlendFunc::Off, BlendFunc::AlphaBlend, BlendFunc::InverseVideo];
        let mut rng = Lcg::new(7);
        let random_info = |rng: &mut Lcg| {
            let mut info = PipelineCreateInfo::new(
                vk::ShaderModule::from_raw(1 + rng.below(2)),
                vk::ShaderModule::from_raw(10 + rng.below(2)),
                vk::PipelineLayout::from_raw(20 + rng.below(2)),
                vk::RenderPass::from_raw(30 + rng.below(2)),
            );
            info.set_vertex_format(formats[rng.below(3) as usize])
                .set_color_blend(blends[rng.below(3) as usize]);
            info
        };

        let mut equal_pairs = 0;
        for _ in 0..2000 {
            let a = random_info(&mut rng);
            let b = random_info(&mut rng);
            if a == b {
                equal_pairs += 1;
                assert_eq!(hash_of(&a), hash_of(&b));
            }
        }
        assert!(equal_pairs > 0);
    }

    #[test]
    fn pipeline_info_differs_by_render_pass() {
        let a = PipelineCreateInfo::new(
            vk::ShaderModule::from_raw(1),
            vk::ShaderModule::from_raw(2),
            vk::PipelineLayout::from_raw(3),
            vk::RenderPass::from_raw(4),
        );
        let b = PipelineCreateInfo::new(
            vk::ShaderModule::from_raw(1),
            vk::ShaderModule::from_raw(2),
            vk::PipelineLayout::from_raw(3),
            vk::RenderPass::from_raw(5),
        );
        assert_ne!(a, b);
    }

    #[test]
    fn pipeline_creation_failure_keeps_the_status() {
        let err = single_pipeline(Err((
            vec![vk::Pipeline::null()],
            vk::Result::ERROR_OUT_OF_DEVICE_MEMORY,
        )))
        .unwrap_err();
        assert_eq!(err.vk_result(), Some(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY));
        assert!(err.to_string().starts_with("vkCreateGraphicsPipelines failed"));

        assert!(matches!(
            single_pipeline(Ok(Vec::new())),
            Err(GpuError::PipelineCreation(_))
        ));
        assert_eq!(
            single_pipeline(Ok(vec![vk::Pipeline::from_raw(9)])).unwrap(),
            vk::Pipeline::from_raw(9)
        );
    }
}
