//! Fixed-function state for one renderable "look".
//!
//! A [`PipelineStateDescriptor`] is plain data: no device handles. It is
//! frozen once built and turned into Vulkan create-info structs when a
//! pipeline object is compiled, so switching looks at draw time is a
//! pipeline bind rather than a state change.

use ash::vk;

/// State left unset in the pipeline object and recorded per command buffer.
pub const DEFAULT_DYNAMIC_STATES: [vk::DynamicState; 3] = [
    vk::DynamicState::VIEWPORT,
    vk::DynamicState::SCISSOR,
    vk::DynamicState::LINE_WIDTH,
];

/// Line width baked into edge pipelines.
pub const DEFAULT_EDGE_LINE_WIDTH: f32 = 4.0;

/// Depth test configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthPolicy {
    pub test_enable: bool,
    pub write_enable: bool,
    pub compare_op: vk::CompareOp,
}

impl Default for DepthPolicy {
    fn default() -> Self {
        Self {
            test_enable: true,
            write_enable: true,
            compare_op: vk::CompareOp::LESS_OR_EQUAL,
        }
    }
}

/// Immutable description of topology, rasterization, blend, depth/stencil,
/// multisample and dynamic state for one pipeline variant.
///
/// The `with_*` methods return a new descriptor; nothing mutates a
/// descriptor after it has been handed to a pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineStateDescriptor {
    topology: vk::PrimitiveTopology,
    polygon_mode: vk::PolygonMode,
    cull_mode: vk::CullModeFlags,
    front_face: vk::FrontFace,
    line_width: f32,
    depth: DepthPolicy,
    stencil_test_enable: bool,
    color_write_mask: vk::ColorComponentFlags,
    blend_enable: bool,
    samples: vk::SampleCountFlags,
    dynamic_states: Vec<vk::DynamicState>,
}

impl Default for PipelineStateDescriptor {
    fn default() -> Self {
        Self::edges()
    }
}

impl PipelineStateDescriptor {
    /// Line-list state shared by the wireframe and point variants: solid
    /// fill, no culling, counter-clockwise front faces, depth test and write
    /// with less-or-equal, no stencil, no blending, 4x multisampling.
    pub fn edges() -> Self {
        Self {
            topology: vk::PrimitiveTopology::LINE_LIST,
            polygon_mode: vk::PolygonMode::FILL,
            cull_mode: vk::CullModeFlags::NONE,
            front_face: vk::FrontFace::COUNTER_CLOCKWISE,
            line_width: DEFAULT_EDGE_LINE_WIDTH,
            depth: DepthPolicy::default(),
            stencil_test_enable: false,
            color_write_mask: vk::ColorComponentFlags::RGBA,
            blend_enable: false,
            samples: vk::SampleCountFlags::TYPE_4,
            dynamic_states: DEFAULT_DYNAMIC_STATES.to_vec(),
        }
    }

    /// Same state with a different primitive topology.
    pub fn with_topology(&self, topology: vk::PrimitiveTopology) -> Self {
        Self {
            topology,
            ..self.clone()
        }
    }

    pub fn with_samples(self, samples: vk::SampleCountFlags) -> Self {
        Self { samples, ..self }
    }

    pub fn with_line_width(self, line_width: f32) -> Self {
        Self { line_width, ..self }
    }

    pub fn with_cull_mode(self, cull_mode: vk::CullModeFlags, front_face: vk::FrontFace) -> Self {
        Self {
            cull_mode,
            front_face,
            ..self
        }
    }

    pub fn with_depth(self, depth: DepthPolicy) -> Self {
        Self { depth, ..self }
    }

    pub fn with_blend(self, blend_enable: bool, color_write_mask: vk::ColorComponentFlags) -> Self {
        Self {
            blend_enable,
            color_write_mask,
            ..self
        }
    }

    pub fn with_dynamic_states(self, dynamic_states: &[vk::DynamicState]) -> Self {
        Self {
            dynamic_states: dynamic_states.to_vec(),
            ..self
        }
    }

    pub fn topology(&self) -> vk::PrimitiveTopology {
        self.topology
    }

    pub fn line_width(&self) -> f32 {
        self.line_width
    }

    pub fn samples(&self) -> vk::SampleCountFlags {
        self.samples
    }

    pub fn depth(&self) -> DepthPolicy {
        self.depth
    }

    pub fn dynamic_states(&self) -> &[vk::DynamicState] {
        &self.dynamic_states
    }

    /// Whether the line width recorded in the command buffer overrides the
    /// baked one.
    pub fn has_dynamic_line_width(&self) -> bool {
        self.dynamic_states.contains(&vk::DynamicState::LINE_WIDTH)
    }

    pub fn input_assembly(&self) -> vk::PipelineInputAssemblyStateCreateInfo<'static> {
        vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(self.topology)
            .primitive_restart_enable(false)
    }

    pub fn rasterization(&self) -> vk::PipelineRasterizationStateCreateInfo<'static> {
        vk::PipelineRasterizationStateCreateInfo::default()
            .polygon_mode(self.polygon_mode)
            .cull_mode(self.cull_mode)
            .front_face(self.front_face)
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .depth_bias_enable(false)
            .line_width(self.line_width)
    }

    pub fn depth_stencil(&self) -> vk::PipelineDepthStencilStateCreateInfo<'static> {
        let keep = vk::StencilOpState::default()
            .fail_op(vk::StencilOp::KEEP)
            .pass_op(vk::StencilOp::KEEP)
            .compare_op(vk::CompareOp::ALWAYS);

        vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(self.depth.test_enable)
            .depth_write_enable(self.depth.write_enable)
            .depth_compare_op(self.depth.compare_op)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(self.stencil_test_enable)
            .front(keep)
            .back(keep)
    }

    pub fn multisample(&self) -> vk::PipelineMultisampleStateCreateInfo<'static> {
        vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(self.samples)
            .sample_shading_enable(false)
    }

    pub fn color_blend_attachment(&self) -> vk::PipelineColorBlendAttachmentState {
        let attachment = vk::PipelineColorBlendAttachmentState::default()
            .color_write_mask(self.color_write_mask)
            .blend_enable(self.blend_enable);

        if self.blend_enable {
            attachment
                .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
                .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
                .color_blend_op(vk::BlendOp::ADD)
                .src_alpha_blend_factor(vk::BlendFactor::ONE)
                .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
                .alpha_blend_op(vk::BlendOp::ADD)
        } else {
            attachment
        }
    }
}
