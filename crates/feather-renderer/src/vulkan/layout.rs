//! Pipeline layout description shared by every category.

use ash::vk;
use bytemuck::{Pod, Zeroable};

/// Stages that read node push constants and scene uniforms.
pub const NODE_STAGES: vk::ShaderStageFlags = vk::ShaderStageFlags::from_raw(
    vk::ShaderStageFlags::VERTEX.as_raw()
        | vk::ShaderStageFlags::GEOMETRY.as_raw()
        | vk::ShaderStageFlags::FRAGMENT.as_raw(),
);

/// Per-node push constants read by the bundled shaders.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct NodeConstants {
    pub model: [[f32; 4]; 4],
    pub color: [f32; 4],
}

impl Default for NodeConstants {
    fn default() -> Self {
        Self {
            model: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
            color: [1.0, 1.0, 1.0, 1.0],
        }
    }
}

impl NodeConstants {
    pub fn push_constant_range() -> vk::PushConstantRange {
        vk::PushConstantRange::default()
            .stage_flags(NODE_STAGES)
            .offset(0)
            .size(std::mem::size_of::<Self>() as u32)
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

/// Uniform buffer binding (set 0, binding 0) holding the view and
/// projection matrices.
pub fn scene_uniform_binding() -> vk::DescriptorSetLayoutBinding<'static> {
    vk::DescriptorSetLayoutBinding::default()
        .binding(0)
        .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
        .descriptor_count(1)
        .stage_flags(NODE_STAGES)
}

/// Resource-binding slots of the shared pipeline layout.
///
/// Descriptor set layouts are owned by the caller and must outlive the
/// pipeline layout.
#[derive(Debug, Clone, Default)]
pub struct LayoutDescriptor {
    pub set_layouts: Vec<vk::DescriptorSetLayout>,
    pub push_constant_ranges: Vec<vk::PushConstantRange>,
}

impl LayoutDescriptor {
    pub fn new(set_layouts: Vec<vk::DescriptorSetLayout>) -> Self {
        Self {
            set_layouts,
            push_constant_ranges: Vec::new(),
        }
    }

    /// Add the [`NodeConstants`] push-constant range.
    pub fn with_node_constants(mut self) -> Self {
        self.push_constant_ranges.push(NodeConstants::push_constant_range());
        self
    }

    pub fn create_info(&self) -> vk::PipelineLayoutCreateInfo<'_> {
        vk::PipelineLayoutCreateInfo::default()
            .set_layouts(&self.set_layouts)
            .push_constant_ranges(&self.push_constant_ranges)
    }
}
