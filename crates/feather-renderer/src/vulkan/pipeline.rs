//! Per-category pipeline objects.
//!
//! A category (mesh, light, ...) draws with three pipeline objects: a shaded
//! triangle pass, a wireframe pass and a point pass. All three share the
//! vertex input layout, pipeline layout and cache of the owning set, and the
//! wire and point passes share one state descriptor.
//!
//! Construction is two-phase. [`Pipeline`] only records shader paths and
//! state; [`Pipeline::prepare`] needs a live device and yields a
//! [`PreparedPipeline`] holding the GPU handles.

use std::path::{Path, PathBuf};

use ash::vk;
use serde::{Deserialize, Serialize};

use super::gpu::GpuDevice;
use super::shader::{load_shader, ShaderProgram, ShaderStage};
use super::state::PipelineStateDescriptor;
use crate::error::{PipelineError, Result};

/// Shader binaries for the three variants of one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineShaders {
    pub shade_vert: PathBuf,
    pub shade_frag: PathBuf,
    pub wire_vert: PathBuf,
    pub wire_frag: PathBuf,
    pub wire_geom: PathBuf,
    pub point_vert: PathBuf,
    pub point_frag: PathBuf,
    pub point_geom: PathBuf,
}

impl PipelineShaders {
    /// Resolve relative paths against `dir`. Absolute paths are kept.
    pub fn resolved(&self, dir: &Path) -> Self {
        Self {
            shade_vert: dir.join(&self.shade_vert),
            shade_frag: dir.join(&self.shade_frag),
            wire_vert: dir.join(&self.wire_vert),
            wire_frag: dir.join(&self.wire_frag),
            wire_geom: dir.join(&self.wire_geom),
            point_vert: dir.join(&self.point_vert),
            point_frag: dir.join(&self.point_frag),
            point_geom: dir.join(&self.point_geom),
        }
    }
}

/// Handles shared by every pipeline object built for a set.
#[derive(Clone, Copy)]
pub struct PipelineTarget<'a> {
    pub cache: vk::PipelineCache,
    pub layout: vk::PipelineLayout,
    pub render_pass: vk::RenderPass,
    pub vertex_input: &'a vk::PipelineVertexInputStateCreateInfo<'a>,
}

/// An unprepared category pipeline: shader paths and state, no GPU objects.
#[derive(Debug, Clone)]
pub struct Pipeline {
    name: String,
    shaders: PipelineShaders,
    state: PipelineStateDescriptor,
}

impl Pipeline {
    pub fn new(name: impl Into<String>, shaders: PipelineShaders) -> Self {
        Self {
            name: name.into(),
            shaders,
            state: PipelineStateDescriptor::edges(),
        }
    }

    /// Replace the edge state descriptor. The shaded variant derives its
    /// state from it with a triangle-list topology.
    pub fn with_state(self, state: PipelineStateDescriptor) -> Self {
        Self { state, ..self }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shaders(&self) -> &PipelineShaders {
        &self.shaders
    }

    pub fn state(&self) -> &PipelineStateDescriptor {
        &self.state
    }

    /// Load the shaders and compile the wireframe, point and shaded
    /// pipeline objects, in that order.
    ///
    /// On failure every module and pipeline object created so far is
    /// released before the error is returned.
    pub fn prepare<G: GpuDevice>(self, gpu: &G, target: &PipelineTarget<'_>) -> Result<PreparedPipeline> {
        let mut prepared = PreparedPipeline {
            name: self.name,
            shade: vk::Pipeline::null(),
            wire: vk::Pipeline::null(),
            point: vk::Pipeline::null(),
            modules: Vec::with_capacity(8),
        };

        if let Err(e) = prepared.build(gpu, target, &self.shaders, &self.state) {
            prepared.release(gpu);
            return Err(e);
        }

        log::info!("Prepared '{}' pipelines (shade/wire/point)", prepared.name);
        Ok(prepared)
    }
}

/// Compiled pipeline objects for one category.
///
/// Dropping without [`cleanup`](Self::cleanup) leaks the handles.
#[derive(Debug)]
pub struct PreparedPipeline {
    name: String,
    shade: vk::Pipeline,
    wire: vk::Pipeline,
    point: vk::Pipeline,
    modules: Vec<ShaderProgram>,
}

impl PreparedPipeline {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shade(&self) -> vk::Pipeline {
        self.shade
    }

    pub fn wire(&self) -> vk::Pipeline {
        self.wire
    }

    pub fn point(&self) -> vk::Pipeline {
        self.point
    }

    pub fn shader_modules(&self) -> &[ShaderProgram] {
        &self.modules
    }

    /// Destroy the three pipeline objects, then the shader modules.
    ///
    /// Must run before the layout the pipelines were built against is
    /// destroyed.
    pub fn cleanup<G: GpuDevice>(mut self, gpu: &G) {
        self.release(gpu);
    }

    fn build<G: GpuDevice>(
        &mut self,
        gpu: &G,
        target: &PipelineTarget<'_>,
        shaders: &PipelineShaders,
        edge_state: &PipelineStateDescriptor,
    ) -> Result<()> {
        let shade_state = edge_state.with_topology(vk::PrimitiveTopology::TRIANGLE_LIST);

        let wire_stages = [
            self.load(gpu, &shaders.wire_vert, ShaderStage::Vertex)?,
            self.load(gpu, &shaders.wire_frag, ShaderStage::Fragment)?,
            self.load(gpu, &shaders.wire_geom, ShaderStage::Geometry)?,
        ];
        self.wire = create_variant(gpu, target, edge_state, &wire_stages)?;
        log::debug!("'{}' wireframe pipeline: {:?}", self.name, self.wire);

        // Same create parameters as the wireframe, point shaders only.
        let point_stages = [
            self.load(gpu, &shaders.point_vert, ShaderStage::Vertex)?,
            self.load(gpu, &shaders.point_frag, ShaderStage::Fragment)?,
            self.load(gpu, &shaders.point_geom, ShaderStage::Geometry)?,
        ];
        self.point = create_variant(gpu, target, edge_state, &point_stages)?;
        log::debug!("'{}' point pipeline: {:?}", self.name, self.point);

        let shade_stages = [
            self.load(gpu, &shaders.shade_vert, ShaderStage::Vertex)?,
            self.load(gpu, &shaders.shade_frag, ShaderStage::Fragment)?,
        ];
        self.shade = create_variant(gpu, target, &shade_state, &shade_stages)?;
        log::debug!("'{}' shaded pipeline: {:?}", self.name, self.shade);

        Ok(())
    }

    /// Load one stage and keep the module for cleanup.
    fn load<G: GpuDevice>(
        &mut self,
        gpu: &G,
        path: &Path,
        stage: ShaderStage,
    ) -> Result<vk::PipelineShaderStageCreateInfo<'static>> {
        let program = load_shader(gpu, path, stage)?;
        let info = program.stage_info();
        self.modules.push(program);
        Ok(info)
    }

    fn release<G: GpuDevice>(&mut self, gpu: &G) {
        for pipeline in [&mut self.shade, &mut self.wire, &mut self.point] {
            if *pipeline != vk::Pipeline::null() {
                gpu.destroy_pipeline(*pipeline);
                *pipeline = vk::Pipeline::null();
            }
        }
        for module in self.modules.drain(..) {
            module.destroy(gpu);
        }
    }
}

impl Drop for PreparedPipeline {
    fn drop(&mut self) {
        if self.shade != vk::Pipeline::null()
            || self.wire != vk::Pipeline::null()
            || self.point != vk::Pipeline::null()
        {
            log::warn!("'{}' pipelines dropped without cleanup; GPU handles leaked", self.name);
        }
    }
}

fn create_variant<G: GpuDevice>(
    gpu: &G,
    target: &PipelineTarget<'_>,
    state: &PipelineStateDescriptor,
    stages: &[vk::PipelineShaderStageCreateInfo<'_>],
) -> Result<vk::Pipeline> {
    let input_assembly = state.input_assembly();
    let rasterization = state.rasterization();
    let depth_stencil = state.depth_stencil();
    let multisample = state.multisample();

    let attachments = [state.color_blend_attachment()];
    let color_blend = vk::PipelineColorBlendStateCreateInfo::default()
        .logic_op_enable(false)
        .attachments(&attachments);

    // Viewport and scissor values come from the command buffer
    let viewport = vk::PipelineViewportStateCreateInfo::default()
        .viewport_count(1)
        .scissor_count(1);

    let dynamic = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(state.dynamic_states());

    let info = vk::GraphicsPipelineCreateInfo::default()
        .stages(stages)
        .vertex_input_state(target.vertex_input)
        .input_assembly_state(&input_assembly)
        .viewport_state(&viewport)
        .rasterization_state(&rasterization)
        .multisample_state(&multisample)
        .depth_stencil_state(&depth_stencil)
        .color_blend_state(&color_blend)
        .dynamic_state(&dynamic)
        .layout(target.layout)
        .render_pass(target.render_pass)
        .subpass(0);

    gpu.create_graphics_pipeline(target.cache, &info)
        .map_err(|e| PipelineError::vulkan("vkCreateGraphicsPipelines", e))
}
