//! Recording device double used by the unit tests.
//!
//! Hands out unique fake handles, records every call in order, snapshots the
//! create-info of each graphics pipeline and can be told to fail.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use ash::prelude::VkResult;
use ash::vk::{self, Handle};

use super::gpu::{CommandRecorder, GpuDevice};
use super::pipeline::PipelineShaders;
use super::shader::SPIRV_MAGIC;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateShaderModule(vk::ShaderModule),
    DestroyShaderModule(vk::ShaderModule),
    CreatePipeline(vk::Pipeline),
    DestroyPipeline(vk::Pipeline),
    CreatePipelineCache { cache: vk::PipelineCache, initial_len: usize },
    PipelineCacheData(vk::PipelineCache),
    DestroyPipelineCache(vk::PipelineCache),
    CreatePipelineLayout { layout: vk::PipelineLayout, set_layouts: u32, push_constant_ranges: u32 },
    DestroyPipelineLayout(vk::PipelineLayout),
    BindVertexBuffers { first_binding: u32, buffers: Vec<vk::Buffer>, offsets: Vec<vk::DeviceSize> },
    BindIndexBuffer { buffer: vk::Buffer, offset: vk::DeviceSize, index_type: vk::IndexType },
    BindPipeline(vk::Pipeline),
    SetLineWidth(f32),
    DrawIndexed { index_count: u32, instance_count: u32, first_index: u32, vertex_offset: i32, first_instance: u32 },
}

/// Rasterization, blend, depth/stencil, multisample and dynamic state of a
/// pipeline create-info. Topology and stages are excluded.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedState {
    pub polygon_mode: vk::PolygonMode,
    pub cull_mode: vk::CullModeFlags,
    pub front_face: vk::FrontFace,
    pub line_width: f32,
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_compare: vk::CompareOp,
    pub stencil_test: bool,
    pub samples: vk::SampleCountFlags,
    pub color_write_mask: vk::ColorComponentFlags,
    pub blend_enable: bool,
    pub dynamic_states: Vec<vk::DynamicState>,
}

/// What the driver was asked to compile.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSnapshot {
    pub pipeline: vk::Pipeline,
    pub cache: vk::PipelineCache,
    pub layout: vk::PipelineLayout,
    pub render_pass: vk::RenderPass,
    pub topology: vk::PrimitiveTopology,
    pub polygon_mode: vk::PolygonMode,
    pub cull_mode: vk::CullModeFlags,
    pub front_face: vk::FrontFace,
    pub line_width: f32,
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_compare: vk::CompareOp,
    pub stencil_test: bool,
    pub samples: vk::SampleCountFlags,
    pub color_write_mask: vk::ColorComponentFlags,
    pub blend_enable: bool,
    pub dynamic_states: Vec<vk::DynamicState>,
    pub stages: Vec<(vk::ShaderStageFlags, vk::ShaderModule)>,
}

impl PipelineSnapshot {
    /// # Safety
    /// Every pointer in `info` must be valid, as during a create call.
    unsafe fn capture(
        pipeline: vk::Pipeline,
        cache: vk::PipelineCache,
        info: &vk::GraphicsPipelineCreateInfo<'_>,
    ) -> Self {
        unsafe {
            let ia = &*info.p_input_assembly_state;
            let rs = &*info.p_rasterization_state;
            let ds = &*info.p_depth_stencil_state;
            let ms = &*info.p_multisample_state;
            let cb = &*info.p_color_blend_state;
            let attachment = *cb.p_attachments;
            let dynamic = &*info.p_dynamic_state;
            let dynamic_states =
                std::slice::from_raw_parts(dynamic.p_dynamic_states, dynamic.dynamic_state_count as usize)
                    .to_vec();
            let stages = std::slice::from_raw_parts(info.p_stages, info.stage_count as usize)
                .iter()
                .map(|s| (s.stage, s.module))
                .collect();

            Self {
                pipeline,
                cache,
                layout: info.layout,
                render_pass: info.render_pass,
                topology: ia.topology,
                polygon_mode: rs.polygon_mode,
                cull_mode: rs.cull_mode,
                front_face: rs.front_face,
                line_width: rs.line_width,
                depth_test: ds.depth_test_enable == vk::TRUE,
                depth_write: ds.depth_write_enable == vk::TRUE,
                depth_compare: ds.depth_compare_op,
                stencil_test: ds.stencil_test_enable == vk::TRUE,
                samples: ms.rasterization_samples,
                color_write_mask: attachment.color_write_mask,
                blend_enable: attachment.blend_enable == vk::TRUE,
                dynamic_states,
                stages,
            }
        }
    }

    pub fn stage_flags(&self) -> Vec<vk::ShaderStageFlags> {
        self.stages.iter().map(|(flags, _)| *flags).collect()
    }

    pub fn stage_modules(&self) -> Vec<vk::ShaderModule> {
        self.stages.iter().map(|(_, module)| *module).collect()
    }

    pub fn fixed_state(&self) -> FixedState {
        FixedState {
            polygon_mode: self.polygon_mode,
            cull_mode: self.cull_mode,
            front_face: self.front_face,
            line_width: self.line_width,
            depth_test: self.depth_test,
            depth_write: self.depth_write,
            depth_compare: self.depth_compare,
            stencil_test: self.stencil_test,
            samples: self.samples,
            color_write_mask: self.color_write_mask,
            blend_enable: self.blend_enable,
            dynamic_states: self.dynamic_states.clone(),
        }
    }
}

pub struct RecordingGpu {
    calls: RefCell<Vec<Call>>,
    snapshots: RefCell<Vec<PipelineSnapshot>>,
    command_buffers: RefCell<Vec<vk::CommandBuffer>>,
    live: RefCell<HashSet<u64>>,
    next_handle: Cell<u64>,
    pipeline_attempts: Cell<usize>,
    fail_pipeline: Cell<Option<(usize, vk::Result)>>,
    fail_shader_modules: Cell<Option<vk::Result>>,
    fail_layout: Cell<Option<vk::Result>>,
    cache_data: RefCell<Vec<u8>>,
}

impl RecordingGpu {
    pub fn new() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            snapshots: RefCell::new(Vec::new()),
            command_buffers: RefCell::new(Vec::new()),
            live: RefCell::new(HashSet::new()),
            next_handle: Cell::new(0x1000),
            pipeline_attempts: Cell::new(0),
            fail_pipeline: Cell::new(None),
            fail_shader_modules: Cell::new(None),
            fail_layout: Cell::new(None),
            cache_data: RefCell::new(Vec::new()),
        }
    }

    /// Fail the `attempt`-th graphics pipeline creation (zero based).
    pub fn fail_pipeline(&self, attempt: usize, result: vk::Result) {
        self.fail_pipeline.set(Some((attempt, result)));
    }

    pub fn fail_shader_modules(&self, result: vk::Result) {
        self.fail_shader_modules.set(Some(result));
    }

    pub fn fail_layout(&self, result: vk::Result) {
        self.fail_layout.set(Some(result));
    }

    /// Data returned by the next pipeline cache readback.
    pub fn set_cache_data(&self, data: Vec<u8>) {
        *self.cache_data.borrow_mut() = data;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    /// Forget recorded calls and snapshots. Live handles are kept.
    pub fn clear(&self) {
        self.calls.borrow_mut().clear();
        self.snapshots.borrow_mut().clear();
        self.command_buffers.borrow_mut().clear();
    }

    pub fn created_pipelines(&self) -> Vec<PipelineSnapshot> {
        self.snapshots.borrow().clone()
    }

    /// Handles created and not yet destroyed.
    pub fn live_handles(&self) -> Vec<u64> {
        let mut live: Vec<u64> = self.live.borrow().iter().copied().collect();
        live.sort_unstable();
        live
    }

    /// Command buffers every recorded command went to.
    pub fn command_buffers(&self) -> Vec<vk::CommandBuffer> {
        self.command_buffers.borrow().clone()
    }

    /// Index counts of every indexed draw, in recording order.
    pub fn draw_counts(&self) -> Vec<u32> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                Call::DrawIndexed { index_count, .. } => Some(*index_count),
                _ => None,
            })
            .collect()
    }

    fn create(&self) -> u64 {
        let raw = self.next_handle.get();
        self.next_handle.set(raw + 1);
        self.live.borrow_mut().insert(raw);
        raw
    }

    fn destroy(&self, raw: u64) {
        assert!(self.live.borrow_mut().remove(&raw), "destroying unknown handle {raw:#x}");
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }

    fn record_command(&self, cmd: vk::CommandBuffer, call: Call) {
        self.command_buffers.borrow_mut().push(cmd);
        self.record(call);
    }
}

impl GpuDevice for RecordingGpu {
    fn create_shader_module(&self, code: &[u32]) -> VkResult<vk::ShaderModule> {
        assert_eq!(code[0], SPIRV_MAGIC);
        if let Some(result) = self.fail_shader_modules.get() {
            return Err(result);
        }
        let module = vk::ShaderModule::from_raw(self.create());
        self.record(Call::CreateShaderModule(module));
        Ok(module)
    }

    fn destroy_shader_module(&self, module: vk::ShaderModule) {
        self.destroy(module.as_raw());
        self.record(Call::DestroyShaderModule(module));
    }

    fn create_graphics_pipeline(
        &self,
        cache: vk::PipelineCache,
        info: &vk::GraphicsPipelineCreateInfo<'_>,
    ) -> VkResult<vk::Pipeline> {
        let attempt = self.pipeline_attempts.get();
        self.pipeline_attempts.set(attempt + 1);
        if let Some((failing, result)) = self.fail_pipeline.get() {
            if failing == attempt {
                return Err(result);
            }
        }

        let pipeline = vk::Pipeline::from_raw(self.create());
        // SAFETY: info is borrowed for the duration of the create call
        let snapshot = unsafe { PipelineSnapshot::capture(pipeline, cache, info) };
        self.snapshots.borrow_mut().push(snapshot);
        self.record(Call::CreatePipeline(pipeline));
        Ok(pipeline)
    }

    fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        self.destroy(pipeline.as_raw());
        self.record(Call::DestroyPipeline(pipeline));
    }

    fn create_pipeline_cache(&self, initial_data: &[u8]) -> VkResult<vk::PipelineCache> {
        let cache = vk::PipelineCache::from_raw(self.create());
        self.record(Call::CreatePipelineCache { cache, initial_len: initial_data.len() });
        Ok(cache)
    }

    fn pipeline_cache_data(&self, cache: vk::PipelineCache) -> VkResult<Vec<u8>> {
        self.record(Call::PipelineCacheData(cache));
        Ok(self.cache_data.borrow().clone())
    }

    fn destroy_pipeline_cache(&self, cache: vk::PipelineCache) {
        self.destroy(cache.as_raw());
        self.record(Call::DestroyPipelineCache(cache));
    }

    fn create_pipeline_layout(
        &self,
        info: &vk::PipelineLayoutCreateInfo<'_>,
    ) -> VkResult<vk::PipelineLayout> {
        if let Some(result) = self.fail_layout.get() {
            return Err(result);
        }
        let layout = vk::PipelineLayout::from_raw(self.create());
        self.record(Call::CreatePipelineLayout {
            layout,
            set_layouts: info.set_layout_count,
            push_constant_ranges: info.push_constant_range_count,
        });
        Ok(layout)
    }

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        self.destroy(layout.as_raw());
        self.record(Call::DestroyPipelineLayout(layout));
    }
}

impl CommandRecorder for RecordingGpu {
    fn bind_vertex_buffers(
        &self,
        cmd: vk::CommandBuffer,
        first_binding: u32,
        buffers: &[vk::Buffer],
        offsets: &[vk::DeviceSize],
    ) {
        self.record_command(
            cmd,
            Call::BindVertexBuffers {
                first_binding,
                buffers: buffers.to_vec(),
                offsets: offsets.to_vec(),
            },
        );
    }

    fn bind_index_buffer(
        &self,
        cmd: vk::CommandBuffer,
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        index_type: vk::IndexType,
    ) {
        self.record_command(cmd, Call::BindIndexBuffer { buffer, offset, index_type });
    }

    fn bind_pipeline(&self, cmd: vk::CommandBuffer, pipeline: vk::Pipeline) {
        self.record_command(cmd, Call::BindPipeline(pipeline));
    }

    fn set_line_width(&self, cmd: vk::CommandBuffer, width: f32) {
        self.record_command(cmd, Call::SetLineWidth(width));
    }

    fn draw_indexed(
        &self,
        cmd: vk::CommandBuffer,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) {
        self.record_command(
            cmd,
            Call::DrawIndexed {
                index_count,
                instance_count,
                first_index,
                vertex_offset,
                first_instance,
            },
        );
    }
}

/// Fresh per-test directory under the system temp dir.
pub fn fixture_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("feather_test_{}_{}", name, std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

/// Write a minimal SPIR-V module (header words only).
pub fn write_spirv(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    let words = [SPIRV_MAGIC, 0x0001_0000, 0, 16, 0];
    let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
    fs::write(&path, bytes).unwrap();
    path
}

/// Write the eight binaries of one category and return their paths.
pub fn write_shader_set(dir: &Path) -> PipelineShaders {
    PipelineShaders {
        shade_vert: write_spirv(dir, "mesh_shade.vert.spv"),
        shade_frag: write_spirv(dir, "mesh_shade.frag.spv"),
        wire_vert: write_spirv(dir, "mesh_wire.vert.spv"),
        wire_frag: write_spirv(dir, "mesh_wire.frag.spv"),
        wire_geom: write_spirv(dir, "mesh_wire.geom.spv"),
        point_vert: write_spirv(dir, "mesh_point.vert.spv"),
        point_frag: write_spirv(dir, "mesh_point.frag.spv"),
        point_geom: write_spirv(dir, "mesh_point.geom.spv"),
    }
}

/// Write every binary the default configuration references.
pub fn write_default_shaders(dir: &Path) {
    write_shader_set(dir);
    write_spirv(dir, "light_wire.frag.spv");
}

/// Route `log` output through the test harness.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
