//! Per-category pipeline registry and draw-command dispatch.
//!
//! A [`PipelineSet`] owns the pipeline cache and layout shared by every
//! category, so all its pipelines are cache-compatible. Once prepared it
//! records, for each node, the bind and draw sequence of the routine its
//! category is registered with.
//!
//! Lifecycle: `create_cache` -> `create_layout` -> `prepare` -> `bind`* ->
//! `cleanup`. The last two live on [`PreparedPipelineSet`], so binding an
//! unprepared set or cleaning up twice does not compile.

use std::collections::HashMap;

use ash::vk;
use feather_scene::{GeometryBuffers, Node, NodeCategory};
use serde::{Deserialize, Serialize};

use super::gpu::{CommandRecorder, GpuDevice};
use super::layout::LayoutDescriptor;
use super::pipeline::{Pipeline, PipelineTarget, PreparedPipeline};
use super::pipeline_cache::{CacheIdentity, PipelineCache};
use super::state::PipelineStateDescriptor;
use crate::config::PipelineSetConfig;
use crate::error::{PipelineError, Result};

/// Vertex buffer binding slot used by every category.
pub const VERTEX_BUFFER_BIND_ID: u32 = 0;

/// Line width recorded before wireframe draws.
pub const DEFAULT_DYNAMIC_LINE_WIDTH: f32 = 2.0;

const FIRST_INSTANCE: u32 = 1;

/// Draw sequence used for the nodes of a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindRoutine {
    /// Shaded triangles, then wireframe edges, then edge vertices as points.
    Mesh,
    /// Wireframe edges only.
    Light,
}

#[derive(Debug)]
struct Category<P> {
    pipeline: P,
    routine: BindRoutine,
}

/// Node category to registry slot.
#[derive(Debug, Clone, Default)]
struct RouteTable {
    builtin: [Option<usize>; 4],
    other: HashMap<u32, usize>,
    fallback: Option<usize>,
}

impl RouteTable {
    fn set(&mut self, category: NodeCategory, slot: usize) {
        match category {
            NodeCategory::Other(type_id) => {
                self.other.insert(type_id, slot);
            }
            builtin => {
                if let Some(i) = builtin.builtin_index() {
                    self.builtin[i] = Some(slot);
                }
            }
        }
    }

    /// Only valid once a fallback is set; `prepare` checks that.
    fn resolve(&self, category: NodeCategory, fallback: usize) -> usize {
        let routed = match category {
            NodeCategory::Other(type_id) => self.other.get(&type_id).copied(),
            builtin => builtin.builtin_index().and_then(|i| self.builtin[i]),
        };
        routed.unwrap_or(fallback)
    }
}

/// A pipeline set before its GPU objects exist.
#[derive(Debug)]
pub struct PipelineSet {
    categories: Vec<Category<Pipeline>>,
    routes: RouteTable,
    line_width: f32,
    cache_path: Option<std::path::PathBuf>,
    cache: Option<PipelineCache>,
    layout: Option<vk::PipelineLayout>,
}

impl Default for PipelineSet {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineSet {
    /// An empty set. Categories are added with [`register`](Self::register).
    pub fn new() -> Self {
        Self {
            categories: Vec::new(),
            routes: RouteTable::default(),
            line_width: DEFAULT_DYNAMIC_LINE_WIDTH,
            cache_path: None,
            cache: None,
            layout: None,
        }
    }

    /// Build the registry described by `config`.
    pub fn from_config(config: &PipelineSetConfig) -> Result<Self> {
        Self::with_edge_state(config, config.edge_state()?)
    }

    /// Build the registry described by `config`, lowering its MSAA sample
    /// count to what the device supports.
    pub fn from_config_for(config: &PipelineSetConfig, limits: &vk::PhysicalDeviceLimits) -> Result<Self> {
        Self::with_edge_state(config, config.edge_state_for(limits)?)
    }

    fn with_edge_state(config: &PipelineSetConfig, edge_state: PipelineStateDescriptor) -> Result<Self> {
        if !(config.dynamic_line_width > 0.0) {
            return Err(PipelineError::Config(format!(
                "dynamic line width must be positive, got {}",
                config.dynamic_line_width
            )));
        }

        let mut set = Self::new();
        set.line_width = config.dynamic_line_width;
        set.cache_path = config.cache_path.clone();

        for category in &config.categories {
            let pipeline = Pipeline::new(&category.name, category.shaders.resolved(&config.shader_dir))
                .with_state(edge_state.clone());
            set.register(pipeline, category.routine)?;
            for node in &category.nodes {
                set.route(*node, &category.name)?;
            }
        }
        set.set_fallback(&config.fallback)?;

        Ok(set)
    }

    /// Add a category. Names must be unique.
    pub fn register(&mut self, pipeline: Pipeline, routine: BindRoutine) -> Result<()> {
        if self.slot(pipeline.name()).is_some() {
            return Err(PipelineError::Config(format!(
                "category '{}' registered twice",
                pipeline.name()
            )));
        }
        log::debug!("Registered category '{}' ({:?} routine)", pipeline.name(), routine);
        self.categories.push(Category { pipeline, routine });
        Ok(())
    }

    /// Draw nodes of `category` with the registered category `name`.
    pub fn route(&mut self, category: NodeCategory, name: &str) -> Result<()> {
        let slot = self.require_slot(name)?;
        self.routes.set(category, slot);
        Ok(())
    }

    /// Draw nodes no route names with the registered category `name`.
    pub fn set_fallback(&mut self, name: &str) -> Result<()> {
        self.routes.fallback = Some(self.require_slot(name)?);
        Ok(())
    }

    pub fn set_line_width(&mut self, width: f32) {
        self.line_width = width;
    }

    pub fn pipeline(&self, name: &str) -> Option<&Pipeline> {
        self.slot(name).map(|i| &self.categories[i].pipeline)
    }

    fn slot(&self, name: &str) -> Option<usize> {
        self.categories.iter().position(|c| c.pipeline.name() == name)
    }

    fn require_slot(&self, name: &str) -> Result<usize> {
        self.slot(name)
            .ok_or_else(|| PipelineError::Config(format!("unknown category '{}'", name)))
    }

    /// Create the pipeline cache shared by every category.
    pub fn create_cache<G: GpuDevice>(&mut self, gpu: &G, identity: &CacheIdentity) -> Result<()> {
        if self.cache.is_some() {
            return Err(PipelineError::Sequence("pipeline cache already created"));
        }
        self.cache = Some(PipelineCache::create(gpu, self.cache_path.as_deref(), identity)?);
        Ok(())
    }

    /// Create the pipeline layout shared by every category.
    pub fn create_layout<G: GpuDevice>(&mut self, gpu: &G, descriptor: &LayoutDescriptor) -> Result<()> {
        if self.cache.is_none() {
            return Err(PipelineError::Sequence("create_layout called before create_cache"));
        }
        if self.layout.is_some() {
            return Err(PipelineError::Sequence("pipeline layout already created"));
        }

        let layout = gpu
            .create_pipeline_layout(&descriptor.create_info())
            .map_err(|e| PipelineError::vulkan("vkCreatePipelineLayout", e))?;
        log::info!(
            "Created pipeline layout ({} set layouts, {} push constant ranges)",
            descriptor.set_layouts.len(),
            descriptor.push_constant_ranges.len()
        );
        self.layout = Some(layout);
        Ok(())
    }

    /// Compile every category's pipelines against the shared cache and
    /// layout, in registration order.
    ///
    /// On failure everything this set created is released, including the
    /// layout and cache.
    pub fn prepare<G: GpuDevice>(
        mut self,
        gpu: &G,
        render_pass: vk::RenderPass,
        vertex_input: &vk::PipelineVertexInputStateCreateInfo<'_>,
    ) -> Result<PreparedPipelineSet> {
        let categories = std::mem::take(&mut self.categories);
        let layout = self.layout.take();

        let mut prepared = PreparedPipelineSet {
            categories: Vec::with_capacity(categories.len()),
            routes: std::mem::take(&mut self.routes),
            fallback: 0,
            line_width: self.line_width,
            layout: layout.unwrap_or_else(vk::PipelineLayout::null),
            cache: self.cache.take(),
        };

        let (Some(cache), Some(layout)) = (prepared.cache.as_ref().map(PipelineCache::handle), layout) else {
            prepared.release(gpu);
            return Err(PipelineError::Sequence("prepare called before create_cache/create_layout"));
        };
        let Some(fallback) = prepared.routes.fallback else {
            prepared.release(gpu);
            return Err(PipelineError::Config("no fallback category".to_string()));
        };
        prepared.fallback = fallback;

        let target = PipelineTarget {
            cache,
            layout,
            render_pass,
            vertex_input,
        };
        for category in categories {
            match category.pipeline.prepare(gpu, &target) {
                Ok(pipeline) => prepared.categories.push(Category {
                    pipeline,
                    routine: category.routine,
                }),
                Err(e) => {
                    prepared.release(gpu);
                    return Err(e);
                }
            }
        }

        log::info!("Prepared pipeline set with {} categories", prepared.categories.len());
        Ok(prepared)
    }

    /// Release the cache and layout of a set that will not be prepared.
    pub fn discard<G: GpuDevice>(mut self, gpu: &G) {
        if let Some(layout) = self.layout.take() {
            gpu.destroy_pipeline_layout(layout);
        }
        if let Some(cache) = self.cache.take() {
            cache.destroy(gpu);
        }
    }
}

impl Drop for PipelineSet {
    fn drop(&mut self) {
        if self.cache.is_some() || self.layout.is_some() {
            log::warn!("Pipeline set dropped without prepare or discard; GPU handles leaked");
        }
    }
}

/// A pipeline set with compiled pipeline objects, ready to record draws.
#[derive(Debug)]
pub struct PreparedPipelineSet {
    categories: Vec<Category<PreparedPipeline>>,
    routes: RouteTable,
    fallback: usize,
    line_width: f32,
    layout: vk::PipelineLayout,
    cache: Option<PipelineCache>,
}

impl PreparedPipelineSet {
    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }

    pub fn cache(&self) -> vk::PipelineCache {
        self.cache
            .as_ref()
            .map_or_else(vk::PipelineCache::null, PipelineCache::handle)
    }

    pub fn pipeline(&self, name: &str) -> Option<&PreparedPipeline> {
        self.categories
            .iter()
            .map(|c| &c.pipeline)
            .find(|p| p.name() == name)
    }

    /// The pipeline and routine nodes of `category` are drawn with.
    pub fn dispatch(&self, category: NodeCategory) -> (&PreparedPipeline, BindRoutine) {
        let entry = &self.categories[self.routes.resolve(category, self.fallback)];
        (&entry.pipeline, entry.routine)
    }

    /// Record the bind and draw commands for one node into `cmd`.
    ///
    /// The command sequence is fixed per routine and must not be reordered:
    /// the index buffer is switched to the edge indices before any edge or
    /// point draw.
    pub fn bind<R: CommandRecorder>(
        &self,
        recorder: &R,
        cmd: vk::CommandBuffer,
        node: &Node,
        offsets: [vk::DeviceSize; 1],
    ) {
        let (pipeline, routine) = self.dispatch(node.category());
        let geometry = node.geometry();
        match routine {
            BindRoutine::Mesh => self.bind_mesh(recorder, cmd, pipeline, geometry, &offsets),
            BindRoutine::Light => self.bind_light(recorder, cmd, pipeline, geometry, &offsets),
        }
    }

    /// Bind every node in caller order.
    pub fn record<'a, R, I>(&self, recorder: &R, cmd: vk::CommandBuffer, nodes: I, offsets: [vk::DeviceSize; 1])
    where
        R: CommandRecorder,
        I: IntoIterator<Item = &'a Node>,
    {
        for node in nodes {
            self.bind(recorder, cmd, node, offsets);
        }
    }

    fn bind_mesh<R: CommandRecorder>(
        &self,
        recorder: &R,
        cmd: vk::CommandBuffer,
        pipeline: &PreparedPipeline,
        geometry: &GeometryBuffers,
        offsets: &[vk::DeviceSize; 1],
    ) {
        recorder.bind_vertex_buffers(cmd, VERTEX_BUFFER_BIND_ID, &[geometry.vertices], offsets);

        // Triangles
        recorder.bind_index_buffer(cmd, geometry.indices, 0, vk::IndexType::UINT32);
        recorder.bind_pipeline(cmd, pipeline.shade());
        recorder.draw_indexed(cmd, geometry.index_count, 1, 0, 0, FIRST_INSTANCE);

        // Edges
        recorder.bind_index_buffer(cmd, geometry.edges, 0, vk::IndexType::UINT32);
        recorder.set_line_width(cmd, self.line_width);
        recorder.bind_pipeline(cmd, pipeline.wire());
        recorder.draw_indexed(cmd, geometry.edge_count, 1, 0, 0, FIRST_INSTANCE);

        // Points, from the edge indices still bound
        recorder.bind_pipeline(cmd, pipeline.point());
        recorder.draw_indexed(cmd, geometry.point_count(), 1, 0, 0, FIRST_INSTANCE);
    }

    fn bind_light<R: CommandRecorder>(
        &self,
        recorder: &R,
        cmd: vk::CommandBuffer,
        pipeline: &PreparedPipeline,
        geometry: &GeometryBuffers,
        offsets: &[vk::DeviceSize; 1],
    ) {
        recorder.bind_vertex_buffers(cmd, VERTEX_BUFFER_BIND_ID, &[geometry.vertices], offsets);
        recorder.bind_index_buffer(cmd, geometry.edges, 0, vk::IndexType::UINT32);

        recorder.set_line_width(cmd, self.line_width);
        recorder.bind_pipeline(cmd, pipeline.wire());
        recorder.draw_indexed(cmd, geometry.edge_count, 1, 0, 0, FIRST_INSTANCE);
    }

    /// Destroy every category's pipelines, then the shared layout, then the
    /// cache (saving it first when a cache path is configured).
    pub fn cleanup<G: GpuDevice>(mut self, gpu: &G) {
        self.release(gpu);
        log::info!("Pipeline set cleaned up");
    }

    fn release<G: GpuDevice>(&mut self, gpu: &G) {
        for category in self.categories.drain(..) {
            category.pipeline.cleanup(gpu);
        }
        if self.layout != vk::PipelineLayout::null() {
            gpu.destroy_pipeline_layout(self.layout);
            self.layout = vk::PipelineLayout::null();
        }
        if let Some(cache) = self.cache.take() {
            cache.destroy(gpu);
        }
    }
}

impl Drop for PreparedPipelineSet {
    fn drop(&mut self) {
        if self.layout != vk::PipelineLayout::null() {
            log::warn!("Pipeline set dropped without cleanup; GPU handles leaked");
        }
    }
}
