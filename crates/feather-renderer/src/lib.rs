//! Rendering pipeline management for the feather scene graph.
//!
//! A [`PipelineSet`] holds one [`Pipeline`] per node category. Each pipeline
//! is three Vulkan graphics pipelines built from SPIR-V shaders: a shaded
//! triangle pass, a wireframe edge pass and an edge-vertex point pass. Once
//! prepared, the set records the bind and draw commands for every node
//! according to its category.
//!
//! ```no_run
//! # use ash::vk;
//! # use feather_renderer::{PipelineSet, PipelineSetConfig, LayoutDescriptor, CacheIdentity};
//! # fn run(device: &ash::Device, props: &vk::PhysicalDeviceProperties, render_pass: vk::RenderPass,
//! #        vertex_input: &vk::PipelineVertexInputStateCreateInfo<'_>, cmd: vk::CommandBuffer,
//! #        nodes: &[feather_scene::Node]) -> feather_renderer::Result<()> {
//! let mut set = PipelineSet::from_config(&PipelineSetConfig::default())?;
//! set.create_cache(device, &CacheIdentity::from(props))?;
//! set.create_layout(device, &LayoutDescriptor::default().with_node_constants())?;
//! let set = set.prepare(device, render_pass, vertex_input)?;
//!
//! set.record(device, cmd, nodes, [0]);
//!
//! set.cleanup(device);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod vulkan;

pub use config::{CategoryConfig, PipelineSetConfig};
pub use error::{ErrorKind, PipelineError, Result};
pub use vulkan::{
    BindRoutine, CacheIdentity, CommandRecorder, GpuDevice, LayoutDescriptor, Pipeline,
    PipelineSet, PipelineShaders, PipelineStateDescriptor, PreparedPipeline, PreparedPipelineSet,
    ShaderStage,
};
