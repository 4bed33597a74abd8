//! Vulkan pipeline objects for the scene renderer.
//!
//! Shader loading, fixed-function state, the shared pipeline cache and
//! layout, and the per-category pipeline registry that records draw
//! commands for scene nodes. Device access goes through [`GpuDevice`] and
//! [`CommandRecorder`], implemented for [`ash::Device`].

pub mod gpu;
pub mod layout;
pub mod pipeline;
pub mod pipeline_cache;
pub mod pipeline_set;
pub mod shader;
pub mod state;

#[cfg(test)]
pub(crate) mod mock;

pub use gpu::{CommandRecorder, GpuDevice};
pub use layout::{LayoutDescriptor, NodeConstants};
pub use pipeline::{Pipeline, PipelineShaders, PreparedPipeline};
pub use pipeline_cache::{CacheIdentity, PipelineCache};
pub use pipeline_set::{BindRoutine, PipelineSet, PreparedPipelineSet};
pub use shader::{load_shader, ShaderProgram, ShaderStage};
pub use state::{DepthPolicy, PipelineStateDescriptor};
