//! Pipeline set configuration.
//!
//! Everything has a default matching the built-in mesh and light categories,
//! so an empty JSON object is a valid configuration.

use std::fs;
use std::path::{Path, PathBuf};

use ash::vk;
use feather_scene::NodeCategory;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::vulkan::pipeline::PipelineShaders;
use crate::vulkan::pipeline_set::{BindRoutine, DEFAULT_DYNAMIC_LINE_WIDTH};
use crate::vulkan::state::{PipelineStateDescriptor, DEFAULT_EDGE_LINE_WIDTH};

/// Where `build.rs` put the compiled shaders, if glslc was available.
const BUILT_SPIRV_DIR: Option<&str> = option_env!("FEATHER_SPIRV_DIR");

/// One category of the registry: its pipeline shaders, the bind routine it
/// draws with and the node categories routed to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryConfig {
    pub name: String,
    pub routine: BindRoutine,
    #[serde(default)]
    pub nodes: Vec<NodeCategory>,
    pub shaders: PipelineShaders,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSetConfig {
    /// Base directory for relative shader paths.
    pub shader_dir: PathBuf,
    /// Rasterization samples; must match the render pass.
    pub msaa_samples: u32,
    /// Line width baked into the edge state.
    pub edge_line_width: f32,
    /// Line width recorded before each wireframe draw.
    pub dynamic_line_width: f32,
    /// Persisted pipeline cache location.
    pub cache_path: Option<PathBuf>,
    /// Category drawing nodes no route names.
    pub fallback: String,
    pub categories: Vec<CategoryConfig>,
}

impl Default for PipelineSetConfig {
    fn default() -> Self {
        Self {
            shader_dir: default_shader_dir(),
            msaa_samples: 4,
            edge_line_width: DEFAULT_EDGE_LINE_WIDTH,
            dynamic_line_width: DEFAULT_DYNAMIC_LINE_WIDTH,
            cache_path: None,
            fallback: "mesh".to_string(),
            categories: vec![
                CategoryConfig {
                    name: "mesh".to_string(),
                    routine: BindRoutine::Mesh,
                    nodes: vec![NodeCategory::Null, NodeCategory::Camera, NodeCategory::Mesh],
                    shaders: mesh_shaders(),
                },
                CategoryConfig {
                    name: "light".to_string(),
                    routine: BindRoutine::Light,
                    nodes: vec![NodeCategory::Light],
                    shaders: light_shaders(),
                },
            ],
        }
    }
}

impl PipelineSetConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| PipelineError::Config(format!("invalid JSON: {}", e)))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| PipelineError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json(&json)
    }

    /// The configured sample count as Vulkan flags.
    pub fn sample_count(&self) -> Result<vk::SampleCountFlags> {
        sample_count_flags(self.msaa_samples).ok_or_else(|| {
            PipelineError::Config(format!("unsupported MSAA sample count {}", self.msaa_samples))
        })
    }

    /// The configured sample count, lowered to the highest count both the
    /// colour and depth attachments of this device support.
    pub fn sample_count_for(&self, limits: &vk::PhysicalDeviceLimits) -> Result<vk::SampleCountFlags> {
        let requested = self.sample_count()?;
        let supported = limits.framebuffer_color_sample_counts & limits.framebuffer_depth_sample_counts;

        let candidates = [
            vk::SampleCountFlags::TYPE_64,
            vk::SampleCountFlags::TYPE_32,
            vk::SampleCountFlags::TYPE_16,
            vk::SampleCountFlags::TYPE_8,
            vk::SampleCountFlags::TYPE_4,
            vk::SampleCountFlags::TYPE_2,
        ];
        for flag in candidates {
            if requested.as_raw() >= flag.as_raw() && supported.contains(flag) {
                return Ok(flag);
            }
        }
        Ok(vk::SampleCountFlags::TYPE_1)
    }

    /// Edge state descriptor built from the configured samples and width.
    pub fn edge_state(&self) -> Result<PipelineStateDescriptor> {
        self.edge_state_with(self.sample_count()?)
    }

    /// Like [`edge_state`](Self::edge_state), with the sample count lowered
    /// to what the device supports.
    pub fn edge_state_for(&self, limits: &vk::PhysicalDeviceLimits) -> Result<PipelineStateDescriptor> {
        self.edge_state_with(self.sample_count_for(limits)?)
    }

    fn edge_state_with(&self, samples: vk::SampleCountFlags) -> Result<PipelineStateDescriptor> {
        if !(self.edge_line_width > 0.0) {
            return Err(PipelineError::Config(format!(
                "edge line width must be positive, got {}",
                self.edge_line_width
            )));
        }
        Ok(PipelineStateDescriptor::edges()
            .with_samples(samples)
            .with_line_width(self.edge_line_width))
    }
}

/// Shader binaries of the built-in mesh category.
pub fn mesh_shaders() -> PipelineShaders {
    PipelineShaders {
        shade_vert: "mesh_shade.vert.spv".into(),
        shade_frag: "mesh_shade.frag.spv".into(),
        wire_vert: "mesh_wire.vert.spv".into(),
        wire_frag: "mesh_wire.frag.spv".into(),
        wire_geom: "mesh_wire.geom.spv".into(),
        point_vert: "mesh_point.vert.spv".into(),
        point_frag: "mesh_point.frag.spv".into(),
        point_geom: "mesh_point.geom.spv".into(),
    }
}

/// Shader binaries of the built-in light category. Only the wireframe
/// colour differs from the mesh category.
pub fn light_shaders() -> PipelineShaders {
    PipelineShaders {
        wire_frag: "light_wire.frag.spv".into(),
        ..mesh_shaders()
    }
}

pub fn default_shader_dir() -> PathBuf {
    PathBuf::from(BUILT_SPIRV_DIR.unwrap_or("shaders/spirv"))
}

fn sample_count_flags(samples: u32) -> Option<vk::SampleCountFlags> {
    match samples {
        1 => Some(vk::SampleCountFlags::TYPE_1),
        2 => Some(vk::SampleCountFlags::TYPE_2),
        4 => Some(vk::SampleCountFlags::TYPE_4),
        8 => Some(vk::SampleCountFlags::TYPE_8),
        16 => Some(vk::SampleCountFlags::TYPE_16),
        32 => Some(vk::SampleCountFlags::TYPE_32),
        64 => Some(vk::SampleCountFlags::TYPE_64),
        _ => None,
    }
}
