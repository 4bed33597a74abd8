//! SPIR-V shader loading.
//!
//! Shader binaries are precompiled (see `build.rs`) and loaded from disk by
//! path. A binary only reaches the driver after a header sanity check.

use std::ffi::CStr;
use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use ash::vk;

use super::gpu::GpuDevice;
use crate::error::{PipelineError, Result};

/// SPIR-V magic number, first word of every module.
pub const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Entry point every bundled shader exports.
pub const SHADER_ENTRY_POINT: &CStr = c"main";

/// Pipeline stage a shader module is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Geometry,
}

impl ShaderStage {
    pub fn flags(self) -> vk::ShaderStageFlags {
        match self {
            ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
            ShaderStage::Fragment => vk::ShaderStageFlags::FRAGMENT,
            ShaderStage::Geometry => vk::ShaderStageFlags::GEOMETRY,
        }
    }
}

/// A shader module resident on the device, tagged with its stage.
///
/// Owned by the pipeline that loaded it and destroyed by that pipeline's
/// cleanup.
#[derive(Debug)]
pub struct ShaderProgram {
    module: vk::ShaderModule,
    stage: ShaderStage,
    path: PathBuf,
}

impl ShaderProgram {
    pub fn module(&self) -> vk::ShaderModule {
        self.module
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stage description for a graphics pipeline create-info.
    pub fn stage_info(&self) -> vk::PipelineShaderStageCreateInfo<'static> {
        vk::PipelineShaderStageCreateInfo::default()
            .stage(self.stage.flags())
            .module(self.module)
            .name(SHADER_ENTRY_POINT)
    }

    pub(crate) fn destroy<G: GpuDevice>(self, gpu: &G) {
        gpu.destroy_shader_module(self.module);
    }
}

/// Load a SPIR-V binary from `path` and create a shader module for `stage`.
pub fn load_shader<G: GpuDevice>(gpu: &G, path: &Path, stage: ShaderStage) -> Result<ShaderProgram> {
    let bytes = fs::read(path).map_err(|e| match e.kind() {
        IoErrorKind::NotFound => PipelineError::AssetNotFound { path: path.to_path_buf() },
        _ => PipelineError::Io { path: path.to_path_buf(), source: e },
    })?;

    let code = spirv_words(&bytes).map_err(|reason| PipelineError::InvalidAsset {
        path: path.to_path_buf(),
        reason,
    })?;

    let module = gpu
        .create_shader_module(&code)
        .map_err(|e| PipelineError::vulkan("vkCreateShaderModule", e))?;

    log::debug!("Loaded {:?} shader {} ({} bytes)", stage, path.display(), bytes.len());

    Ok(ShaderProgram {
        module,
        stage,
        path: path.to_path_buf(),
    })
}

/// Check the SPIR-V header and convert the binary to native-endian words.
///
/// Modules written in the opposite byte order are swapped.
pub fn spirv_words(bytes: &[u8]) -> std::result::Result<Vec<u32>, String> {
    if bytes.is_empty() {
        return Err("empty file".to_string());
    }
    if bytes.len() % 4 != 0 {
        return Err(format!("size {} is not a multiple of 4", bytes.len()));
    }

    let mut words: Vec<u32> = bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();

    if words[0] == SPIRV_MAGIC.swap_bytes() {
        for word in &mut words {
            *word = word.swap_bytes();
        }
    } else if words[0] != SPIRV_MAGIC {
        return Err(format!("bad magic number {:#010x}", words[0]));
    }

    Ok(words)
}
