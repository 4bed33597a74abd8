//! Error types for pipeline construction.
//!
//! Construction-time failures (missing shader assets, driver rejections,
//! lifecycle misuse, bad configuration) are returned as [`PipelineError`].
//! Recording draw commands never fails and has no error path.

use std::path::PathBuf;

use ash::vk;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Coarse classification of a [`PipelineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A shader asset is missing from disk.
    AssetNotFound,
    /// A shader asset exists but is not a usable SPIR-V binary.
    InvalidAsset,
    /// The driver ran out of host or device memory.
    ResourceExhausted,
    /// The driver rejected a call for any other reason.
    Driver,
    /// A lifecycle step was skipped or reordered.
    Sequence,
    /// The configuration is inconsistent.
    Config,
    /// Reading or writing a persisted file failed.
    Io,
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Shader not found: {}", path.display())]
    AssetNotFound { path: PathBuf },

    #[error("Invalid shader binary {}: {reason}", path.display())]
    InvalidAsset { path: PathBuf, reason: String },

    #[error("Vulkan error in {call}: {result:?}")]
    Vulkan { call: &'static str, result: vk::Result },

    #[error("Pipeline lifecycle error: {0}")]
    Sequence(&'static str),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    /// Wrap a failed driver call, naming the call for diagnostics.
    pub fn vulkan(call: &'static str, result: vk::Result) -> Self {
        PipelineError::Vulkan { call, result }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::AssetNotFound { .. } => ErrorKind::AssetNotFound,
            PipelineError::InvalidAsset { .. } => ErrorKind::InvalidAsset,
            PipelineError::Vulkan { result, .. } => match *result {
                vk::Result::ERROR_OUT_OF_HOST_MEMORY | vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => {
                    ErrorKind::ResourceExhausted
                }
                _ => ErrorKind::Driver,
            },
            PipelineError::Sequence(_) => ErrorKind::Sequence,
            PipelineError::Config(_) => ErrorKind::Config,
            PipelineError::Io { .. } => ErrorKind::Io,
        }
    }
}
