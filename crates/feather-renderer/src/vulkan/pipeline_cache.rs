//! Shared pipeline cache, optionally persisted between runs.
//!
//! When a cache path is configured the cache is seeded from disk, letting
//! the driver skip recompiling shader/state combinations it has already
//! seen, and written back on cleanup.
//!
//! Data is only reused when the Vulkan cache header matches the current
//! device (vendor, device id and pipeline-cache UUID).

use std::fs;
use std::path::{Path, PathBuf};

use ash::vk;

use super::gpu::GpuDevice;
use crate::error::{PipelineError, Result};

/// Size of the version-one Vulkan pipeline cache header.
const VK_CACHE_HEADER_SIZE: usize = 16 + vk::UUID_SIZE;

/// Device properties a persisted cache must match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheIdentity {
    pub vendor_id: u32,
    pub device_id: u32,
    pub pipeline_cache_uuid: [u8; vk::UUID_SIZE],
}

impl From<&vk::PhysicalDeviceProperties> for CacheIdentity {
    fn from(props: &vk::PhysicalDeviceProperties) -> Self {
        Self {
            vendor_id: props.vendor_id,
            device_id: props.device_id,
            pipeline_cache_uuid: props.pipeline_cache_uuid,
        }
    }
}

/// The pipeline cache shared by every category of a pipeline set.
#[derive(Debug)]
pub struct PipelineCache {
    cache: vk::PipelineCache,
    path: Option<PathBuf>,
    loaded_from_disk: bool,
}

impl PipelineCache {
    /// Create the cache, seeding it from `path` when that file holds data
    /// for this device.
    pub fn create<G: GpuDevice>(gpu: &G, path: Option<&Path>, identity: &CacheIdentity) -> Result<Self> {
        let initial_data = path.and_then(|p| Self::load_cache_data(p, identity));

        let cache = gpu
            .create_pipeline_cache(initial_data.as_deref().unwrap_or(&[]))
            .map_err(|e| PipelineError::vulkan("vkCreatePipelineCache", e))?;

        match &initial_data {
            Some(data) => log::info!("Loaded pipeline cache from disk ({} bytes)", data.len()),
            None => log::info!("Created empty pipeline cache"),
        }

        Ok(Self {
            cache,
            path: path.map(Path::to_path_buf),
            loaded_from_disk: initial_data.is_some(),
        })
    }

    fn load_cache_data(path: &Path, identity: &CacheIdentity) -> Option<Vec<u8>> {
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                log::warn!("Discarding pipeline cache {}: {}", path.display(), e);
                return None;
            }
        };
        match validate_header(&data, identity) {
            Ok(()) => Some(data),
            Err(reason) => {
                log::warn!("Discarding pipeline cache {}: {}", path.display(), reason);
                None
            }
        }
    }

    pub fn handle(&self) -> vk::PipelineCache {
        self.cache
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn was_loaded_from_disk(&self) -> bool {
        self.loaded_from_disk
    }

    /// Write the driver's cache data to the configured path, if any.
    pub fn save<G: GpuDevice>(&self, gpu: &G) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let data = gpu
            .pipeline_cache_data(self.cache)
            .map_err(|e| PipelineError::vulkan("vkGetPipelineCacheData", e))?;
        if data.is_empty() {
            return Ok(());
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| PipelineError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        fs::write(path, &data).map_err(|e| PipelineError::Io {
            path: path.clone(),
            source: e,
        })?;

        log::info!("Saved pipeline cache to disk ({} bytes)", data.len());
        Ok(())
    }

    /// Save (when persisted) and destroy the cache.
    pub fn destroy<G: GpuDevice>(self, gpu: &G) {
        if let Err(e) = self.save(gpu) {
            log::warn!("Pipeline cache not saved: {}", e);
        }
        gpu.destroy_pipeline_cache(self.cache);
    }
}

/// Check a Vulkan pipeline cache header against the current device.
pub fn validate_header(data: &[u8], identity: &CacheIdentity) -> std::result::Result<(), String> {
    if data.len() < VK_CACHE_HEADER_SIZE {
        return Err(format!("{} bytes is shorter than the header", data.len()));
    }

    let word = |i: usize| u32::from_ne_bytes([data[i], data[i + 1], data[i + 2], data[i + 3]]);
    let header_size = word(0) as usize;
    let header_version = word(4);
    let vendor_id = word(8);
    let device_id = word(12);

    if header_size < VK_CACHE_HEADER_SIZE || header_size > data.len() {
        return Err(format!("invalid header size {}", header_size));
    }
    if header_version != vk::PipelineCacheHeaderVersion::ONE.as_raw() as u32 {
        return Err(format!("invalid header version {}", header_version));
    }
    if vendor_id != identity.vendor_id || device_id != identity.device_id {
        return Err(format!(
            "device mismatch (cache: {:04x}:{:04x}, current: {:04x}:{:04x})",
            vendor_id, device_id, identity.vendor_id, identity.device_id
        ));
    }
    if data[16..VK_CACHE_HEADER_SIZE] != identity.pipeline_cache_uuid {
        return Err("UUID mismatch".to_string());
    }

    Ok(())
}

#[cfg(test)]
pub(crate) fn header_for(identity: &CacheIdentity, payload: &[u8]) -> Vec<u8> {
    let mut data = Vec::with_capacity(VK_CACHE_HEADER_SIZE + payload.len());
    data.extend_from_slice(&(VK_CACHE_HEADER_SIZE as u32).to_ne_bytes());
    data.extend_from_slice(&1u32.to_ne_bytes());
    data.extend_from_slice(&identity.vendor_id.to_ne_bytes());
    data.extend_from_slice(&identity.device_id.to_ne_bytes());
    data.extend_from_slice(&identity.pipeline_cache_uuid);
    data.extend_from_slice(payload);
    data
}
