//! Engine configuration.
//!
//! All fields have defaults, so a config file only needs to name what it
//! overrides:
//!
//! ```json
//! { "max_megavoxels": 512, "id_factor": 4 }
//! ```

use crate::enums::RenderMode;
use crate::lut::HALF_DEPTH;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeConfig {
    /// Safety ceiling on X·Y·Z, in units of 2^20 voxels
    pub max_megavoxels: u64,
    /// Value returned for samples outside the volume
    pub null_value: u8,
    /// Volume voxels per label cell along each axis
    pub id_factor: u32,
    /// Samples marched into the screen per pixel
    pub depth_samples: u32,
    /// LUT depth bucket used for every rendered row; the default is the
    /// farthest "behind" row
    pub depth_bucket: i32,
    pub worker_threads: usize,
    /// Ball brush radius in volume voxels
    pub ball_radius: f32,
    pub render_mode: RenderMode,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            max_megavoxels: 2048,
            null_value: 0,
            id_factor: 1,
            depth_samples: 10,
            depth_bucket: -HALF_DEPTH,
            worker_threads: 4,
            ball_radius: 9.0,
            render_mode: RenderMode::DepthComposite,
        }
    }
}

impl VolumeConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn max_voxels(&self) -> u64 {
        self.max_megavoxels.saturating_mul(1024 * 1024)
    }

    pub fn with_max_megavoxels(mut self, max_megavoxels: u64) -> Self {
        self.max_megavoxels = max_megavoxels;
        self
    }

    pub fn with_id_factor(mut self, id_factor: u32) -> Self {
        self.id_factor = id_factor.max(1);
        self
    }

    pub fn with_null_value(mut self, null_value: u8) -> Self {
        self.null_value = null_value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{ "max_megavoxels": 16, "id_factor": 3 }}"#).unwrap();

        let config = VolumeConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.max_megavoxels, 16);
        assert_eq!(config.id_factor, 3);
        assert_eq!(config.depth_samples, 10);
        assert_eq!(config.worker_threads, 4);
        assert_eq!(config.depth_bucket, -HALF_DEPTH);
        assert_eq!(config.max_voxels(), 16 * 1024 * 1024);
    }

    #[test]
    fn test_invalid_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            VolumeConfig::from_json_file(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }
}
