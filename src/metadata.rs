//! Persisted volume metadata.
//!
//! Stored next to the raw voxel dump as `<base>.json`:
//!
//! ```json
//! {
//!   "voxmap": {
//!     "width": 512, "height": 512, "depth": 300,
//!     "source": "/data/stack", "outbase": "/data/out/stack",
//!     "importdate": "2026-01-01T12:00:00Z",
//!     "names": { "3": "soma" }
//!   }
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeMetadata {
    pub width: usize,
    pub height: usize,
    pub depth: usize,

    /// Directory the slices were imported from
    pub source: PathBuf,

    /// Base path of the `.json`/`.data` pair
    pub outbase: PathBuf,

    #[serde(rename = "importdate")]
    pub import_date: DateTime<Utc>,

    /// User-assigned segment names, keyed by label id
    #[serde(default)]
    pub names: BTreeMap<u16, String>,
}

impl VolumeMetadata {
    pub fn new(dim: (usize, usize, usize), source: impl Into<PathBuf>) -> Self {
        let (depth, height, width) = dim;
        Self {
            width,
            height,
            depth,
            source: source.into(),
            outbase: PathBuf::new(),
            import_date: Utc::now(),
            names: BTreeMap::new(),
        }
    }

    pub fn voxel_count(&self) -> Option<u64> {
        (self.width as u64)
            .checked_mul(self.height as u64)?
            .checked_mul(self.depth as u64)
    }

    /// Path of the raw voxel dump belonging to `outbase`
    pub fn data_path(&self) -> PathBuf {
        with_suffix(&self.outbase, "data")
    }
}

/// Top-level record of the metadata file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct MetadataFile {
    pub voxmap: VolumeMetadata,
}

/// Append `.suffix` to a base path without replacing an existing extension.
pub(crate) fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut path = base.as_os_str().to_owned();
    path.push(".");
    path.push(suffix);
    PathBuf::from(path)
}
