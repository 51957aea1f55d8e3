use crate::{
    config::VolumeConfig,
    metadata::{MetadataFile, VolumeMetadata, with_suffix},
    volume::Volume,
};

use image::GrayImage;
use ndarray::{Array3, ArrayView2, Axis};
use rayon::prelude::*;
use std::{
    fs::{self, File},
    io::Read,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{debug, info, warn};
use web_time::Instant;

const SLICE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "tif", "tiff", "png"];

#[derive(Debug, Error)]
pub enum VolumeError {
    #[error("No image slices found in {0}")]
    NoImages(PathBuf),

    #[error("Volume of {voxels} voxels exceeds the configured ceiling of {limit}")]
    ConfigurationTooLarge { voxels: u64, limit: u64 },

    #[error(
        "Slice {index} ({path}) is {found:?}, expected {expected:?}"
    )]
    SizeMismatch {
        index: usize,
        path: PathBuf,
        expected: (u32, u32),
        found: (u32, u32),
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Malformed metadata: {0}")]
    MalformedMetadata(String),

    #[error("Voxel data truncated: expected {expected} bytes, found {found}")]
    TruncatedData { expected: u64, found: u64 },
}

pub struct VolumeLoader;

impl VolumeLoader {
    /// Build a volume from every image slice below `source`.
    ///
    /// Subdirectories are visited first, depth-first in name order, then the
    /// files of each directory in name order. Every slice becomes one Z layer
    /// and must match the width and height of the first.
    ///
    /// # Errors
    ///
    /// `NoImages` for an empty tree, `ConfigurationTooLarge` when the stack
    /// exceeds `config.max_voxels()`, `SizeMismatch` for a slice of the
    /// wrong size, `Io`/`Image` when a slice cannot be read.
    pub fn import_from_image_stack(
        source: impl AsRef<Path>,
        config: &VolumeConfig,
    ) -> Result<Volume, VolumeError> {
        let source = source.as_ref();
        let started = Instant::now();

        let paths = Self::discover_slices(source)?;
        debug!(count = paths.len(), source = %source.display(), "discovered slices");
        let Some(first_path) = paths.first() else {
            return Err(VolumeError::NoImages(source.to_path_buf()));
        };

        let first = image::open(first_path)?.into_luma8();
        let (width, height) = first.dimensions();
        let depth = paths.len();
        Self::check_ceiling(width as u64, height as u64, depth as u64, config)?;

        let mut data = Array3::<u8>::zeros((depth, height as usize, width as usize));
        data.axis_iter_mut(Axis(0))
            .into_par_iter()
            .zip(paths.par_iter())
            .enumerate()
            .try_for_each(|(index, (mut slab, path))| {
                debug!(index, depth, path = %path.display(), "loading slice");
                let decoded;
                let slice = if index == 0 {
                    &first
                } else {
                    decoded = image::open(path)?.into_luma8();
                    &decoded
                };
                if slice.dimensions() != (width, height) {
                    warn!(index, path = %path.display(), "slice size mismatch");
                    return Err(VolumeError::SizeMismatch {
                        index,
                        path: path.clone(),
                        expected: (width, height),
                        found: slice.dimensions(),
                    });
                }
                slab.assign(&Self::slice_view(slice)?);
                Ok(())
            })?;

        let metadata = VolumeMetadata::new(data.dim(), source);
        info!(
            width,
            height,
            depth,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "imported image stack"
        );

        Ok(Volume::new(data, config.null_value).with_metadata(metadata))
    }

    /// Load a volume previously written by [`Volume::persist`].
    ///
    /// The voxel dump is read from `<outbase>.data` as recorded in the
    /// metadata, or from the metadata path with a `.data` extension when the
    /// recorded file no longer exists.
    pub fn load(
        metadata_path: impl AsRef<Path>,
        config: &VolumeConfig,
    ) -> Result<Volume, VolumeError> {
        let metadata_path = metadata_path.as_ref();
        let started = Instant::now();

        let text = fs::read_to_string(metadata_path)?;
        let file: MetadataFile = serde_json::from_str(&text)
            .map_err(|e| VolumeError::MalformedMetadata(e.to_string()))?;
        let metadata = file.voxmap;

        let (width, height, depth) = (metadata.width, metadata.height, metadata.depth);
        if width == 0 || height == 0 || depth == 0 {
            return Err(VolumeError::MalformedMetadata(format!(
                "zero dimension in {width}x{height}x{depth}"
            )));
        }
        Self::check_ceiling(width as u64, height as u64, depth as u64, config)?;
        let expected = width * height * depth;

        let data_path = Self::resolve_data_path(metadata_path, &metadata);
        debug!(path = %data_path.display(), bytes = expected, "reading voxel data");

        let mut buffer = Vec::with_capacity(expected);
        File::open(&data_path)?
            .take(expected as u64)
            .read_to_end(&mut buffer)?;
        if buffer.len() < expected {
            return Err(VolumeError::TruncatedData {
                expected: expected as u64,
                found: buffer.len() as u64,
            });
        }

        let data = Array3::from_shape_vec((depth, height, width), buffer)
            .map_err(|e| VolumeError::MalformedMetadata(e.to_string()))?;
        info!(
            width,
            height,
            depth,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "loaded volume"
        );

        Ok(Volume::new(data, config.null_value).with_metadata(metadata))
    }

    /// Image files below `root` in import order.
    pub fn discover_slices(root: impl AsRef<Path>) -> Result<Vec<PathBuf>, VolumeError> {
        let mut out = Vec::new();
        Self::traverse(root.as_ref(), &mut out)?;
        Ok(out)
    }

    fn traverse(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), VolumeError> {
        let mut dirs = Vec::new();
        let mut files = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                dirs.push(path);
            } else if Self::is_slice(&path) {
                files.push(path);
            }
        }
        dirs.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        for sub in dirs {
            Self::traverse(&sub, out)?;
        }
        out.extend(files);
        Ok(())
    }

    fn is_slice(path: &Path) -> bool {
        path.extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| {
                SLICE_EXTENSIONS
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
            })
    }

    fn check_ceiling(
        width: u64,
        height: u64,
        depth: u64,
        config: &VolumeConfig,
    ) -> Result<(), VolumeError> {
        let limit = config.max_voxels();
        let voxels = width.saturating_mul(height).saturating_mul(depth);
        if voxels > limit {
            warn!(voxels, limit, "volume too large");
            return Err(VolumeError::ConfigurationTooLarge { voxels, limit });
        }
        Ok(())
    }

    fn slice_view(slice: &GrayImage) -> Result<ArrayView2<'_, u8>, VolumeError> {
        let (width, height) = slice.dimensions();
        ArrayView2::from_shape((height as usize, width as usize), slice.as_raw())
            .map_err(|e| VolumeError::MalformedMetadata(e.to_string()))
    }

    fn resolve_data_path(metadata_path: &Path, metadata: &VolumeMetadata) -> PathBuf {
        let recorded = metadata.data_path();
        if metadata.outbase.as_os_str().is_empty() || !recorded.exists() {
            let beside = metadata_path.with_extension("data");
            if beside.exists() {
                return beside;
            }
        }
        recorded
    }

    /// Metadata and data file paths for a persistence base path.
    pub fn persistence_paths(base: impl AsRef<Path>) -> (PathBuf, PathBuf) {
        let base = base.as_ref();
        (with_suffix(base, "json"), with_suffix(base, "data"))
    }
}
