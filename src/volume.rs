use crate::config::VolumeConfig;
use crate::enums::RenderMode;
use crate::interpolator::Interpolator;
use crate::lut::ColorLut;
use crate::metadata::{MetadataFile, VolumeMetadata};
use crate::transform::Transform;
use crate::volume_loader::{VolumeError, VolumeLoader};

use glam::Vec3;
use ndarray::Array3;
use std::borrow::Cow;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Per-row sampling settings shared by every scanline of a render
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanParams {
    pub mode: RenderMode,
    pub depth_samples: u32,
    pub depth_bucket: i32,
}

impl Default for ScanParams {
    fn default() -> Self {
        Self::from(&VolumeConfig::default())
    }
}

impl From<&VolumeConfig> for ScanParams {
    fn from(config: &VolumeConfig) -> Self {
        Self {
            mode: config.render_mode,
            depth_samples: config.depth_samples,
            depth_bucket: config.depth_bucket,
        }
    }
}

/// Dense 8-bit voxel volume indexed `(z, y, x)`.
///
/// An empty volume has shape `(0, 0, 0)`; every sample then returns the
/// null value. Import and load replace the whole volume, they never leave a
/// partially filled one behind.
#[derive(Debug, Clone)]
pub struct Volume {
    data: Array3<u8>,
    nullval: u8,
    metadata: Option<VolumeMetadata>,
}

impl Default for Volume {
    fn default() -> Self {
        Self {
            data: Array3::zeros((0, 0, 0)),
            nullval: 0,
            metadata: None,
        }
    }
}

impl Volume {
    pub fn new(data: Array3<u8>, nullval: u8) -> Self {
        Self {
            data,
            nullval,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: VolumeMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Get the dimensions of the volume (depth, height, width)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    pub fn width(&self) -> usize {
        self.data.dim().2
    }

    pub fn height(&self) -> usize {
        self.data.dim().1
    }

    pub fn depth(&self) -> usize {
        self.data.dim().0
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get a reference to the underlying data
    pub fn data(&self) -> &Array3<u8> {
        &self.data
    }

    pub fn nullval(&self) -> u8 {
        self.nullval
    }

    pub fn set_null_value(&mut self, nullval: u8) {
        self.nullval = nullval;
    }

    pub fn metadata(&self) -> Option<&VolumeMetadata> {
        self.metadata.as_ref()
    }

    /// Drop the voxels and metadata. The null value is kept.
    pub fn clear(&mut self) {
        self.data = Array3::zeros((0, 0, 0));
        self.metadata = None;
    }

    /// Replace this volume with an imported image stack. On failure the
    /// volume is left empty.
    pub fn import_dir(
        &mut self,
        source: impl AsRef<Path>,
        config: &VolumeConfig,
    ) -> Result<(), VolumeError> {
        self.clear();
        let mut volume = VolumeLoader::import_from_image_stack(source, config)?;
        volume.nullval = self.nullval;
        *self = volume;
        Ok(())
    }

    /// Replace this volume with a persisted one. On failure the volume is
    /// left empty.
    pub fn load_from_json(
        &mut self,
        metadata_path: impl AsRef<Path>,
        config: &VolumeConfig,
    ) -> Result<(), VolumeError> {
        self.clear();
        let mut volume = VolumeLoader::load(metadata_path, config)?;
        volume.nullval = self.nullval;
        *self = volume;
        Ok(())
    }

    /// Write `<base>.data` (raw voxels, Z-major then row-major) and
    /// `<base>.json` (metadata). Returns both paths.
    pub fn persist(&mut self, base: impl AsRef<Path>) -> Result<(PathBuf, PathBuf), VolumeError> {
        if self.is_empty() {
            return Err(VolumeError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "cannot persist an empty volume",
            )));
        }
        let base = base.as_ref();
        let (json_path, data_path) = VolumeLoader::persistence_paths(base);

        let bytes: Cow<'_, [u8]> = match self.data.as_slice() {
            Some(slice) => Cow::Borrowed(slice),
            None => Cow::Owned(self.data.iter().copied().collect()),
        };
        let mut writer = BufWriter::new(File::create(&data_path)?);
        writer.write_all(&bytes)?;
        writer.flush()?;
        debug!(path = %data_path.display(), bytes = bytes.len(), "wrote voxel data");

        let dim = self.data.dim();
        let metadata = self
            .metadata
            .get_or_insert_with(|| VolumeMetadata::new(dim, PathBuf::new()));
        metadata.outbase = base.to_path_buf();

        let file = MetadataFile {
            voxmap: metadata.clone(),
        };
        let json = serde_json::to_vec_pretty(&file)
            .map_err(|e| VolumeError::MalformedMetadata(e.to_string()))?;
        std::fs::write(&json_path, json)?;
        info!(path = %json_path.display(), "persisted volume");

        Ok((json_path, data_path))
    }

    /// Name a segment; the name is persisted with the metadata.
    pub fn set_name(&mut self, label: u16, name: impl Into<String>) {
        match self.metadata.as_mut() {
            Some(metadata) => {
                metadata.names.insert(label, name.into());
            }
            None => warn!(label, "no metadata to attach segment name to"),
        }
    }

    pub fn name(&self, label: u16) -> Option<&str> {
        self.metadata.as_ref()?.names.get(&label).map(String::as_str)
    }

    /// Stored voxel at the truncated coordinates, or the null value outside.
    #[inline]
    pub fn point_sample(&self, x: f32, y: f32, z: f32) -> u8 {
        let (x, y, z) = (x.trunc(), y.trunc(), z.trunc());
        Interpolator::voxel_or(&self.data.view(), x as i64, y as i64, z as i64, self.nullval)
    }

    /// Trilinear interpolation of the eight surrounding voxels; corners
    /// outside the volume count as the null value.
    #[inline]
    pub fn trilinear_sample(&self, x: f32, y: f32, z: f32) -> f32 {
        Interpolator::trilinear_interpolate(&self.data.view(), x, y, z, self.nullval)
    }

    /// Render output row `row` into `dest` (RGBA, four bytes per pixel).
    pub fn render_scanline(
        &self,
        transform: &Transform,
        row: u32,
        dest: &mut [u8],
        params: &ScanParams,
        lut: &ColorLut,
    ) {
        let step = transform.column(0);
        match params.mode {
            RenderMode::Nearest => {
                let mut p = transform.apply(Vec3::new(0.0, row as f32, 0.0)) + Vec3::splat(0.5);
                for pixel in dest.chunks_exact_mut(4) {
                    let value = self.point_sample(p.x, p.y, p.z);
                    pixel.copy_from_slice(&lut.lookup(value, params.depth_bucket).0);
                    p += step;
                }
            }
            RenderMode::Trilinear => {
                let mut p = transform.apply(Vec3::new(0.0, row as f32, 0.0));
                for pixel in dest.chunks_exact_mut(4) {
                    let value = self.trilinear_sample(p.x, p.y, p.z);
                    let byte = value.clamp(0.0, 255.0) as u8;
                    pixel.copy_from_slice(&lut.lookup(byte, params.depth_bucket).0);
                    p += step;
                }
            }
            RenderMode::DepthComposite => {
                let samples = params.depth_samples.max(1);
                let mut p = transform.apply(Vec3::new(
                    0.0,
                    row as f32,
                    samples.saturating_sub(1) as f32,
                ));
                for pixel in dest.chunks_exact_mut(4) {
                    let gray = self.composite_depth(p, -transform.column(2), samples);
                    pixel.copy_from_slice(&lut.lookup(gray, params.depth_bucket).0);
                    p += step;
                }
            }
        }
    }

    /// March `samples` steps from `start` along `step` and accumulate the
    /// normalized trilinear samples, each weighted by its square root.
    #[inline]
    pub fn composite_depth(&self, start: Vec3, step: Vec3, samples: u32) -> u8 {
        let alpha = 1.0f32;
        let mut gray = 0.0f32;
        let mut p = start;
        for _ in 0..samples {
            let here = self.trilinear_sample(p.x, p.y, p.z) / 255.0;
            let weight = here.sqrt();
            gray = here * weight + gray * (1.0 - weight);
            p += step;
        }
        (255.99 * gray.clamp(0.0, 1.0) / alpha) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tempfile::TempDir;

    /// 4x4x4 volume holding `x + 4y + 16z`
    fn ramp() -> Volume {
        let data = Array3::from_shape_fn((4, 4, 4), |(z, y, x)| (x + 4 * y + 16 * z) as u8);
        Volume::new(data, 0)
    }

    #[test]
    fn test_point_sample_in_and_out_of_bounds() {
        let mut volume = ramp();
        volume.set_null_value(99);
        for z in 0..4 {
            for y in 0..4 {
                for x in 0..4 {
                    let expected = (x + 4 * y + 16 * z) as u8;
                    assert_eq!(volume.point_sample(x as f32, y as f32, z as f32), expected);
                    assert_eq!(
                        volume.point_sample(x as f32 + 0.9, y as f32 + 0.5, z as f32 + 0.1),
                        expected
                    );
                }
            }
        }
        assert_eq!(volume.point_sample(4.0, 0.0, 0.0), 99);
        assert_eq!(volume.point_sample(0.0, -1.0, 0.0), 99);
        assert_eq!(volume.point_sample(0.0, 0.0, 17.0), 99);
        // truncation toward zero keeps (-0.5) inside
        assert_eq!(volume.point_sample(-0.5, 0.0, 0.0), 0);
    }

    #[test]
    fn test_trilinear_matches_point_sample_on_grid() {
        let volume = ramp();
        for z in 0..4 {
            for y in 0..4 {
                for x in 0..4 {
                    let (fx, fy, fz) = (x as f32, y as f32, z as f32);
                    assert_relative_eq!(
                        volume.trilinear_sample(fx, fy, fz),
                        volume.point_sample(fx, fy, fz) as f32
                    );
                }
            }
        }
    }

    #[test]
    fn test_trilinear_is_corner_mean_at_cell_center() {
        let volume = ramp();
        let corners: f32 = [(1, 1, 1), (2, 1, 1), (1, 2, 1), (2, 2, 1)]
            .iter()
            .chain(&[(1, 1, 2), (2, 1, 2), (1, 2, 2), (2, 2, 2)])
            .map(|&(x, y, z)| (x + 4 * y + 16 * z) as f32)
            .sum();
        assert_relative_eq!(
            volume.trilinear_sample(1.5, 1.5, 1.5),
            corners / 8.0,
            epsilon = 1e-4
        );
    }

    #[test]
    fn test_trilinear_bounded_by_corners() {
        let data = Array3::from_shape_fn((5, 5, 5), |(z, y, x)| {
            ((x * 37 + y * 101 + z * 53) % 256) as u8
        });
        let volume = Volume::new(data, 0);
        for i in 0..200 {
            let t = i as f32 * 0.173;
            let (x, y, z) = ((t * 1.3) % 3.9, (t * 0.7) % 3.9, (t * 2.1) % 3.9);
            let (x0, y0, z0) = (x.floor() as usize, y.floor() as usize, z.floor() as usize);
            let mut lo = f32::MAX;
            let mut hi = f32::MIN;
            for (dx, dy, dz) in [
                (0, 0, 0),
                (1, 0, 0),
                (0, 1, 0),
                (1, 1, 0),
                (0, 0, 1),
                (1, 0, 1),
                (0, 1, 1),
                (1, 1, 1),
            ] {
                let v = volume.data()[[z0 + dz, y0 + dy, x0 + dx]] as f32;
                lo = lo.min(v);
                hi = hi.max(v);
            }
            let value = volume.trilinear_sample(x, y, z);
            assert!(value >= lo - 1e-3 && value <= hi + 1e-3, "{value} not in [{lo}, {hi}]");
        }
    }

    #[test]
    fn test_persist_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("ramp");
        let mut volume = ramp().with_metadata(VolumeMetadata::new((4, 4, 4), "/src/stack"));
        volume.set_name(3, "soma");
        let (json_path, data_path) = volume.persist(&base).unwrap();
        assert_eq!(std::fs::metadata(&data_path).unwrap().len(), 64);

        let mut loaded = Volume::default();
        loaded
            .load_from_json(&json_path, &VolumeConfig::default())
            .unwrap();
        assert_eq!(loaded.data(), volume.data());
        assert_eq!(loaded.metadata(), volume.metadata());
        assert_eq!(loaded.metadata().unwrap().outbase, base);
        assert_eq!(loaded.name(3), Some("soma"));
    }

    #[test]
    fn test_load_truncated_data_resets_volume() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("ramp");
        let (json_path, data_path) = ramp().persist(&base).unwrap();
        std::fs::write(&data_path, [0u8; 10]).unwrap();

        let mut volume = ramp();
        let result = volume.load_from_json(&json_path, &VolumeConfig::default());
        assert!(matches!(
            result,
            Err(VolumeError::TruncatedData {
                expected: 64,
                found: 10
            })
        ));
        assert!(volume.is_empty());
        assert!(volume.metadata().is_none());
    }

    #[test]
    fn test_load_over_ceiling_resets_volume() {
        let dir = TempDir::new().unwrap();
        let (json_path, _) = ramp().persist(dir.path().join("ramp")).unwrap();

        let mut volume = ramp();
        let config = VolumeConfig::default().with_max_megavoxels(0);
        let result = volume.load_from_json(&json_path, &config);
        assert!(matches!(result, Err(VolumeError::ConfigurationTooLarge { .. })));
        assert!(volume.is_empty());
    }

    #[test]
    fn test_failed_import_resets_volume() {
        let dir = TempDir::new().unwrap();
        let mut volume = ramp();
        volume.set_null_value(5);
        assert!(volume.import_dir(dir.path(), &VolumeConfig::default()).is_err());
        assert!(volume.is_empty());
        assert_eq!(volume.nullval(), 5);
        assert_eq!(volume.point_sample(0.0, 0.0, 0.0), 5);
    }

    #[test]
    fn test_composite_uniform_volume() {
        // a constant column converges toward its own value
        let volume = Volume::new(Array3::from_elem((8, 8, 8), 255), 0);
        let gray = volume.composite_depth(Vec3::new(2.0, 2.0, 6.0), Vec3::new(0.0, 0.0, -1.0), 5);
        assert_eq!(gray, 255);

        let empty = Volume::new(Array3::zeros((8, 8, 8)), 0);
        let gray = empty.composite_depth(Vec3::new(2.0, 2.0, 6.0), Vec3::new(0.0, 0.0, -1.0), 5);
        assert_eq!(gray, 0);
    }

    #[test]
    fn test_composite_recurrence() {
        // samples along the march: 0.25 then 1.0
        let mut data = Array3::zeros((2, 1, 1));
        data[[1, 0, 0]] = 64;
        data[[0, 0, 0]] = 255;
        let volume = Volume::new(data, 0);
        let here0 = 64.0f32 / 255.0;
        let gray0 = here0 * here0.sqrt();
        let gray1 = 1.0 * 1.0 + gray0 * 0.0;
        let expected = (255.99 * gray1) as u8;
        let gray = volume.composite_depth(Vec3::new(0.0, 0.0, 1.0), Vec3::new(0.0, 0.0, -1.0), 2);
        assert_eq!(gray, expected);

        // reversed order: the bright sample first, then the dim one
        let gray = volume.composite_depth(Vec3::new(0.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 1.0), 2);
        let w = here0.sqrt();
        let expected = (255.99 * (here0 * w + 1.0 * (1.0 - w))) as u8;
        assert_eq!(gray, expected);
    }

    #[test]
    fn test_render_scanline_steps_along_row() {
        let volume = ramp();
        let lut = ColorLut::new();
        let transform = Transform::identity();
        let params = ScanParams {
            mode: RenderMode::Nearest,
            depth_samples: 1,
            depth_bucket: 0,
        };
        let mut row = vec![0u8; 4 * 6];
        volume.render_scanline(&transform, 2, &mut row, &params, &lut);
        for x in 0..6 {
            let expected = if x < 4 {
                lut.lookup((x + 8) as u8, 0)
            } else {
                lut.lookup(0, 0)
            };
            assert_eq!(&row[4 * x..4 * x + 4], &expected.0);
        }
    }

    #[test]
    fn test_depth_composite_scanline_matches_march() {
        let volume = ramp();
        let lut = ColorLut::new();
        let transform = Transform::identity();
        let params = ScanParams {
            mode: RenderMode::DepthComposite,
            depth_samples: 4,
            depth_bucket: 0,
        };
        let mut row = vec![0u8; 4 * 4];
        volume.render_scanline(&transform, 1, &mut row, &params, &lut);
        for x in 0..4 {
            let gray = volume.composite_depth(
                Vec3::new(x as f32, 1.0, 3.0),
                Vec3::new(0.0, 0.0, -1.0),
                4,
            );
            assert_eq!(&row[4 * x..4 * x + 4], &lut.lookup(gray, 0).0);
        }
    }
}
