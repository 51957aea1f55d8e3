//! Row-parallel rendering of the volume and its label overlay.
//!
//! Output rows are split into one contiguous band per worker of a fixed
//! rayon pool. Workers only read the volume, label map and LUT and only
//! write their own band; a render returns once every band has finished.

use crate::config::VolumeConfig;
use crate::label_map::{Label, LabelMap};
use crate::lut::ColorLut;
use crate::overlay::composite_row;
use crate::palette::Palette;
use crate::transform::Transform;
use crate::volume::{ScanParams, Volume};

use image::RgbaImage;
use parking_lot::RwLock;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::debug;
use web_time::Instant;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Could not build render pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub struct Renderer {
    pool: ThreadPool,
    workers: usize,
    lut: ColorLut,
    params: ScanParams,
}

impl Renderer {
    pub fn new(config: &VolumeConfig) -> Result<Self, RenderError> {
        let workers = config.worker_threads.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("voxseg-render-{i}"))
            .build()?;
        Ok(Self {
            pool,
            workers,
            lut: ColorLut::new(),
            params: ScanParams::from(config),
        })
    }

    pub fn lut(&self) -> &ColorLut {
        &self.lut
    }

    pub fn params(&self) -> &ScanParams {
        &self.params
    }

    pub fn set_params(&mut self, params: ScanParams) {
        self.params = params;
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Rows per band so that every worker gets one contiguous range
    fn band_rows(&self, height: u32) -> usize {
        (height as usize).div_ceil(self.workers).max(1)
    }

    /// Render the volume as seen through `view`.
    pub fn render(&self, volume: &Volume, view: &Transform, width: u32, height: u32) -> RgbaImage {
        let mut image = RgbaImage::new(width, height);
        if width == 0 || height == 0 {
            return image;
        }
        let started = Instant::now();
        let row_bytes = width as usize * 4;
        let band_rows = self.band_rows(height);

        self.pool.install(|| {
            image
                .par_chunks_mut(band_rows * row_bytes)
                .enumerate()
                .for_each(|(band, rows)| {
                    for (i, dest) in rows.chunks_exact_mut(row_bytes).enumerate() {
                        let y = (band * band_rows + i) as u32;
                        volume.render_scanline(view, y, dest, &self.params, &self.lut);
                    }
                });
        });

        debug!(
            width,
            height,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "rendered volume"
        );
        image
    }

    /// Nearest labels for every output pixel, row-major.
    pub fn scan_labels(&self, labels: &LabelMap, view: &Transform, width: u32, height: u32) -> Vec<Label> {
        let mut out = vec![0; width as usize * height as usize];
        if out.is_empty() {
            return out;
        }
        let tid = labels.label_transform(view);
        let row_len = width as usize;
        let band_rows = self.band_rows(height);

        self.pool.install(|| {
            out.par_chunks_mut(band_rows * row_len)
                .enumerate()
                .for_each(|(band, rows)| {
                    for (i, dest) in rows.chunks_exact_mut(row_len).enumerate() {
                        let y = (band * band_rows + i) as u32;
                        labels.scan_line_into(&tid, y, dest);
                    }
                });
        });
        out
    }

    /// Tint `image` with the colors of the labels under each pixel.
    pub fn composite(&self, image: &mut RgbaImage, ids: &[Label], palette: &mut Palette) {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return;
        }
        let present: BTreeSet<Label> = ids.iter().copied().filter(|&id| id != 0).collect();
        for &id in &present {
            palette.color(id);
        }
        let palette = &*palette;
        let row_len = width as usize;
        let band_rows = self.band_rows(height);

        self.pool.install(|| {
            image
                .par_chunks_mut(band_rows * row_len * 4)
                .zip(ids.par_chunks(band_rows * row_len))
                .for_each(|(rows, band_ids)| {
                    for (dest, row_ids) in rows
                        .chunks_exact_mut(row_len * 4)
                        .zip(band_ids.chunks_exact(row_len))
                    {
                        composite_row(dest, row_ids, palette);
                    }
                });
        });
    }

    /// Volume render plus label overlay. The label map's read lock is held
    /// while its labels are scanned, so edits wait for the scan to finish.
    pub fn render_frame(
        &self,
        volume: &Volume,
        labels: Option<&RwLock<LabelMap>>,
        view: &Transform,
        width: u32,
        height: u32,
        palette: &mut Palette,
    ) -> RgbaImage {
        let mut image = self.render(volume, view, width, height);
        if let Some(labels) = labels {
            let ids = {
                let guard = labels.read();
                self.scan_labels(&guard, view, width, height)
            };
            self.composite(&mut image, &ids, palette);
        }
        image
    }
}
