use crate::brush::Brush;
use crate::enums::EditOp;
use crate::transform::Transform;
use crate::volume::Volume;

use glam::Vec3;
use ndarray::Array3;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

pub type Label = u16;

#[derive(Debug, Error)]
pub enum LabelMapError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Label data truncated: expected {expected} bytes, found {found}")]
    TruncatedData { expected: u64, found: u64 },
}

/// Segment labels on a grid `idfactor` times coarser than the volume.
///
/// Volume-space coordinates map to cell `floor(v / idfactor)`. Edits that
/// land outside the grid are ignored; lookups there return 0.
#[derive(Debug, Clone)]
pub struct LabelMap {
    data: Array3<Label>,
    idfactor: u32,
}

impl LabelMap {
    /// Empty map of `(depth, height, width)` cells
    pub fn new(dim: (usize, usize, usize), idfactor: u32) -> Self {
        Self {
            data: Array3::zeros(dim),
            idfactor: idfactor.max(1),
        }
    }

    /// Empty map covering `volume`, rounding partial cells up.
    pub fn for_volume(volume: &Volume, idfactor: u32) -> Self {
        let f = idfactor.max(1) as usize;
        let (depth, height, width) = volume.dim();
        Self::new(
            (depth.div_ceil(f), height.div_ceil(f), width.div_ceil(f)),
            idfactor,
        )
    }

    /// Get the dimensions of the grid (depth, height, width)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    pub fn idfactor(&self) -> u32 {
        self.idfactor
    }

    pub fn data(&self) -> &Array3<Label> {
        &self.data
    }

    /// View transform re-targeted at label space.
    pub fn label_transform(&self, view: &Transform) -> Transform {
        Transform::scaler(1.0 / self.idfactor as f32) * *view
    }

    /// Label-space cell containing a volume-space point, unchecked.
    #[inline]
    pub fn anchor(&self, x: f32, y: f32, z: f32) -> [i64; 3] {
        let f = self.idfactor as f32;
        [
            (x / f).floor() as i64,
            (y / f).floor() as i64,
            (z / f).floor() as i64,
        ]
    }

    #[inline]
    fn index(&self, cell: [i64; 3]) -> Option<(usize, usize, usize)> {
        let [x, y, z] = cell;
        let (depth, height, width) = self.data.dim();
        if x < 0 || y < 0 || z < 0 {
            return None;
        }
        let (x, y, z) = (x as usize, y as usize, z as usize);
        (x < width && y < height && z < depth).then_some((z, y, x))
    }

    /// Set the cell holding a volume-space point. Label 0 erases.
    pub fn paint(&mut self, x: f32, y: f32, z: f32, label: Label) {
        self.paint_cell(self.anchor(x, y, z), label);
    }

    /// Set one label-space cell; returns false when it lies outside.
    pub fn paint_cell(&mut self, cell: [i64; 3], label: Label) -> bool {
        match self.index(cell) {
            Some(idx) => {
                self.data[idx] = label;
                true
            }
            None => false,
        }
    }

    /// Label at a volume-space point, 0 outside.
    pub fn getf(&self, x: f32, y: f32, z: f32) -> Label {
        self.get_cell(self.anchor(x, y, z))
    }

    pub fn get_cell(&self, cell: [i64; 3]) -> Label {
        self.index(cell).map_or(0, |idx| self.data[idx])
    }

    /// Paint or erase every cell `brush` covers around `anchor`. Returns
    /// the number of cells written.
    pub fn apply_brush(&mut self, anchor: [i64; 3], brush: &Brush, op: EditOp) -> usize {
        let label = op.label();
        brush
            .offsets()
            .into_iter()
            .filter(|[dx, dy, dz]| {
                let cell = [
                    anchor[0].saturating_add(*dx),
                    anchor[1].saturating_add(*dy),
                    anchor[2].saturating_add(*dz),
                ];
                self.paint_cell(cell, label)
            })
            .count()
    }

    /// Clear every cell holding `label`; returns how many were cleared.
    pub fn drop_label(&mut self, label: Label) -> usize {
        if label == 0 {
            return 0;
        }
        let mut cleared = 0;
        self.data.iter_mut().filter(|v| **v == label).for_each(|v| {
            *v = 0;
            cleared += 1;
        });
        debug!(label, cleared, "dropped label");
        cleared
    }

    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    /// Label-space `[x, y, z]` of every cell holding `label`.
    pub fn extract(&self, label: Label) -> Vec<[usize; 3]> {
        self.data
            .indexed_iter()
            .filter(|(_, v)| **v == label)
            .map(|((z, y, x), _)| [x, y, z])
            .collect()
    }

    /// Volume-space center of mass of a segment.
    pub fn centroid(&self, label: Label) -> Option<Vec3> {
        let cells = self.extract(label);
        if cells.is_empty() {
            return None;
        }
        let sum = cells.iter().fold(Vec3::ZERO, |acc, [x, y, z]| {
            acc + Vec3::new(*x as f32, *y as f32, *z as f32)
        });
        Some(sum / cells.len() as f32 * self.idfactor as f32)
    }

    /// Highest label present, 0 for an empty map.
    pub fn max(&self) -> Label {
        self.data.iter().copied().max().unwrap_or(0)
    }

    /// A label id not yet used anywhere in the map
    pub fn next_free(&self) -> Option<Label> {
        self.max().checked_add(1)
    }

    /// Nearest-cell labels along output row `row` of a label-space transform.
    pub fn scan_line(&self, tid: &Transform, row: u32, width: usize) -> Vec<Label> {
        let mut out = vec![0; width];
        self.scan_line_into(tid, row, &mut out);
        out
    }

    pub fn scan_line_into(&self, tid: &Transform, row: u32, dest: &mut [Label]) {
        let step = tid.column(0);
        let mut p = tid.apply(Vec3::new(0.0, row as f32, 0.0));
        for label in dest.iter_mut() {
            let cell = [
                p.x.floor() as i64,
                p.y.floor() as i64,
                p.z.floor() as i64,
            ];
            *label = self.get_cell(cell);
            p += step;
        }
    }

    /// Write one `x y z id` line per labelled cell, coordinates in volume
    /// space. Returns the number of lines.
    pub fn export(&self, path: impl AsRef<Path>) -> Result<usize, LabelMapError> {
        let path = path.as_ref();
        let f = self.idfactor as usize;
        let mut writer = BufWriter::new(File::create(path)?);
        let mut lines = 0;
        for ((z, y, x), &label) in self.data.indexed_iter() {
            if label != 0 {
                writeln!(writer, "{} {} {} {}", x * f, y * f, z * f, label)?;
                lines += 1;
            }
        }
        writer.flush()?;
        info!(path = %path.display(), lines, "exported labels");
        Ok(lines)
    }

    /// Raw little-endian dump, x fastest.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), LabelMapError> {
        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        for label in self.data.iter() {
            writer.write_all(&label.to_le_bytes())?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn load(
        path: impl AsRef<Path>,
        dim: (usize, usize, usize),
        idfactor: u32,
    ) -> Result<Self, LabelMapError> {
        let cells = dim.0 * dim.1 * dim.2;
        let expected = (cells * 2) as u64;
        let mut bytes = Vec::with_capacity(cells * 2);
        File::open(path.as_ref())?
            .take(expected)
            .read_to_end(&mut bytes)?;
        if (bytes.len() as u64) < expected {
            return Err(LabelMapError::TruncatedData {
                expected,
                found: bytes.len() as u64,
            });
        }
        let labels: Vec<Label> = bytes
            .chunks_exact(2)
            .map(|pair| Label::from_le_bytes([pair[0], pair[1]]))
            .collect();
        let data = Array3::from_shape_vec(dim, labels).map_err(|e| {
            LabelMapError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;
        Ok(Self {
            data,
            idfactor: idfactor.max(1),
        })
    }
}
