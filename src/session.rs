//! Viewing and editing state driven by an interactive front end.
//!
//! The front end decodes its own input events and calls these operations
//! with screen coordinates in output-image pixels. Gesture bookkeeping (which
//! button is held, where a drag started) stays on the caller's side: a drag
//! that should be relative to its start restores the saved transform with
//! [`ViewSession::set_view`] before applying the new offset.

use crate::brush::Brush;
use crate::config::VolumeConfig;
use crate::enums::EditOp;
use crate::label_map::{Label, LabelMap, LabelMapError};
use crate::palette::Palette;
use crate::renderer::Renderer;
use crate::transform::Transform;
use crate::volume::Volume;

use glam::Vec3;
use image::RgbaImage;
use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Screen pixels of drag per radian of orbit
const ORBIT_PIXELS_PER_RADIAN: f32 = 200.0;
/// Wheel units per e-fold of zoom
const ZOOM_WHEEL_UNITS: f32 = 200.0;
/// Wheel units per voxel of depth motion
const DEPTH_WHEEL_UNITS: f32 = 40.0;

pub type SharedLabelMap = Arc<RwLock<LabelMap>>;

pub struct ViewSession {
    view: Transform,
    width: u32,
    height: u32,
    labels: Option<SharedLabelMap>,
    paint_id: Label,
    show_labels: bool,
    ball_radius: f32,
}

impl ViewSession {
    pub fn new(width: u32, height: u32, config: &VolumeConfig) -> Self {
        Self {
            view: Transform::identity(),
            width,
            height,
            labels: None,
            paint_id: 0,
            show_labels: true,
            ball_radius: config.ball_radius,
        }
    }

    pub fn view(&self) -> &Transform {
        &self.view
    }

    pub fn set_view(&mut self, view: Transform) {
        self.view = view;
    }

    pub fn viewport(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    /// Reset the view so the volume center sits in the middle of the output.
    pub fn center_on_volume(&mut self, volume: &Volume) {
        let mut view = Transform::identity();
        view.shift(
            volume.width() as f32 / 2.0,
            volume.height() as f32 / 2.0,
            volume.depth() as f32 / 2.0,
        );
        view.shift(-(self.width as f32) / 2.0, -(self.height as f32) / 2.0, 0.0);
        self.view = view;
    }

    pub fn attach_labels(&mut self, labels: SharedLabelMap) {
        self.labels = Some(labels);
        self.paint_id = 0;
    }

    pub fn labels(&self) -> Option<&SharedLabelMap> {
        self.labels.as_ref()
    }

    /// The view transform mapped into label space
    pub fn label_transform(&self) -> Option<Transform> {
        let labels = self.labels.as_ref()?;
        Some(labels.read().label_transform(&self.view))
    }

    pub fn paint_id(&self) -> Label {
        self.paint_id
    }

    pub fn set_paint_id(&mut self, label: Label) {
        self.paint_id = label;
    }

    pub fn show_labels(&self) -> bool {
        self.show_labels
    }

    pub fn toggle_labels(&mut self) -> bool {
        self.show_labels = !self.show_labels;
        self.show_labels
    }

    /// Volume-space point under a screen position
    pub fn voxel_at(&self, sx: f32, sy: f32) -> Vec3 {
        self.view.apply(Vec3::new(sx, sy, 0.0))
    }

    /// Move the view so content follows a drag of `(dx, dy)` pixels.
    pub fn pan(&mut self, dx: f32, dy: f32) {
        self.view.shift(-dx, -dy, 0.0);
    }

    /// Orbit for a drag of `(dx, dy)` pixels around the drag start.
    pub fn orbit(&mut self, dx: f32, dy: f32, pivot_x: f32, pivot_y: f32) {
        self.view.rotate(
            -dx / ORBIT_PIXELS_PER_RADIAN,
            -dy / ORBIT_PIXELS_PER_RADIAN,
            pivot_x,
            pivot_y,
        );
    }

    /// Zoom around a screen position; positive wheel deltas zoom in.
    /// Returns the new zoom in percent.
    pub fn zoom(&mut self, wheel_delta: f32, pivot_x: f32, pivot_y: f32) -> f32 {
        self.view
            .scale((-wheel_delta / ZOOM_WHEEL_UNITS).exp(), pivot_x, pivot_y);
        self.zoom_percent()
    }

    pub fn move_depth(&mut self, wheel_delta: f32) {
        self.view.shift(0.0, 0.0, wheel_delta / DEPTH_WHEEL_UNITS);
    }

    /// Screen pixels per voxel, in percent
    pub fn zoom_percent(&self) -> f32 {
        100.0 / self.view.scale_factor()
    }

    /// Label under a screen position; it becomes the paint id.
    pub fn pick(&mut self, sx: f32, sy: f32) -> Label {
        let p = self.voxel_at(sx, sy);
        let label = match &self.labels {
            Some(labels) => labels.read().getf(p.x, p.y, p.z),
            None => 0,
        };
        self.paint_id = label;
        debug!(label, "picked");
        label
    }

    /// Allocate an unused label and make it the paint id.
    pub fn new_label(&mut self) -> Option<Label> {
        let label = self.labels.as_ref()?.read().next_free()?;
        self.paint_id = label;
        info!(label, "new label");
        Some(label)
    }

    /// Remove every cell of the current paint id and reset it.
    pub fn delete_label(&mut self) -> usize {
        let Some(labels) = &self.labels else {
            return 0;
        };
        let cleared = labels.write().drop_label(self.paint_id);
        info!(label = self.paint_id, cleared, "deleted label");
        self.paint_id = 0;
        cleared
    }

    fn edit(&self, sx: f32, sy: f32, brush: &Brush, op: EditOp) -> usize {
        let Some(labels) = &self.labels else {
            return 0;
        };
        let p = self.voxel_at(sx, sy);
        let mut labels = labels.write();
        let anchor = labels.anchor(p.x, p.y, p.z);
        labels.apply_brush(anchor, brush, op)
    }

    /// Paint the single cell under the pointer with the paint id.
    pub fn paint_at(&self, sx: f32, sy: f32) -> bool {
        if self.paint_id == 0 {
            return false;
        }
        self.edit(sx, sy, &Brush::Point, EditOp::Paint(self.paint_id)) > 0
    }

    /// Clear the 3x3x3 block under the pointer, one step of an erase drag.
    pub fn erase_at(&self, sx: f32, sy: f32) -> usize {
        self.edit(sx, sy, &Brush::erase_drag(), EditOp::Erase)
    }

    /// Fill (or clear) a ball around the pointer.
    pub fn ball_at(&self, sx: f32, sy: f32, erase: bool) -> usize {
        let Some(labels) = &self.labels else {
            return 0;
        };
        let op = if erase {
            EditOp::Erase
        } else if self.paint_id > 0 {
            EditOp::Paint(self.paint_id)
        } else {
            return 0;
        };
        let brush = Brush::ball(self.ball_radius, labels.read().idfactor());
        self.edit(sx, sy, &brush, op)
    }

    /// Move the view so the segment's center of mass sits under the middle
    /// of the output. Returns false for an absent or empty segment.
    pub fn center_on(&mut self, label: Label) -> bool {
        if label == 0 {
            return false;
        }
        let Some(centroid) = self.labels.as_ref().and_then(|l| l.read().centroid(label)) else {
            return false;
        };
        let current = self.voxel_at(self.width as f32 / 2.0, self.height as f32 / 2.0);
        let delta = centroid - current;
        self.view = Transform::shifter(delta.x, delta.y, delta.z) * self.view;
        self.paint_id = label;
        info!(label, x = centroid.x, y = centroid.y, z = centroid.z, "centered on label");
        true
    }

    pub fn render(&self, renderer: &Renderer, volume: &Volume, palette: &mut Palette) -> RgbaImage {
        let labels = if self.show_labels {
            self.labels.as_deref()
        } else {
            None
        };
        renderer.render_frame(volume, labels, &self.view, self.width, self.height, palette)
    }

    /// Text export of the attached labels; `None` when no map is attached.
    pub fn export(&self, path: impl AsRef<Path>) -> Option<Result<usize, LabelMapError>> {
        Some(self.labels.as_ref()?.read().export(path))
    }
}
