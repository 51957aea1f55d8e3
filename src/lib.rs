//! # voxseg
//!
//! Depth-cued rendering and interactive segmentation of volumes built from
//! stacks of 2D grayscale images.
//!
//! A [`Volume`] is imported from a directory of slices (every image below the
//! directory becomes one Z layer; subdirectories first, then files, all in
//! name order) or loaded from a `.json`/`.data` pair written by
//! [`Volume::persist`]. The slices are decoded in parallel using rayon.
//!
//! The [`Renderer`] projects the volume through an affine [`Transform`] onto
//! an RGBA image. Each pixel marches a few trilinear samples into the screen
//! and accumulates them, brighter samples weighing more, and the result goes
//! through a [`ColorLut`] that encodes brightness and depth as one color.
//!
//! Segments live in a [`LabelMap`], a `u16` grid that may be coarser than the
//! volume by an integer factor. Labels are painted and erased with
//! [`Brush`]es and drawn over the render as a multiplicative tint, one
//! [`Palette`] color per segment.
//!
//! Front ends hold a [`ViewSession`], which keeps the view transform and the
//! shared label map and exposes the pan/orbit/zoom and paint/erase/pick
//! operations that input gestures map to.
//!
//! # Examples
//!
//! ## Importing a stack and rendering it
//!
//! ```no_run
//! # use voxseg::{Palette, Renderer, ViewSession, Volume, VolumeConfig};
//! let config = VolumeConfig::default();
//! let mut volume = Volume::default();
//! volume
//!     .import_dir("slices", &config)
//!     .expect("should have imported the slice directory");
//! volume.persist("out/stack").expect("should have written the volume");
//!
//! let renderer = Renderer::new(&config).expect("should have built the render pool");
//! let mut session = ViewSession::new(512, 512, &config);
//! session.center_on_volume(&volume);
//! let image = session.render(&renderer, &volume, &mut Palette::new());
//! image.save("view.png").expect("should have saved the render");
//! ```
//!
//! ## Painting a segment
//!
//! ```
//! # use voxseg::{Brush, EditOp, LabelMap};
//! let mut labels = LabelMap::new((32, 32, 32), 2);
//! let anchor = labels.anchor(20.0, 20.0, 20.0);
//! labels.apply_brush(anchor, &Brush::ball(9.0, 2), EditOp::Paint(1));
//! assert_eq!(labels.getf(20.0, 20.0, 20.0), 1);
//! let painted = labels.extract(1).len();
//! assert_eq!(labels.drop_label(1), painted);
//! assert!(labels.extract(1).is_empty());
//! ```

pub mod brush;
pub mod config;
pub mod enums;
mod interpolator;
pub mod label_map;
pub mod lut;
pub mod metadata;
pub mod overlay;
pub mod palette;
pub mod renderer;
pub mod session;
pub mod transform;
pub mod volume;
pub mod volume_loader;

pub use brush::Brush;
pub use config::{ConfigError, VolumeConfig};
pub use enums::{EditOp, RenderMode};
pub use label_map::{Label, LabelMap, LabelMapError};
pub use lut::ColorLut;
pub use metadata::VolumeMetadata;
pub use palette::Palette;
pub use renderer::{RenderError, Renderer};
pub use session::{SharedLabelMap, ViewSession};
pub use transform::{Transform, TransformError};
pub use volume::{ScanParams, Volume};
pub use volume_loader::{VolumeError, VolumeLoader};
