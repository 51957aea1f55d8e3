use serde::{Deserialize, Serialize};

/// How a screen pixel is sampled from the volume
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    /// Nearest voxel on the screen plane
    Nearest,
    /// Trilinear sample on the screen plane
    Trilinear,
    /// Trilinear samples marched into the screen and accumulated
    #[default]
    DepthComposite,
}

/// What a label edit writes into the cells it touches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOp {
    Paint(u16),
    Erase,
}

impl EditOp {
    pub fn label(&self) -> u16 {
        match self {
            EditOp::Paint(label) => *label,
            EditOp::Erase => 0,
        }
    }
}
