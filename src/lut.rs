//! Brightness and depth to display color lookup table.
//!
//! One table row per signed depth bucket in `[-HALF_DEPTH, HALF_DEPTH]`, each
//! row holding 256 brightness levels. Brightness goes through a gamma-like
//! curve; a positive bucket (in front of the reference plane) pulls green
//! down, a negative one (behind) pulls red and blue toward a complementary hue.

use image::Rgba;

pub const HALF_DEPTH: i32 = 20;
pub const DEPTH_BUCKETS: usize = (2 * HALF_DEPTH + 1) as usize;

#[derive(Debug, Clone)]
pub struct ColorLut {
    entries: Vec<Rgba<u8>>,
}

impl Default for ColorLut {
    fn default() -> Self {
        Self::new()
    }
}

impl ColorLut {
    pub fn new() -> Self {
        let mut entries = Vec::with_capacity(256 * DEPTH_BUCKETS);
        for iz in -HALF_DEPTH..=HALF_DEPTH {
            let z = iz as f64 / HALF_DEPTH as f64;
            let front = z.max(0.0);
            let behind = z.min(0.0);
            for b in 0..=255u8 {
                let y = Self::brightness(b);
                let r = Self::channel(y * (1.0 - 0.85 * behind * behind));
                let g = Self::channel(y * (1.0 - 0.75 * front));
                let b = Self::channel(y * (1.0 + 0.2 * behind));
                entries.push(Rgba([r, g, b, 255]));
            }
        }
        Self { entries }
    }

    #[inline]
    fn brightness(b: u8) -> f64 {
        let base = (b as f64 / 255.0 - 0.1) / 0.75;
        if base <= 0.0 {
            0.0
        } else {
            base.sqrt().clamp(0.0, 1.0)
        }
    }

    #[inline]
    fn channel(v: f64) -> u8 {
        (255.99 * v).clamp(0.0, 255.0) as u8
    }

    /// Color for a brightness byte at a signed depth bucket. Buckets outside
    /// the table are clamped to its edge.
    #[inline]
    pub fn lookup(&self, brightness: u8, bucket: i32) -> Rgba<u8> {
        let row = (bucket.clamp(-HALF_DEPTH, HALF_DEPTH) + HALF_DEPTH) as usize;
        self.entries[row * 256 + brightness as usize]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
