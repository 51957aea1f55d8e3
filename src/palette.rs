//! Stable, mutually distinguishable colors for segment labels.

use crate::label_map::Label;
use image::Rgb;
use std::collections::HashMap;
use tracing::trace;

const LEVELS: [u8; 4] = [64, 128, 191, 255];
const SEED: Rgb<u8> = Rgb([255, 64, 64]);

/// Label → color assignments for one viewing session.
///
/// A label gets its color on first request and keeps it for the lifetime of
/// the palette. New colors are picked greedily as far as possible (redmean
/// distance) from every color handed out before.
#[derive(Debug, Clone)]
pub struct Palette {
    assigned: HashMap<Label, Rgb<u8>>,
    used: Vec<Rgb<u8>>,
    candidates: Vec<Rgb<u8>>,
}

impl Default for Palette {
    fn default() -> Self {
        Self::new()
    }
}

impl Palette {
    pub fn new() -> Self {
        let mut candidates = Vec::new();
        for &r in &LEVELS {
            for &g in &LEVELS {
                for &b in &LEVELS {
                    if !(r == g && g == b) {
                        candidates.push(Rgb([r, g, b]));
                    }
                }
            }
        }
        Self {
            assigned: HashMap::new(),
            used: Vec::new(),
            candidates,
        }
    }

    pub fn color(&mut self, label: Label) -> Rgb<u8> {
        if let Some(&color) = self.assigned.get(&label) {
            return color;
        }
        let color = self.next_color();
        self.assigned.insert(label, color);
        self.used.push(color);
        trace!(label, ?color, "assigned palette color");
        color
    }

    /// Previously assigned color, without assigning one.
    pub fn get(&self, label: Label) -> Option<Rgb<u8>> {
        self.assigned.get(&label).copied()
    }

    pub fn len(&self) -> usize {
        self.assigned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty()
    }

    fn next_color(&self) -> Rgb<u8> {
        if self.used.is_empty() {
            return SEED;
        }
        // every candidate handed out: replay the farthest-point sequence
        if self.used.len() >= self.candidates.len() {
            return self.used[self.used.len() % self.candidates.len()];
        }

        let mut best = SEED;
        let mut best_distance = f32::MIN;
        for &candidate in self.candidates.iter().filter(|c| !self.used.contains(c)) {
            let nearest = self
                .used
                .iter()
                .map(|used| distance(candidate, *used))
                .fold(f32::MAX, f32::min);
            if nearest > best_distance {
                best_distance = nearest;
                best = candidate;
            }
        }
        best
    }
}

/// Redmean approximation of perceptual color distance.
pub fn distance(a: Rgb<u8>, b: Rgb<u8>) -> f32 {
    let rmean = (a[0] as f32 + b[0] as f32) / 2.0;
    let dr = a[0] as f32 - b[0] as f32;
    let dg = a[1] as f32 - b[1] as f32;
    let db = a[2] as f32 - b[2] as f32;
    ((2.0 + rmean / 256.0) * dr * dr
        + 4.0 * dg * dg
        + (2.0 + (255.0 - rmean) / 256.0) * db * db)
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_is_stable() {
        let mut palette = Palette::new();
        let first = palette.color(17);
        for id in 1..40 {
            palette.color(id);
        }
        assert_eq!(palette.color(17), first);
        assert_eq!(palette.get(17), Some(first));
        assert_eq!(palette.get(1000), None);
    }

    #[test]
    fn test_early_colors_are_far_apart() {
        let mut palette = Palette::new();
        let colors: Vec<_> = (1..=12).map(|id| palette.color(id)).collect();
        for (i, a) in colors.iter().enumerate() {
            for b in &colors[i + 1..] {
                assert!(distance(*a, *b) >= 100.0, "{a:?} vs {b:?}");
            }
        }
    }

    #[test]
    fn test_working_set_is_distinct() {
        let mut palette = Palette::new();
        let colors: Vec<_> = (1..=40).map(|id| palette.color(id)).collect();
        for (i, a) in colors.iter().enumerate() {
            assert!(!colors[i + 1..].contains(a));
        }
    }

    #[test]
    fn test_exhausted_palette_repeats_sequence() {
        let mut palette = Palette::new();
        let count = palette.candidates.len();
        let first: Vec<_> = (0..count).map(|i| palette.color(i as Label + 1)).collect();
        let again: Vec<_> = (0..count).map(|i| palette.color((count + i) as Label + 1)).collect();
        assert_eq!(first, again);
        assert_eq!(palette.len(), 2 * count);
    }

    #[test]
    fn test_separate_palettes_do_not_share_state() {
        let mut a = Palette::new();
        a.color(1);
        a.color(2);
        let mut b = Palette::new();
        assert_eq!(b.color(2), a.color(1));
    }
}
