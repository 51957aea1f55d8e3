//! Multiplicative label tint over the rendered volume.

use crate::label_map::Label;
use crate::palette::Palette;
use image::{Rgb, Rgba};

/// Multiply each color channel by the label color, both taken as `[0, 1]`.
/// Alpha is kept.
#[inline]
pub fn tint(pixel: Rgba<u8>, color: Rgb<u8>) -> Rgba<u8> {
    let mul = |c: u8, k: u8| ((c as u16 * k as u16 + 127) / 255) as u8;
    Rgba([
        mul(pixel[0], color[0]),
        mul(pixel[1], color[1]),
        mul(pixel[2], color[2]),
        pixel[3],
    ])
}

/// Tint an RGBA row in place wherever its label is non-zero. Labels without
/// an assigned palette color are left untouched.
pub fn composite_row(row: &mut [u8], labels: &[Label], palette: &Palette) {
    for (pixel, &label) in row.chunks_exact_mut(4).zip(labels) {
        if label == 0 {
            continue;
        }
        if let Some(color) = palette.get(label) {
            let tinted = tint(Rgba([pixel[0], pixel[1], pixel[2], pixel[3]]), color);
            pixel.copy_from_slice(&tinted.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_white_and_black_tints() {
        let pixel = Rgba([200, 100, 37, 255]);
        assert_eq!(tint(pixel, Rgb([255, 255, 255])), pixel);
        assert_eq!(tint(pixel, Rgb([0, 0, 0])), Rgba([0, 0, 0, 255]));
        assert_eq!(tint(pixel, Rgb([255, 0, 128])), Rgba([200, 0, 19, 255]));
    }

    #[test]
    fn test_composite_row_skips_unlabelled() {
        let mut palette = Palette::new();
        let color = palette.color(3);
        let mut row = vec![100u8; 4 * 3];
        composite_row(&mut row, &[0, 3, 0], &palette);

        assert_eq!(&row[0..4], &[100; 4]);
        assert_eq!(&row[8..12], &[100; 4]);
        let expected = tint(Rgba([100; 4]), color);
        assert_eq!(&row[4..8], &expected.0);
    }
}
