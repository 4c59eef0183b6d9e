use image::Rgb;
use palette::{FromColor, Hsl, Srgb};

/// Golden angle in degrees; consecutive labels land far apart on the hue wheel.
const HUE_STEP: f32 = 137.507_77;

/// Generates `n` saturated colours for label rendering.
///
/// Labels are numbered in raster order, so neighbouring objects usually have close numbers;
/// stepping the hue by the golden angle keeps them visually apart.
pub(crate) fn label_palette(n: usize) -> Vec<Rgb<u8>> {
    (0..n)
        .map(|i| {
            let hue = (i as f32 * HUE_STEP) % 360.0;
            let lightness = if i % 2 == 0 { 0.5 } else { 0.6 };
            let srgb: Srgb<u8> = Srgb::from_color(Hsl::new(hue, 0.9, lightness)).into_format();
            Rgb([srgb.red, srgb.green, srgb.blue])
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_palette_works() {
        assert!(label_palette(0).is_empty());
        assert_eq!(label_palette(1), vec![Rgb([242, 13, 13])]);

        let palette = label_palette(12);
        assert_eq!(palette.len(), 12);
        for (i, a) in palette.iter().enumerate() {
            for b in &palette[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert_eq!(palette, label_palette(12));
    }
}
