use image::{GrayImage, Luma};
use imageproc::contrast::otsu_level;

use crate::buffer::{FloatImage, is_valid};

/// Inclusive intensity bounds of the foreground.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForegroundThreshold {
    pub min: f32,
    pub max: f32,
}

impl ForegroundThreshold {
    pub fn contains(&self, value: f32) -> bool {
        is_valid(value) && value >= self.min && value <= self.max
    }
}

/// Binary mask (`0`/`255`) of the samples inside `threshold`.
pub fn preview(image: &FloatImage, threshold: ForegroundThreshold) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        if threshold.contains(image.get_pixel(x, y).0[0]) {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Initial threshold: Otsu's level on the buffer rescaled to 8 bits, up to the buffer maximum.
pub fn auto_threshold(image: &FloatImage) -> ForegroundThreshold {
    let (min, max) = image
        .pixels()
        .map(|p| p.0[0])
        .filter(|v| is_valid(*v))
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if !(min < max) {
        let value = if min.is_finite() { min } else { 0.0 };
        return ForegroundThreshold {
            min: value,
            max: value,
        };
    }

    let scale = 255.0 / (max - min);
    let gray = GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let value = image.get_pixel(x, y).0[0];
        if is_valid(value) {
            Luma([((value - min) * scale).round().clamp(0.0, 255.0) as u8])
        } else {
            Luma([0])
        }
    });
    let level = otsu_level(&gray);
    let threshold = ForegroundThreshold {
        min: min + level as f32 / scale,
        max,
    };
    tracing::debug!(
        "automatic foreground threshold [{:.3}, {:.3}]",
        threshold.min,
        threshold.max
    );
    threshold
}

/// Boundary adapter for the threshold dialog.
///
/// The slider dialog itself lives outside this crate. Every change recomputes the preview from
/// scratch; nothing but the last bounds is kept.
pub struct ThresholdPreviewer<'a> {
    image: &'a FloatImage,
    current: ForegroundThreshold,
}

impl<'a> ThresholdPreviewer<'a> {
    /// Starts from the automatic threshold.
    pub fn new(image: &'a FloatImage) -> Self {
        Self {
            image,
            current: auto_threshold(image),
        }
    }

    pub fn current(&self) -> ForegroundThreshold {
        self.current
    }

    /// Slider moved: remember the bounds and return the new preview.
    pub fn on_change(&mut self, min: f32, max: f32) -> GrayImage {
        self.current = ForegroundThreshold { min, max };
        preview(self.image, self.current)
    }

    /// Dialog confirmed.
    pub fn accept(self) -> ForegroundThreshold {
        self.current
    }
}

/// Zeroes donor and acceptor outside the foreground mask.
pub fn apply_mask(donor: &mut FloatImage, acceptor: &mut FloatImage, mask: &GrayImage) {
    for (x, y, pixel) in donor.enumerate_pixels_mut() {
        if mask.get_pixel(x, y).0[0] == 0 {
            pixel.0[0] = 0.0;
        }
    }
    for (x, y, pixel) in acceptor.enumerate_pixels_mut() {
        if mask.get_pixel(x, y).0[0] == 0 {
            pixel.0[0] = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::INVALID;

    fn two_level() -> FloatImage {
        FloatImage::from_fn(20, 20, |x, _| Luma([if x < 10 { 10.0 } else { 200.0 }]))
    }

    #[test]
    fn preview_marks_pixels_in_range() {
        let mut image = two_level();
        image.put_pixel(15, 0, Luma([INVALID]));
        let mask = preview(
            &image,
            ForegroundThreshold {
                min: 100.0,
                max: 300.0,
            },
        );
        assert_eq!(mask.get_pixel(0, 0).0[0], 0);
        assert_eq!(mask.get_pixel(12, 3).0[0], 255);
        assert_eq!(mask.get_pixel(15, 0).0[0], 0);
    }

    #[test]
    fn auto_threshold_separates_two_levels() {
        let threshold = auto_threshold(&two_level());
        assert!(threshold.min >= 10.0 && threshold.min < 200.0, "{threshold:?}");
        assert_eq!(threshold.max, 200.0);
    }

    #[test]
    fn previewer_recomputes_on_every_change() {
        let image = two_level();
        let mut previewer = ThresholdPreviewer::new(&image);
        let all = previewer.on_change(0.0, 1000.0);
        assert!(all.pixels().all(|p| p.0[0] == 255));
        let none = previewer.on_change(500.0, 1000.0);
        assert!(none.pixels().all(|p| p.0[0] == 0));
        assert_eq!(
            previewer.accept(),
            ForegroundThreshold {
                min: 500.0,
                max: 1000.0
            }
        );
    }

    #[test]
    fn mask_zeroes_both_channels_outside() {
        let mut donor = FloatImage::from_pixel(4, 1, Luma([5.0]));
        let mut acceptor = FloatImage::from_pixel(4, 1, Luma([7.0]));
        let mask = GrayImage::from_fn(4, 1, |x, _| Luma([if x < 2 { 255 } else { 0 }]));
        apply_mask(&mut donor, &mut acceptor, &mask);
        assert_eq!(donor.get_pixel(1, 0).0[0], 5.0);
        assert_eq!(donor.get_pixel(2, 0).0[0], 0.0);
        assert_eq!(acceptor.get_pixel(3, 0).0[0], 0.0);
    }
}
