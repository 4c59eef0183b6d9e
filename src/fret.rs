use image::{GrayImage, Luma};

use crate::buffer::{FloatImage, INVALID, ensure_same_dimensions, is_valid};
use crate::error::{FretError, Result};

/// Range the FRET image is displayed and thresholded in, whatever its data range.
pub const FRET_DISPLAY_RANGE: (f32, f32) = (0.0, 100.0);

/// FRET index of one pixel, `100 * A / (D + A)`, or `None` where it is undefined.
///
/// Undefined covers a non-positive denominator, invalid inputs and ratios outside `[0, 100]`.
///
/// # Examples
///
/// ```
/// use nuclear_fret::fret::fret_index;
///
/// assert_eq!(fret_index(30.0, 10.0), Some(25.0));
/// assert_eq!(fret_index(0.0, 0.0), None);
/// assert_eq!(fret_index(-10.0, 20.0), None);
/// ```
pub fn fret_index(donor: f32, acceptor: f32) -> Option<f32> {
    let denominator = donor + acceptor;
    if !(denominator > 0.0) {
        return None;
    }
    let ratio = acceptor / denominator;
    if !(0.0..=1.0).contains(&ratio) {
        return None;
    }
    Some(100.0 * ratio)
}

/// Pixelwise FRET index of two preprocessed channels.
///
/// Fails only when the denominator is not positive anywhere; single undefined pixels are marked
/// invalid.
pub fn compute_fret(donor: &FloatImage, acceptor: &FloatImage) -> Result<FloatImage> {
    ensure_same_dimensions(donor.dimensions(), acceptor.dimensions())?;

    let mut computed = 0usize;
    let fret = FloatImage::from_fn(donor.width(), donor.height(), |x, y| {
        let d = donor.get_pixel(x, y).0[0];
        let a = acceptor.get_pixel(x, y).0[0];
        if d + a > 0.0 {
            computed += 1;
        }
        Luma([fret_index(d, a).unwrap_or(INVALID)])
    });

    if computed == 0 {
        return Err(FretError::DegenerateDenominator);
    }
    let valid = fret.pixels().filter(|p| is_valid(p.0[0])).count();
    tracing::info!(
        "FRET index defined on {} of {} pixels",
        valid,
        fret.width() as usize * fret.height() as usize
    );
    Ok(fret)
}

/// 8-bit rendering of a FRET image over [`FRET_DISPLAY_RANGE`]; invalid pixels are black.
pub fn to_display(fret: &FloatImage) -> GrayImage {
    let (low, high) = FRET_DISPLAY_RANGE;
    GrayImage::from_fn(fret.width(), fret.height(), |x, y| {
        let value = fret.get_pixel(x, y).0[0];
        if is_valid(value) {
            Luma([((value - low) / (high - low) * 255.0).round().clamp(0.0, 255.0) as u8])
        } else {
            Luma([0])
        }
    })
}
