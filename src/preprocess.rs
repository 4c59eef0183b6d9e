use image::{GrayImage, Luma};
use imageproc::{drawing::BresenhamLineIter, filter::gaussian_blur_f32, point::Point};

use crate::buffer::{FloatImage, INVALID, ImageStats};
use crate::config::{AnalysisConfig, BackgroundMode, SensorRange};
use crate::error::{FretError, Result};

/// Which of the two FRET channels a buffer holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelRole {
    Donor,
    Acceptor,
}

impl std::fmt::Display for ChannelRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelRole::Donor => write!(f, "donor"),
            ChannelRole::Acceptor => write!(f, "acceptor"),
        }
    }
}

/// A user-drawn free line lying in the image background.
#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundLine {
    points: Vec<Point<f32>>,
}

impl BackgroundLine {
    pub fn new(points: Vec<Point<f32>>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Point<f32>] {
        &self.points
    }

    /// First and last vertex of the line.
    pub fn endpoints(&self) -> Option<(Point<f32>, Point<f32>)> {
        Some((*self.points.first()?, *self.points.last()?))
    }

    /// Pixels visited by the line, without consecutive repeats.
    fn pixels(&self) -> Vec<(i32, i32)> {
        let mut pixels: Vec<(i32, i32)> = match self.points.as_slice() {
            [] => Vec::new(),
            [only] => vec![(only.x.round() as i32, only.y.round() as i32)],
            points => points
                .windows(2)
                .flat_map(|w| BresenhamLineIter::new((w[0].x, w[0].y), (w[1].x, w[1].y)))
                .collect(),
        };
        pixels.dedup();
        pixels
    }

    /// Mean of the valid samples the line passes over.
    pub fn mean_along(&self, image: &FloatImage) -> Result<f32> {
        let (width, height) = image.dimensions();
        let values = self
            .pixels()
            .into_iter()
            .filter(|&(x, y)| x >= 0 && y >= 0 && (x as u32) < width && (y as u32) < height)
            .map(|(x, y)| image.get_pixel(x as u32, y as u32).0[0]);
        ImageStats::from_values(values)
            .mean
            .map(|mean| mean as f32)
            .ok_or_else(|| FretError::EmptyRoi("background line".to_string()))
    }
}

/// Binary mask, 1 where the raw sample lies inside the trusted sensor range.
pub fn validity_mask(raw: &FloatImage, range: SensorRange) -> GrayImage {
    GrayImage::from_fn(raw.width(), raw.height(), |x, y| {
        Luma([range.contains(raw.get_pixel(x, y).0[0]) as u8])
    })
}

/// Smooths a raw channel once and suppresses every sample the sensor could not be trusted on.
///
/// Out-of-range samples become `0`; samples that end up negative become invalid so they cannot
/// feed the ratio downstream.
pub fn remove_saturated_pixels(raw: &FloatImage, range: SensorRange, sigma: f32) -> FloatImage {
    let mask = validity_mask(raw, range);
    let finite = FloatImage::from_fn(raw.width(), raw.height(), |x, y| {
        let value = raw.get_pixel(x, y).0[0];
        Luma([if value.is_finite() { value } else { 0.0 }])
    });
    let mut smoothed = gaussian_blur_f32(&finite, sigma);
    for (x, y, pixel) in smoothed.enumerate_pixels_mut() {
        let value = pixel.0[0] * mask.get_pixel(x, y).0[0] as f32;
        pixel.0[0] = if value < 0.0 { INVALID } else { value };
    }
    smoothed
}

/// Background level to remove from one channel.
pub fn background_level(
    image: &FloatImage,
    mode: BackgroundMode,
    role: ChannelRole,
    line: Option<&BackgroundLine>,
) -> Result<f32> {
    match mode {
        BackgroundMode::Constant { donor, acceptor } => Ok(match role {
            ChannelRole::Donor => donor,
            ChannelRole::Acceptor => acceptor,
        }),
        BackgroundMode::Roi => line
            .ok_or(FretError::MissingBackgroundRoi)?
            .mean_along(image),
    }
}

/// Subtracts `level` from every valid sample.
pub fn subtract_background(image: &mut FloatImage, level: f32) {
    for pixel in image.pixels_mut() {
        pixel.0[0] -= level;
    }
}

/// Full per-channel preprocessing: saturation removal, smoothing, background subtraction.
pub fn preprocess_channel(
    raw: &FloatImage,
    role: ChannelRole,
    config: &AnalysisConfig,
    line: Option<&BackgroundLine>,
) -> Result<FloatImage> {
    let _span = tracing::debug_span!("preprocess", channel = %role).entered();

    let mut cleaned = remove_saturated_pixels(raw, config.sensor_range, config.smoothing_sigma);
    let level = background_level(&cleaned, config.background, role, line)?;
    tracing::info!("{} background level: {:.5}", role, level);
    subtract_background(&mut cleaned, level);
    Ok(cleaned)
}
