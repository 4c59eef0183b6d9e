use image::{ImageBuffer, Luma, math::Rect};

use crate::config::Calibration;
use crate::error::{FretError, Result};

/// A single-plane image of `f32` samples.
///
/// Invalid (no-data) samples are stored as [`INVALID`] so that `0.0` stays a legitimate value.
/// [`sample`] hands them out as `None`.
pub type FloatImage = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Marker stored in place of an invalid sample.
pub const INVALID: f32 = f32::NAN;

/// Reads a sample, returning `None` when it is out of bounds or invalid.
pub fn sample(image: &FloatImage, x: i64, y: i64) -> Option<f32> {
    if x < 0 || y < 0 || x >= image.width() as i64 || y >= image.height() as i64 {
        return None;
    }
    let value = image.get_pixel(x as u32, y as u32).0[0];
    (!value.is_nan()).then_some(value)
}

/// Whether `value` is a real sample rather than [`INVALID`].
pub fn is_valid(value: f32) -> bool {
    !value.is_nan()
}

pub(crate) fn ensure_same_dimensions(expected: (u32, u32), actual: (u32, u32)) -> Result<()> {
    if expected != actual {
        return Err(FretError::DimensionMismatch { expected, actual });
    }
    Ok(())
}

/// Count, mean and sample standard deviation over the valid values of a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ImageStats {
    pub count: usize,
    /// `None` when no valid value was seen.
    pub mean: Option<f64>,
    pub std_dev: f64,
}

impl ImageStats {
    /// Accumulates with Welford's update; `NaN` inputs are skipped.
    pub fn from_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = f32>,
    {
        let mut count = 0usize;
        let mut mean = 0.0f64;
        let mut m2 = 0.0f64;
        for value in values.into_iter().filter(|v| is_valid(*v)) {
            count += 1;
            let value = value as f64;
            let delta = value - mean;
            mean += delta / count as f64;
            m2 += delta * (value - mean);
        }
        let std_dev = if count > 1 {
            (m2 / (count - 1) as f64).sqrt()
        } else {
            0.0
        };
        Self {
            count,
            mean: (count > 0).then_some(mean),
            std_dev,
        }
    }

    pub fn of_image(image: &FloatImage) -> Self {
        Self::from_values(image.pixels().map(|p| p.0[0]))
    }
}

/// Dimensions of the acquired hyperstack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackGeometry {
    pub channels: usize,
    pub slices: usize,
    pub frames: usize,
}

impl StackGeometry {
    /// Only single optical sections with at least two channels can be analysed.
    pub fn validate(&self) -> Result<()> {
        if self.channels < 2 || self.slices != 1 || self.frames != 1 {
            return Err(FretError::UnsupportedGeometry {
                channels: self.channels,
                slices: self.slices,
                frames: self.frames,
            });
        }
        Ok(())
    }
}

/// 1-based donor and acceptor channel indices, as presented to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelSelection {
    pub donor: usize,
    pub acceptor: usize,
}

/// A calibrated single-section multichannel image.
#[derive(Debug, Clone)]
pub struct Acquisition {
    channels: Vec<FloatImage>,
    geometry: StackGeometry,
    calibration: Calibration,
}

impl Acquisition {
    /// Builds an acquisition from its planes, rejecting anything but a single section.
    pub fn new(
        planes: Vec<FloatImage>,
        geometry: StackGeometry,
        calibration: Calibration,
    ) -> Result<Self> {
        geometry.validate()?;
        if planes.len() != geometry.channels {
            return Err(FretError::UnsupportedGeometry {
                channels: planes.len(),
                slices: geometry.slices,
                frames: geometry.frames,
            });
        }
        let dims = planes[0].dimensions();
        for plane in &planes[1..] {
            ensure_same_dimensions(dims, plane.dimensions())?;
        }
        Ok(Self {
            channels: planes,
            geometry,
            calibration,
        })
    }

    pub fn single_section(channels: Vec<FloatImage>, calibration: Calibration) -> Result<Self> {
        let geometry = StackGeometry {
            channels: channels.len(),
            slices: 1,
            frames: 1,
        };
        Self::new(channels, geometry, calibration)
    }

    pub fn geometry(&self) -> StackGeometry {
        self.geometry
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.channels[0].dimensions()
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Returns the channel at a 1-based index.
    pub fn channel(&self, index: usize) -> Result<&FloatImage> {
        index
            .checked_sub(1)
            .and_then(|i| self.channels.get(i))
            .ok_or(FretError::ChannelOutOfRange {
                index,
                available: self.channels.len(),
            })
    }

    /// Copies out the donor and acceptor channels.
    pub fn select(&self, selection: ChannelSelection) -> Result<(FloatImage, FloatImage)> {
        let donor = self.channel(selection.donor)?.clone();
        let acceptor = self.channel(selection.acceptor)?.clone();
        Ok((donor, acceptor))
    }

    /// Per-pixel maximum over all channels.
    pub fn max_projection(&self) -> FloatImage {
        let (width, height) = self.dimensions();
        FloatImage::from_fn(width, height, |x, y| {
            let max = self
                .channels
                .iter()
                .map(|c| c.get_pixel(x, y).0[0])
                .filter(|v| is_valid(*v))
                .fold(f32::NEG_INFINITY, f32::max);
            Luma([if max.is_finite() { max } else { INVALID }])
        })
    }

    /// Mean intensity of every channel inside `rect`, clipped to the image.
    ///
    /// Used to tell donor and acceptor apart by their emission profile.
    pub fn channel_means(&self, rect: Rect) -> Vec<Option<f64>> {
        let (width, height) = self.dimensions();
        let x_end = rect.x.saturating_add(rect.width).min(width);
        let y_end = rect.y.saturating_add(rect.height).min(height);
        self.channels
            .iter()
            .map(|channel| {
                let values = (rect.y..y_end)
                    .flat_map(|y| (rect.x..x_end).map(move |x| (x, y)))
                    .map(|(x, y)| channel.get_pixel(x, y).0[0]);
                ImageStats::from_values(values).mean
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant(width: u32, height: u32, value: f32) -> FloatImage {
        FloatImage::from_pixel(width, height, Luma([value]))
    }

    #[test]
    fn stats_skip_invalid_samples() {
        let stats = ImageStats::from_values([1.0, INVALID, 3.0]);
        assert_eq!(stats.count, 2);
        assert!((stats.mean.unwrap() - 2.0).abs() < 1e-12);
        assert!((stats.std_dev - 2f64.sqrt()).abs() < 1e-12);

        let empty = ImageStats::from_values(std::iter::empty());
        assert_eq!(empty.count, 0);
        assert_eq!(empty.mean, None);
        assert_eq!(empty.std_dev, 0.0);
    }

    #[test]
    fn sample_hides_invalid_and_out_of_bounds() {
        let mut image = constant(3, 3, 5.0);
        image.put_pixel(1, 1, Luma([INVALID]));
        assert_eq!(sample(&image, 0, 0), Some(5.0));
        assert_eq!(sample(&image, 1, 1), None);
        assert_eq!(sample(&image, -1, 0), None);
        assert_eq!(sample(&image, 3, 0), None);
    }

    #[test]
    fn geometry_rejects_stacks_and_single_channels() {
        let ok = StackGeometry {
            channels: 2,
            slices: 1,
            frames: 1,
        };
        assert!(ok.validate().is_ok());
        for (channels, slices, frames) in [(1, 1, 1), (2, 3, 1), (2, 1, 5)] {
            let geometry = StackGeometry {
                channels,
                slices,
                frames,
            };
            assert!(matches!(
                geometry.validate(),
                Err(FretError::UnsupportedGeometry { .. })
            ));
        }
    }

    #[test]
    fn acquisition_selects_projects_and_profiles() {
        let acquisition = Acquisition::single_section(
            vec![constant(4, 4, 10.0), constant(4, 4, 30.0), constant(4, 4, 20.0)],
            Calibration::default(),
        )
        .unwrap();

        let (donor, acceptor) = acquisition
            .select(ChannelSelection {
                donor: 1,
                acceptor: 2,
            })
            .unwrap();
        assert_eq!(donor.get_pixel(0, 0).0[0], 10.0);
        assert_eq!(acceptor.get_pixel(0, 0).0[0], 30.0);

        assert!(matches!(
            acquisition.select(ChannelSelection {
                donor: 0,
                acceptor: 2
            }),
            Err(FretError::ChannelOutOfRange { index: 0, .. })
        ));

        let projection = acquisition.max_projection();
        assert!(projection.pixels().all(|p| p.0[0] == 30.0));

        let means = acquisition.channel_means(Rect {
            x: 2,
            y: 2,
            width: 10,
            height: 10,
        });
        assert_eq!(means, vec![Some(10.0), Some(30.0), Some(20.0)]);
    }

    #[test]
    fn acquisition_keeps_its_geometry() {
        let geometry = StackGeometry {
            channels: 2,
            slices: 1,
            frames: 1,
        };
        let acquisition = Acquisition::new(
            vec![constant(3, 2, 1.0), constant(3, 2, 2.0)],
            geometry,
            Calibration::default(),
        )
        .unwrap();
        assert_eq!(acquisition.geometry(), geometry);
        assert_eq!(acquisition.channel_count(), 2);
        assert_eq!(acquisition.dimensions(), (3, 2));

        let wrong_count = Acquisition::new(
            vec![constant(3, 2, 1.0), constant(3, 2, 2.0)],
            StackGeometry {
                channels: 3,
                ..geometry
            },
            Calibration::default(),
        );
        assert!(matches!(
            wrong_count,
            Err(FretError::UnsupportedGeometry { channels: 2, .. })
        ));
    }

    #[test]
    fn acquisition_rejects_mismatched_planes() {
        let result = Acquisition::single_section(
            vec![constant(4, 4, 1.0), constant(5, 4, 1.0)],
            Calibration::default(),
        );
        assert!(matches!(result, Err(FretError::DimensionMismatch { .. })));
        let result = Acquisition::single_section(vec![constant(4, 4, 1.0)], Calibration::default());
        assert!(matches!(result, Err(FretError::UnsupportedGeometry { .. })));
    }
}
