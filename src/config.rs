use image::Rgb;

use crate::error::{FretError, Result};

/// What the FRET index is aggregated over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnalysisMode {
    /// Statistics over the whole (optionally foreground-masked) FRET image.
    WholeObject,
    /// Segment nuclei and measure the FRET index along each periphery.
    #[default]
    PerObject,
}

/// How the background level is removed from each channel after preprocessing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BackgroundMode {
    /// Subtract fixed per-channel levels.
    Constant { donor: f32, acceptor: f32 },
    /// Subtract the mean intensity sampled along a user-drawn background line.
    Roi,
}

impl Default for BackgroundMode {
    fn default() -> Self {
        Self::Constant {
            donor: 140.0,
            acceptor: 140.0,
        }
    }
}

/// Inclusive raw-intensity range in which the sensor response is trusted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorRange {
    pub low: f32,
    pub high: f32,
}

impl SensorRange {
    pub fn contains(&self, value: f32) -> bool {
        value >= self.low && value <= self.high
    }
}

impl Default for SensorRange {
    /// A 12-bit camera with the zero and saturated codes excluded.
    fn default() -> Self {
        Self {
            low: 1.0,
            high: 4094.0,
        }
    }
}

/// Relief flooded by the watershed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WatershedRelief {
    /// Flood the intensity surface as given.
    Intensity,
    /// Flood the Sobel gradient magnitude of the surface, so that floods meet on object edges.
    #[default]
    Gradient,
}

/// Physical pixel calibration. Only used to scale reported areas and lengths.
#[derive(Debug, Clone, PartialEq)]
pub struct Calibration {
    pub unit: String,
    pub pixel_width: f64,
    pub pixel_height: f64,
}

impl Calibration {
    /// Builds a calibration; the unit `"micron"` is normalised to `"um"`.
    ///
    /// # Examples
    ///
    /// ```
    /// use nuclear_fret::Calibration;
    ///
    /// let calibration = Calibration::new("micron", 0.2, 0.2);
    /// assert_eq!(calibration.unit, "um");
    /// assert!((calibration.pixel_area() - 0.04).abs() < 1e-12);
    /// ```
    pub fn new(unit: impl Into<String>, pixel_width: f64, pixel_height: f64) -> Self {
        let unit = unit.into();
        let unit = if unit == "micron" {
            "um".to_string()
        } else {
            unit
        };
        Self {
            unit,
            pixel_width,
            pixel_height,
        }
    }

    pub fn pixel_area(&self) -> f64 {
        self.pixel_width * self.pixel_height
    }

    /// Converts a length measured in pixels, assuming square-ish pixels.
    pub fn length(&self, pixels: f64) -> f64 {
        pixels * (self.pixel_width * self.pixel_height).sqrt()
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self::new("pixel", 1.0, 1.0)
    }
}

/// Immutable settings threaded through every stage of the analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    pub mode: AnalysisMode,
    pub background: BackgroundMode,
    /// Restrict the FRET computation to an acceptor-derived foreground mask.
    pub use_mask: bool,
    pub sensor_range: SensorRange,
    pub smoothing_sigma: f32,
    /// Radius of the disk each marker point is stamped as.
    pub marker_radius: i32,
    pub relief: WatershedRelief,
    /// Regions whose resampled outline has fewer points are dropped.
    pub min_contour_points: usize,
    pub band_outward: u8,
    pub band_inward: u8,
    pub review_background: Rgb<u8>,
    pub archive_background: Rgb<u8>,
}

impl AnalysisConfig {
    /// The settings of a per-nucleus analysis.
    pub fn per_object() -> Self {
        Self::default()
    }

    /// The settings of a whole-cell analysis, which masks the FRET image by acceptor foreground.
    pub fn whole_object() -> Self {
        Self {
            mode: AnalysisMode::WholeObject,
            use_mask: true,
            ..Self::default()
        }
    }

    /// Replaces the background subtraction mode.
    pub fn with_background(mut self, background: BackgroundMode) -> Self {
        self.background = background;
        self
    }

    /// Turns acceptor foreground masking on or off.
    pub fn with_mask(mut self, use_mask: bool) -> Self {
        self.use_mask = use_mask;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.sensor_range.low <= self.sensor_range.high) {
            return Err(FretError::InvalidConfig(format!(
                "sensor range [{}, {}] is empty",
                self.sensor_range.low, self.sensor_range.high
            )));
        }
        if !(self.smoothing_sigma > 0.0) {
            return Err(FretError::InvalidConfig(format!(
                "smoothing sigma must be positive (got {})",
                self.smoothing_sigma
            )));
        }
        if self.marker_radius < 0 {
            return Err(FretError::InvalidConfig(format!(
                "marker radius must not be negative (got {})",
                self.marker_radius
            )));
        }
        if self.min_contour_points < 3 {
            return Err(FretError::InvalidConfig(format!(
                "a contour needs at least 3 points (got {})",
                self.min_contour_points
            )));
        }
        if let BackgroundMode::Constant { donor, acceptor } = self.background
            && !(donor.is_finite() && acceptor.is_finite())
        {
            return Err(FretError::InvalidConfig(
                "background levels must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            mode: AnalysisMode::PerObject,
            background: BackgroundMode::default(),
            use_mask: false,
            sensor_range: SensorRange::default(),
            smoothing_sigma: 2.0,
            marker_radius: 2,
            relief: WatershedRelief::default(),
            min_contour_points: 10,
            band_outward: 2,
            band_inward: 1,
            review_background: Rgb([0, 0, 0]),
            archive_background: Rgb([255, 255, 255]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn micron_unit_is_normalised() {
        let cal = Calibration::new("micron", 0.2, 0.2);
        assert_eq!(cal.unit, "um");
        assert!((cal.pixel_area() - 0.04).abs() < 1e-12);
        assert!((cal.length(10.0) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn default_config_is_valid() {
        assert!(AnalysisConfig::default().validate().is_ok());
        assert!(AnalysisConfig::whole_object().validate().is_ok());
        assert!(AnalysisConfig::whole_object().use_mask);
    }

    #[test]
    fn rejects_bad_values() {
        let config = AnalysisConfig {
            smoothing_sigma: 0.0,
            ..AnalysisConfig::default()
        };
        assert!(matches!(config.validate(), Err(FretError::InvalidConfig(_))));

        let config = AnalysisConfig {
            sensor_range: SensorRange {
                low: 10.0,
                high: 1.0,
            },
            ..AnalysisConfig::default()
        };
        assert!(config.validate().is_err());

        let config = AnalysisConfig::default().with_background(BackgroundMode::Constant {
            donor: f32::NAN,
            acceptor: 0.0,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn sensor_range_is_inclusive() {
        let range = SensorRange::default();
        assert!(!range.contains(0.0));
        assert!(range.contains(1.0));
        assert!(range.contains(4094.0));
        assert!(!range.contains(4095.0));
    }
}
