use image::{Luma, math::Rect};

use crate::buffer::{FloatImage, INVALID, ImageStats, sample};
use crate::config::Calibration;
use crate::contours::{ShapeDescriptors, perimeter, shape_descriptors};
use crate::extract::ObjectRegion;
use crate::rect::bounding_box;

/// FRET index at one resampled contour point.
#[derive(Debug, Clone, PartialEq)]
pub struct ContourMeasurement {
    pub object_id: u32,
    pub name: String,
    pub point_index: usize,
    pub x: f64,
    pub y: f64,
    /// `None` where the FRET index is undefined.
    pub fret: Option<f32>,
}

/// Ordered contour measurements of all objects.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FretTable {
    rows: Vec<ContourMeasurement>,
}

impl FretTable {
    pub const COLUMNS: [&'static str; 6] = ["object", "name", "point", "x", "y", "fret_index"];

    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, row: ContourMeasurement) {
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[ContourMeasurement] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Drops rows without a genuine ratiometric reading: invalid or exactly `0`.
    ///
    /// Returns the number of rows removed.
    pub fn retain_valid(&mut self) -> usize {
        let before = self.rows.len();
        self.rows.retain(|row| row.fret.is_some_and(|v| v != 0.0));
        before - self.rows.len()
    }
}

/// Samples `fret` at the rounded position of every contour point of every region.
pub fn sample_contours(regions: &[ObjectRegion], fret: &FloatImage) -> FretTable {
    let mut table = FretTable::new();
    for region in regions {
        for (point_index, point) in region.contour.iter().enumerate() {
            table.push(ContourMeasurement {
                object_id: region.id,
                name: region.name.clone(),
                point_index,
                x: point.x,
                y: point.y,
                fret: sample(fret, point.x.round() as i64, point.y.round() as i64),
            });
        }
    }
    table
}

/// Aggregate FRET statistics of one object's band.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionStats {
    pub object_id: u32,
    pub name: String,
    /// Calibrated area of the whole band.
    pub area: f64,
    /// `None` when no band pixel carries a valid FRET index.
    pub mean: Option<f64>,
    pub std_dev: f64,
    /// Band pixels carrying a valid FRET index.
    pub valid_pixels: usize,
    /// Calibrated perimeter of the band's outer outline.
    pub perimeter: f64,
    /// Shape of the band's outer outline.
    pub shape: Option<ShapeDescriptors>,
    pub bounds: Rect,
}

/// FRET statistics over the band of `region`, with area and perimeter scaled by `calibration`.
pub fn region_stats(
    region: &ObjectRegion,
    fret: &FloatImage,
    calibration: &Calibration,
) -> RegionStats {
    let band = &region.band;
    let stats = ImageStats::from_values(band.pixels().map(|(x, y)| fret.get_pixel(x, y).0[0]));
    let bounds = bounding_box(&band.outer)
        .map(|b| b.to_pixel_rect())
        .unwrap_or(Rect {
            x: band.origin.0,
            y: band.origin.1,
            width: 0,
            height: 0,
        });
    RegionStats {
        object_id: region.id,
        name: region.name.clone(),
        area: band.area() as f64 * calibration.pixel_area(),
        mean: stats.mean,
        std_dev: stats.std_dev,
        valid_pixels: stats.count,
        perimeter: calibration.length(perimeter(&band.outer)),
        shape: shape_descriptors(&band.outer),
        bounds,
    }
}

/// Statistics of a whole FRET image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WholeImageStats {
    /// Calibrated area of the valid pixels.
    pub area: f64,
    /// `None` when the image has no valid sample.
    pub mean: Option<f64>,
    pub std_dev: f64,
    pub valid_pixels: usize,
}

/// Statistics over every valid pixel of `fret`.
pub fn whole_image_stats(fret: &FloatImage, calibration: &Calibration) -> WholeImageStats {
    let stats = ImageStats::of_image(fret);
    WholeImageStats {
        area: stats.count as f64 * calibration.pixel_area(),
        mean: stats.mean,
        std_dev: stats.std_dev,
        valid_pixels: stats.count,
    }
}

/// Copy of `fret` that keeps only the samples inside some region's band.
pub fn composite(fret: &FloatImage, regions: &[ObjectRegion]) -> FloatImage {
    let mut inside = vec![false; fret.width() as usize * fret.height() as usize];
    for region in regions {
        for (x, y) in region.band.pixels() {
            if x < fret.width() && y < fret.height() {
                inside[y as usize * fret.width() as usize + x as usize] = true;
            }
        }
    }
    FloatImage::from_fn(fret.width(), fret.height(), |x, y| {
        if inside[y as usize * fret.width() as usize + x as usize] {
            *fret.get_pixel(x, y)
        } else {
            Luma([INVALID])
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::band::build_band;
    use crate::contours::resample;
    use imageproc::point::Point;
    use std::num::NonZeroU32;

    fn row(fret: Option<f32>) -> ContourMeasurement {
        ContourMeasurement {
            object_id: 1,
            name: "n".to_string(),
            point_index: 0,
            x: 0.0,
            y: 0.0,
            fret,
        }
    }

    fn square_region(id: u32, x0: i32, y0: i32, side: i32) -> ObjectRegion {
        let outline = vec![
            Point::new(x0, y0),
            Point::new(x0 + side, y0),
            Point::new(x0 + side, y0 + side),
            Point::new(x0, y0 + side),
        ];
        let contour = resample(&outline, 1.0);
        let band = build_band(&contour, (60, 60), 2, 1).unwrap();
        ObjectRegion {
            id,
            label: NonZeroU32::new(id).unwrap(),
            name: format!("square-{id}"),
            outline,
            contour,
            band,
        }
    }

    #[test]
    fn filtering_keeps_only_real_readings() {
        let mut table = FretTable::new();
        table.push(row(Some(0.0)));
        table.push(row(None));
        table.push(row(Some(42.5)));
        assert_eq!(table.retain_valid(), 2);
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0].fret, Some(42.5));
    }

    #[test]
    fn contour_samples_use_rounded_positions() {
        let mut fret = FloatImage::from_fn(60, 60, |x, _| Luma([x as f32]));
        fret.put_pixel(10, 10, Luma([INVALID]));
        let region = square_region(3, 10, 10, 20);
        let table = sample_contours(std::slice::from_ref(&region), &fret);
        assert_eq!(table.len(), region.contour.len());
        assert!(table.rows().iter().all(|r| r.object_id == 3));
        assert_eq!(table.rows()[0].fret, None);
        assert_eq!(table.rows()[1].fret, Some(11.0));
        assert_eq!(table.rows()[1].point_index, 1);
    }

    #[test]
    fn band_statistics() {
        let fret = FloatImage::from_pixel(60, 60, Luma([25.0]));
        let region = square_region(1, 20, 20, 15);
        let stats = region_stats(&region, &fret, &Calibration::new("um", 0.5, 0.5));
        assert!((stats.mean.unwrap() - 25.0).abs() < 1e-9);
        assert!(stats.std_dev.abs() < 1e-9);
        assert_eq!(stats.valid_pixels, region.band.area());
        assert!((stats.area - region.band.area() as f64 * 0.25).abs() < 1e-9);
        let shape = stats.shape.unwrap();
        assert!((shape.aspect_ratio - 1.0).abs() < 0.1);
        assert!(stats.bounds.width >= 16);
    }

    #[test]
    fn band_without_valid_samples_has_no_mean() {
        let fret = FloatImage::from_pixel(60, 60, Luma([INVALID]));
        let region = square_region(1, 20, 20, 15);
        let stats = region_stats(&region, &fret, &Calibration::default());
        assert_eq!(stats.mean, None);
        assert_eq!(stats.valid_pixels, 0);
        assert_eq!(stats.std_dev, 0.0);
        assert!((stats.area - region.band.area() as f64).abs() < 1e-9);

        let whole = whole_image_stats(&fret, &Calibration::default());
        assert_eq!(whole.mean, None);
        assert_eq!(whole.area, 0.0);
    }

    #[test]
    fn whole_image_statistics_skip_invalid() {
        let mut fret = FloatImage::from_pixel(4, 4, Luma([10.0]));
        fret.put_pixel(0, 0, Luma([INVALID]));
        let stats = whole_image_stats(&fret, &Calibration::default());
        assert_eq!(stats.valid_pixels, 15);
        assert!((stats.area - 15.0).abs() < 1e-12);
        assert!((stats.mean.unwrap() - 10.0).abs() < 1e-12);
    }

    #[test]
    fn composite_blanks_everything_outside_bands() {
        let fret = FloatImage::from_pixel(60, 60, Luma([30.0]));
        let regions = vec![square_region(1, 5, 5, 12), square_region(2, 35, 35, 12)];
        let masked = composite(&fret, &regions);
        for (x, y, pixel) in masked.enumerate_pixels() {
            let inside = regions.iter().any(|r| r.band.contains(x, y));
            assert_eq!(pixel.0[0].is_nan(), !inside, "({x}, {y})");
        }
    }
}
