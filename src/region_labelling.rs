use std::collections::{BTreeMap, BTreeSet};
use std::num::NonZeroU32;

use image::{Luma, Rgb, RgbImage, math::Rect};
use imageproc::point::Point;

use crate::colors::label_palette;
use crate::rect::Bounds;
use crate::watershed::{LabelBuffer, MarkerSet, Segmentation, pixel_of};

/// What a pixel of a label image belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Region {
    Background,
    Object(NonZeroU32),
}

impl Region {
    fn from_raw(raw: u32) -> Self {
        NonZeroU32::new(raw).map_or(Region::Background, Region::Object)
    }

    pub fn object(self) -> Option<NonZeroU32> {
        match self {
            Region::Background => None,
            Region::Object(label) => Some(label),
        }
    }
}

/// Integer label grid in which `0` is reserved for the background.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelImage {
    raw: LabelBuffer,
}

impl LabelImage {
    pub fn new(raw: LabelBuffer) -> Self {
        Self { raw }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.raw.dimensions()
    }

    pub fn as_buffer(&self) -> &LabelBuffer {
        &self.raw
    }

    pub fn region_at(&self, x: u32, y: u32) -> Region {
        Region::from_raw(self.raw.get_pixel(x, y).0[0])
    }

    /// Object labels present, in increasing order.
    pub fn objects(&self) -> BTreeSet<NonZeroU32> {
        self.raw
            .pixels()
            .filter_map(|p| NonZeroU32::new(p.0[0]))
            .collect()
    }

    /// Pixel extent of every object.
    pub fn object_bounds(&self) -> BTreeMap<NonZeroU32, Rect> {
        let mut bounds: BTreeMap<NonZeroU32, Bounds<u32>> = BTreeMap::new();
        for (x, y, pixel) in self.raw.enumerate_pixels() {
            if let Some(label) = NonZeroU32::new(pixel.0[0]) {
                bounds
                    .entry(label)
                    .and_modify(|b| b.include(x, y))
                    .or_insert_with(|| Bounds::at(x, y));
            }
        }
        bounds
            .into_iter()
            .map(|(label, b)| (label, b.to_pixel_rect()))
            .collect()
    }

    /// Turns every listed object into background.
    pub fn clear(&mut self, labels: &BTreeSet<NonZeroU32>) {
        if labels.is_empty() {
            return;
        }
        for pixel in self.raw.pixels_mut() {
            if NonZeroU32::new(pixel.0[0]).is_some_and(|l| labels.contains(&l)) {
                *pixel = Luma([0]);
            }
        }
    }

    /// Merges into the background every object one of `points` lands on.
    ///
    /// Points on different objects merge all of them. Returns the merged labels.
    pub fn merge_into_background(&mut self, points: &[Point<f32>]) -> BTreeSet<NonZeroU32> {
        let dimensions = self.dimensions();
        let merged: BTreeSet<NonZeroU32> = points
            .iter()
            .filter_map(|p| pixel_of(*p, dimensions))
            .filter_map(|(x, y)| self.region_at(x, y).object())
            .collect();
        self.clear(&merged);
        merged
    }

    /// Removes every object with a pixel in the first or last row or column.
    pub fn remove_border_objects(&mut self) -> BTreeSet<NonZeroU32> {
        let (width, height) = self.dimensions();
        if width == 0 || height == 0 {
            return BTreeSet::new();
        }
        let rows = (0..width).flat_map(|x| [(x, 0), (x, height - 1)]);
        let columns = (0..height).flat_map(|y| [(0, y), (width - 1, y)]);
        let touching: BTreeSet<NonZeroU32> = rows
            .chain(columns)
            .filter_map(|(x, y)| self.region_at(x, y).object())
            .collect();
        self.clear(&touching);
        touching
    }

    /// Renders objects in distinct colours over a uniform background.
    pub fn render(&self, background: Rgb<u8>) -> RgbImage {
        let objects: Vec<NonZeroU32> = self.objects().into_iter().collect();
        let palette = label_palette(objects.len());
        let colour_of: BTreeMap<NonZeroU32, Rgb<u8>> =
            objects.into_iter().zip(palette).collect();
        RgbImage::from_fn(self.raw.width(), self.raw.height(), |x, y| {
            match self.region_at(x, y) {
                Region::Background => background,
                Region::Object(label) => colour_of.get(&label).copied().unwrap_or(background),
            }
        })
    }
}

/// Label images on both sides of the clean-up, plus what it removed.
#[derive(Debug, Clone)]
pub struct PostProcessed {
    /// Watershed output, before any merge.
    pub raw: LabelImage,
    pub labels: LabelImage,
    pub merged: BTreeSet<NonZeroU32>,
    pub border_removed: BTreeSet<NonZeroU32>,
}

/// Merges the regions under the background marker and any review points into the background,
/// then removes border-touching objects.
pub fn post_process(
    segmentation: Segmentation,
    markers: &MarkerSet,
    merge_points: &[Point<f32>],
) -> PostProcessed {
    let _span = tracing::info_span!("post_process_labels").entered();

    let raw = LabelImage::new(segmentation.labels);
    let mut labels = raw.clone();

    let points: Vec<Point<f32>> = std::iter::once(markers.background())
        .chain(merge_points.iter().copied())
        .collect();
    let merged = labels.merge_into_background(&points);
    if merged.len() > 1 {
        tracing::info!(
            "background points land on {} regions; all of them are merged",
            merged.len()
        );
    }
    let border_removed = labels.remove_border_objects();
    tracing::info!(
        "merged {} region(s) into background, removed {} border region(s), {} remain",
        merged.len(),
        border_removed.len(),
        labels.objects().len()
    );

    PostProcessed {
        raw,
        labels,
        merged,
        border_removed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nz(v: u32) -> NonZeroU32 {
        NonZeroU32::new(v).unwrap()
    }

    /// Label 1 touches the left edge, 2 is interior, 3 fills the rest.
    fn sample_labels() -> LabelBuffer {
        LabelBuffer::from_fn(10, 10, |x, y| {
            if x < 3 && (3..6).contains(&y) {
                Luma([1])
            } else if (5..8).contains(&x) && (4..7).contains(&y) {
                Luma([2])
            } else {
                Luma([3])
            }
        })
    }

    #[test]
    fn background_sentinel_is_distinct() {
        let mut raw = LabelBuffer::new(2, 1);
        raw.put_pixel(1, 0, Luma([7]));
        let labels = LabelImage::new(raw);
        assert_eq!(labels.region_at(0, 0), Region::Background);
        assert_eq!(labels.region_at(1, 0), Region::Object(nz(7)));
        assert_eq!(labels.objects(), BTreeSet::from([nz(7)]));
    }

    #[test]
    fn border_objects_are_removed() {
        let mut labels = LabelImage::new(sample_labels());
        let removed = labels.remove_border_objects();
        assert_eq!(removed, BTreeSet::from([nz(1), nz(3)]));
        assert_eq!(labels.objects(), BTreeSet::from([nz(2)]));
        let (w, h) = labels.dimensions();
        for x in 0..w {
            assert_eq!(labels.region_at(x, 0), Region::Background);
            assert_eq!(labels.region_at(x, h - 1), Region::Background);
        }
    }

    #[test]
    fn merge_takes_every_label_under_the_points() {
        let mut labels = LabelImage::new(sample_labels());
        let merged = labels.merge_into_background(&[
            Point::new(6.0, 5.0),
            Point::new(9.0, 9.0),
            Point::new(40.0, 40.0),
        ]);
        assert_eq!(merged, BTreeSet::from([nz(2), nz(3)]));
        assert_eq!(labels.objects(), BTreeSet::from([nz(1)]));
    }

    #[test]
    fn merge_happens_before_border_removal() {
        let segmentation = Segmentation {
            labels: sample_labels(),
            background_label: 3,
        };
        let markers =
            MarkerSet::new(vec![Point::new(6.0, 5.0)], vec![Point::new(6.0, 5.0)]).unwrap();
        let result = post_process(segmentation, &markers, &[]);
        assert_eq!(result.merged, BTreeSet::from([nz(2)]));
        assert!(!result.border_removed.contains(&nz(2)));
        assert!(result.labels.objects().is_empty());
        assert_eq!(result.raw.objects().len(), 3);
    }

    #[test]
    fn bounds_and_render() {
        let labels = LabelImage::new(sample_labels());
        let bounds = labels.object_bounds();
        assert_eq!(
            bounds[&nz(2)],
            Rect {
                x: 5,
                y: 4,
                width: 3,
                height: 3
            }
        );
        let mut cleaned = labels.clone();
        cleaned.remove_border_objects();
        let rgb = cleaned.render(Rgb([255, 255, 255]));
        assert_eq!(*rgb.get_pixel(0, 0), Rgb([255, 255, 255]));
        assert_ne!(*rgb.get_pixel(6, 5), Rgb([255, 255, 255]));
    }
}
