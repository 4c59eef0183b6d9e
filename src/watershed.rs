use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::{
    drawing::draw_filled_circle_mut,
    gradients::sobel_gradients,
    point::Point,
    region_labelling::{Connectivity, connected_components},
};

use crate::buffer::{FloatImage, ensure_same_dimensions, is_valid};
use crate::config::{AnalysisConfig, WatershedRelief};
use crate::error::{FretError, Result};

/// Raw integer label grid as produced by component labelling. `0` means unlabelled.
pub type LabelBuffer = ImageBuffer<Luma<u32>, Vec<u32>>;

/// Seed points placed by the user: one or more inside objects, exactly one in the background.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerSet {
    interior: Vec<Point<f32>>,
    background: Point<f32>,
}

impl MarkerSet {
    pub fn new(interior: Vec<Point<f32>>, background: Vec<Point<f32>>) -> Result<Self> {
        if interior.is_empty() {
            return Err(FretError::NoInteriorMarkers);
        }
        match background.as_slice() {
            [only] => Ok(Self {
                interior,
                background: *only,
            }),
            other => Err(FretError::BackgroundMarkerCount(other.len())),
        }
    }

    pub fn interior(&self) -> &[Point<f32>] {
        &self.interior
    }

    pub fn background(&self) -> Point<f32> {
        self.background
    }
}

pub(crate) fn pixel_of(point: Point<f32>, (width, height): (u32, u32)) -> Option<(u32, u32)> {
    let x = point.x.round();
    let y = point.y.round();
    (x >= 0.0 && y >= 0.0 && x < width as f32 && y < height as f32).then(|| (x as u32, y as u32))
}

/// Labelled marker canvas.
#[derive(Debug, Clone)]
pub struct Seeds {
    pub labels: LabelBuffer,
    /// Label of the cluster holding the background marker.
    pub background_label: u32,
    pub count: u32,
}

/// Stamps every marker as a disk and labels the disjoint clusters.
pub fn label_markers(markers: &MarkerSet, dimensions: (u32, u32), radius: i32) -> Result<Seeds> {
    let (width, height) = dimensions;
    let background = pixel_of(markers.background, dimensions)
        .ok_or(FretError::BackgroundMarkerCount(0))?;

    let interior: Vec<(u32, u32)> = markers
        .interior
        .iter()
        .filter_map(|p| {
            let pixel = pixel_of(*p, dimensions);
            if pixel.is_none() {
                tracing::warn!("interior marker ({}, {}) lies outside the image", p.x, p.y);
            }
            pixel
        })
        .collect();
    if interior.is_empty() {
        return Err(FretError::NoInteriorMarkers);
    }

    let mut canvas = GrayImage::new(width, height);
    for &(x, y) in interior.iter().chain(std::iter::once(&background)) {
        draw_filled_circle_mut(&mut canvas, (x as i32, y as i32), radius, Luma([255u8]));
    }
    let labels = connected_components(&canvas, Connectivity::Eight, Luma([0u8]));

    let background_label = labels.get_pixel(background.0, background.1).0[0];
    let count = labels.pixels().map(|p| p.0[0]).max().unwrap_or(0);
    let absorbed = interior
        .iter()
        .filter(|&&(x, y)| labels.get_pixel(x, y).0[0] == background_label)
        .count();
    if absorbed > 0 {
        tracing::warn!(
            "{} interior marker(s) touch the background marker and join the background seed",
            absorbed
        );
    }
    tracing::info!("{} seed cluster(s), background seed {}", count, background_label);

    Ok(Seeds {
        labels,
        background_label,
        count,
    })
}

/// Surface the floods climb, with invalid samples raised to the top.
pub fn relief(surface: &FloatImage, kind: WatershedRelief) -> FloatImage {
    let lifted = |v: f32| if is_valid(v) { v } else { f32::INFINITY };
    match kind {
        WatershedRelief::Intensity => {
            FloatImage::from_fn(surface.width(), surface.height(), |x, y| {
                Luma([lifted(surface.get_pixel(x, y).0[0])])
            })
        }
        WatershedRelief::Gradient => {
            let gradient = sobel_gradients(&to_gray(surface));
            FloatImage::from_fn(surface.width(), surface.height(), |x, y| {
                Luma([gradient.get_pixel(x, y).0[0] as f32])
            })
        }
    }
}

/// Stretches the valid range of a float image onto 8 bits.
fn to_gray(image: &FloatImage) -> GrayImage {
    let (min, max) = image
        .pixels()
        .map(|p| p.0[0])
        .filter(|v| v.is_finite())
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    let span = if max > min { max - min } else { 1.0 };
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let value = image.get_pixel(x, y).0[0];
        if value.is_finite() {
            Luma([((value - min) / span * 255.0).round().clamp(0.0, 255.0) as u8])
        } else {
            Luma([255])
        }
    })
}

#[derive(Debug, Clone, Copy)]
struct Front {
    level: f32,
    order: u64,
    x: u32,
    y: u32,
    label: u32,
}

impl PartialEq for Front {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Front {}

impl PartialOrd for Front {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Front {
    fn cmp(&self, other: &Self) -> Ordering {
        self.level
            .total_cmp(&other.level)
            .then(self.order.cmp(&other.order))
    }
}

const NEIGHBOURS: [(i64, i64); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Floods `relief` from `seeds` with 8-connectivity. Every pixel ends up with a seed label.
///
/// Pixels are claimed in order of increasing relief. Equal relief is served first-come, so a
/// ridge pixel belongs to the flood whose front reached it first. No dam lines are drawn.
pub fn watershed(relief: &FloatImage, seeds: &LabelBuffer) -> Result<LabelBuffer> {
    ensure_same_dimensions(relief.dimensions(), seeds.dimensions())?;
    let (width, height) = relief.dimensions();
    let mut labels = seeds.clone();
    let mut queue = BinaryHeap::new();
    let mut order = 0u64;

    let mut push_neighbours = |labels: &LabelBuffer,
                               queue: &mut BinaryHeap<Reverse<Front>>,
                               x: u32,
                               y: u32,
                               label: u32| {
        for (dx, dy) in NEIGHBOURS {
            let nx = x as i64 + dx;
            let ny = y as i64 + dy;
            if nx < 0 || ny < 0 || nx >= width as i64 || ny >= height as i64 {
                continue;
            }
            let (nx, ny) = (nx as u32, ny as u32);
            if labels.get_pixel(nx, ny).0[0] != 0 {
                continue;
            }
            queue.push(Reverse(Front {
                level: relief.get_pixel(nx, ny).0[0],
                order,
                x: nx,
                y: ny,
                label,
            }));
            order += 1;
        }
    };

    for y in 0..height {
        for x in 0..width {
            let label = labels.get_pixel(x, y).0[0];
            if label != 0 {
                push_neighbours(&labels, &mut queue, x, y, label);
            }
        }
    }

    while let Some(Reverse(front)) = queue.pop() {
        if labels.get_pixel(front.x, front.y).0[0] != 0 {
            continue;
        }
        labels.put_pixel(front.x, front.y, Luma([front.label]));
        push_neighbours(&labels, &mut queue, front.x, front.y, front.label);
    }

    Ok(labels)
}

/// Segmentation result before any label post-processing.
#[derive(Debug, Clone)]
pub struct Segmentation {
    pub labels: LabelBuffer,
    pub background_label: u32,
}

/// Labels the markers and floods the intensity surface from them.
pub fn segment(
    surface: &FloatImage,
    markers: &MarkerSet,
    config: &AnalysisConfig,
) -> Result<Segmentation> {
    let _span = tracing::info_span!("segment").entered();
    let seeds = label_markers(markers, surface.dimensions(), config.marker_radius)?;
    let relief = relief(surface, config.relief);
    let labels = watershed(&relief, &seeds.labels)?;
    Ok(Segmentation {
        labels,
        background_label: seeds.background_label,
    })
}
