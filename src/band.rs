use image::{GrayImage, Luma, math::Rect};
use imageproc::{
    contours::{BorderType, Contour, find_contours},
    distance_transform::Norm,
    drawing::draw_polygon_mut,
    morphology::{dilate, erode},
    point::Point,
};

use crate::rect::{bounding_box, pad_within};

/// Annulus around one outline, stored as a mask cropped to its neighbourhood.
#[derive(Debug, Clone, PartialEq)]
pub struct BandRegion {
    /// Outline of the outward offset, in image coordinates.
    pub outer: Vec<Point<i32>>,
    /// Outline of the inward offset; `None` when the erosion leaves nothing.
    pub inner: Option<Vec<Point<i32>>>,
    /// Image coordinates of the crop's top-left pixel.
    pub origin: (u32, u32),
    /// `255` on band pixels.
    pub mask: GrayImage,
    /// Pixel counts of the two offsets.
    pub outward_area: usize,
    pub inward_area: usize,
}

impl BandRegion {
    /// Number of pixels in the band.
    pub fn area(&self) -> usize {
        self.mask.pixels().filter(|p| p.0[0] != 0).count()
    }

    /// Image coordinates of every band pixel, in raster order.
    pub fn pixels(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        let (ox, oy) = self.origin;
        self.mask
            .enumerate_pixels()
            .filter(|(_, _, p)| p.0[0] != 0)
            .map(move |(x, y, _)| (ox + x, oy + y))
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        let (ox, oy) = self.origin;
        x >= ox
            && y >= oy
            && x - ox < self.mask.width()
            && y - oy < self.mask.height()
            && self.mask.get_pixel(x - ox, y - oy).0[0] != 0
    }
}

/// Fills `polygon` into a mask covering `crop`. `None` if fewer than three distinct vertices
/// survive rounding to pixels.
pub fn rasterize(polygon: &[Point<f64>], crop: Rect) -> Option<GrayImage> {
    let mut vertices: Vec<Point<i32>> = polygon
        .iter()
        .map(|p| {
            Point::new(
                p.x.round() as i32 - crop.x as i32,
                p.y.round() as i32 - crop.y as i32,
            )
        })
        .collect();
    vertices.dedup();
    while vertices.len() > 1 && vertices.first() == vertices.last() {
        vertices.pop();
    }
    if vertices.len() < 3 {
        return None;
    }
    let mut mask = GrayImage::new(crop.width, crop.height);
    draw_polygon_mut(&mut mask, &vertices, Luma([255u8]));
    Some(mask)
}

/// Longest outer outline of a mask, shifted to image coordinates.
fn main_outline(mask: &GrayImage, origin: (u32, u32)) -> Option<Vec<Point<i32>>> {
    let contours: Vec<Contour<i32>> = find_contours(mask);
    contours
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer)
        .max_by_key(|c| c.points.len())
        .map(|c| {
            c.points
                .into_iter()
                .map(|p| Point::new(p.x + origin.0 as i32, p.y + origin.1 as i32))
                .collect()
        })
}

/// Builds the band between the `outward` and `inward` offsets of a closed polygon.
///
/// The polygon is rasterised and offset with Euclidean dilation and erosion; the band is what the
/// outward offset covers and the inward one does not. Offsets are clipped to the `width` x
/// `height` image. Returns `None` for a polygon that does not rasterise to any area.
pub fn build_band(
    polygon: &[Point<f64>],
    (width, height): (u32, u32),
    outward: u8,
    inward: u8,
) -> Option<BandRegion> {
    let rect = bounding_box(polygon)?.to_pixel_rect();
    let crop = pad_within(rect, outward as u32 + 2, width, height);
    if crop.width == 0 || crop.height == 0 {
        return None;
    }
    let filled = rasterize(polygon, crop)?;

    let outward_mask = dilate(&filled, Norm::L2, outward);
    let inward_mask = erode(&filled, Norm::L2, inward);
    let origin = (crop.x, crop.y);

    let outer = main_outline(&outward_mask, origin)?;
    let inner = main_outline(&inward_mask, origin);

    let mut outward_area = 0;
    let mut inward_area = 0;
    let mask = GrayImage::from_fn(crop.width, crop.height, |x, y| {
        let out = outward_mask.get_pixel(x, y).0[0] != 0;
        let inn = inward_mask.get_pixel(x, y).0[0] != 0;
        outward_area += out as usize;
        inward_area += inn as usize;
        Luma([if out != inn { 255 } else { 0 }])
    });

    Some(BandRegion {
        outer,
        inner,
        origin,
        mask,
        outward_area,
        inward_area,
    })
}
