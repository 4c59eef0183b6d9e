use std::num::NonZeroU32;

use image::GrayImage;
use imageproc::{
    contours::{BorderType, Contour, find_contours},
    geometry::{convex_hull, min_area_rect},
    point::Point,
};
use num::{Num, NumCast};
use num_traits::AsPrimitive;

use crate::rect::pad_within;
use crate::region_labelling::LabelImage;

/// Outer boundary of one connected piece of a labelled object, in image coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Outline {
    pub label: NonZeroU32,
    pub points: Vec<Point<i32>>,
}

/// Traces the outer boundary of every connected piece of every object.
///
/// Objects are visited in label order and each object's pieces in raster order of their first
/// pixel. Holes are not traced: only the outer outline delimits a nucleus.
pub fn trace_objects(labels: &LabelImage) -> Vec<Outline> {
    let (width, height) = labels.dimensions();
    let raw = labels.as_buffer();
    let mut outlines = Vec::new();

    for (label, rect) in labels.object_bounds() {
        // A one pixel margin keeps every piece closed inside the crop.
        let crop = pad_within(rect, 1, width, height);
        let mask = GrayImage::from_fn(crop.width, crop.height, |x, y| {
            let value = raw.get_pixel(crop.x + x, crop.y + y).0[0];
            image::Luma([if value == label.get() { 255 } else { 0 }])
        });
        let contours: Vec<Contour<i32>> = find_contours(&mask);
        outlines.extend(
            contours
                .into_iter()
                .filter(|c| c.border_type == BorderType::Outer)
                .map(|c| Outline {
                    label,
                    points: c
                        .points
                        .into_iter()
                        .map(|p| Point::new(p.x + crop.x as i32, p.y + crop.y as i32))
                        .collect(),
                }),
        );
    }
    outlines
}

/// Calculates the length of the closed polygon through `points`.
///
/// # Arguments
///
/// * `points` - The polygon's vertices in order. The last vertex is joined back to the first.
///
/// # Returns
///
/// The sum of Euclidean distances between consecutive points. Polygons with 0 or 1 point have a
/// perimeter of `0.0`.
///
/// # Examples
///
/// ```
/// use imageproc::point::Point;
/// use nuclear_fret::contours::{perimeter, polygon_area};
///
/// let square = [Point::new(0, 0), Point::new(10, 0), Point::new(10, 10), Point::new(0, 10)];
/// assert_eq!(perimeter(&square), 40.0);
/// assert_eq!(polygon_area(&square), 100.0);
/// ```
pub fn perimeter<T>(points: &[Point<T>]) -> f64
where
    T: Copy + AsPrimitive<f64>,
{
    points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(p1, p2)| {
            let dx: f64 = p2.x.as_() - p1.x.as_();
            let dy: f64 = p2.y.as_() - p1.y.as_();
            dx.hypot(dy)
        })
        .sum()
}

/// Unsigned area enclosed by the closed polygon through `points` (shoelace formula).
pub fn polygon_area<T>(points: &[Point<T>]) -> f64
where
    T: Copy + AsPrimitive<f64>,
{
    let twice: f64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(p1, p2)| {
            let (x1, y1): (f64, f64) = (p1.x.as_(), p1.y.as_());
            let (x2, y2): (f64, f64) = (p2.x.as_(), p2.y.as_());
            x1 * y2 - x2 * y1
        })
        .sum();
    twice.abs() / 2.0
}

/// Resamples a closed polygon at `spacing` arc-length steps, starting at its first vertex.
///
/// # Arguments
///
/// * `points` - The polygon's vertices in order.
/// * `spacing` - Target distance between output points. The step is adjusted so the perimeter
///   divides evenly.
///
/// # Returns
///
/// The resampled points. Consecutive duplicates are removed, including a last point equal to
/// the first.
///
/// # Examples
///
/// ```
/// use imageproc::point::Point;
/// use nuclear_fret::contours::resample;
///
/// let square = [Point::new(0, 0), Point::new(2, 0), Point::new(2, 2), Point::new(0, 2)];
/// let points = resample(&square, 1.0);
/// assert_eq!(points.len(), 8);
/// assert_eq!(points[1], Point::new(1.0, 0.0));
/// ```
pub fn resample<T>(points: &[Point<T>], spacing: f64) -> Vec<Point<f64>>
where
    T: Copy + AsPrimitive<f64>,
{
    let vertices: Vec<Point<f64>> = points
        .iter()
        .map(|p| Point::new(p.x.as_(), p.y.as_()))
        .collect();
    let total = perimeter(&vertices);
    if vertices.len() < 2 || total <= 0.0 || spacing <= 0.0 {
        return dedup_closed(vertices);
    }

    let steps = (total / spacing).round().max(1.0) as usize;
    let step = total / steps as f64;
    let mut resampled = Vec::with_capacity(steps);
    let mut segment = 0usize;
    let mut travelled = 0.0;
    for i in 0..steps {
        let target = i as f64 * step;
        loop {
            let a = vertices[segment];
            let b = vertices[(segment + 1) % vertices.len()];
            let length = (b.x - a.x).hypot(b.y - a.y);
            if target <= travelled + length || segment + 1 == vertices.len() {
                let t = if length > 0.0 {
                    ((target - travelled) / length).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                resampled.push(Point::new(a.x + t * (b.x - a.x), a.y + t * (b.y - a.y)));
                break;
            }
            travelled += length;
            segment += 1;
        }
    }
    dedup_closed(resampled)
}

fn dedup_closed<T: PartialEq>(mut points: Vec<Point<T>>) -> Vec<Point<T>> {
    points.dedup();
    while points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    points
}

/// Shape of a closed outline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeDescriptors {
    /// `4π·area / perimeter²`, at most 1.
    pub circularity: f64,
    /// Long over short side of the minimum-area bounding rectangle.
    pub aspect_ratio: f64,
    /// `4·area / (π·long side²)`.
    pub roundness: f64,
    /// Area over convex hull area.
    pub solidity: f64,
}

/// Shape descriptors of the polygon through `points`, `None` when it encloses no area.
pub fn shape_descriptors<T>(points: &[Point<T>]) -> Option<ShapeDescriptors>
where
    T: Num + NumCast + Copy + Ord + AsPrimitive<f64>,
{
    let distance_squared = |p1: Point<T>, p2: Point<T>| -> f64 {
        let dx: f64 = p1.x.as_() - p2.x.as_();
        let dy: f64 = p1.y.as_() - p2.y.as_();
        dx * dx + dy * dy
    };

    if points.len() < 3 {
        return None;
    }
    let area = polygon_area(points);
    let length = perimeter(points);
    if area < 1e-6 || length < 1e-6 {
        return None;
    }

    let rect_points = min_area_rect(points);
    let side1_squared = distance_squared(rect_points[0], rect_points[1]);
    let side2_squared = distance_squared(rect_points[1], rect_points[2]);
    if side1_squared < 1e-6 || side2_squared < 1e-6 {
        return None;
    }
    let (long_squared, short_squared) = if side1_squared > side2_squared {
        (side1_squared, side2_squared)
    } else {
        (side2_squared, side1_squared)
    };

    let hull = convex_hull(points);
    let hull_area = polygon_area(&hull);

    Some(ShapeDescriptors {
        circularity: (4.0 * std::f64::consts::PI * area / (length * length)).min(1.0),
        aspect_ratio: (long_squared / short_squared).sqrt(),
        roundness: 4.0 * area / (std::f64::consts::PI * long_squared),
        solidity: if hull_area > 0.0 {
            (area / hull_area).min(1.0)
        } else {
            1.0
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watershed::LabelBuffer;
    use image::Luma;

    fn assert_float_eq(a: f64, b: f64) {
        assert!(
            (a - b).abs() < 1e-9,
            "Assertion failed: expected {}, got {}",
            b,
            a
        );
    }

    fn square(side: i32) -> Vec<Point<i32>> {
        vec![
            Point::new(0, 0),
            Point::new(side, 0),
            Point::new(side, side),
            Point::new(0, side),
        ]
    }

    #[test]
    fn test_perimeter_and_area() {
        assert_float_eq(perimeter(&square(10)), 40.0);
        assert_float_eq(polygon_area(&square(10)), 100.0);

        // Line: 10 forward + 10 back, no area.
        let line = [Point::new(0, 0), Point::new(10, 0)];
        assert_float_eq(perimeter(&line), 20.0);
        assert_float_eq(polygon_area(&line), 0.0);

        let triangle = [Point::new(0, 0), Point::new(3, 0), Point::new(0, 4)];
        assert_float_eq(perimeter(&triangle), 12.0);
        assert_float_eq(polygon_area(&triangle), 6.0);

        let single: [Point<i32>; 1] = [Point::new(100, 100)];
        assert_float_eq(perimeter(&single), 0.0);
        let empty: [Point<i32>; 0] = [];
        assert_float_eq(perimeter(&empty), 0.0);
    }

    #[test]
    fn test_resample_at_unit_spacing() {
        let points = resample(&square(10), 1.0);
        assert_eq!(points.len(), 40);
        assert_eq!(points[0], Point::new(0.0, 0.0));
        assert_eq!(points[10], Point::new(10.0, 0.0));
        for (a, b) in points.iter().zip(points.iter().cycle().skip(1)) {
            assert!(((b.x - a.x).hypot(b.y - a.y) - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_resample_removes_duplicates() {
        let repeated = [
            Point::new(0, 0),
            Point::new(0, 0),
            Point::new(4, 0),
            Point::new(4, 0),
            Point::new(0, 0),
        ];
        let points = resample(&repeated, 1.0);
        assert_eq!(points.len(), 8);
        for (a, b) in points.iter().zip(points.iter().cycle().skip(1)) {
            assert_ne!(a, b);
        }

        let single = resample(&[Point::new(3, 3)], 1.0);
        assert_eq!(single, vec![Point::new(3.0, 3.0)]);
    }

    #[test]
    fn test_shape_descriptors_of_square() {
        let shape = shape_descriptors(&square(10)).unwrap();
        assert_float_eq(shape.circularity, std::f64::consts::PI / 4.0);
        assert_float_eq(shape.aspect_ratio, 1.0);
        assert_float_eq(shape.roundness, 4.0 / std::f64::consts::PI);
        assert_float_eq(shape.solidity, 1.0);

        let rectangle = [
            Point::new(0, 0),
            Point::new(20, 0),
            Point::new(20, 5),
            Point::new(0, 5),
        ];
        let shape = shape_descriptors(&rectangle).unwrap();
        assert_float_eq(shape.aspect_ratio, 4.0);

        assert!(shape_descriptors(&[Point::new(0, 0), Point::new(1, 1)]).is_none());
    }

    #[test]
    fn test_concave_outline_has_lower_solidity() {
        let l_shape = [
            Point::new(0, 0),
            Point::new(10, 0),
            Point::new(10, 4),
            Point::new(4, 4),
            Point::new(4, 10),
            Point::new(0, 10),
        ];
        let shape = shape_descriptors(&l_shape).unwrap();
        assert!(shape.solidity < 0.9, "{shape:?}");
    }

    #[test]
    fn test_trace_objects_finds_each_piece() {
        // Label 1 has two disjoint pieces, label 2 one square with a hole.
        let raw = LabelBuffer::from_fn(20, 12, |x, y| {
            let v = if (1..4).contains(&x) && (1..4).contains(&y) {
                1
            } else if (6..9).contains(&x) && (6..9).contains(&y) {
                1
            } else if (11..18).contains(&x) && (2..9).contains(&y) && !(x == 14 && y == 5) {
                2
            } else {
                0
            };
            Luma([v])
        });
        let outlines = trace_objects(&LabelImage::new(raw));
        assert_eq!(outlines.len(), 3);
        assert_eq!(outlines.iter().filter(|o| o.label.get() == 1).count(), 2);
        let two = outlines.iter().find(|o| o.label.get() == 2).unwrap();
        assert!(two.points.contains(&Point::new(11, 2)));
        assert!(two.points.contains(&Point::new(17, 8)));
        assert!(!two.points.contains(&Point::new(14, 4)));
    }
}
