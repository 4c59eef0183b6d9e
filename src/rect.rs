use image::math::Rect;
use imageproc::point::Point;
use num_traits::{Num, ToPrimitive};

/// Running axis-aligned extent of a set of coordinates.
///
/// Generic over any numeric type with a partial order, so it serves pixel indices as well as
/// resampled floating-point outlines.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds<T> {
    pub min_x: T,
    pub min_y: T,
    pub max_x: T,
    pub max_y: T,
}

impl<T> Bounds<T>
where
    T: Copy + PartialOrd + Num + ToPrimitive,
{
    pub fn at(x: T, y: T) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
        }
    }

    // Manual comparisons: `T` only has `PartialOrd` so that floats are accepted.
    pub fn include(&mut self, x: T, y: T) {
        if x < self.min_x {
            self.min_x = x;
        }
        if x > self.max_x {
            self.max_x = x;
        }
        if y < self.min_y {
            self.min_y = y;
        }
        if y > self.max_y {
            self.max_y = y;
        }
    }

    /// Pixel rectangle covering the extent, inclusive of the max coordinates.
    ///
    /// Negative coordinates clamp to 0.
    pub fn to_pixel_rect(&self) -> Rect {
        let x = self.min_x.to_f64().unwrap_or(0.0).floor().max(0.0) as u32;
        let y = self.min_y.to_f64().unwrap_or(0.0).floor().max(0.0) as u32;
        let x_end = self.max_x.to_f64().unwrap_or(0.0).floor().max(0.0) as u32;
        let y_end = self.max_y.to_f64().unwrap_or(0.0).floor().max(0.0) as u32;
        Rect {
            x,
            y,
            width: x_end.saturating_sub(x) + 1,
            height: y_end.saturating_sub(y) + 1,
        }
    }
}

/// Calculates the axis-aligned extent of a point sequence.
///
/// # Arguments
///
/// * `points` - The vertices of an outline, in any order. `T` may be an integer or a float type.
///
/// # Returns
///
/// The smallest [`Bounds`] containing every point, or `None` when `points` is empty.
///
/// # Examples
///
/// ```
/// use imageproc::point::Point;
/// use nuclear_fret::rect::bounding_box;
///
/// let outline = [Point::new(4, 7), Point::new(12, 3), Point::new(9, 10)];
/// let bounds = bounding_box(&outline).unwrap();
/// assert_eq!((bounds.min_x, bounds.min_y, bounds.max_x, bounds.max_y), (4, 3, 12, 10));
///
/// let rect = bounds.to_pixel_rect();
/// assert_eq!((rect.x, rect.y, rect.width, rect.height), (4, 3, 9, 8));
///
/// let empty: [Point<i32>; 0] = [];
/// assert!(bounding_box(&empty).is_none());
/// ```
pub fn bounding_box<T>(points: &[Point<T>]) -> Option<Bounds<T>>
where
    T: Copy + PartialOrd + Num + ToPrimitive,
{
    let (first, rest) = points.split_first()?;
    let mut bounds = Bounds::at(first.x, first.y);
    for p in rest {
        bounds.include(p.x, p.y);
    }
    Some(bounds)
}

/// Grows `rect` by `margin` on every side without leaving a `width` x `height` image.
///
/// # Examples
///
/// ```
/// use image::math::Rect;
/// use nuclear_fret::rect::pad_within;
///
/// let rect = Rect { x: 1, y: 5, width: 4, height: 4 };
/// let padded = pad_within(rect, 2, 20, 10);
/// assert_eq!((padded.x, padded.y, padded.width, padded.height), (0, 3, 7, 7));
/// ```
pub fn pad_within(rect: Rect, margin: u32, width: u32, height: u32) -> Rect {
    let x = rect.x.saturating_sub(margin);
    let y = rect.y.saturating_sub(margin);
    let x_end = rect.x.saturating_add(rect.width).saturating_add(margin).min(width);
    let y_end = rect.y.saturating_add(rect.height).saturating_add(margin).min(height);
    Rect {
        x,
        y,
        width: x_end.saturating_sub(x),
        height: y_end.saturating_sub(y),
    }
}
