use imageproc::point::Point;

use crate::extract::ObjectRegion;
use crate::watershed::MarkerSet;

/// One named ROI. A point selection or polygon has a single ring; a band has its outer ring
/// followed by its inner ring.
#[derive(Debug, Clone, PartialEq)]
pub struct Roi {
    pub name: String,
    pub rings: Vec<Vec<Point<f64>>>,
}

impl Roi {
    fn from_points<T>(name: impl Into<String>, points: &[Point<T>]) -> Self
    where
        T: Copy + Into<f64>,
    {
        Self {
            name: name.into(),
            rings: vec![to_f64(points)],
        }
    }
}

fn to_f64<T: Copy + Into<f64>>(points: &[Point<T>]) -> Vec<Point<f64>> {
    points
        .iter()
        .map(|p| Point::new(p.x.into(), p.y.into()))
        .collect()
}

/// An ordered, named collection of ROIs.
#[derive(Debug, Clone, PartialEq)]
pub struct RoiSet {
    pub name: String,
    pub rois: Vec<Roi>,
}

impl RoiSet {
    /// Interior markers, the background marker and the merge-review points.
    pub fn markers(markers: &MarkerSet, merge_points: &[Point<f32>]) -> Self {
        let mut rois = vec![
            Roi::from_points("interior", markers.interior()),
            Roi::from_points("background", &[markers.background()]),
        ];
        if !merge_points.is_empty() {
            rois.push(Roi::from_points("merge", merge_points));
        }
        Self {
            name: "markers".to_string(),
            rois,
        }
    }

    /// Resampled outline of every accepted object.
    pub fn contours(regions: &[ObjectRegion]) -> Self {
        Self {
            name: "nuclei-contour".to_string(),
            rois: regions
                .iter()
                .map(|r| Roi {
                    name: r.name.clone(),
                    rings: vec![r.contour.clone()],
                })
                .collect(),
        }
    }

    /// Band of every accepted object.
    pub fn bands(regions: &[ObjectRegion]) -> Self {
        Self {
            name: "nuclear-band".to_string(),
            rois: regions
                .iter()
                .map(|r| {
                    let mut rings = vec![to_f64(&r.band.outer)];
                    if let Some(inner) = &r.band.inner {
                        rings.push(to_f64(inner));
                    }
                    Roi {
                        name: r.name.clone(),
                        rings,
                    }
                })
                .collect(),
        }
    }
}
