use std::num::NonZeroU32;

use imageproc::point::Point;

use crate::band::{BandRegion, build_band};
use crate::config::AnalysisConfig;
use crate::contours::{Outline, resample, trace_objects};
use crate::region_labelling::LabelImage;

/// An accepted object: its traced outline, resampled contour and measurement band.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectRegion {
    /// 1-based index of the outline among all traced outlines, rejected ones included.
    pub id: u32,
    pub label: NonZeroU32,
    pub name: String,
    pub outline: Vec<Point<i32>>,
    /// Outline resampled at unit spacing.
    pub contour: Vec<Point<f64>>,
    pub band: BandRegion,
}

pub fn region_name(id: u32, label: NonZeroU32) -> String {
    format!("nucleus-{id:03}-label-{label}")
}

fn accept(
    id: u32,
    outline: Outline,
    dimensions: (u32, u32),
    config: &AnalysisConfig,
) -> Option<ObjectRegion> {
    let contour = resample(&outline.points, 1.0);
    if contour.len() < config.min_contour_points {
        tracing::debug!(
            "dropping outline {} of label {}: {} contour points",
            id,
            outline.label,
            contour.len()
        );
        return None;
    }
    let Some(band) = build_band(&contour, dimensions, config.band_outward, config.band_inward)
    else {
        tracing::debug!("dropping outline {} of label {}: empty band", id, outline.label);
        return None;
    };
    Some(ObjectRegion {
        id,
        label: outline.label,
        name: region_name(id, outline.label),
        outline: outline.points,
        contour,
        band,
    })
}

/// Traces every object of a cleaned label image and keeps the outlines long enough to measure.
///
/// Outlines are independent of each other; a rejected one is logged and skipped.
pub fn extract_regions(labels: &LabelImage, config: &AnalysisConfig) -> Vec<ObjectRegion> {
    let _span = tracing::info_span!("extract_contours").entered();
    let dimensions = labels.dimensions();
    let outlines = trace_objects(labels);
    let traced = outlines.len();
    let regions: Vec<ObjectRegion> = outlines
        .into_iter()
        .zip(1u32..)
        .filter_map(|(outline, id)| accept(id, outline, dimensions, config))
        .collect();
    tracing::info!("{} of {} traced outline(s) accepted", regions.len(), traced);
    regions
}
