use image::RgbImage;
use imageproc::point::Point;

use crate::buffer::{Acquisition, ChannelSelection, FloatImage};
use crate::config::{AnalysisConfig, AnalysisMode, Calibration};
use crate::error::{FretError, Result};
use crate::extract::{ObjectRegion, extract_regions};
use crate::fret::compute_fret;
use crate::measure::{
    FretTable, RegionStats, WholeImageStats, composite, region_stats, sample_contours,
    whole_image_stats,
};
use crate::preprocess::{BackgroundLine, ChannelRole, preprocess_channel};
use crate::region_labelling::{LabelImage, post_process};
use crate::roi::RoiSet;
use crate::threshold::{ForegroundThreshold, apply_mask, auto_threshold, preview};
use crate::watershed::{MarkerSet, segment};

/// Everything the interactive collaborators have gathered before the analysis runs.
#[derive(Debug, Clone)]
pub struct AnalysisInput {
    pub acquisition: Acquisition,
    pub selection: ChannelSelection,
    /// Background line for ROI-based background subtraction.
    pub background_line: Option<BackgroundLine>,
    /// Foreground bounds chosen on the acceptor; the automatic threshold is used when absent.
    pub foreground: Option<ForegroundThreshold>,
    pub markers: Option<MarkerSet>,
    /// Points clicked during label review; every region under one is merged into background.
    pub merge_points: Vec<Point<f32>>,
}

impl AnalysisInput {
    pub fn new(acquisition: Acquisition, selection: ChannelSelection) -> Self {
        Self {
            acquisition,
            selection,
            background_line: None,
            foreground: None,
            markers: None,
            merge_points: Vec::new(),
        }
    }

    /// Subtracts the mean along `line` instead of constant levels, when the config asks for it.
    pub fn with_background_line(mut self, line: BackgroundLine) -> Self {
        self.background_line = Some(line);
        self
    }

    /// Acceptor bounds accepted in the threshold dialog.
    pub fn with_foreground(mut self, threshold: ForegroundThreshold) -> Self {
        self.foreground = Some(threshold);
        self
    }

    /// Interior and background markers for per-object analysis.
    pub fn with_markers(mut self, markers: MarkerSet) -> Self {
        self.markers = Some(markers);
        self
    }

    /// Review clicks on regions that should join the background.
    pub fn with_merge_points(mut self, points: Vec<Point<f32>>) -> Self {
        self.merge_points = points;
        self
    }
}

/// Products of a per-object analysis.
#[derive(Debug, Clone)]
pub struct ObjectAnalysis {
    /// Watershed labels before the merge and border clean-up.
    pub raw_labels: LabelImage,
    pub labels: LabelImage,
    /// Raw labels over black, shown for the merge review.
    pub review_render: RgbImage,
    /// Cleaned labels over the archive background colour.
    pub label_render: RgbImage,
    pub regions: Vec<ObjectRegion>,
    pub marker_rois: RoiSet,
    pub contour_rois: RoiSet,
    pub band_rois: RoiSet,
    /// Contour-point FRET table, invalid and zero rows removed.
    pub contour_table: FretTable,
    pub region_stats: Vec<RegionStats>,
    /// FRET index restricted to the union of all bands.
    pub composite: FloatImage,
}

#[derive(Debug, Clone)]
pub enum Outcome {
    WholeObject(WholeImageStats),
    PerObject(Box<ObjectAnalysis>),
}

#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub calibration: Calibration,
    /// Donor and acceptor after preprocessing, before masking.
    pub donor: FloatImage,
    pub acceptor: FloatImage,
    /// FRET index on a 0 to 100 scale, invalid where undefined.
    pub fret: FloatImage,
    pub outcome: Outcome,
}

/// Runs the FRET analysis with a fixed configuration.
///
/// ```text
/// preprocess -> FRET index -> whole-object statistics
///                          -> segment -> clean labels -> contours and bands -> measure -> composite
/// ```
///
/// Each stage consumes the previous one's output completely; any fatal error halts the run.
#[derive(Debug, Clone)]
pub struct FretAnalysis {
    config: AnalysisConfig,
}

impl FretAnalysis {
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn run(&self, input: AnalysisInput) -> Result<AnalysisReport> {
        let _span = tracing::info_span!("fret_analysis", mode = ?self.config.mode).entered();

        if self.config.mode == AnalysisMode::PerObject && input.markers.is_none() {
            return Err(FretError::MissingMarkers);
        }

        let (raw_donor, raw_acceptor) = input.acquisition.select(input.selection)?;
        let (donor, acceptor) = {
            let _stage = tracing::info_span!("preprocess").entered();
            let line = input.background_line.as_ref();
            let donor = preprocess_channel(&raw_donor, ChannelRole::Donor, &self.config, line)?;
            let acceptor =
                preprocess_channel(&raw_acceptor, ChannelRole::Acceptor, &self.config, line)?;
            (donor, acceptor)
        };

        let fret = {
            let _stage = tracing::info_span!("fret_index").entered();
            self.fret_index(&donor, &acceptor, input.foreground)?
        };

        let calibration = input.acquisition.calibration().clone();
        let outcome = match self.config.mode {
            AnalysisMode::WholeObject => {
                let _stage = tracing::info_span!("aggregate_whole").entered();
                let stats = whole_image_stats(&fret, &calibration);
                match stats.mean {
                    Some(mean) => tracing::info!(
                        "mean FRET index {:.5} (sd {:.5}) over {} pixel(s)",
                        mean,
                        stats.std_dev,
                        stats.valid_pixels
                    ),
                    None => tracing::warn!("no pixel carries a valid FRET index"),
                }
                Outcome::WholeObject(stats)
            }
            AnalysisMode::PerObject => {
                let markers = input.markers.as_ref().ok_or(FretError::MissingMarkers)?;
                let surface = input.acquisition.max_projection();
                let objects = self.analyse_objects(
                    &surface,
                    markers,
                    &input.merge_points,
                    &fret,
                    &calibration,
                )?;
                Outcome::PerObject(Box::new(objects))
            }
        };

        Ok(AnalysisReport {
            calibration,
            donor,
            acceptor,
            fret,
            outcome,
        })
    }

    /// FRET index of the preprocessed channels, masked by acceptor foreground if configured.
    fn fret_index(
        &self,
        donor: &FloatImage,
        acceptor: &FloatImage,
        foreground: Option<ForegroundThreshold>,
    ) -> Result<FloatImage> {
        if !self.config.use_mask {
            return compute_fret(donor, acceptor);
        }
        let threshold = foreground.unwrap_or_else(|| {
            tracing::info!("no foreground threshold supplied, using the automatic one");
            auto_threshold(acceptor)
        });
        tracing::info!(
            "acceptor foreground [{:.3}, {:.3}]",
            threshold.min,
            threshold.max
        );
        let mask = preview(acceptor, threshold);
        let mut donor = donor.clone();
        let mut acceptor = acceptor.clone();
        apply_mask(&mut donor, &mut acceptor, &mask);
        compute_fret(&donor, &acceptor)
    }

    fn analyse_objects(
        &self,
        surface: &FloatImage,
        markers: &MarkerSet,
        merge_points: &[Point<f32>],
        fret: &FloatImage,
        calibration: &Calibration,
    ) -> Result<ObjectAnalysis> {
        let segmentation = segment(surface, markers, &self.config)?;
        let cleaned = post_process(segmentation, markers, merge_points);
        let regions = extract_regions(&cleaned.labels, &self.config);

        let _stage = tracing::info_span!("aggregate_objects").entered();
        let mut contour_table = sample_contours(&regions, fret);
        let dropped = contour_table.retain_valid();
        tracing::info!(
            "{} contour measurement(s) kept, {} without FRET signal dropped",
            contour_table.len(),
            dropped
        );
        let region_stats = regions
            .iter()
            .map(|region| region_stats(region, fret, calibration))
            .collect();
        let composite = composite(fret, &regions);

        Ok(ObjectAnalysis {
            review_render: cleaned.raw.render(self.config.review_background),
            label_render: cleaned.labels.render(self.config.archive_background),
            raw_labels: cleaned.raw,
            labels: cleaned.labels,
            marker_rois: RoiSet::markers(markers, merge_points),
            contour_rois: RoiSet::contours(&regions),
            band_rois: RoiSet::bands(&regions),
            regions,
            contour_table,
            region_stats,
            composite,
        })
    }
}
