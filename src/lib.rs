//! Ratiometric FRET analysis of two-channel fluorescence images, built on [imageproc].
//!
//! The FRET index `100 * A / (D + A)` is computed per pixel from preprocessed donor and acceptor
//! channels. It is then either summarised over the whole image or, after a marker-controlled
//! watershed segmentation of the nuclei, sampled along each nucleus periphery and aggregated over
//! a thin band straddling it. [`FretAnalysis`] drives the stages in order; each stage is also
//! usable on its own.

pub mod band;
pub mod buffer;
mod colors;
pub mod config;
pub mod contours;
pub mod error;
pub mod extract;
pub mod fret;
pub mod measure;
pub mod pipeline;
pub mod preprocess;
pub mod rect;
pub mod region_labelling;
pub mod roi;
pub mod threshold;
pub mod watershed;

pub use buffer::{Acquisition, ChannelSelection, FloatImage, StackGeometry};
pub use config::{AnalysisConfig, AnalysisMode, BackgroundMode, Calibration};
pub use error::{FretError, Result};
pub use pipeline::{AnalysisInput, AnalysisReport, FretAnalysis, ObjectAnalysis, Outcome};
pub use region_labelling::{LabelImage, Region};
pub use watershed::MarkerSet;
