/// Fatal failures that halt the analysis.
///
/// Recoverable conditions (degenerate contours, invalid table rows, zero denominators at single
/// pixels) never surface here; they are logged and skipped where they occur.
#[derive(Debug, thiserror::Error)]
pub enum FretError {
    /// The acquisition is not a single optical section with at least two channels.
    #[error(
        "analysis requires a multichannel image with one slice and one frame \
         (got {channels} channel(s), {slices} slice(s), {frames} frame(s))"
    )]
    UnsupportedGeometry {
        channels: usize,
        slices: usize,
        frames: usize,
    },

    /// A donor or acceptor channel index does not exist in the acquisition.
    #[error("channel {index} is out of range (acquisition has {available} channel(s))")]
    ChannelOutOfRange { index: usize, available: usize },

    /// Two buffers that must share a grid do not.
    #[error("dimension mismatch: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    /// Segmentation was requested without any object marker.
    #[error("at least one interior marker is required for segmentation")]
    NoInteriorMarkers,

    /// Segmentation needs exactly one background marker.
    #[error("exactly one background marker is required for segmentation (got {0})")]
    BackgroundMarkerCount(usize),

    /// Donor + acceptor is not positive anywhere, so no FRET index can be computed.
    #[error("donor + acceptor is zero or invalid at every pixel")]
    DegenerateDenominator,

    /// Background subtraction from a ROI was configured but no ROI was supplied.
    #[error("background subtraction from a ROI requires a background line")]
    MissingBackgroundRoi,

    /// Per-object analysis without a marker set.
    #[error("per-object analysis requires a marker set")]
    MissingMarkers,

    /// A sampling ROI did not cover any valid pixel.
    #[error("ROI `{0}` does not cover any valid pixel")]
    EmptyRoi(String),

    /// Configuration values that cannot be used.
    #[error("invalid analysis configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, FretError>;
