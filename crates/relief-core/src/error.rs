//! Error taxonomy shared by ingestion, analysis and rendering.
//!
//! Missing data inside a grid is never an error: derivative and contour
//! algorithms propagate it into their output. Only malformed input, failed
//! reprojection and violated preconditions surface here.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TerrainError>;

/// Ingestion reports through the same taxonomy as analysis.
pub type IngestError = TerrainError;

#[derive(Debug, Error)]
pub enum TerrainError {
    /// The raster container or its header could not be understood.
    #[error("malformed raster header: {0}")]
    Parse(String),

    /// The header parsed but the elevation band could not be decoded.
    #[error("cannot decode elevation band: {0}")]
    Read(String),

    /// Every reprojection fallback failed.
    #[error("cannot reproject extent from {source_crs} to {target_crs}: {reason}")]
    Projection {
        source_crs: String,
        target_crs: String,
        reason: String,
    },

    /// Input violates a precondition of the requested computation.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// A background analysis ended without delivering its result.
    #[error("analysis worker failed: {0}")]
    Worker(String),
}

impl TerrainError {
    pub(crate) fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }
}

impl From<tiff::TiffError> for TerrainError {
    fn from(err: tiff::TiffError) -> Self {
        match err {
            tiff::TiffError::FormatError(e) => Self::Parse(e.to_string()),
            tiff::TiffError::IoError(e) => Self::Parse(e.to_string()),
            other => Self::Read(other.to_string()),
        }
    }
}
