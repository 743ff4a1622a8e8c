use crate::sources::error::SourceError;
use chrono::NaiveDate;
use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of a [`WaterTempError`].
///
/// Callers that only care about *what kind* of failure happened (for example to decide
/// whether re-running later could help) can match on this instead of every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The upstream source failed, returned malformed data, or returned nothing usable.
    DataUnavailable,
    /// A timestamp or the shape of the data did not match what was expected.
    Parse,
    /// The destination (or cache) could not be written.
    Io,
    /// An internal dataframe or runtime failure.
    Processing,
}

#[derive(Debug, Error)]
pub enum WaterTempError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("No water temperature readings available for {start} to {end}")]
    NoReadings { start: NaiveDate, end: NaiveDate },

    #[error("Invalid timestamp '{value}' for station '{station}', expected format '{format}'")]
    TimestampParse {
        station: String,
        value: String,
        format: &'static str,
        #[source]
        source: chrono::ParseError,
    },

    #[error("Required column '{0}' not found in DataFrame")]
    MissingColumn(String, #[source] PolarsError),

    #[error("Failed to write '{0}'")]
    Write(PathBuf, #[source] std::io::Error),

    #[error("Failed to determine cache directory")]
    CacheDirResolution(#[source] std::io::Error),

    #[error("Failed to create cache directory '{0}'")]
    CacheDirCreation(PathBuf, #[source] std::io::Error),

    #[error("Failed processing DataFrame: {0}")]
    Polars(#[from] PolarsError),

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl WaterTempError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WaterTempError::Source(source) => source.kind(),
            WaterTempError::NoReadings { .. } => ErrorKind::DataUnavailable,
            WaterTempError::TimestampParse { .. } | WaterTempError::MissingColumn(..) => {
                ErrorKind::Parse
            }
            WaterTempError::Write(..)
            | WaterTempError::CacheDirResolution(_)
            | WaterTempError::CacheDirCreation(..) => ErrorKind::Io,
            WaterTempError::Polars(_) | WaterTempError::TaskJoin(_) => ErrorKind::Processing,
        }
    }
}
