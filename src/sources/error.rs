use crate::error::ErrorKind;
use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Network request failed for {0}")]
    NetworkRequest(String, #[source] reqwest::Error),

    #[error("HTTP request failed for {url} with status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to read response body from {0}")]
    ResponseBody(String, #[source] reqwest::Error),

    #[error("Failed to parse JSON response from {url}")]
    JsonParse {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Empty response from {0}")]
    EmptyResponse(String),

    #[error("No hourly data returned for {lat},{lon}; the variables or date range may be invalid")]
    MissingHourlyData { lat: f64, lon: f64 },

    #[error("Hourly variable '{0}' missing from weather response")]
    MissingVariable(String),

    #[error("Hourly variable '{variable}' has {found} values but there are {expected} timestamps")]
    LengthMismatch {
        variable: String,
        expected: usize,
        found: usize,
    },

    #[error("Invalid hourly timestamp '{value}'")]
    HourParse {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("No location found for '{0}'")]
    NoGeocodeMatch(String),

    #[error("Invalid coordinate '{value}' returned for '{query}'")]
    CoordinateParse {
        query: String,
        value: String,
        #[source]
        source: std::num::ParseFloatError,
    },

    #[error("Failed to create cache directory '{0}'")]
    CacheDirCreation(PathBuf, #[source] std::io::Error),

    #[error("Failed to read metadata for cache file '{0}'")]
    CacheMetadataRead(PathBuf, #[source] std::io::Error),

    #[error("I/O error writing parquet cache file '{0}'")]
    ParquetWriteIo(PathBuf, #[source] std::io::Error),

    #[error("Encoding error writing parquet cache file '{0}'")]
    ParquetWritePolars(PathBuf, #[source] PolarsError),

    #[error("Failed to scan parquet cache file '{0}'")]
    ParquetScan(PathBuf, #[source] PolarsError),

    #[error("Failed building DataFrame from response: {0}")]
    DataFrame(#[from] PolarsError),

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl SourceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SourceError::NetworkRequest(..)
            | SourceError::HttpStatus { .. }
            | SourceError::ResponseBody(..)
            | SourceError::JsonParse { .. }
            | SourceError::EmptyResponse(_)
            | SourceError::MissingHourlyData { .. }
            | SourceError::MissingVariable(_)
            | SourceError::LengthMismatch { .. }
            | SourceError::NoGeocodeMatch(_) => ErrorKind::DataUnavailable,
            SourceError::HourParse { .. } | SourceError::CoordinateParse { .. } => {
                ErrorKind::Parse
            }
            SourceError::CacheDirCreation(..)
            | SourceError::CacheMetadataRead(..)
            | SourceError::ParquetWriteIo(..) => ErrorKind::Io,
            SourceError::ParquetWritePolars(..)
            | SourceError::ParquetScan(..)
            | SourceError::DataFrame(_)
            | SourceError::TaskJoin(_) => ErrorKind::Processing,
        }
    }
}
