use crate::sources::error::SourceError;
use crate::sources::http::HttpFetcher;
use crate::types::reading::RawReading;
use chrono::NaiveDate;
use log::info;

/// Date format of the `start`/`end` query parameters.
pub const DATE_PARAM_FORMAT: &str = "%Y-%m-%d";

/// Fetches every sensor row the endpoint has between `start` and `end`.
///
/// Rows are returned as delivered, including non water temperature types; see
/// [`crate::validate_readings`]. An empty array is reported as
/// [`SourceError::EmptyResponse`].
pub async fn fetch_raw_readings(
    http: &HttpFetcher,
    url: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<RawReading>, SourceError> {
    info!("Fetching water temperatures from {} to {} at {}", start, end, url);
    let rows: Vec<RawReading> = http
        .get_json(
            url,
            &[
                ("start", start.format(DATE_PARAM_FORMAT).to_string()),
                ("end", end.format(DATE_PARAM_FORMAT).to_string()),
            ],
        )
        .await?;

    if rows.is_empty() {
        return Err(SourceError::EmptyResponse(url.to_string()));
    }
    info!("Received {} sensor rows", rows.len());
    Ok(rows)
}
