use crate::config::ClientConfig;
use crate::sources::cache::FrameCache;
use crate::sources::error::SourceError;
use crate::sources::http::HttpFetcher;
use crate::types::weather::{LatLon, WeatherVariable, COL_WEATHER_HOUR};
use chrono::{NaiveDate, NaiveDateTime};
use log::{info, warn};
use polars::prelude::*;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Format of the local-time hour labels in `hourly.time`.
pub const HOUR_FORMAT: &str = "%Y-%m-%dT%H:%M";

const COL_ROW_NR: &str = "row_nr";

#[derive(Debug, Deserialize)]
pub struct OpenMeteoResponse {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub hourly: Option<HourlyBlock>,
}

#[derive(Debug, Deserialize)]
pub struct HourlyBlock {
    pub time: Vec<String>,
    /// One array per requested variable, keyed by its API name.
    #[serde(flatten)]
    pub variables: HashMap<String, Vec<Option<f64>>>,
}

/// Turns an Open-Meteo response into an hourly weather frame: a millisecond `date`
/// column followed by one `f64` column per [`WeatherVariable`].
///
/// Hours with any missing variable are dropped. A repeated hour label (the autumn DST
/// switch) keeps its first row so every hour maps to at most one row.
pub fn hourly_frame(response: OpenMeteoResponse) -> Result<DataFrame, SourceError> {
    let mut hourly = response.hourly.ok_or(SourceError::MissingHourlyData {
        lat: response.latitude,
        lon: response.longitude,
    })?;

    let hours = hourly
        .time
        .iter()
        .map(|value| {
            NaiveDateTime::parse_from_str(value, HOUR_FORMAT).map_err(|source| {
                SourceError::HourParse {
                    value: value.clone(),
                    source,
                }
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut columns = Vec::with_capacity(WeatherVariable::ALL.len() + 1);
    columns.push(Column::from(
        DatetimeChunked::from_naive_datetime(
            COL_WEATHER_HOUR.into(),
            hours.iter().copied(),
            TimeUnit::Milliseconds,
        )
        .into_series(),
    ));
    for variable in WeatherVariable::ALL {
        let values = hourly
            .variables
            .remove(variable.api_name())
            .ok_or_else(|| SourceError::MissingVariable(variable.api_name().to_string()))?;
        if values.len() != hours.len() {
            return Err(SourceError::LengthMismatch {
                variable: variable.api_name().to_string(),
                expected: hours.len(),
                found: values.len(),
            });
        }
        columns.push(Column::new(variable.api_name().into(), values));
    }

    let complete = WeatherVariable::ALL
        .iter()
        .map(|v| col(v.api_name()).is_not_null())
        .reduce(|acc, e| acc.and(e))
        .unwrap_or_else(|| lit(true));
    let mut output_columns = vec![col(COL_WEATHER_HOUR)];
    output_columns.extend(WeatherVariable::ALL.iter().map(|v| col(v.api_name())));

    let df = DataFrame::new(columns)?
        .lazy()
        .filter(complete)
        .with_row_index(COL_ROW_NR, None)
        .filter(col(COL_ROW_NR).eq(col(COL_ROW_NR).min().over([col(COL_WEATHER_HOUR)])))
        .select(output_columns)
        .collect()?;

    if df.height() < hours.len() {
        warn!(
            "Dropped {} of {} weather hours with gaps or repeated labels",
            hours.len() - df.height(),
            hours.len()
        );
    }
    Ok(df)
}

/// Fetches hourly archive and forecast weather from Open-Meteo, caching each
/// response as parquet.
#[derive(Debug, Clone)]
pub struct WeatherLoader {
    http: HttpFetcher,
    cache: FrameCache,
    archive_url: String,
    forecast_url: String,
    timezone: String,
    archive_max_age: Option<Duration>,
    forecast_max_age: Duration,
}

impl WeatherLoader {
    pub fn new(http: HttpFetcher, cache_dir: &Path, config: &ClientConfig) -> WeatherLoader {
        WeatherLoader {
            http,
            cache: FrameCache::new(cache_dir),
            archive_url: config.archive_url.clone(),
            forecast_url: config.forecast_url.clone(),
            timezone: config.timezone.clone(),
            archive_max_age: config.archive_max_age,
            forecast_max_age: config.forecast_max_age,
        }
    }

    /// Historical hourly weather for `location` over `start..=end`.
    pub async fn archive(
        &self,
        location: LatLon,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<LazyFrame, SourceError> {
        let key = format!("archive-{}-{}-{}-{}", location, start, end, self.timezone);
        if let Some(frame) = self.cache.get(&key, self.archive_max_age).await? {
            return Ok(frame);
        }

        info!("Fetching archive weather for {} from {} to {}", location, start, end);
        let mut query = self.base_query(location);
        query.push(("start_date", start.to_string()));
        query.push(("end_date", end.to_string()));
        let response: OpenMeteoResponse = self.http.get_json(&self.archive_url, &query).await?;
        let df = hourly_frame(response)?;

        self.cache.put(&key, df.clone()).await?;
        Ok(df.lazy())
    }

    /// Hourly forecast for `location` as currently published.
    pub async fn forecast(&self, location: LatLon) -> Result<LazyFrame, SourceError> {
        let key = format!("forecast-{}-{}", location, self.timezone);
        if let Some(frame) = self.cache.get(&key, Some(self.forecast_max_age)).await? {
            return Ok(frame);
        }

        info!("Fetching weather forecast for {}", location);
        let query = self.base_query(location);
        let response: OpenMeteoResponse = self.http.get_json(&self.forecast_url, &query).await?;
        let df = hourly_frame(response)?;

        self.cache.put(&key, df.clone()).await?;
        Ok(df.lazy())
    }

    fn base_query(&self, location: LatLon) -> Vec<(&'static str, String)> {
        vec![
            ("latitude", location.0.to_string()),
            ("longitude", location.1.to_string()),
            ("hourly", WeatherVariable::hourly_param()),
            ("timezone", self.timezone.clone()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::test_server::{serve, Canned};

    const RESPONSE: &str = r#"{
        "latitude": 59.2, "longitude": 17.62, "timezone": "Europe/Stockholm",
        "hourly_units": {"time": "iso8601", "temperature_2m": "°C"},
        "hourly": {
            "time": ["2025-06-10T11:00", "2025-06-10T12:00", "2025-06-10T13:00"],
            "temperature_2m": [18.2, 19.0, null],
            "precipitation": [0.0, 0.1, 0.0],
            "wind_speed_10m": [10.4, 11.2, 9.8],
            "wind_direction_10m": [180, 190, 200]
        }
    }"#;

    fn parse(body: &str) -> OpenMeteoResponse {
        serde_json::from_str(body).expect("valid response json")
    }

    #[test]
    fn test_hourly_frame_drops_incomplete_hours() -> Result<(), Box<dyn std::error::Error>> {
        let df = hourly_frame(parse(RESPONSE))?;
        assert_eq!(
            df.get_column_names()
                .iter()
                .map(|name| name.as_str())
                .collect::<Vec<_>>(),
            vec![
                "date",
                "temperature_2m",
                "precipitation",
                "wind_speed_10m",
                "wind_direction_10m"
            ]
        );
        assert_eq!(df.height(), 2);
        let temps: Vec<Option<f64>> = df.column("temperature_2m")?.f64()?.into_iter().collect();
        assert_eq!(temps, vec![Some(18.2), Some(19.0)]);
        Ok(())
    }

    #[test]
    fn test_hourly_frame_keeps_first_repeated_hour() -> Result<(), Box<dyn std::error::Error>> {
        let body = r#"{
            "latitude": 59.2, "longitude": 17.62,
            "hourly": {
                "time": ["2025-10-26T02:00", "2025-10-26T02:00", "2025-10-26T03:00"],
                "temperature_2m": [5.0, 4.0, 3.0],
                "precipitation": [0.0, 0.0, 0.0],
                "wind_speed_10m": [1.0, 1.0, 1.0],
                "wind_direction_10m": [90.0, 90.0, 90.0]
            }
        }"#;
        let df = hourly_frame(parse(body))?;
        assert_eq!(df.height(), 2);
        let temps: Vec<Option<f64>> = df.column("temperature_2m")?.f64()?.into_iter().collect();
        assert_eq!(temps, vec![Some(5.0), Some(3.0)]);
        Ok(())
    }

    #[test]
    fn test_missing_hourly_block() {
        let err = hourly_frame(parse(r#"{"latitude": 1.0, "longitude": 2.0}"#)).unwrap_err();
        assert!(matches!(err, SourceError::MissingHourlyData { .. }));
    }

    #[test]
    fn test_missing_variable() {
        let body = r#"{"latitude": 1.0, "longitude": 2.0,
            "hourly": {"time": ["2025-06-10T11:00"], "temperature_2m": [1.0]}}"#;
        let err = hourly_frame(parse(body)).unwrap_err();
        assert!(matches!(err, SourceError::MissingVariable(ref v) if v == "precipitation"));
    }

    #[test]
    fn test_length_mismatch() {
        let body = r#"{"latitude": 1.0, "longitude": 2.0,
            "hourly": {"time": ["2025-06-10T11:00", "2025-06-10T12:00"],
                       "temperature_2m": [1.0], "precipitation": [0.0, 0.0],
                       "wind_speed_10m": [1.0, 1.0], "wind_direction_10m": [1.0, 1.0]}}"#;
        let err = hourly_frame(parse(body)).unwrap_err();
        assert!(matches!(
            err,
            SourceError::LengthMismatch { expected: 2, found: 1, .. }
        ));
    }

    #[test]
    fn test_bad_hour_label() {
        let body = r#"{"latitude": 1.0, "longitude": 2.0,
            "hourly": {"time": ["10 June 2025"], "temperature_2m": [1.0], "precipitation": [0.0],
                       "wind_speed_10m": [1.0], "wind_direction_10m": [1.0]}}"#;
        let err = hourly_frame(parse(body)).unwrap_err();
        assert!(matches!(err, SourceError::HourParse { .. }));
    }

    #[tokio::test]
    async fn test_archive_is_cached() -> Result<(), Box<dyn std::error::Error>> {
        // Only one canned response: a second network request would fail.
        let server = serve(vec![Canned::ok(RESPONSE)]).await;
        let dir = tempfile::tempdir()?;
        let config = ClientConfig::builder()
            .archive_url(server.url("/v1/archive"))
            .max_retries(0)
            .build();
        let loader = WeatherLoader::new(HttpFetcher::new(&config), dir.path(), &config);
        let location = LatLon(59.2, 17.62);
        let day = NaiveDate::from_ymd_opt(2025, 6, 10).ok_or("date")?;

        let first = loader.archive(location, day, day).await?.collect()?;
        let second = loader.archive(location, day, day).await?.collect()?;
        assert!(first.equals(&second));

        let requests = server.requests().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].query["start_date"], "2025-06-10");
        assert_eq!(requests[0].query["timezone"], "Europe/Stockholm");
        assert_eq!(
            requests[0].query["hourly"],
            "temperature_2m,precipitation,wind_speed_10m,wind_direction_10m"
        );
        Ok(())
    }
}
