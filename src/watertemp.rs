//! The [`WaterTemp`] client: fetches sensor readings, reconciles them to one per station
//! and day, and enriches them with hourly weather.

use crate::config::ClientConfig;
use crate::error::WaterTempError;
use crate::features::{attach_weather, combine_features};
use crate::output;
use crate::reconcile::{reconcile, reconcile_midday_window, WaterTempFrameExt};
use crate::sources::geocoding;
use crate::sources::http::HttpFetcher;
use crate::sources::open_meteo::WeatherLoader;
use crate::sources::water_temp::fetch_raw_readings;
use crate::types::reading::{collect_readings, readings_to_frame, validate_readings, Reading};
use crate::types::weather::LatLon;
use crate::utils::{ensure_cache_dir_exists, get_cache_dir};
use bon::bon;
use chrono::{Local, NaiveDate};
use log::info;
use polars::prelude::{DataFrame, IntoLazy, LazyFrame};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// First date requested when no start date is given.
pub fn default_start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2022, 1, 1).unwrap_or_default()
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Client for the water temperature pipeline.
///
/// Create one with [`WaterTemp::new()`] (default cache folder and endpoints),
/// [`WaterTemp::with_config()`] or [`WaterTemp::with_cache_folder()`]. Weather
/// responses are cached as parquet files in the cache folder; sensor readings are
/// always fetched fresh.
///
/// # Examples
///
/// ```rust,no_run
/// # use watertemp::{WaterTemp, WaterTempError};
/// # use chrono::NaiveDate;
/// # #[tokio::main]
/// # async fn main() -> Result<(), WaterTempError> {
/// let client = WaterTemp::new().await?;
/// let readings = client
///     .readings()
///     .start(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap())
///     .end(NaiveDate::from_ymd_opt(2025, 6, 30).unwrap())
///     .call()
///     .await?;
/// for reading in readings {
///     println!("{} {} {}", reading.alias, reading.formatted_time, reading.temp_water);
/// }
/// # Ok(())
/// # }
/// ```
pub struct WaterTemp {
    config: ClientConfig,
    http: HttpFetcher,
    weather: WeatherLoader,
}

#[bon]
impl WaterTemp {
    /// Creates a client caching into `cache_folder`, which is created if missing.
    ///
    /// # Errors
    ///
    /// Returns [`WaterTempError::CacheDirCreation`] if the folder cannot be created.
    pub async fn with_cache_folder(
        cache_folder: PathBuf,
        config: ClientConfig,
    ) -> Result<Self, WaterTempError> {
        ensure_cache_dir_exists(&cache_folder)
            .await
            .map_err(|e| WaterTempError::CacheDirCreation(cache_folder.clone(), e))?;
        let http = HttpFetcher::new(&config);
        Ok(Self {
            weather: WeatherLoader::new(http.clone(), &cache_folder, &config),
            http,
            config,
        })
    }

    /// Creates a client with `config` and the default cache folder
    /// (e.g. `~/.cache/watertemp_rs_cache` on Linux).
    pub async fn with_config(config: ClientConfig) -> Result<Self, WaterTempError> {
        let cache_folder = get_cache_dir().map_err(WaterTempError::CacheDirResolution)?;
        Self::with_cache_folder(cache_folder, config).await
    }

    /// Creates a client with the production endpoints and the default cache folder.
    pub async fn new() -> Result<Self, WaterTempError> {
        Self::with_config(ClientConfig::default()).await
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Fetches and validates every water temperature reading between `start` and `end`
    /// (inclusive), without reconciling.
    ///
    /// * `.start(NaiveDate)`: optional, defaults to 2022-01-01.
    /// * `.end(NaiveDate)`: optional, defaults to today.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::DataUnavailable`](crate::ErrorKind::DataUnavailable) when the
    /// endpoint fails or nothing usable falls in the range,
    /// [`WaterTempError::TimestampParse`] on the first malformed timestamp.
    #[builder]
    pub async fn raw_readings(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<Reading>, WaterTempError> {
        let start = start.unwrap_or_else(default_start_date);
        let end = end.unwrap_or_else(today);

        let rows =
            fetch_raw_readings(&self.http, &self.config.water_temp_url, start, end).await?;
        let validated = validate_readings(rows, start, end)?;
        let in_range = readings_to_frame(&validated)?
            .lazy()
            .filter_dates(start, end)
            .collect()?;
        let readings = collect_readings(&in_range)?;
        if readings.is_empty() {
            return Err(WaterTempError::NoReadings { start, end });
        }
        info!(
            "{} of {} validated readings fall within {} to {}",
            readings.len(),
            validated.len(),
            start,
            end
        );
        Ok(readings)
    }

    /// Fetches readings and reconciles them to one per station and day, the one
    /// nearest noon.
    ///
    /// * `.start(NaiveDate)` / `.end(NaiveDate)`: as for [`WaterTemp::raw_readings`].
    /// * `.midday_window(bool)`: optional, drop readings outside 10:00–15:59 before
    ///   reconciling. Defaults to `false`.
    #[builder]
    pub async fn readings(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        midday_window: Option<bool>,
    ) -> Result<Vec<Reading>, WaterTempError> {
        let raw = self.raw_readings().maybe_start(start).maybe_end(end).call().await?;
        reconcile_readings(&raw, midday_window.unwrap_or(false))
    }

    /// Hourly archive weather at `location` over `start..=end`.
    #[builder]
    pub async fn historical_weather(
        &self,
        location: LatLon,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<LazyFrame, WaterTempError> {
        Ok(self.weather.archive(location, start, end).await?)
    }

    /// The current hourly forecast at `location`.
    #[builder]
    pub async fn weather_forecast(&self, location: LatLon) -> Result<LazyFrame, WaterTempError> {
        Ok(self.weather.forecast(location).await?)
    }

    /// Looks up `place` and returns its coordinates rounded to two decimals.
    #[builder]
    pub async fn locate(&self, place: &str) -> Result<LatLon, WaterTempError> {
        Ok(geocoding::locate(&self.http, &self.config.geocoding_url, place).await?)
    }

    /// Reconciled readings joined with the archive weather at the nearest hour.
    ///
    /// Weather is fetched per station, for that station's coordinates and the span of
    /// dates it has readings for.
    #[builder]
    pub async fn historical_features(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        midday_window: Option<bool>,
    ) -> Result<DataFrame, WaterTempError> {
        let readings = self
            .readings()
            .maybe_start(start)
            .maybe_end(end)
            .maybe_midday_window(midday_window)
            .call()
            .await?;

        let mut by_station: BTreeMap<&str, Vec<Reading>> = BTreeMap::new();
        for reading in &readings {
            by_station
                .entry(reading.alias.as_str())
                .or_default()
                .push(reading.clone());
        }

        let mut frames = Vec::with_capacity(by_station.len());
        for (alias, station_readings) in &by_station {
            let Some(first) = station_readings.first() else {
                continue;
            };
            let (from, to) = station_readings.iter().map(Reading::date).fold(
                (first.date(), first.date()),
                |(lo, hi), d| (lo.min(d), hi.max(d)),
            );
            info!(
                "Attaching weather to {} readings from {}",
                station_readings.len(),
                alias
            );
            let weather = self
                .weather
                .archive(LatLon(first.latitude, first.longitude), from, to)
                .await?;
            frames.push(attach_weather(station_readings, weather)?);
        }
        Ok(combine_features(frames)?)
    }

    /// Fetches and reconciles readings, then writes them as CSV into `out_dir`.
    ///
    /// * `.out_dir(&Path)`: required, created if missing.
    /// * `.include_raw(bool)`: optional, also write every validated reading before
    ///   reconciliation. Defaults to `true`.
    ///
    /// Returns the paths written.
    #[builder]
    pub async fn export_readings(
        &self,
        out_dir: &Path,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        midday_window: Option<bool>,
        include_raw: Option<bool>,
    ) -> Result<Vec<PathBuf>, WaterTempError> {
        let raw = self.raw_readings().maybe_start(start).maybe_end(end).call().await?;
        let reconciled = reconcile_readings(&raw, midday_window.unwrap_or(false))?;
        info!(
            "Reconciled {} readings into {} station-days",
            raw.len(),
            reconciled.len()
        );
        let raw = include_raw.unwrap_or(true).then_some(raw.as_slice());
        output::export_readings(out_dir, &reconciled, raw).await
    }
}

fn reconcile_readings(raw: &[Reading], midday_window: bool) -> Result<Vec<Reading>, WaterTempError> {
    if midday_window {
        reconcile_midday_window(raw)
    } else {
        reconcile(raw)
    }
}
