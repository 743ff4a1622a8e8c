//! Water temperature readings: the raw rows returned by the sensor endpoint and the
//! validated [`Reading`] the rest of the crate works with, plus the conversion between
//! `Vec<Reading>` and a Polars `DataFrame`.

use crate::error::WaterTempError;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use log::debug;
use polars::prelude::*;
use serde::{Deserialize, Deserializer, Serialize};

pub const COL_TEMP_WATER: &str = "temp_water";
pub const COL_FORMATTED_TIME: &str = "formatted_time";
pub const COL_ALIAS: &str = "alias";
pub const COL_LATITUDE: &str = "latitude";
pub const COL_LONGITUDE: &str = "longitude";

/// Column order of every readings table this crate writes.
pub const READING_COLUMNS: [&str; 5] = [
    COL_TEMP_WATER,
    COL_FORMATTED_TIME,
    COL_ALIAS,
    COL_LATITUDE,
    COL_LONGITUDE,
];

/// Format of the `formatted_time` field, e.g. `Jun 10 2025 11:58:23`.
pub const TIME_FORMAT: &str = "%b %d %Y %H:%M:%S";

/// Value of the `type` discriminator for water temperature rows.
pub const WATER_TEMP_TYPE: &str = "Watertemp";

/// One row of the sensor endpoint's JSON array, as delivered.
///
/// Every field is optional because the endpoint mixes sensor types and does not
/// guarantee complete rows. Numeric fields are accepted both as JSON numbers and as
/// numeric strings.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawReading {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub formatted_time: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub temp_water: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub longitude: Option<f64>,
}

/// A single water temperature measurement from one station.
///
/// `formatted_time` is local time truncated to the minute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub alias: String,
    pub formatted_time: NaiveDateTime,
    pub temp_water: f64,
    pub latitude: f64,
    pub longitude: f64,
}

impl Reading {
    /// Calendar date the reading belongs to.
    pub fn date(&self) -> NaiveDate {
        self.formatted_time.date()
    }

    /// Start of the hour nearest to this reading. A reading exactly on the half hour
    /// rounds to the even hour, so 11:30 and 12:30 both map to 12:00.
    pub fn nearest_hour(&self) -> NaiveDateTime {
        let hour = self.formatted_time.hour();
        let hour_start = NaiveTime::from_hms_opt(hour, 0, 0)
            .map(|t| self.formatted_time.date().and_time(t))
            .unwrap_or(self.formatted_time);
        let into_hour = self.formatted_time - hour_start;
        let half = Duration::minutes(30);
        let round_up = into_hour > half || (into_hour == half && hour % 2 == 1);
        if round_up {
            hour_start + Duration::hours(1)
        } else {
            hour_start
        }
    }
}

impl RawReading {
    /// Validates a raw row.
    ///
    /// Returns `Ok(None)` for rows of another sensor type and for rows with a missing
    /// field; those are dropped. Numeric fields holding unparsable text count as missing
    /// and are logged at debug level when deserialized. A complete water temperature row whose
    /// timestamp does not parse is an error.
    pub fn into_reading(self) -> Result<Option<Reading>, WaterTempError> {
        if self.kind.as_deref() != Some(WATER_TEMP_TYPE) {
            return Ok(None);
        }
        let (Some(alias), Some(time), Some(temp_water), Some(latitude), Some(longitude)) = (
            self.alias,
            self.formatted_time,
            self.temp_water,
            self.latitude,
            self.longitude,
        ) else {
            return Ok(None);
        };

        let formatted_time =
            parse_formatted_time(&time).map_err(|source| WaterTempError::TimestampParse {
                station: alias.clone(),
                value: time.clone(),
                format: TIME_FORMAT,
                source,
            })?;

        Ok(Some(Reading {
            alias,
            formatted_time,
            temp_water,
            latitude,
            longitude,
        }))
    }
}

/// Parses a `formatted_time` value and truncates it to the minute.
pub fn parse_formatted_time(value: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    let parsed = NaiveDateTime::parse_from_str(value.trim(), TIME_FORMAT)?;
    Ok(NaiveTime::from_hms_opt(parsed.hour(), parsed.minute(), 0)
        .map(|t| parsed.date().and_time(t))
        .unwrap_or(parsed))
}

/// Validates every raw row, keeping only complete water temperature readings.
///
/// Aborts on the first unparsable timestamp. An empty result is an error: there is
/// nothing to reconcile.
pub fn validate_readings(
    raw: Vec<RawReading>,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<Reading>, WaterTempError> {
    let mut readings = Vec::with_capacity(raw.len());
    for row in raw {
        if let Some(reading) = row.into_reading()? {
            readings.push(reading);
        }
    }
    if readings.is_empty() {
        return Err(WaterTempError::NoReadings { start, end });
    }
    Ok(readings)
}

/// Builds a readings `DataFrame` with the columns in [`READING_COLUMNS`] order.
/// `formatted_time` is stored as a millisecond `Datetime`.
pub fn readings_to_frame(readings: &[Reading]) -> PolarsResult<DataFrame> {
    let times = DatetimeChunked::from_naive_datetime(
        COL_FORMATTED_TIME.into(),
        readings.iter().map(|r| r.formatted_time),
        TimeUnit::Milliseconds,
    );
    DataFrame::new(vec![
        Column::new(
            COL_TEMP_WATER.into(),
            readings.iter().map(|r| r.temp_water).collect::<Vec<f64>>(),
        ),
        Column::from(times.into_series()),
        Column::new(
            COL_ALIAS.into(),
            readings.iter().map(|r| r.alias.as_str()).collect::<Vec<&str>>(),
        ),
        Column::new(
            COL_LATITUDE.into(),
            readings.iter().map(|r| r.latitude).collect::<Vec<f64>>(),
        ),
        Column::new(
            COL_LONGITUDE.into(),
            readings.iter().map(|r| r.longitude).collect::<Vec<f64>>(),
        ),
    ])
}

fn get_column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column, WaterTempError> {
    df.column(name)
        .map_err(|e| WaterTempError::MissingColumn(name.to_string(), e))
}

pub(crate) fn timestamp_to_naive(value: i64, unit: TimeUnit) -> Option<NaiveDateTime> {
    match unit {
        TimeUnit::Milliseconds => DateTime::from_timestamp_millis(value),
        TimeUnit::Microseconds => DateTime::from_timestamp_micros(value),
        TimeUnit::Nanoseconds => Some(DateTime::from_timestamp_nanos(value)),
    }
    .map(|dt| dt.naive_utc())
}

/// Collects a readings `DataFrame` back into typed rows, in frame order.
/// Rows with a null in any reading column are skipped.
pub fn collect_readings(df: &DataFrame) -> Result<Vec<Reading>, WaterTempError> {
    let temp_water = get_column(df, COL_TEMP_WATER)?.f64()?;
    let times = get_column(df, COL_FORMATTED_TIME)?.datetime()?;
    let alias = get_column(df, COL_ALIAS)?.str()?;
    let latitude = get_column(df, COL_LATITUDE)?.f64()?;
    let longitude = get_column(df, COL_LONGITUDE)?.f64()?;
    let time_unit = times.time_unit();

    let mut readings = Vec::with_capacity(df.height());
    for idx in 0..df.height() {
        let row = (
            alias.get(idx),
            times.get(idx).and_then(|t| timestamp_to_naive(t, time_unit)),
            temp_water.get(idx),
            latitude.get(idx),
            longitude.get(idx),
        );
        if let (Some(alias), Some(formatted_time), Some(temp_water), Some(latitude), Some(longitude)) =
            row
        {
            readings.push(Reading {
                alias: alias.to_string(),
                formatted_time,
                temp_water,
                latitude,
                longitude,
            });
        }
    }
    Ok(readings)
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrText {
        Number(f64),
        Text(String),
    }

    let value = match Option::<NumberOrText>::deserialize(deserializer)? {
        Some(NumberOrText::Number(v)) => Some(v),
        Some(NumberOrText::Text(s)) => match s.trim().parse::<f64>() {
            Ok(v) => Some(v),
            Err(_) => {
                debug!("Treating non-numeric value {:?} as missing", s);
                None
            }
        },
        None => None,
    };
    match value {
        Some(v) if !v.is_finite() => {
            debug!("Treating non-finite value {} as missing", v);
            Ok(None)
        }
        other => Ok(other),
    }
}
