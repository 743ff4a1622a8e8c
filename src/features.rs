//! Joining reconciled readings with the hourly weather at the time they were taken.

use crate::types::reading::{readings_to_frame, Reading, COL_ALIAS, COL_FORMATTED_TIME, READING_COLUMNS};
use crate::types::weather::{WeatherVariable, COL_WEATHER_HOUR};
use polars::prelude::*;

const COL_HOUR_KEY: &str = "hour_key";

/// Column order of a feature table: the reading columns, then one per weather variable.
pub fn feature_columns() -> Vec<&'static str> {
    READING_COLUMNS
        .iter()
        .copied()
        .chain(WeatherVariable::ALL.iter().map(WeatherVariable::api_name))
        .collect()
}

fn readings_with_hour_key(readings: &[Reading]) -> PolarsResult<DataFrame> {
    let mut df = readings_to_frame(readings)?;
    let keys = DatetimeChunked::from_naive_datetime(
        COL_HOUR_KEY.into(),
        readings.iter().map(Reading::nearest_hour),
        TimeUnit::Milliseconds,
    );
    df.with_column(keys.into_series())?;
    Ok(df)
}

/// Left-joins `weather` (an hourly frame as produced by the weather loader) onto
/// `readings` by the hour nearest each reading.
///
/// Every reading appears exactly once; weather columns are null where the hour is
/// missing from `weather`.
pub fn attach_weather(readings: &[Reading], weather: LazyFrame) -> PolarsResult<LazyFrame> {
    let mut weather_columns = vec![col(COL_WEATHER_HOUR).alias(COL_HOUR_KEY)];
    weather_columns.extend(WeatherVariable::ALL.iter().map(|v| col(v.api_name())));

    let features = readings_with_hour_key(readings)?
        .lazy()
        .left_join(
            weather.select(weather_columns),
            col(COL_HOUR_KEY),
            col(COL_HOUR_KEY),
        )
        .select(feature_columns().into_iter().map(col).collect::<Vec<_>>());
    Ok(features)
}

/// Stacks per-station feature frames and orders them by station, then time.
pub fn combine_features(frames: Vec<LazyFrame>) -> PolarsResult<DataFrame> {
    concat(frames, UnionArgs::default())?
        .sort_by_exprs(
            [col(COL_ALIAS), col(COL_FORMATTED_TIME)],
            SortMultipleOptions::default(),
        )
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use polars::df;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 10)
            .and_then(|d| d.and_hms_opt(hour, minute, 0))
            .expect("valid time")
    }

    fn reading(alias: &str, time: NaiveDateTime) -> Reading {
        Reading {
            alias: alias.to_string(),
            formatted_time: time,
            temp_water: 17.5,
            latitude: 59.2,
            longitude: 17.63,
        }
    }

    fn weather() -> LazyFrame {
        let hours = DatetimeChunked::from_naive_datetime(
            "date".into(),
            [at(11, 0), at(12, 0), at(13, 0)],
            TimeUnit::Milliseconds,
        );
        let mut df = df! {
            "temperature_2m" => [18.0f64, 19.0, 20.0],
            "precipitation" => [0.0f64, 0.2, 0.0],
            "wind_speed_10m" => [5.0f64, 6.0, 7.0],
            "wind_direction_10m" => [90.0f64, 180.0, 270.0],
        }
        .expect("frame");
        df.insert_column(0, hours.into_series()).expect("date column");
        df.lazy()
    }

    #[test]
    fn test_attach_weather_uses_nearest_hour() -> Result<(), PolarsError> {
        let readings = vec![
            reading("A", at(11, 29)),
            reading("B", at(12, 30)),
            reading("C", at(12, 31)),
        ];
        let df = attach_weather(&readings, weather())?.collect()?;

        assert_eq!(
            df.get_column_names()
                .iter()
                .map(|name| name.as_str())
                .collect::<Vec<_>>(),
            feature_columns()
        );
        assert_eq!(df.height(), 3);
        let temps: Vec<Option<f64>> = df.column("temperature_2m")?.f64()?.into_iter().collect();
        assert_eq!(temps, vec![Some(18.0), Some(19.0), Some(20.0)]);
        Ok(())
    }

    #[test]
    fn test_attach_weather_missing_hour_is_null() -> Result<(), PolarsError> {
        let readings = vec![reading("A", at(18, 0))];
        let df = attach_weather(&readings, weather())?.collect()?;
        assert_eq!(df.height(), 1);
        assert_eq!(df.column("wind_speed_10m")?.null_count(), 1);
        assert_eq!(df.column("temp_water")?.null_count(), 0);
        Ok(())
    }

    #[test]
    fn test_combine_features_sorts() -> Result<(), PolarsError> {
        let b = attach_weather(&[reading("B", at(11, 0))], weather())?;
        let a = attach_weather(&[reading("A", at(13, 0)), reading("A", at(12, 0))], weather())?;
        let df = combine_features(vec![b, a])?;

        let aliases: Vec<Option<&str>> = df.column("alias")?.str()?.into_iter().collect();
        assert_eq!(aliases, vec![Some("A"), Some("A"), Some("B")]);
        let temps: Vec<Option<f64>> = df.column("temperature_2m")?.f64()?.into_iter().collect();
        assert_eq!(temps, vec![Some(19.0), Some(20.0), Some(18.0)]);
        Ok(())
    }
}
