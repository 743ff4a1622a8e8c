//! Fetches bathing-site water temperature readings, reconciles them to one reading per
//! station and day (the one nearest noon), and joins them with hourly weather from
//! Open-Meteo to build forecasting features.
//!
//! The main entry point is [`WaterTemp`]; the reconciler itself is available without a
//! client as [`reconcile`] or, on a `LazyFrame`, through [`WaterTempFrameExt`].

mod config;
mod error;
mod features;
mod output;
mod reconcile;
mod types;
mod utils;
mod watertemp;

pub mod sources;

pub use config::*;
pub use error::{ErrorKind, WaterTempError};
pub use features::{attach_weather, combine_features, feature_columns};
pub use output::{
    export_readings, write_csv, write_readings, CSV_DATETIME_FORMAT, DEDUPED_FILE_NAME,
    RAW_FILE_NAME,
};
pub use reconcile::{reconcile, reconcile_midday_window, WaterTempFrameExt, MIDDAY_WINDOW_HOURS};
pub use watertemp::{default_start_date, WaterTemp};

pub use types::reading::{
    collect_readings, parse_formatted_time, readings_to_frame, validate_readings, RawReading,
    Reading, COL_ALIAS, COL_FORMATTED_TIME, COL_LATITUDE, COL_LONGITUDE, COL_TEMP_WATER,
    READING_COLUMNS, TIME_FORMAT, WATER_TEMP_TYPE,
};
pub use types::weather::{LatLon, WeatherVariable, COL_WEATHER_HOUR};

pub use sources::error::SourceError;
