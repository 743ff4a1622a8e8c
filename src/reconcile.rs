//! Same-day reading reconciliation.
//!
//! Sensors report several times a day at irregular moments. The forecasting features
//! need exactly one reading per station per day, and the reading nearest to local noon
//! is the most comparable across days. [`WaterTempFrameExt::reconcile_midday`] picks
//! that reading for every (station, date) group:
//!
//! * a group with a single reading keeps it unchanged;
//! * otherwise the reading with the smallest absolute distance to 12:00 wins;
//! * equal distances go to the earliest timestamp, and identical timestamps to the
//!   row that came first in the input.
//!
//! The output is sorted by station, then timestamp, and every output row is a verbatim
//! copy of an input row.

use crate::error::WaterTempError;
use crate::types::reading::{
    collect_readings, readings_to_frame, Reading, COL_ALIAS, COL_FORMATTED_TIME, READING_COLUMNS,
};
use chrono::NaiveDate;
use polars::prelude::*;

const COL_DATE: &str = "date";
const COL_NOON_DISTANCE: &str = "noon_distance_s";
const COL_ROW_NR: &str = "row_nr";

const NOON_SECOND_OF_DAY: i32 = 12 * 3600;

/// First and last hour (inclusive) of the optional midday window.
pub const MIDDAY_WINDOW_HOURS: (i32, i32) = (10, 15);

/// Absolute distance in seconds between `formatted_time` and 12:00 on the same day.
fn seconds_from_noon() -> Expr {
    let time = col(COL_FORMATTED_TIME);
    let second_of_day = time.clone().dt().hour().cast(DataType::Int32) * lit(3600)
        + time.clone().dt().minute().cast(DataType::Int32) * lit(60)
        + time.dt().second().cast(DataType::Int32);
    let offset = second_of_day - lit(NOON_SECOND_OF_DAY);
    when(offset.clone().lt(lit(0)))
        .then(lit(0) - offset.clone())
        .otherwise(offset)
}

pub trait WaterTempFrameExt {
    /// Collapses every (station, date) group to its canonical reading.
    ///
    /// Expects the reading columns (`temp_water`, `formatted_time`, `alias`,
    /// `latitude`, `longitude`) and returns exactly those, in that order.
    fn reconcile_midday(self) -> LazyFrame;

    /// Keeps only readings taken between 10:00 and 15:59.
    ///
    /// One variant of the upstream pipeline applied this before reconciling and one
    /// did not. Reconciling without it is the canonical behaviour; this exists so the
    /// windowed output can still be produced on request.
    fn filter_midday_window(self) -> LazyFrame;

    /// Keeps readings whose date lies within `start..=end`.
    fn filter_dates(self, start: NaiveDate, end: NaiveDate) -> LazyFrame;
}

impl WaterTempFrameExt for LazyFrame {
    fn reconcile_midday(self) -> LazyFrame {
        let day_group = [col(COL_ALIAS), col(COL_DATE)];

        self.with_row_index(COL_ROW_NR, None)
            .with_columns([
                col(COL_FORMATTED_TIME).dt().date().alias(COL_DATE),
                seconds_from_noon().alias(COL_NOON_DISTANCE),
            ])
            // Each step can only narrow a group, never empty it: the group minimum is
            // always attained by at least one of its rows.
            .filter(
                col(COL_NOON_DISTANCE).eq(col(COL_NOON_DISTANCE).min().over(day_group.clone())),
            )
            .filter(
                col(COL_FORMATTED_TIME).eq(col(COL_FORMATTED_TIME).min().over(day_group.clone())),
            )
            .filter(col(COL_ROW_NR).eq(col(COL_ROW_NR).min().over(day_group)))
            .sort_by_exprs(
                [col(COL_ALIAS), col(COL_FORMATTED_TIME)],
                SortMultipleOptions::default(),
            )
            .select(READING_COLUMNS.map(|name| col(name)))
    }

    fn filter_midday_window(self) -> LazyFrame {
        let (first_hour, last_hour) = MIDDAY_WINDOW_HOURS;
        let hour = col(COL_FORMATTED_TIME).dt().hour().cast(DataType::Int32);
        self.filter(
            hour.clone()
                .gt_eq(lit(first_hour))
                .and(hour.lt_eq(lit(last_hour))),
        )
    }

    fn filter_dates(self, start: NaiveDate, end: NaiveDate) -> LazyFrame {
        let date = col(COL_FORMATTED_TIME).dt().date();
        self.filter(
            date.clone()
                .gt_eq(lit(start))
                .and(date.lt_eq(lit(end))),
        )
    }
}

/// Reconciles typed readings; see the [module documentation](self).
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use watertemp::{reconcile, Reading};
///
/// let day = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();
/// let reading = |h, m| Reading {
///     alias: "A".to_string(),
///     formatted_time: day.and_hms_opt(h, m, 0).unwrap(),
///     temp_water: 18.0,
///     latitude: 59.2,
///     longitude: 17.6,
/// };
///
/// let kept = reconcile(&[reading(12, 3), reading(11, 58)]).unwrap();
/// assert_eq!(kept, vec![reading(11, 58)]);
/// ```
pub fn reconcile(readings: &[Reading]) -> Result<Vec<Reading>, WaterTempError> {
    let reconciled = readings_to_frame(readings)?
        .lazy()
        .reconcile_midday()
        .collect()?;
    collect_readings(&reconciled)
}

/// Like [`reconcile`], but first drops readings outside 10:00–15:59.
pub fn reconcile_midday_window(readings: &[Reading]) -> Result<Vec<Reading>, WaterTempError> {
    let reconciled = readings_to_frame(readings)?
        .lazy()
        .filter_midday_window()
        .reconcile_midday()
        .collect()?;
    collect_readings(&reconciled)
}
