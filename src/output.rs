use crate::error::WaterTempError;
use crate::types::reading::{readings_to_frame, Reading};
use log::{info, warn};
use polars::prelude::*;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::{fs, task};

/// Reconciled readings, one per station and day.
pub const DEDUPED_FILE_NAME: &str = "watertemp_midday_deduped.csv";
/// Every validated reading, before reconciliation.
pub const RAW_FILE_NAME: &str = "watertemp_midday.csv";
/// How `Datetime` columns are rendered in CSV output.
pub const CSV_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Writes `df` as a CSV file with a header row.
///
/// The file is written to a temporary file next to `path` and renamed into place, so a
/// failed write never leaves a partial file behind.
pub async fn write_csv(df: DataFrame, path: &Path) -> Result<(), WaterTempError> {
    let path_buf = path.to_path_buf();
    let rows = df.height();
    task::spawn_blocking(move || write_csv_blocking(df, &path_buf)).await??;
    info!("Wrote {} rows to {:?}", rows, path);
    Ok(())
}

fn write_csv_blocking(df: DataFrame, path: &Path) -> Result<(), WaterTempError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let staged = stage_csv(df, dir, path)?;
    staged
        .persist(path)
        .map_err(|e| WaterTempError::Write(path.to_path_buf(), e.error))?;
    Ok(())
}

/// Renders `df` into an unnamed temporary file in `dir`, destined for `target`.
fn stage_csv(
    mut df: DataFrame,
    dir: &Path,
    target: &Path,
) -> Result<NamedTempFile, WaterTempError> {
    let write_error = |e: io::Error| WaterTempError::Write(target.to_path_buf(), e);
    let mut temp_file = NamedTempFile::new_in(dir).map_err(write_error)?;
    CsvWriter::new(temp_file.as_file_mut())
        .include_header(true)
        .with_datetime_format(Some(CSV_DATETIME_FORMAT.to_string()))
        .finish(&mut df)
        .map_err(|e| write_error(io::Error::other(e)))?;
    Ok(temp_file)
}

/// Moves every staged file onto its target. If one rename fails, the targets already
/// renamed by this call are removed again so no partial export is left behind.
fn persist_all(staged: Vec<(NamedTempFile, PathBuf)>) -> Result<(), WaterTempError> {
    let mut persisted: Vec<PathBuf> = Vec::with_capacity(staged.len());
    for (temp_file, target) in staged {
        if let Err(e) = temp_file.persist(&target) {
            for done in &persisted {
                if let Err(remove_err) = std::fs::remove_file(done) {
                    warn!("Could not roll back {:?}: {}", done, remove_err);
                }
            }
            return Err(WaterTempError::Write(target, e.error));
        }
        persisted.push(target);
    }
    Ok(())
}

/// Writes `readings` with the reading columns in their canonical order.
pub async fn write_readings(readings: &[Reading], path: &Path) -> Result<(), WaterTempError> {
    write_csv(readings_to_frame(readings)?, path).await
}

/// Writes the reconciled readings (and optionally the unreconciled ones) into `out_dir`,
/// creating it if needed. Returns the paths written.
///
/// Both files are rendered before either is moved into place; on any failure neither
/// output file is left in `out_dir`.
pub async fn export_readings(
    out_dir: &Path,
    reconciled: &[Reading],
    raw: Option<&[Reading]>,
) -> Result<Vec<PathBuf>, WaterTempError> {
    fs::create_dir_all(out_dir)
        .await
        .map_err(|e| WaterTempError::Write(out_dir.to_path_buf(), e))?;

    let mut frames = vec![(
        readings_to_frame(reconciled)?,
        out_dir.join(DEDUPED_FILE_NAME),
    )];
    if let Some(raw) = raw {
        frames.push((readings_to_frame(raw)?, out_dir.join(RAW_FILE_NAME)));
    }
    let written: Vec<PathBuf> = frames.iter().map(|(_, path)| path.clone()).collect();
    let rows: Vec<usize> = frames.iter().map(|(df, _)| df.height()).collect();

    let dir = out_dir.to_path_buf();
    task::spawn_blocking(move || {
        let mut staged = Vec::with_capacity(frames.len());
        for (df, target) in frames {
            staged.push((stage_csv(df, &dir, &target)?, target));
        }
        persist_all(staged)
    })
    .await??;

    for (path, rows) in written.iter().zip(rows) {
        info!("Wrote {} rows to {:?}", rows, path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use chrono::NaiveDate;

    fn reading(alias: &str, day: u32, hour: u32, minute: u32, temp_water: f64) -> Reading {
        Reading {
            alias: alias.to_string(),
            formatted_time: NaiveDate::from_ymd_opt(2025, 6, day)
                .and_then(|d| d.and_hms_opt(hour, minute, 0))
                .expect("valid time"),
            temp_water,
            latitude: 59.2,
            longitude: 17.63,
        }
    }

    #[tokio::test]
    async fn test_write_readings_layout() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("out.csv");
        write_readings(&[reading("Brandalsund", 10, 11, 58, 17.1)], &path).await?;

        let contents = std::fs::read_to_string(&path)?;
        let mut lines = contents.lines();
        assert_eq!(
            lines.next(),
            Some("temp_water,formatted_time,alias,latitude,longitude")
        );
        assert_eq!(
            lines.next(),
            Some("17.1,2025-06-10 11:58:00,Brandalsund,59.2,17.63")
        );
        assert_eq!(lines.next(), None);
        Ok(())
    }

    #[tokio::test]
    async fn test_export_readings_writes_both_files() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let out_dir = dir.path().join("exports");
        let raw = vec![
            reading("A", 10, 11, 58, 17.1),
            reading("A", 10, 12, 3, 17.4),
        ];
        let written = export_readings(&out_dir, &raw[..1], Some(&raw)).await?;

        assert_eq!(
            written,
            vec![out_dir.join(DEDUPED_FILE_NAME), out_dir.join(RAW_FILE_NAME)]
        );
        assert_eq!(std::fs::read_to_string(&written[0])?.lines().count(), 2);
        assert_eq!(std::fs::read_to_string(&written[1])?.lines().count(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_raw_export_leaves_no_deduped_file(
    ) -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        // a directory squatting on the raw file name makes the second rename fail
        std::fs::create_dir(dir.path().join(RAW_FILE_NAME))?;
        let rows = vec![reading("A", 10, 12, 0, 17.0)];

        let err = export_readings(dir.path(), &rows, Some(&rows))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(!dir.path().join(DEDUPED_FILE_NAME).exists());

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())?
            .map(|entry| entry.map(|e| e.file_name()))
            .collect::<Result<_, _>>()?;
        assert_eq!(leftovers, vec![std::ffi::OsString::from(RAW_FILE_NAME)]);
        Ok(())
    }

    #[tokio::test]
    async fn test_unwritable_destination_leaves_nothing() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        // a regular file where the output directory should be
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, b"")?;
        let path = blocker.join("out.csv");

        let err = write_readings(&[reading("A", 10, 12, 0, 17.0)], &path)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(!path.exists());
        Ok(())
    }
}
