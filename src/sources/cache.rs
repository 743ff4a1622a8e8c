use crate::sources::error::SourceError;
use log::{debug, info};
use polars::prelude::*;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::{fs, task};

/// Parquet files on disk keyed by request, each valid for a caller-chosen age.
#[derive(Debug, Clone)]
pub struct FrameCache {
    cache_dir: PathBuf,
}

impl FrameCache {
    pub fn new(cache_dir: &Path) -> FrameCache {
        FrameCache {
            cache_dir: cache_dir.to_path_buf(),
        }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.parquet", sanitize_key(key)))
    }

    /// Returns the cached frame for `key` unless it is missing or older than `max_age`.
    /// `None` as `max_age` never expires.
    pub async fn get(
        &self,
        key: &str,
        max_age: Option<Duration>,
    ) -> Result<Option<LazyFrame>, SourceError> {
        let path = self.path_for(key);
        let metadata = match fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                debug!("Cache miss for {}", key);
                return Ok(None);
            }
            Err(e) => return Err(SourceError::CacheMetadataRead(path, e)),
        };

        if let Some(max_age) = max_age {
            let modified = metadata
                .modified()
                .map_err(|e| SourceError::CacheMetadataRead(path.clone(), e))?;
            // mtime in the future counts as fresh
            let age = modified.elapsed().unwrap_or_default();
            if age > max_age {
                info!("Cache entry {:?} is {:?} old, refreshing", path, age);
                return Ok(None);
            }
        }

        info!("Cache hit for {} at {:?}", key, path);
        LazyFrame::scan_parquet(&path, Default::default())
            .map(Some)
            .map_err(|e| SourceError::ParquetScan(path, e))
    }

    /// Stores `df` under `key`, replacing any previous entry.
    pub async fn put(&self, key: &str, df: DataFrame) -> Result<PathBuf, SourceError> {
        fs::create_dir_all(&self.cache_dir)
            .await
            .map_err(|e| SourceError::CacheDirCreation(self.cache_dir.clone(), e))?;

        let path = self.path_for(key);
        Self::cache_dataframe(df, &self.cache_dir, &path).await?;
        info!("Cached {} to {:?}", key, path);
        Ok(path)
    }

    /// Writes through a temporary file in the cache dir so readers never see a partial file.
    async fn cache_dataframe(mut df: DataFrame, dir: &Path, path: &Path) -> Result<(), SourceError> {
        let dir = dir.to_path_buf();
        let path_buf = path.to_path_buf();
        task::spawn_blocking(move || {
            let mut temp_file = NamedTempFile::new_in(&dir)
                .map_err(|e| SourceError::ParquetWriteIo(path_buf.clone(), e))?;
            ParquetWriter::new(temp_file.as_file_mut())
                .with_compression(ParquetCompression::Snappy)
                .finish(&mut df)
                .map_err(|e| SourceError::ParquetWritePolars(path_buf.clone(), e))?;
            temp_file
                .persist(&path_buf)
                .map_err(|e| SourceError::ParquetWriteIo(path_buf, e.error))?;
            Ok::<(), SourceError>(())
        })
        .await??;
        Ok(())
    }
}

/// Maps a cache key to a file stem safe on every platform.
fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;

    fn sample_frame() -> DataFrame {
        df! {
            "a" => [1i64, 2, 3],
            "b" => [0.5f64, 1.5, 2.5],
        }
        .expect("frame")
    }

    #[test]
    fn test_sanitize_key() {
        assert_eq!(
            sanitize_key("archive-59.2,17.63-2025-06-01/Europe/Stockholm"),
            "archive-59.2_17.63-2025-06-01_Europe_Stockholm"
        );
    }

    #[tokio::test]
    async fn test_missing_entry_is_none() -> Result<(), SourceError> {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = FrameCache::new(dir.path());
        assert!(cache.get("nothing", None).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_put_then_get() -> Result<(), SourceError> {
        let dir = tempfile::tempdir().expect("tempdir");
        // nested dir is created on demand
        let cache = FrameCache::new(&dir.path().join("nested"));
        let path = cache.put("forecast-1,2", sample_frame()).await?;
        assert!(path.exists());

        let frame = cache
            .get("forecast-1,2", Some(Duration::from_secs(3600)))
            .await?
            .expect("fresh entry");
        let df = frame.collect()?;
        assert!(df.equals(&sample_frame()));
        Ok(())
    }

    #[tokio::test]
    async fn test_expired_entry_is_none() -> Result<(), SourceError> {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = FrameCache::new(dir.path());
        cache.put("old", sample_frame()).await?;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(cache.get("old", Some(Duration::ZERO)).await?.is_none());
        assert!(cache.get("old", None).await?.is_some());
        Ok(())
    }
}
