//! On-disk persistence for collected snapshots.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

use crate::constants::FILE_TIMESTAMP_FMT;
use crate::summary::{GameSummary, RawSnapshot};
use crate::util::safe_file_stem;

pub type StorageResult<T> = core::result::Result<T, StorageErr>;

#[derive(Debug, Error)]
pub enum StorageErr {
    #[error("i/o error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Serialize(#[from] serde_json::Error),
}

#[async_trait]
pub trait RawSink: Send + Sync {
    /// Persists one raw snapshot for `game_name`, returning where it was written.
    async fn save_raw(
        &self,
        source: &str,
        game_name: &str,
        payload: &RawSnapshot,
    ) -> StorageResult<PathBuf>;
}

/// Writes pretty-printed JSON documents under `{raw_dir}/{source}/` and
/// `{processed_dir}/{source}/`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    raw_dir: PathBuf,
    processed_dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(raw_dir: impl Into<PathBuf>, processed_dir: impl Into<PathBuf>) -> Self {
        Self {
            raw_dir: raw_dir.into(),
            processed_dir: processed_dir.into(),
        }
    }

    /// Writes a batch's summaries as one document.
    #[instrument(skip(self, summaries), fields(count = summaries.len()))]
    pub async fn save_batch(
        &self,
        source: &str,
        summaries: &[GameSummary],
    ) -> StorageResult<PathBuf> {
        let stamp = Utc::now().format(FILE_TIMESTAMP_FMT);
        let dir = self.processed_dir.join(source);
        let path = dir.join(format!("batch_{stamp}.json"));

        write_json(&dir, &path, &summaries).await?;
        tracing::info!(source, path = %path.display(), "saved batch summaries");

        Ok(path)
    }
}

#[async_trait]
impl RawSink for JsonFileStore {
    #[instrument(skip(self, payload))]
    async fn save_raw(
        &self,
        source: &str,
        game_name: &str,
        payload: &RawSnapshot,
    ) -> StorageResult<PathBuf> {
        let stamp = Utc::now().format(FILE_TIMESTAMP_FMT);
        let dir = self.raw_dir.join(source);
        let path = dir.join(format!("{}_{stamp}.json", safe_file_stem(game_name)));

        write_json(&dir, &path, payload).await?;
        tracing::info!(source, path = %path.display(), "saved raw snapshot");

        Ok(path)
    }
}

async fn write_json<T: Serialize + ?Sized>(dir: &Path, path: &Path, value: &T) -> StorageResult<()> {
    let body = serde_json::to_vec_pretty(value)?;

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| StorageErr::Io {
            path: dir.to_path_buf(),
            source,
        })?;

    tokio::fs::write(path, body)
        .await
        .map_err(|source| StorageErr::Io {
            path: path.to_path_buf(),
            source,
        })
}
