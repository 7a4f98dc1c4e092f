// src/position_store.rs - Durable single-slot store for the blind's extension length
use async_trait::async_trait;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("position file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Where the last known extension length survives restarts.
#[async_trait]
pub trait PositionStore: Send {
    /// Read the stored length. Missing or unusable content yields `0.0`.
    async fn load(&mut self) -> Result<f64, StoreError>;
    /// Replace the stored length.
    async fn save(&mut self, length: f64) -> Result<(), StoreError>;
}

/// Text file holding one decimal number, kept open for the process lifetime
/// and rewritten in place on every save.
#[derive(Debug)]
pub struct FilePositionStore {
    path: PathBuf,
    file: File,
}

impl FilePositionStore {
    /// Open the state file, creating it when it does not exist yet.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        tracing::info!("Opening blind state file: {}", path.display());
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .await
            .map_err(|source| StoreError::Io { path: path.clone(), source })?;
        Ok(Self { path, file })
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

/// Parse stored content. Non-finite numbers count as corrupt.
pub fn parse_length(contents: &str) -> Option<f64> {
    contents
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|length| length.is_finite())
}

#[async_trait]
impl PositionStore for FilePositionStore {
    async fn load(&mut self) -> Result<f64, StoreError> {
        let mut contents = String::new();
        self.file.seek(SeekFrom::Start(0)).await.map_err(|e| self.io_error(e))?;
        if let Err(e) = self.file.read_to_string(&mut contents).await {
            // not UTF-8: same treatment as any other garbage
            tracing::warn!("Blind state file '{}' is unreadable: {}", self.path.display(), e);
            contents.clear();
        }
        tracing::debug!("Length from file: {:?}", contents);

        match parse_length(&contents) {
            Some(length) => {
                tracing::info!("Restored blind extension length {}", length);
                Ok(length)
            }
            None => {
                tracing::warn!(
                    "Blind state file '{}' holds no usable length, resetting to 0",
                    self.path.display()
                );
                self.save(0.0).await?;
                Ok(0.0)
            }
        }
    }

    async fn save(&mut self, length: f64) -> Result<(), StoreError> {
        let text = length.to_string();
        self.file.seek(SeekFrom::Start(0)).await.map_err(|e| self.io_error(e))?;
        self.file.write_all(text.as_bytes()).await.map_err(|e| self.io_error(e))?;
        self.file.set_len(text.len() as u64).await.map_err(|e| self.io_error(e))?;
        self.file.flush().await.map_err(|e| self.io_error(e))?;
        self.file.sync_data().await.map_err(|e| self.io_error(e))?;
        tracing::trace!("Wrote blind extension length {} to disk", text);
        Ok(())
    }
}
