//! Durable photo storage.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use mockall::automock;
use thiserror::Error;
use uuid::Uuid;

use crate::cfg;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Unsupported content type: {0}")]
    UnsupportedContentType(String),

    #[error("Failed to write object: {0}")]
    WriteFailed(#[from] std::io::Error),

    #[error("Storage did not answer within {0:?}")]
    TimedOut(Duration),
}

#[automock]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores the bytes and returns the URL they can be fetched from.
    async fn put(&self, bytes: Vec<u8>, content_type: &str) -> Result<String, StorageError>;
}

/// Stores objects as files in a local directory served under `public_base_url`
#[derive(Clone, Debug)]
pub struct LocalObjectStore {
    directory: PathBuf,
    public_base_url: String,
}

impl LocalObjectStore {
    #[must_use]
    pub fn new(settings: &cfg::StorageSettings) -> Self {
        Self {
            directory: PathBuf::from(&settings.directory),
            public_base_url: settings.public_base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, bytes: Vec<u8>, content_type: &str) -> Result<String, StorageError> {
        let extension = image_extension(content_type)
            .ok_or_else(|| StorageError::UnsupportedContentType(content_type.to_string()))?;
        let key = format!("{}.{extension}", Uuid::new_v4());

        tokio::fs::create_dir_all(&self.directory).await?;
        tokio::fs::write(self.directory.join(&key), &bytes).await?;

        tracing::debug!(key = %key, size = bytes.len(), "Stored object");
        Ok(format!("{}/{key}", self.public_base_url))
    }
}

/// Runs `put` with an upper bound on how long the store may take
pub async fn put_with_timeout(
    store: &dyn ObjectStore,
    bytes: Vec<u8>,
    content_type: &str,
    timeout: Duration,
) -> Result<String, StorageError> {
    tokio::time::timeout(timeout, store.put(bytes, content_type))
        .await
        .map_err(|_| StorageError::TimedOut(timeout))?
}

fn image_extension(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}
