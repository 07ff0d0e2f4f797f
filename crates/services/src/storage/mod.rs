pub mod local;
pub mod s3;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use koe_config::StorageSettings;
use tempfile::NamedTempFile;
use tracing::debug;

pub use local::LocalObjectStore;
pub use s3::S3ObjectStore;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),
    #[error("Invalid object key: {0}")]
    InvalidKey(String),
    #[error("Object store returned {status} for {key}")]
    Status { status: u16, key: String },
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Request signing failed: {0}")]
    Signing(String),
    #[error("Unsupported storage backend: {0}")]
    UnsupportedBackend(String),
}

/// Read access to the bucket holding recorded audio.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Writes the object at `key` to `dest`, returning the byte count.
    async fn download(&self, key: &str, dest: &Path) -> Result<u64, StorageError>;

    fn backend_name(&self) -> &str;
}

/// Builds the configured object store.
pub fn from_settings(settings: &StorageSettings) -> Result<Arc<dyn ObjectStore>, StorageError> {
    match settings.backend.to_ascii_lowercase().as_str() {
        "s3" => Ok(Arc::new(S3ObjectStore::new(settings))),
        "local" => {
            let root = settings.local_root.as_deref().unwrap_or(".");
            Ok(Arc::new(LocalObjectStore::new(root)))
        }
        other => Err(StorageError::UnsupportedBackend(other.to_string())),
    }
}

/// A downloaded artifact on local disk. The file is removed on drop.
pub struct StagedArtifact {
    file: NamedTempFile,
    size: u64,
}

impl StagedArtifact {
    /// Downloads `key` into a fresh temp file named after the key's extension.
    pub async fn fetch(store: &dyn ObjectStore, key: &str) -> Result<Self, StorageError> {
        let suffix = key
            .rsplit_once('.')
            .map(|(_, ext)| format!(".{ext}"))
            .filter(|s| !s.contains('/'))
            .unwrap_or_default();
        let file = tempfile::Builder::new()
            .prefix("koe-")
            .suffix(&suffix)
            .tempfile()?;
        let size = store.download(key, file.path()).await?;
        debug!(backend = store.backend_name(), key, bytes = size, "Object staged");
        Ok(Self { file, size })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub async fn read(&self) -> Result<Vec<u8>, StorageError> {
        Ok(tokio::fs::read(self.file.path()).await?)
    }
}
