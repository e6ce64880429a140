//! File-backed store for running without Firestore.
//!
//! The catalog is a JSON array of products; customers and messages are
//! appended as JSON lines under the data directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::{CustomerRecord, MessageRecord, PersistenceSink, Product, ProductCatalog, StoreError};

pub struct LocalStore {
    catalog_path: PathBuf,
    data_dir: PathBuf,
}

impl LocalStore {
    pub fn new(catalog_path: impl Into<PathBuf>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            catalog_path: catalog_path.into(),
            data_dir: data_dir.into(),
        }
    }

    async fn append<T: Serialize>(&self, file_name: &str, record: &T) -> Result<(), StoreError> {
        let path = self.data_dir.join(file_name);
        let io_err = |source| StoreError::Io {
            path: path.display().to_string(),
            source,
        };

        fs::create_dir_all(&self.data_dir)
            .await
            .map_err(|source| StoreError::Io {
                path: self.data_dir.display().to_string(),
                source,
            })?;

        let mut line = serde_json::to_string(record).map_err(|source| StoreError::Encode {
            origin: path.display().to_string(),
            source,
        })?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(io_err)?;
        file.write_all(line.as_bytes()).await.map_err(io_err)?;

        debug!("Appended record to {}", path.display());
        Ok(())
    }
}

#[async_trait]
impl ProductCatalog for LocalStore {
    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        read_catalog(&self.catalog_path).await
    }
}

#[async_trait]
impl PersistenceSink for LocalStore {
    async fn register_customer(&self, record: CustomerRecord) -> Result<(), StoreError> {
        self.append("users.jsonl", &record).await
    }

    async fn log_message(&self, record: MessageRecord) -> Result<(), StoreError> {
        self.append("messages.jsonl", &record).await
    }
}

/// A missing catalog file reads as an empty catalog.
async fn read_catalog(path: &Path) -> Result<Vec<Product>, StoreError> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("Catalog file not found: {}", path.display());
            return Ok(Vec::new());
        }
        Err(source) => {
            return Err(StoreError::Io {
                path: path.display().to_string(),
                source,
            })
        }
    };

    serde_json::from_str(&content).map_err(|source| StoreError::Decode {
        origin: path.display().to_string(),
        source,
    })
}
