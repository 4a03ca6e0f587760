//! Persistence of the monitored domain set.

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

/// The set of monitored URLs.
pub type DomainSet = BTreeSet<String>;

/// Errors raised while loading or saving the domain set.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to decode {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode domain set: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Load/save contract for the domain set. Saves replace the whole set.
#[async_trait]
pub trait DomainStore: Send + Sync {
    async fn load(&self) -> Result<DomainSet, StoreError>;

    async fn save(&self, domains: &DomainSet) -> Result<(), StoreError>;
}

/// Domain set kept as a pretty-printed JSON array on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn display(&self) -> String {
        self.path.display().to_string()
    }
}

#[async_trait]
impl DomainStore for JsonFileStore {
    async fn load(&self) -> Result<DomainSet, StoreError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.display(), "Domain file missing, starting empty");
                return Ok(DomainSet::new());
            }
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.display(),
                    source,
                })
            }
        };

        serde_json::from_str(&content).map_err(|source| StoreError::Decode {
            path: self.display(),
            source,
        })
    }

    async fn save(&self, domains: &DomainSet) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(domains)?;

        // Write next to the target and rename so readers never see a torn file.
        let tmp = self.path.with_extension("json.tmp");
        let write = async {
            fs::write(&tmp, json).await?;
            fs::rename(&tmp, &self.path).await
        };
        write.await.map_err(|source| StoreError::Write {
            path: self.display(),
            source,
        })?;

        debug!(path = %self.display(), count = domains.len(), "Domain set saved");
        Ok(())
    }
}

/// In-memory store, for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    domains: Mutex<DomainSet>,
}

impl MemoryStore {
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            domains: Mutex::new(domains.into_iter().map(Into::into).collect()),
        }
    }
}

#[async_trait]
impl DomainStore for MemoryStore {
    async fn load(&self) -> Result<DomainSet, StoreError> {
        Ok(self.domains.lock().await.clone())
    }

    async fn save(&self, domains: &DomainSet) -> Result<(), StoreError> {
        *self.domains.lock().await = domains.clone();
        Ok(())
    }
}
