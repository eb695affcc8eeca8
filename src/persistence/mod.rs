//! Persistence gateway: named byte blobs in a user-chosen storage location
//!
//! The engine only ever reads and writes whole named blobs; each write
//! overwrites the whole file, never appends. The target location is chosen
//! once and stays fixed for the process lifetime.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

/// File name of the persisted roster
pub const ROSTER_FILE: &str = "database.csv";

/// File name of the persisted attendance log
pub const LOG_FILE: &str = "attendance_records.csv";

/// Storage failures; non-fatal, the in-memory ledger stays authoritative
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage target is not a directory: {0}")]
    NotADirectory(PathBuf),
}

pub type Result<T> = std::result::Result<T, PersistenceError>;

/// Read/write of named byte blobs in one storage location
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Read a named blob; Ok(None) when it does not exist
    async fn read_named(&self, name: &str) -> Result<Option<Vec<u8>>>;

    /// Overwrite a named blob in full
    async fn write_named(&self, name: &str, bytes: &[u8]) -> Result<()>;
}

/// Gateway backed by a plain directory on the local filesystem
#[derive(Debug, Clone)]
pub struct DirGateway {
    root: PathBuf,
}

impl DirGateway {
    /// Open (creating if needed) a directory as the storage target
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if root.exists() && !root.is_dir() {
            return Err(PersistenceError::NotADirectory(root));
        }
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl PersistenceGateway for DirGateway {
    async fn read_named(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let path = self.root.join(name);
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                debug!(?path, len = bytes.len(), "read blob");
                Ok(Some(bytes))
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn write_named(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let path = self.root.join(name);
        tokio::fs::write(&path, bytes).await?;
        debug!(?path, len = bytes.len(), "wrote blob");
        Ok(())
    }
}
