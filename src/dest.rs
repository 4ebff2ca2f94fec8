//! Destination-write collaborator boundary.

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};

/// A place a downloaded representation can be written to.
///
/// Implementations must make `replace_with` an idempotent overwrite: the
/// engine may invoke the whole download-and-write operation several times,
/// and a partial earlier write must not survive a later one.
#[async_trait]
pub trait Destination: Send + Sync {
    /// Replace the destination's contents with `body`.
    async fn replace_with(&self, body: &[u8]) -> io::Result<()>;
}

/// A destination backed by a file path, overwritten delete-then-write.
#[derive(Debug, Clone)]
pub struct FileDestination {
    path: PathBuf,
}

impl FileDestination {
    /// Create a destination for the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The destination path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Destination for FileDestination {
    async fn replace_with(&self, body: &[u8]) -> io::Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(error) if error.kind() == io::ErrorKind::NotFound => {}
            Err(error) => return Err(error),
        }
        tokio::fs::write(&self.path, body).await
    }
}
