use crate::services::error::TransferError;
use async_trait::async_trait;
use serde::Serialize;
use std::pin::Pin;
use tokio::io::AsyncWrite;
use utoipa::ToSchema;

/// Open remote file; shutting it down closes the file on the store.
pub type ArtifactWriter = Pin<Box<dyn AsyncWrite + Send>>;

/// One entry of a remote directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ListingEntry {
    pub name: String,
    pub path: String,
    pub size: u64,
    pub is_dir: bool,
    /// Modification time in seconds since the epoch, when the store reports it.
    pub modified: Option<u32>,
}

/// Remote file placement used for published artifacts.
///
/// Paths are POSIX-style and absolute (already joined with the media root).
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Creates `dir` and its parents. An existing directory is not an error.
    async fn ensure_dir(&self, dir: &str) -> Result<(), TransferError>;

    /// Opens `path` for writing, truncating any previous content.
    async fn open_write(&self, path: &str) -> Result<ArtifactWriter, TransferError>;

    async fn list_dir(&self, dir: &str) -> Result<Vec<ListingEntry>, TransferError>;

    /// Moves `from` to `to`, replacing an existing file at `to`.
    async fn rename(&self, from: &str, to: &str) -> Result<(), TransferError>;

    async fn remove(&self, path: &str) -> Result<(), TransferError>;

    /// Check if the store is reachable
    async fn health_check(&self) -> bool;

    /// Drops any cached connection so the next call starts fresh.
    async fn invalidate(&self) {}
}

/// Joins a relative path below `root`.
pub fn join_path(root: &str, relative: &str) -> String {
    let root = root.trim_end_matches('/');
    let relative = relative.trim_start_matches('/');
    if relative.is_empty() {
        root.to_string()
    } else {
        format!("{root}/{relative}")
    }
}

/// POSIX `dirname`.
pub fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) => "/",
        Some(idx) => &path[..idx],
        None => ".",
    }
}
