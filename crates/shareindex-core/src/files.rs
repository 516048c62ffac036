//! File-share collaborator boundary.
//!
//! The engine never mounts or walks a share itself; it consumes an
//! already-provided [`FileSource`]. Per-file read failures are expected
//! and non-fatal: the ingestion workflow collects them as
//! [`ReadFailure`]s and moves on.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;

/// Directory listing entry as reported by the file collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct FileEntry {
    pub name: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
    pub is_directory: bool,
}

/// A document read from the share.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentFile {
    pub name: String,
    pub content: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
}

/// One skipped file during collection. Logged, never thrown.
#[derive(Debug, Clone, Serialize)]
pub struct ReadFailure {
    pub path: String,
    pub message: String,
}

/// External file listing/reading collaborator.
#[async_trait]
pub trait FileSource: Send + Sync {
    /// List entries in `directory` matching the glob `pattern`.
    async fn list_files(&self, directory: &str, pattern: &str) -> Result<Vec<FileEntry>>;

    /// Read one file's text content. `path` is relative to the share root
    /// (typically `"{directory}/{name}"`).
    async fn read_file(&self, path: &str) -> Result<String>;
}
