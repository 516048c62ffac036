//! [`FileSource`] over a locally mounted share.
//!
//! Listing is non-recursive: one directory per call, filtered by a glob
//! against the file name. Entries come back sorted by name so ingestion
//! order (and therefore tie-breaking in retrieval) is stable across runs.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use globset::Glob;

use shareindex_core::error::{Error, Result};
use shareindex_core::files::{FileEntry, FileSource};

pub struct MountedShare {
    root: PathBuf,
}

impl MountedShare {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, relative: &str) -> Result<PathBuf> {
        // Keep paths inside the mount.
        let rel = Path::new(relative);
        if rel.is_absolute()
            || rel
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(Error::Storage(format!("path escapes share: {relative}")));
        }
        Ok(self.root.join(rel))
    }
}

fn modified_time(meta: &std::fs::Metadata) -> DateTime<Utc> {
    meta.modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now())
}

#[async_trait]
impl FileSource for MountedShare {
    async fn list_files(&self, directory: &str, pattern: &str) -> Result<Vec<FileEntry>> {
        let dir = self.resolve(directory)?;
        let matcher = Glob::new(pattern)
            .map_err(|e| Error::InvalidConfig(format!("bad file pattern {pattern:?}: {e}")))?
            .compile_matcher();

        let read_dir = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| Error::Storage(format!("listing {}: {e}", dir.display())))?;

        let mut entries = Vec::new();
        let mut read_dir = read_dir;
        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| Error::Storage(format!("listing {}: {e}", dir.display())))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            let meta = entry
                .metadata()
                .await
                .map_err(|e| Error::Storage(format!("stat {name}: {e}")))?;
            if !meta.is_dir() && !matcher.is_match(&name) {
                continue;
            }
            entries.push(FileEntry {
                name,
                size: meta.len(),
                modified: modified_time(&meta),
                is_directory: meta.is_dir(),
            });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn read_file(&self, path: &str) -> Result<String> {
        let full = self.resolve(path)?;
        tokio::fs::read_to_string(&full)
            .await
            .map_err(|e| Error::Storage(format!("reading {}: {e}", full.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lists_matching_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "bravo").unwrap();
        std::fs::write(dir.path().join("a.txt"), "alpha").unwrap();
        std::fs::write(dir.path().join("c.log"), "charlie").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let share = MountedShare::new(dir.path());
        let entries = share.list_files("", "*.txt").await.unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt", "sub"]);
        assert!(entries[2].is_directory);
    }

    #[tokio::test]
    async fn test_reads_file_content() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("documents")).unwrap();
        std::fs::write(dir.path().join("documents/a.txt"), "hello").unwrap();

        let share = MountedShare::new(dir.path());
        let content = share.read_file("documents/a.txt").await.unwrap();
        assert_eq!(content, "hello");
    }

    #[tokio::test]
    async fn test_rejects_parent_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let share = MountedShare::new(dir.path());
        assert!(share.read_file("../outside.txt").await.is_err());
    }
}
