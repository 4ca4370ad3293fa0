//! ``src/fs/source.rs``
//!
//! Where directory children come from. The lister only needs names and a
//! directory flag; everything else (classification, ordering, cancellation)
//! is layered on top, so tests can swap the local file system for a fake.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use compact_str::CompactString;
use tokio::fs::{self as TokioFs, DirEntry, ReadDir};
use tracing::debug;

use crate::error::AppError;

/// One child as reported by a source, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChild {
    pub name: CompactString,
    pub is_dir: bool,
}

impl RawChild {
    #[must_use]
    pub fn file(name: &str) -> Self {
        Self {
            name: CompactString::new(name),
            is_dir: false,
        }
    }

    #[must_use]
    pub fn dir(name: &str) -> Self {
        Self {
            name: CompactString::new(name),
            is_dir: true,
        }
    }
}

#[async_trait]
pub trait DirectorySource: Send + Sync + 'static {
    /// Immediate children of `dir`, in any order. Fails instead of returning
    /// a partial result.
    async fn read_children(&self, dir: &Path) -> Result<Vec<RawChild>, AppError>;
}

/// The local file system via `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

#[async_trait]
impl DirectorySource for LocalFs {
    async fn read_children(&self, dir: &Path) -> Result<Vec<RawChild>, AppError> {
        let mut read_dir: ReadDir = TokioFs::read_dir(dir)
            .await
            .map_err(|e| AppError::from_io(dir, e))?;

        let mut children: Vec<RawChild> = Vec::new();

        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| AppError::from_io(dir, e))?
        {
            children.push(Self::raw_child(&entry).await?);
        }

        Ok(children)
    }
}

impl LocalFs {
    async fn raw_child(entry: &DirEntry) -> Result<RawChild, AppError> {
        let entry_path: PathBuf = entry.path();
        let name = CompactString::new(entry.file_name().to_string_lossy());

        let file_type = entry
            .file_type()
            .await
            .map_err(|e| AppError::from_io(&entry_path, e))?;

        // Symlinks count as directories when their target is one.
        let is_dir: bool = if file_type.is_symlink() {
            match TokioFs::metadata(&entry_path).await {
                Ok(meta) => meta.is_dir(),
                Err(e) => {
                    debug!(path = %entry_path.display(), error = %e, "Dangling symlink treated as file");
                    false
                }
            }
        } else {
            file_type.is_dir()
        };

        Ok(RawChild { name, is_dir })
    }
}
