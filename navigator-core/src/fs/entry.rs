//! `src/fs/entry.rs`
//! ============================================================
//! Immutable listing data: one `Entry` per child, one `Listing` per
//! directory snapshot. Both serialize so a session can persist its last
//! listing across restarts.

use std::{
    cmp::Ordering,
    ffi::OsStr,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::config::SortOrder;
use crate::fs::classifier::Category;

// ------------------------------------------------------------
// Entry: a single child of a listed directory.
// ------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Absolute path of the child.
    pub path: PathBuf,

    /// File or directory name as shown to the user.
    pub display_name: CompactString,

    /// Lower-case extension (files only).
    pub extension: Option<CompactString>,

    pub is_dir: bool,

    pub category: Category,
}

impl Entry {
    #[must_use]
    pub fn new(path: PathBuf, is_dir: bool, category: Category) -> Self {
        let display_name =
            CompactString::new(path.file_name().map(OsStr::to_string_lossy).unwrap_or_default());

        let extension = if is_dir {
            None
        } else {
            path.extension()
                .and_then(OsStr::to_str)
                .map(|s: &str| -> CompactString { CompactString::new(s.to_lowercase()) })
        };

        Self {
            path,
            display_name,
            extension,
            is_dir,
            category,
        }
    }

    /// Case-insensitive name order with an exact-name tie break, so the
    /// order is total and identical inputs always sort identically.
    #[must_use]
    pub fn cmp_by_name(&self, other: &Self) -> Ordering {
        self.display_name
            .to_lowercase()
            .cmp(&other.display_name.to_lowercase())
            .then_with(|| self.display_name.cmp(&other.display_name))
    }
}

// ------------------------------------------------------------
// Listing: ordered children of one directory at one instant.
// ------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub directory: PathBuf,

    pub entries: Vec<Entry>,

    pub listed_at: DateTime<Utc>,
}

impl Listing {
    /// Build a listing, ordering `entries` according to `sort`.
    #[must_use]
    pub fn new(directory: PathBuf, mut entries: Vec<Entry>, sort: SortOrder) -> Self {
        sort_entries(&mut entries, sort);

        Self {
            directory,
            entries,
            listed_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn empty(directory: PathBuf) -> Self {
        Self {
            directory,
            entries: Vec::new(),
            listed_at: Utc::now(),
        }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Screen title: the listed directory's own name.
    #[must_use]
    pub fn title(&self) -> String {
        self.directory
            .file_name()
            .map_or_else(
                || self.directory.display().to_string(),
                |name: &OsStr| -> String { name.to_string_lossy().into_owned() },
            )
    }

    /// Look a child up by its display name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&Entry> {
        self.entries
            .iter()
            .find(|entry: &&Entry| -> bool { entry.display_name.as_str() == name })
    }

    #[must_use]
    pub fn is_for(&self, directory: &Path) -> bool {
        self.directory.as_path() == directory
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entry> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a Listing {
    type Item = &'a Entry;
    type IntoIter = std::slice::Iter<'a, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

fn sort_entries(entries: &mut [Entry], sort: SortOrder) {
    match sort {
        SortOrder::Name => entries.sort_by(Entry::cmp_by_name),

        SortOrder::DirectoriesFirst => entries.sort_by(|a: &Entry, b: &Entry| -> Ordering {
            b.is_dir.cmp(&a.is_dir).then_with(|| a.cmp_by_name(b))
        }),
    }
}
