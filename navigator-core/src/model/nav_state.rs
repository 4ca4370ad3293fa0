//! ``src/model/nav_state.rs``
//! ============================================================================
//! # `NavigationState`: where a session is, and what it last saw
//!
//! Owned by `NavigationSession`. The current directory and last listing are
//! only ever replaced together through [`NavigationState::commit`].

use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::fs::entry::Listing;

/// What was extracted into the session root (shown by viewers).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub package_name: CompactString,

    #[serde(default)]
    pub label: Option<CompactString>,
}

impl SourceInfo {
    #[must_use]
    pub fn new(package_name: &str) -> Self {
        Self {
            package_name: CompactString::new(package_name),
            label: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationState {
    current_dir: PathBuf,
    root_dir: PathBuf,
    last_listing: Listing,
}

impl NavigationState {
    /// Fresh state at `root` with nothing listed yet.
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self {
            current_dir: root.clone(),
            last_listing: Listing::empty(root.clone()),
            root_dir: root,
        }
    }

    #[must_use]
    pub fn current_dir(&self) -> &Path {
        &self.current_dir
    }

    #[must_use]
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    #[must_use]
    pub const fn last_listing(&self) -> &Listing {
        &self.last_listing
    }

    #[must_use]
    pub fn is_at_root(&self) -> bool {
        self.current_dir == self.root_dir
    }

    /// Replace directory and listing in one step.
    pub fn commit(&mut self, listing: Listing) {
        self.current_dir.clone_from(&listing.directory);
        self.last_listing = listing;
    }

    /// Point at `dir` while its listing is in flight.
    pub(crate) fn set_tentative(&mut self, dir: PathBuf) {
        self.current_dir = dir;
    }

    /// Resolve `target` against the current directory and check it stays
    /// under the root.
    pub fn resolve(&self, target: &Path) -> Result<PathBuf, AppError> {
        let joined: PathBuf = if target.is_absolute() {
            target.to_path_buf()
        } else {
            self.current_dir.join(target)
        };

        let normalized: PathBuf = normalize(&joined);

        if normalized.starts_with(&self.root_dir) {
            Ok(normalized)
        } else {
            Err(AppError::OutsideRoot {
                path: normalized,
                root: self.root_dir.clone(),
            })
        }
    }
}

/// Flat record persisted between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedSession {
    pub version: u32,

    pub root_dir: PathBuf,

    pub current_dir: PathBuf,

    #[serde(default)]
    pub source: Option<SourceInfo>,

    #[serde(default)]
    pub last_listing: Option<Listing>,

    pub saved_at: DateTime<Utc>,
}

impl SavedSession {
    pub const CURRENT_VERSION: u32 = 1;

    /// Listing that can be reused as-is for the saved current directory.
    #[must_use]
    pub fn reusable_listing(&self, max_age: Option<std::time::Duration>) -> Option<&Listing> {
        let listing: &Listing = self.last_listing.as_ref()?;

        if !listing.is_for(&self.current_dir) {
            return None;
        }

        if let Some(max_age) = max_age {
            let age = Utc::now().signed_duration_since(listing.listed_at);

            if age.to_std().is_ok_and(|age| age > max_age) {
                return None;
            }
        }

        Some(listing)
    }
}

/// Lexically normalise a path: drop `.` and fold `..` without touching disk.
#[must_use]
pub fn normalize(path: &Path) -> PathBuf {
    let mut out: PathBuf = PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}

            Component::ParentDir => match out.components().next_back() {
                // `..` at the root stays at the root
                Some(Component::RootDir | Component::Prefix(_)) => {}

                Some(Component::Normal(_)) => {
                    out.pop();
                }

                _ => out.push(component),
            },

            other => out.push(other),
        }
    }

    out
}

/// Absolute, normalised form of `path` (relative paths resolve against the
/// process working directory).
pub fn absolutize(path: &Path) -> Result<PathBuf, AppError> {
    let absolute: PathBuf = std::path::absolute(path).map_err(|e| AppError::from_io(path, e))?;

    Ok(normalize(&absolute))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SortOrder;
    use crate::fs::classifier::Category;
    use crate::fs::entry::Entry;

    #[test]
    fn normalize_folds_dots() {
        assert_eq!(normalize(Path::new("/out/app/./res/../res/x")), PathBuf::from("/out/app/res/x"));
        assert_eq!(normalize(Path::new("/out/..")), PathBuf::from("/"));
        assert_eq!(normalize(Path::new("/..")), PathBuf::from("/"));
    }

    #[test]
    fn resolve_keeps_paths_under_root() {
        let state = NavigationState::new(PathBuf::from("/out/app"));

        assert_eq!(state.resolve(Path::new("res")).unwrap(), PathBuf::from("/out/app/res"));
        assert_eq!(state.resolve(Path::new("/out/app")).unwrap(), PathBuf::from("/out/app"));
        assert!(matches!(state.resolve(Path::new("..")), Err(AppError::OutsideRoot { .. })));
        assert!(matches!(
            state.resolve(Path::new("/out/application")),
            Err(AppError::OutsideRoot { .. })
        ));
    }

    #[test]
    fn commit_replaces_directory_and_listing_together() {
        let mut state = NavigationState::new(PathBuf::from("/out/app"));
        let listing = Listing::new(
            PathBuf::from("/out/app/res"),
            vec![Entry::new(PathBuf::from("/out/app/res/a.xml"), false, Category::TextLike)],
            SortOrder::Name,
        );

        state.commit(listing.clone());

        assert_eq!(state.current_dir(), Path::new("/out/app/res"));
        assert_eq!(state.last_listing(), &listing);
        assert!(!state.is_at_root());
    }

    #[test]
    fn stale_or_mismatched_listing_is_not_reused() {
        let mut listing = Listing::empty(PathBuf::from("/out/app"));
        listing.listed_at = Utc::now() - chrono::Duration::hours(2);

        let saved = SavedSession {
            version: SavedSession::CURRENT_VERSION,
            root_dir: PathBuf::from("/out/app"),
            current_dir: PathBuf::from("/out/app"),
            source: None,
            last_listing: Some(listing),
            saved_at: Utc::now(),
        };

        assert!(saved.reusable_listing(None).is_some());
        assert!(saved.reusable_listing(Some(std::time::Duration::from_secs(60))).is_none());

        let moved = SavedSession {
            current_dir: PathBuf::from("/out/app/res"),
            ..saved
        };
        assert!(moved.reusable_listing(None).is_none());
    }
}
