//! src/error.rs
//! ============================================================================
//! # `AppError`: Unified Error Type for the Navigator
//!
//! Every fallible operation in the crate returns `Result<T, AppError>`.
//! Listing failures (`NotFound`, `AccessDenied`, `Io`) are recovered at the
//! session boundary; `UnsupportedFileType` only ever reaches the presentation
//! layer.

use compact_str::CompactString;
use smallvec::{SmallVec, smallvec};
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{Level, event};

/// Unified error type for all navigator operations.
#[derive(Debug, Error)]
pub enum AppError {
    /// Directory (or one of its parents) does not exist, or is not a directory.
    #[error("File or directory not found: {0:?}")]
    NotFound(PathBuf),

    /// Permissions error for directory access.
    #[error("Permission denied: {0:?}")]
    AccessDenied(PathBuf),

    /// Any other read failure while listing.
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// No handler is available for the selected file.
    #[error("No supported handler for {path:?} ({})", .mime.as_deref().unwrap_or("unknown type"))]
    UnsupportedFileType {
        path: PathBuf,
        mime: Option<String>,
    },

    /// Navigation target lies above the session root.
    #[error("{path:?} is outside the session root {root:?}")]
    OutsideRoot { path: PathBuf, root: PathBuf },

    /// Programming error: an operation was issued in a state that forbids it.
    #[error("Invalid state: {0}")]
    InvalidState(CompactString),

    /// Operation cancelled before it produced a result.
    #[error("Operation was cancelled")]
    Cancelled,

    /// TOML config parsing error.
    #[error("Config parse error: {0}")]
    Config(#[from] toml::de::Error),

    /// Config file I/O error with path.
    #[error("Failed to access config file {path:?}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Serialization or deserialization error (e.g., JSON session files).
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Any other error, with description.
    #[error("Unexpected error: {0}")]
    Other(String),
}

impl AppError {
    /// Map an `io::Error` raised while touching `path` onto the listing taxonomy.
    pub fn from_io<P: AsRef<Path>>(path: P, err: io::Error) -> Self {
        let path: PathBuf = path.as_ref().to_path_buf();

        match err.kind() {
            ErrorKind::NotFound | ErrorKind::NotADirectory => Self::NotFound(path),
            ErrorKind::PermissionDenied => Self::AccessDenied(path),
            _ => Self::Io { path, source: err },
        }
    }

    #[must_use]
    pub fn invalid_state(message: &str) -> Self {
        Self::InvalidState(CompactString::new(message))
    }

    #[must_use]
    pub fn unsupported_file_type<P: Into<PathBuf>>(path: P, mime: Option<String>) -> Self {
        Self::UnsupportedFileType {
            path: path.into(),
            mime,
        }
    }

    /// True for the three failure kinds a directory listing can produce.
    #[inline]
    #[must_use]
    pub const fn is_listing_failure(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::AccessDenied(_) | Self::Io { .. }
        )
    }

    /// Stable grouping key for structured logs.
    #[inline]
    #[must_use]
    pub const fn operation_type(&self) -> &'static str {
        match self {
            Self::NotFound(_) | Self::AccessDenied(_) | Self::Io { .. } => "directory_listing",

            Self::UnsupportedFileType { .. } => "file_dispatch",

            Self::OutsideRoot { .. } | Self::InvalidState(_) => "navigation",

            Self::Cancelled => "cancellation",

            Self::Config(_) | Self::ConfigIo { .. } => "configuration",

            Self::Serde(_) => "persistence",

            Self::Other(_) => "unknown_error",
        }
    }

    const fn error_marker(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "ERROR_PATH_NOT_FOUND",
            Self::AccessDenied(_) => "ERROR_PATH_ACCESS_DENIED",
            Self::Io { .. } => "ERROR_FILE_SYSTEM",
            Self::UnsupportedFileType { .. } => "ERROR_UNSUPPORTED_FILE_TYPE",
            Self::OutsideRoot { .. } => "ERROR_OUTSIDE_ROOT",
            Self::InvalidState(_) => "ERROR_INVALID_STATE",
            Self::Cancelled => "ERROR_CANCELLED",
            Self::Config(_) | Self::ConfigIo { .. } => "ERROR_CONFIG",
            Self::Serde(_) => "ERROR_SERDE",
            Self::Other(_) => "ERROR_UNKNOWN",
        }
    }

    fn extract_trace_fields(&self) -> SmallVec<[(&'static str, String); 2]> {
        match self {
            Self::NotFound(path) | Self::AccessDenied(path) | Self::Io { path, .. } => {
                smallvec![("path", path.display().to_string())]
            }

            Self::UnsupportedFileType { path, mime } => smallvec![
                ("path", path.display().to_string()),
                ("mime", mime.clone().unwrap_or_default()),
            ],

            Self::OutsideRoot { path, root } => smallvec![
                ("path", path.display().to_string()),
                ("root", root.display().to_string()),
            ],

            _ => smallvec![],
        }
    }

    /// Emit a single structured `tracing` event for this error and return it unchanged.
    #[must_use]
    pub fn trace(self) -> Self {
        let extra = self.extract_trace_fields();

        event!(
            Level::WARN,
            marker = self.error_marker(),
            operation_type = self.operation_type(),
            error = %self,
            extra = ?extra,
        );

        self
    }
}

// Manual Clone implementation to handle non-Clone fields
impl Clone for AppError {
    fn clone(&self) -> Self {
        match self {
            Self::NotFound(path) => Self::NotFound(path.clone()),
            Self::AccessDenied(path) => Self::AccessDenied(path.clone()),
            Self::Io { path, source } => Self::Io {
                path: path.clone(),
                source: io::Error::new(source.kind(), source.to_string()),
            },
            Self::UnsupportedFileType { path, mime } => Self::UnsupportedFileType {
                path: path.clone(),
                mime: mime.clone(),
            },
            Self::OutsideRoot { path, root } => Self::OutsideRoot {
                path: path.clone(),
                root: root.clone(),
            },
            Self::InvalidState(msg) => Self::InvalidState(msg.clone()),
            Self::Cancelled => Self::Cancelled,
            Self::Config(e) => Self::Other(format!("Config error: {e}")),
            Self::ConfigIo { path, source } => Self::ConfigIo {
                path: path.clone(),
                source: io::Error::new(source.kind(), source.to_string()),
            },
            Self::Serde(e) => Self::Other(format!("Serde error: {e}")),
            Self::Other(msg) => Self::Other(msg.clone()),
        }
    }
}

// Allow conversion from `anyhow::Error` as fallback.
impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        Self::Other(e.to_string())
    }
}
