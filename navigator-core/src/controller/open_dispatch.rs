//! ``src/controller/open_dispatch.rs``
//!
//! Routing of a selected entry: directories navigate, files go to the
//! viewer their category calls for. Hosts report a missing handler as
//! `UnsupportedFileType`, which is handed back to the caller and never
//! touches session state.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use crate::error::AppError;
use crate::fs::classifier::{Category, mime_for};
use crate::fs::entry::Entry;
use crate::fs::source::DirectorySource;
use crate::model::nav_state::SourceInfo;

use super::session::NavigationSession;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenAction {
    Navigate(PathBuf),

    Image(PathBuf),

    Code(PathBuf),

    External { path: PathBuf, mime: Option<String> },
}

/// Viewers supplied by the presentation layer.
#[async_trait]
pub trait ViewerHost: Send {
    async fn open_image(&mut self, path: &Path, source: Option<&SourceInfo>)
    -> Result<(), AppError>;

    async fn open_code(&mut self, path: &Path, source: Option<&SourceInfo>)
    -> Result<(), AppError>;

    /// Hand `path` and its MIME type to the platform's handler. Returns
    /// `UnsupportedFileType` when nothing can open it.
    async fn open_external(&mut self, path: &Path, mime: Option<&str>) -> Result<(), AppError>;
}

/// Decide what selecting `entry` should do.
#[must_use]
pub fn resolve_open(entry: &Entry) -> OpenAction {
    let path: PathBuf = entry.path.clone();

    if entry.is_dir {
        return OpenAction::Navigate(path);
    }

    match entry.category {
        Category::Image => OpenAction::Image(path),

        Category::TextLike => OpenAction::Code(path),

        Category::Directory | Category::Other => {
            let mime: Option<String> = mime_for(&path);

            OpenAction::External { path, mime }
        }
    }
}

/// Carry out the selection of `entry`.
pub async fn open_entry<S: DirectorySource>(
    session: &mut NavigationSession<S>,
    entry: &Entry,
    host: &mut dyn ViewerHost,
) -> Result<OpenAction, AppError> {
    let action: OpenAction = resolve_open(entry);

    info!(
        marker = "ENTRY_SELECTED",
        operation_type = "file_dispatch",
        path = %entry.path.display(),
        category = %entry.category,
        "Opening entry"
    );

    match &action {
        OpenAction::Navigate(path) => session.navigate_to(path)?,

        OpenAction::Image(path) => host.open_image(path, session.source_info()).await?,

        OpenAction::Code(path) => host.open_code(path, session.source_info()).await?,

        OpenAction::External { path, mime } => host
            .open_external(path, mime.as_deref())
            .await
            .map_err(AppError::trace)?,
    }

    Ok(action)
}
