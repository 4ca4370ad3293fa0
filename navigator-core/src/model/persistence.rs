//! Session persistence with atomic saves.
//!
//! The saved record is written to a temporary sibling file and renamed over
//! the real one, so a crash mid-save never leaves a truncated session behind.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{info, warn};

use crate::error::AppError;
use crate::model::nav_state::SavedSession;

pub struct SessionStore {
    file_path: PathBuf,
    temp_path: PathBuf,
}

impl SessionStore {
    #[must_use]
    pub fn new(file_path: PathBuf) -> Self {
        let temp_path = file_path.with_extension("tmp");

        Self {
            file_path,
            temp_path,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.file_path
    }

    pub async fn save(&self, session: &SavedSession) -> Result<(), AppError> {
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::from_io(parent, e))?;
        }

        let json: Vec<u8> = serde_json::to_vec_pretty(session)?;

        fs::write(&self.temp_path, json)
            .await
            .map_err(|e| AppError::from_io(&self.temp_path, e))?;

        fs::rename(&self.temp_path, &self.file_path)
            .await
            .map_err(|e| AppError::from_io(&self.file_path, e))?;

        info!(
            marker = "SESSION_SAVED",
            operation_type = "persistence",
            path = %self.file_path.display(),
            current_dir = %session.current_dir.display(),
            "Session saved"
        );

        Ok(())
    }

    /// Load the saved session. A missing file or an unknown format version
    /// yields `None`; a corrupt file is an error.
    pub async fn load(&self) -> Result<Option<SavedSession>, AppError> {
        let bytes: Vec<u8> = match fs::read(&self.file_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AppError::from_io(&self.file_path, e)),
        };

        let session: SavedSession = serde_json::from_slice(&bytes)?;

        if session.version != SavedSession::CURRENT_VERSION {
            warn!(
                marker = "SESSION_VERSION_MISMATCH",
                operation_type = "persistence",
                found = session.version,
                expected = SavedSession::CURRENT_VERSION,
                "Ignoring saved session with unknown version"
            );

            return Ok(None);
        }

        Ok(Some(session))
    }

    pub async fn clear(&self) -> Result<(), AppError> {
        match fs::remove_file(&self.file_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::from_io(&self.file_path, e)),
        }
    }
}
