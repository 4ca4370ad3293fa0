//! src/config.rs
//! ============================================================================
//! # Config: Navigator Configuration Loader and Saver
//!
//! Loads and saves settings as TOML from the platform config path using the
//! [`directories`](https://docs.rs/directories) crate. A missing file is
//! replaced by the defaults, which are written out for the user to edit.
//!
//! ## Example
//! ```rust,ignore
//! let config = Config::load().await?;
//! config.save_to(&Config::config_path()?).await?;
//! ```

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use tokio::fs as TokioFs;

use crate::error::AppError;
use crate::logging::LoggerConfig;

const QUALIFIER: &str = "org";
const ORGANIZATION: &str = "navigator";
const APPLICATION: &str = "Navigator";

/// Ordering applied to every listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Case-insensitive lexicographic by display name.
    #[default]
    Name,

    /// Directories before files, each group by name.
    DirectoriesFirst,
}

/// Directory listing behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingConfig {
    /// Include entries whose name starts with '.'.
    pub show_hidden: bool,

    pub sort: SortOrder,

    /// Entries processed between cooperative yields / cancellation checks.
    pub yield_every: usize,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            show_hidden: true,
            sort: SortOrder::Name,
            yield_every: 64,
        }
    }
}

/// How selected files are handed off.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Command used for files no built-in viewer handles.
    pub external_open_cmd: String,

    /// Lines printed when previewing a code file.
    pub code_preview_lines: usize,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            external_open_cmd: "xdg-open".to_string(),
            code_preview_lines: 40,
        }
    }
}

/// Where and how sessions are persisted.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Explicit session file; defaults to the platform data dir.
    pub session_file: Option<PathBuf>,

    /// Persisted listings older than this are re-listed on restore.
    #[serde(with = "humantime_serde")]
    pub max_listing_age: Option<Duration>,
}

/// Main configuration struct for the application.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub listing: ListingConfig,

    #[serde(default)]
    pub viewer: ViewerConfig,

    #[serde(default)]
    pub logging: LoggerConfig,

    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl Config {
    /// Loads config from the platform config dir, or writes and returns defaults.
    ///
    /// The config is expected at `$XDG_CONFIG_HOME/navigator/config.toml`
    /// (Linux), or equivalent on Windows/macOS.
    pub async fn load() -> Result<Self, AppError> {
        let path: PathBuf = Self::config_path()?;

        Self::load_from(&path).await
    }

    /// Loads config from an explicit path, creating it with defaults if absent.
    pub async fn load_from(path: &Path) -> Result<Self, AppError> {
        if TokioFs::try_exists(path).await.unwrap_or(false) {
            info!("Loading config from {}", path.display());

            let text: String = TokioFs::read_to_string(path)
                .await
                .map_err(|source| AppError::ConfigIo {
                    path: path.to_path_buf(),
                    source,
                })?;

            let cfg: Self = toml::from_str(&text)?;

            Ok(cfg)
        } else {
            info!(
                "No config file found at {}, using default configuration. Creating it now.",
                path.display()
            );

            let default_config = Self::default();
            default_config.save_to(path).await?;

            Ok(default_config)
        }
    }

    pub async fn save_to(&self, path: &Path) -> Result<(), AppError> {
        info!("Saving config to {}", path.display());

        let io_err = |source: std::io::Error| -> AppError {
            AppError::ConfigIo {
                path: path.to_path_buf(),
                source,
            }
        };

        if let Some(parent) = path.parent() {
            TokioFs::create_dir_all(parent).await.map_err(io_err)?;
        }

        let toml_str: String = toml::to_string_pretty(self)
            .map_err(|e| AppError::Other(format!("Config serialize error: {e}")))?;

        TokioFs::write(path, toml_str).await.map_err(io_err)?;

        Ok(())
    }

    /// Returns the canonical config file path using `directories::ProjectDirs`.
    pub fn config_path() -> Result<PathBuf, AppError> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Default location of the persisted navigation session.
    pub fn session_path(&self) -> Result<PathBuf, AppError> {
        match &self.persistence.session_file {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::project_dirs()?.data_dir().join("session.json")),
        }
    }

    fn project_dirs() -> Result<ProjectDirs, AppError> {
        ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION)
            .ok_or_else(|| AppError::Other("Could not determine config directory.".to_string()))
    }
}
