//! ``src/view/terminal.rs``
//!
//! `ViewerHost` for the line-oriented binary: images are announced, code
//! files are previewed inline and everything else goes to the configured
//! external command.

use std::path::Path;
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use tokio::fs as TokioFs;
use tokio::process::Command;
use tracing::{info, warn};

use crate::config::ViewerConfig;
use crate::controller::open_dispatch::ViewerHost;
use crate::error::AppError;
use crate::model::nav_state::SourceInfo;

/// Environment variable carrying the MIME type to the external command.
pub const MIME_ENV_VAR: &str = "NAVIGATOR_MIME_TYPE";

pub struct TerminalHost {
    external_open_cmd: String,
    preview_lines: usize,
}

impl TerminalHost {
    #[must_use]
    pub fn new(config: &ViewerConfig) -> Self {
        Self {
            external_open_cmd: config.external_open_cmd.clone(),
            preview_lines: config.code_preview_lines,
        }
    }
}

/// First `lines` lines of `path`. Bytes that are not UTF-8 are replaced
/// rather than rejected, so compiled `.class` files still preview.
pub async fn preview(path: &Path, lines: usize) -> Result<Vec<String>, AppError> {
    let bytes: Vec<u8> = TokioFs::read(path)
        .await
        .map_err(|e| AppError::from_io(path, e))?;

    Ok(String::from_utf8_lossy(&bytes)
        .lines()
        .take(lines)
        .map(str::to_string)
        .collect())
}

#[async_trait]
impl ViewerHost for TerminalHost {
    async fn open_image(
        &mut self,
        path: &Path,
        source: Option<&SourceInfo>,
    ) -> Result<(), AppError> {
        match source {
            Some(source) => println!("[image] {} ({})", path.display(), source.package_name),
            None => println!("[image] {}", path.display()),
        }

        Ok(())
    }

    async fn open_code(
        &mut self,
        path: &Path,
        _source: Option<&SourceInfo>,
    ) -> Result<(), AppError> {
        let lines: Vec<String> = preview(path, self.preview_lines).await?;

        println!("--- {} ---", path.display());
        for line in lines {
            println!("{line}");
        }

        Ok(())
    }

    async fn open_external(&mut self, path: &Path, mime: Option<&str>) -> Result<(), AppError> {
        let unsupported = || AppError::unsupported_file_type(path, mime.map(str::to_string));

        info!(
            marker = "EXTERNAL_OPEN",
            operation_type = "file_dispatch",
            command = %self.external_open_cmd,
            path = %path.display(),
            mime = mime.unwrap_or("unknown"),
            "Handing file to external command"
        );

        let status: ExitStatus = Command::new(&self.external_open_cmd)
            .arg(path)
            .env(MIME_ENV_VAR, mime.unwrap_or_default())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => unsupported(),
                _ => AppError::from_io(path, e),
            })?;

        if !status.success() {
            warn!(
                marker = "EXTERNAL_OPEN_REJECTED",
                operation_type = "file_dispatch",
                path = %path.display(),
                status = %status,
                "External command could not open file"
            );

            return Err(unsupported());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn host(cmd: &str) -> TerminalHost {
        TerminalHost::new(&ViewerConfig {
            external_open_cmd: cmd.to_string(),
            code_preview_lines: 2,
        })
    }

    #[tokio::test]
    async fn preview_is_lossy_and_bounded() {
        let temp_dir = TempDir::new().unwrap();
        let class_file = temp_dir.path().join("Main.class");
        TokioFs::write(&class_file, b"\xca\xfe\xba\xbe\nsecond\nthird\n")
            .await
            .unwrap();

        let lines = preview(&class_file, 2).await.unwrap();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains('\u{FFFD}'));
        assert_eq!(lines[1], "second");
    }

    #[tokio::test]
    async fn missing_code_file_is_not_found() {
        let temp_dir = TempDir::new().unwrap();

        let err = host("true")
            .open_code(&temp_dir.path().join("gone.java"), None)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn external_command_failure_is_unsupported() {
        let path = Path::new("/out/app/classes.dex");

        host("true").open_external(path, None).await.unwrap();

        let rejected = host("false").open_external(path, None).await.unwrap_err();
        assert!(matches!(rejected, AppError::UnsupportedFileType { .. }));

        let missing = host("/nonexistent/opener")
            .open_external(path, Some("application/pdf"))
            .await
            .unwrap_err();
        assert!(matches!(
            missing,
            AppError::UnsupportedFileType { mime: Some(ref m), .. } if m == "application/pdf"
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn external_command_receives_mime() {
        // `sh <file>` runs the opened file itself, which checks the MIME it was given.
        let temp_dir = TempDir::new().unwrap();
        let doc = temp_dir.path().join("doc.pdf");
        TokioFs::write(&doc, format!("[ \"${MIME_ENV_VAR}\" = \"application/pdf\" ]\n"))
            .await
            .unwrap();

        let mut host = host("sh");

        host.open_external(&doc, Some("application/pdf")).await.unwrap();
        assert!(matches!(
            host.open_external(&doc, Some("image/webp")).await,
            Err(AppError::UnsupportedFileType { .. })
        ));
    }
}
