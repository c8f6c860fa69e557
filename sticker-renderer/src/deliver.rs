//! Delivery of finished PDFs: blob URLs, print windows and downloads.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use crate::error::{RenderError, RenderResult};

/// Temp-file backed blob URLs.
///
/// Each blob is written to a private temporary directory and addressed by a
/// `file://` URL. Revoking deletes the file. The directory itself is removed
/// when the last clone of the registry is dropped.
#[derive(Debug, Clone)]
pub struct BlobRegistry {
    dir: Arc<tempfile::TempDir>,
    live: Arc<Mutex<HashMap<String, PathBuf>>>,
}

impl BlobRegistry {
    /// Create a registry backed by a fresh temporary directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new() -> RenderResult<Self> {
        let dir = tempfile::Builder::new().prefix("sticker-blobs").tempdir()?;
        Ok(Self {
            dir: Arc::new(dir),
            live: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Store `bytes` and return its URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub async fn create(&self, bytes: &[u8], extension: &str) -> RenderResult<String> {
        let path = self
            .dir
            .path()
            .join(format!("{}.{extension}", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, bytes).await?;

        let url = url::Url::from_file_path(&path)
            .map_err(|()| RenderError::Export(format!("not an absolute path: {}", path.display())))?
            .to_string();
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.clone(), path);
        tracing::debug!("Created blob {url}");
        Ok(url)
    }

    /// Revoke a URL. Returns whether it was live.
    pub fn revoke(&self, url: &str) -> bool {
        let path = self
            .live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(url);
        let Some(path) = path else {
            return false;
        };
        if let Err(e) = std::fs::remove_file(&path) {
            tracing::warn!("Failed to remove blob file {}: {e}", path.display());
        }
        tracing::debug!("Revoked blob {url}");
        true
    }

    /// Whether `url` is still live.
    #[must_use]
    pub fn is_live(&self, url: &str) -> bool {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(url)
    }

    /// Number of live blobs.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Local path behind a live URL.
    #[must_use]
    pub fn path_of(&self, url: &str) -> Option<PathBuf> {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(url)
            .cloned()
    }
}

/// The host refused to open a print window.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Print window refused: {0}")]
pub struct PrintRefused(pub String);

/// Opens print windows for blob URLs.
#[async_trait]
pub trait PrintHost: Send + Sync {
    /// Open a window showing `url`.
    ///
    /// # Errors
    ///
    /// Returns [`PrintRefused`] when the host will not open a window; the
    /// pipeline then falls back to a download.
    async fn open(&self, url: &str) -> Result<Box<dyn PrintWindow>, PrintRefused>;
}

/// A window opened by a [`PrintHost`].
#[async_trait]
pub trait PrintWindow: Send {
    /// Wait until the document has loaded.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be loaded.
    async fn loaded(&mut self) -> RenderResult<()>;

    /// Invoke the print command.
    ///
    /// # Errors
    ///
    /// Returns an error if printing fails.
    async fn print(&mut self) -> RenderResult<()>;
}

/// Prints by spawning a system command (`lp` by default) on the PDF file.
#[derive(Debug, Clone)]
pub struct SystemPrintHost {
    command: String,
    args: Vec<String>,
}

impl Default for SystemPrintHost {
    fn default() -> Self {
        Self::new("lp")
    }
}

impl SystemPrintHost {
    /// Create a host running `command [args..] <file>`.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
        }
    }

    /// Extra arguments placed before the file path.
    #[must_use]
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    fn command_available(&self) -> bool {
        let command = Path::new(&self.command);
        if command.components().count() > 1 {
            return command.is_file();
        }
        std::env::var_os("PATH").is_some_and(|paths| {
            std::env::split_paths(&paths).any(|dir| dir.join(&self.command).is_file())
        })
    }
}

#[async_trait]
impl PrintHost for SystemPrintHost {
    async fn open(&self, url: &str) -> Result<Box<dyn PrintWindow>, PrintRefused> {
        if self.command.trim().is_empty() || !self.command_available() {
            return Err(PrintRefused(format!(
                "print command `{}` is not available",
                self.command
            )));
        }
        let path = url::Url::parse(url)
            .ok()
            .and_then(|u| u.to_file_path().ok())
            .ok_or_else(|| PrintRefused(format!("{url} is not a local file")))?;
        Ok(Box::new(CommandWindow {
            command: self.command.clone(),
            args: self.args.clone(),
            path,
        }))
    }
}

struct CommandWindow {
    command: String,
    args: Vec<String>,
    path: PathBuf,
}

#[async_trait]
impl PrintWindow for CommandWindow {
    async fn loaded(&mut self) -> RenderResult<()> {
        tokio::fs::metadata(&self.path).await?;
        Ok(())
    }

    async fn print(&mut self) -> RenderResult<()> {
        let output = tokio::process::Command::new(&self.command)
            .args(&self.args)
            .arg(&self.path)
            .output()
            .await?;
        if output.status.success() {
            tracing::info!("Sent {} to `{}`", self.path.display(), self.command);
            Ok(())
        } else {
            Err(RenderError::Print(format!(
                "`{}` exited with {}: {}",
                self.command,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }
}

/// Write `bytes` to `<dir>/<name>.pdf`, creating `dir` if needed.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be written.
pub async fn write_download(dir: &Path, name: &str, bytes: &[u8]) -> RenderResult<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(format!("{}.pdf", sanitize_file_stem(name)));
    tokio::fs::write(&path, bytes).await?;
    tracing::info!("Downloaded PDF to {}", path.display());
    Ok(path)
}

/// Make a design name safe to use as a file name.
#[must_use]
pub fn sanitize_file_stem(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | ' ' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('.').trim();
    if cleaned.is_empty() {
        "design".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_blob_create_and_revoke() {
        let blobs = BlobRegistry::new().expect("registry");
        let url = blobs.create(b"%PDF-1.3", "pdf").await.expect("create");
        assert!(url.starts_with("file://"));
        assert!(blobs.is_live(&url));

        let path = blobs.path_of(&url).expect("path");
        assert_eq!(std::fs::read(&path).expect("read"), b"%PDF-1.3");

        assert!(blobs.revoke(&url));
        assert!(!blobs.revoke(&url));
        assert!(!path.exists());
        assert_eq!(blobs.live_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_print_command_is_refused() {
        let host = SystemPrintHost::new("definitely-not-a-print-command-4821");
        let refused = host.open("file:///tmp/x.pdf").await;
        assert!(refused.is_err());
    }

    #[tokio::test]
    async fn test_write_download_sanitizes_name() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_download(dir.path(), "Shelf/Label: 1", b"pdf")
            .await
            .expect("write");
        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some("Shelf_Label_ 1.pdf")
        );
    }

    #[test]
    fn test_sanitize_file_stem() {
        assert_eq!(sanitize_file_stem("Jar labels"), "Jar labels");
        assert_eq!(sanitize_file_stem("../.."), "_");
        assert_eq!(sanitize_file_stem("   "), "design");
    }
}
