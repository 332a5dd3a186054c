//! File references handed to the session by a file-picker front end.

use crate::error::{ChatError, Result};
use std::io;
use std::path::{Path, PathBuf};

/// A file the user picked for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    /// Display name, sent as the multipart filename
    pub name: String,
    /// Where the bytes live
    pub path: PathBuf,
    pub mime_type: String,
}

impl FileRef {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, mime_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Build a reference from a local path, guessing the MIME type from the
    /// extension.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|source| ChatError::Attachment {
                path: path.to_path_buf(),
                source,
            })?;

        if !metadata.is_file() {
            return Err(ChatError::Attachment {
                path: path.to_path_buf(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
            });
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        Ok(Self::new(name, path, mime_type))
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

/// Source of files for `SessionController::attach_from`.
///
/// Implementations return `ChatError::Cancelled` when the user backs out, so
/// the session can tell a cancellation apart from a real failure.
#[async_trait::async_trait]
pub trait FilePicker: Send + Sync {
    async fn pick(&self) -> Result<FileRef>;
}

/// Picker backed by a path the user typed. An empty path means the user
/// dismissed the prompt.
#[derive(Debug, Clone, Default)]
pub struct PathPicker {
    path: Option<PathBuf>,
}

impl PathPicker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub fn cancelled() -> Self {
        Self { path: None }
    }

    /// Interpret raw prompt input, expanding a leading `~/`.
    pub fn from_input(input: &str) -> Self {
        let input = input.trim();
        if input.is_empty() {
            return Self::cancelled();
        }

        let path = match input.strip_prefix("~/") {
            Some(rest) => dirs::home_dir()
                .map(|home| home.join(rest))
                .unwrap_or_else(|| PathBuf::from(input)),
            None => PathBuf::from(input),
        };
        Self::new(path)
    }

    /// The typed path, or `None` for a dismissed prompt.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

#[async_trait::async_trait]
impl FilePicker for PathPicker {
    async fn pick(&self) -> Result<FileRef> {
        match &self.path {
            Some(path) => FileRef::from_path(path).await,
            None => Err(ChatError::Cancelled),
        }
    }
}
