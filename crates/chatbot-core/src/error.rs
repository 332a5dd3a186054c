use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, ChatError>;

/// Everything that can go wrong during a turn.
///
/// The session controller turns all of these into error messages in the log,
/// except `Cancelled`, which is dropped silently.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("could not reach the chat server: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server returned {status}: {detail}")]
    Status { status: u16, detail: String },
    #[error("malformed response from server: {0}")]
    MalformedPayload(#[from] serde_json::Error),
    #[error("could not read attachment {}: {source}", .path.display())]
    Attachment {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("attachment {name} has an invalid content type {mime:?}")]
    InvalidContentType { name: String, mime: String },
    /// The user backed out (e.g. closed the file picker).
    #[error("cancelled")]
    Cancelled,
}

impl ChatError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ChatError::Cancelled)
    }
}
