pub mod api;
pub mod attachment;
pub mod config;
pub mod error;
pub mod message;
pub mod session;

// Re-export main types for convenience
pub use api::{ChatBackend, ChatReply, HttpBackend, UploadReply};
pub use attachment::{FilePicker, FileRef, PathPicker};
pub use config::Config;
pub use error::{ChatError, Result};
pub use message::{Message, MessageId, Sender};
pub use session::{RejectReason, SessionController, SessionState, TurnOutcome, REPLY_PLACEHOLDER};
