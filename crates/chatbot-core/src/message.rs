//! UI-agnostic conversation types
//!
//! These are shared by every front end (TUI, one-shot CLI) and don't depend on
//! any specific UI framework.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Counter-based message identifier, strictly increasing within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msg-{}", self.0)
    }
}

/// Who a message came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

/// A single entry in the conversation log.
///
/// Messages are only built by the session controller, which guarantees that
/// each one carries text, an attachment URI, or both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    id: MessageId,
    sender: Sender,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    attachment_uri: Option<String>,
    #[serde(default)]
    is_error: bool,
}

impl Message {
    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn sender(&self) -> Sender {
        self.sender
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn attachment_uri(&self) -> Option<&str> {
        self.attachment_uri.as_deref()
    }

    pub fn is_error(&self) -> bool {
        self.is_error
    }

    pub fn is_user(&self) -> bool {
        self.sender == Sender::User
    }
}

/// A message that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Draft {
    sender: Sender,
    text: Option<String>,
    attachment_uri: Option<String>,
    is_error: bool,
}

impl Draft {
    pub(crate) fn user(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            text: Some(text.into()),
            attachment_uri: None,
            is_error: false,
        }
    }

    pub(crate) fn bot(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::Bot,
            text: Some(text.into()),
            attachment_uri: None,
            is_error: false,
        }
    }

    pub(crate) fn bot_attachment(uri: impl Into<String>, caption: impl Into<String>) -> Self {
        Self {
            sender: Sender::Bot,
            text: Some(caption.into()),
            attachment_uri: Some(uri.into()),
            is_error: false,
        }
    }

    pub(crate) fn error(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::Bot,
            text: Some(text.into()),
            attachment_uri: None,
            is_error: true,
        }
    }

    pub(crate) fn into_message(self, id: MessageId) -> Message {
        Message {
            id,
            sender: self.sender,
            text: self.text,
            attachment_uri: self.attachment_uri,
            is_error: self.is_error,
        }
    }
}
