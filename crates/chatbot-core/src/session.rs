//! The conversation session: an append-only message log plus a single-flight
//! `busy` flag, driven by two operations (`send_text`, `send_attachment`).
//!
//! Every turn follows the same shape:
//!
//! 1. append the user's message and set `busy` in one state change,
//! 2. await exactly one backend call,
//! 3. append the reply, or an error notice, and clear `busy` in one state change.
//!
//! Sends issued while a turn is pending are rejected, never queued. `busy` is
//! cleared on every exit path, including the turn's future being dropped.
//!
//! State is published through a [`tokio::sync::watch`] channel so a UI can
//! re-render on each change; the channel's lock is never held across an await.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::{ChatBackend, UploadReply};
use crate::attachment::{FileRef, FilePicker};
use crate::error::ChatError;
use crate::message::{Draft, Message, MessageId};

/// Shown when the server answered but carried no reply text.
pub const REPLY_PLACEHOLDER: &str = "Sorry, the response could not be processed.";

/// Read-only view of a session, as seen by subscribers.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    messages: Vec<Message>,
    busy: bool,
    next_id: u64,
}

impl SessionState {
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    fn append(&mut self, draft: Draft) -> MessageId {
        let id = MessageId(self.next_id);
        self.next_id += 1;
        self.messages.push(draft.into_message(id));
        id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Another turn is still pending
    Busy,
    /// Input was empty after trimming
    EmptyInput,
}

/// How a send operation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// A bot reply was appended
    Replied,
    /// An error notice was appended
    Failed,
    /// The user backed out; nothing was appended for the failure
    Cancelled,
    /// Nothing happened
    Rejected(RejectReason),
}

/// Owns the conversation log and mediates every call to the chat server.
///
/// Cloning is cheap and all clones share the same session, so a front end can
/// hand a clone to a spawned task and keep rendering from another.
pub struct SessionController<B> {
    backend: Arc<B>,
    state: Arc<watch::Sender<SessionState>>,
}

impl<B> Clone for SessionController<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            state: Arc::clone(&self.state),
        }
    }
}

impl<B: ChatBackend> SessionController<B> {
    pub fn new(backend: B) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self {
            backend: Arc::new(backend),
            state: Arc::new(state),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Receiver that is notified once per state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Copy of the current log.
    pub fn messages(&self) -> Vec<Message> {
        self.state.borrow().messages.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.state.borrow().busy
    }

    /// Send one text turn. Whitespace-only input and calls made while busy
    /// are no-ops.
    pub async fn send_text(&self, input: &str) -> TurnOutcome {
        let text = input.trim();
        if text.is_empty() {
            return TurnOutcome::Rejected(RejectReason::EmptyInput);
        }

        let Some(turn) = self.begin(Draft::user(text)) else {
            debug!("send_text ignored: a turn is already pending");
            return TurnOutcome::Rejected(RejectReason::Busy);
        };
        info!(chars = text.chars().count(), "chat turn started");

        match self.backend.chat(text).await {
            Ok(reply) => {
                if reply.text.is_none() {
                    warn!("chat reply carried no text, using placeholder");
                }
                if let Some(model) = &reply.model {
                    debug!(%model, "reply model");
                }
                let text = reply.text.unwrap_or_else(|| REPLY_PLACEHOLDER.to_string());
                turn.finish(Some(Draft::bot(text)));
                info!("chat turn finished");
                TurnOutcome::Replied
            }
            Err(err) => turn.fail(err),
        }
    }

    /// Upload one file. Calls made while busy are no-ops.
    pub async fn send_attachment(&self, file: FileRef) -> TurnOutcome {
        let Some(turn) = self.begin(Draft::user(format!("Sending file: {}", file.name))) else {
            debug!(name = %file.name, "send_attachment ignored: a turn is already pending");
            return TurnOutcome::Rejected(RejectReason::Busy);
        };
        info!(name = %file.name, mime = %file.mime_type, "upload turn started");

        match self.backend.upload(&file).await {
            Ok(reply) => {
                turn.finish(Some(upload_draft(reply, &file)));
                info!(name = %file.name, "upload turn finished");
                TurnOutcome::Replied
            }
            Err(err) => turn.fail(err),
        }
    }

    /// Ask `picker` for a file, then upload it.
    ///
    /// While busy the picker isn't consulted at all. A picker cancellation
    /// leaves the log untouched. `busy` is only claimed once the file is in
    /// hand, so a turn started during the pick makes this return
    /// `Rejected(Busy)` and the file is not sent.
    pub async fn attach_from<P: FilePicker + ?Sized>(&self, picker: &P) -> TurnOutcome {
        if self.is_busy() {
            return TurnOutcome::Rejected(RejectReason::Busy);
        }

        match picker.pick().await {
            Ok(file) => self.send_attachment(file).await,
            Err(err) if err.is_cancelled() => {
                debug!("file picker dismissed");
                TurnOutcome::Cancelled
            }
            Err(err) => {
                warn!(error = %err, "file picker failed");
                let appended = self.state.send_if_modified(|state| {
                    if state.busy {
                        return false;
                    }
                    state.append(Draft::error(format!("Error: {err}")));
                    true
                });
                if appended {
                    TurnOutcome::Failed
                } else {
                    TurnOutcome::Rejected(RejectReason::Busy)
                }
            }
        }
    }

    /// Append the user's message and flip `busy` in one step, unless a turn
    /// is already pending.
    fn begin(&self, announce: Draft) -> Option<PendingTurn> {
        let started = self.state.send_if_modified(|state| {
            if state.busy {
                return false;
            }
            state.append(announce);
            state.busy = true;
            true
        });

        started.then(|| PendingTurn {
            state: Arc::clone(&self.state),
            finished: false,
        })
    }
}

fn upload_draft(reply: UploadReply, file: &FileRef) -> Draft {
    let name = reply.filename.as_deref().unwrap_or(&file.name);
    match reply.file_url {
        Some(url) => {
            let is_image = match reply.content_type.as_deref() {
                Some(mime) => mime.starts_with("image/"),
                None => file.is_image(),
            };
            let caption = if is_image {
                format!("Image: {name}")
            } else {
                format!("File: {name}")
            };
            Draft::bot_attachment(url, caption)
        }
        None => Draft::bot(
            reply
                .info
                .unwrap_or_else(|| format!("File '{name}' received.")),
        ),
    }
}

/// Handle for an in-flight turn. Clears `busy` when finished or dropped.
struct PendingTurn {
    state: Arc<watch::Sender<SessionState>>,
    finished: bool,
}

impl PendingTurn {
    fn finish(mut self, draft: Option<Draft>) {
        self.state.send_modify(|state| {
            if let Some(draft) = draft {
                state.append(draft);
            }
            state.busy = false;
        });
        self.finished = true;
    }

    fn fail(self, err: ChatError) -> TurnOutcome {
        if err.is_cancelled() {
            debug!("turn cancelled by user");
            self.finish(None);
            return TurnOutcome::Cancelled;
        }

        warn!(error = %err, "turn failed");
        self.finish(Some(Draft::error(format!("Error: {err}"))));
        TurnOutcome::Failed
    }
}

impl Drop for PendingTurn {
    fn drop(&mut self) {
        if !self.finished {
            self.state.send_modify(|state| state.busy = false);
        }
    }
}
