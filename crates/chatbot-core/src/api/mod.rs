pub mod http;
pub mod reply;

pub use http::HttpBackend;
pub use reply::{ChatReply, UploadReply};

use crate::attachment::FileRef;
use crate::error::Result;

/// The two server operations a session depends on.
#[async_trait::async_trait]
pub trait ChatBackend: Send + Sync {
    /// `POST /chat` with the user's text.
    async fn chat(&self, text: &str) -> Result<ChatReply>;
    /// `POST /upload` with a single file part.
    async fn upload(&self, file: &FileRef) -> Result<UploadReply>;
}

#[async_trait::async_trait]
impl<T: ChatBackend + ?Sized> ChatBackend for std::sync::Arc<T> {
    async fn chat(&self, text: &str) -> Result<ChatReply> {
        (**self).chat(text).await
    }

    async fn upload(&self, file: &FileRef) -> Result<UploadReply> {
        (**self).upload(file).await
    }
}
