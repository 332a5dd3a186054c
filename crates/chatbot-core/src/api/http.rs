use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::{ChatBackend, ChatReply, UploadReply};
use crate::attachment::FileRef;
use crate::config::Config;
use crate::error::{ChatError, Result};

#[derive(Serialize)]
struct ChatRequest<'a> {
    msg: &'a str,
}

/// reqwest-backed client for the chat server's `/chat` and `/upload` routes.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Client with the configured request timeout applied.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url: config.server_url().trim_end_matches('/').to_string(),
        })
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait::async_trait]
impl ChatBackend for HttpBackend {
    async fn chat(&self, text: &str) -> Result<ChatReply> {
        let url = format!("{}/chat", self.base_url);
        debug!(%url, "sending chat turn");

        let response = self
            .client
            .post(&url)
            .json(&ChatRequest { msg: text })
            .send()
            .await?;

        let body = read_json(response).await?;
        Ok(ChatReply::from_value(&body))
    }

    async fn upload(&self, file: &FileRef) -> Result<UploadReply> {
        let url = format!("{}/upload", self.base_url);

        let bytes = tokio::fs::read(&file.path)
            .await
            .map_err(|source| ChatError::Attachment {
                path: file.path.clone(),
                source,
            })?;
        debug!(%url, name = %file.name, size = bytes.len(), "uploading attachment");

        let part = Part::bytes(bytes)
            .file_name(file.name.clone())
            .mime_str(&file.mime_type)
            .map_err(|_| ChatError::InvalidContentType {
                name: file.name.clone(),
                mime: file.mime_type.clone(),
            })?;
        let form = Form::new().part("file", part);

        let response = self.client.post(&url).multipart(form).send().await?;

        let body = read_json(response).await?;
        Ok(UploadReply::from_value(&body))
    }
}

/// Check the status and parse the body as JSON.
async fn read_json(response: Response) -> Result<Value> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let detail = error_detail(&body).unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });
        return Err(ChatError::Status {
            status: status.as_u16(),
            detail,
        });
    }

    Ok(serde_json::from_str(&body)?)
}

/// Pull a diagnostic out of an error body: the JSON `detail` field when
/// present, otherwise the raw body text.
fn error_detail(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }

    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return Some(body.to_string());
    };

    match value.get("detail") {
        Some(Value::String(detail)) => Some(detail.clone()),
        // Validation errors come back as a list of {"loc", "msg", "type"}
        Some(Value::Array(items)) => {
            let msgs: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect();
            if msgs.is_empty() {
                Some(Value::Array(items.clone()).to_string())
            } else {
                Some(msgs.join("; "))
            }
        }
        Some(other) => Some(other.to_string()),
        None => Some(body.to_string()),
    }
}
