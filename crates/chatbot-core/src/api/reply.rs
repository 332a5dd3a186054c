//! Decoding of `/chat` and `/upload` response bodies.
//!
//! Servers in the wild disagree on field names, so decoding is lenient: a
//! missing field is `None`, never an error.

use serde_json::Value;

/// Reply to a text turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatReply {
    /// `llm_response`, else `response`; `None` when both are absent or empty
    pub text: Option<String>,
    /// Model name, when the server reports one
    pub model: Option<String>,
}

impl ChatReply {
    pub fn from_value(value: &Value) -> Self {
        let text = ["llm_response", "response"]
            .iter()
            .find_map(|key| value.get(*key).and_then(text_content));
        let model = value.get("model").and_then(non_empty_str);

        Self { text, model }
    }
}

/// Reply to an attachment upload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReply {
    /// Public URL of the stored file (images only)
    pub file_url: Option<String>,
    /// `original_filename`, else `filename`
    pub filename: Option<String>,
    pub content_type: Option<String>,
    /// Human-readable summary for files without a URL
    pub info: Option<String>,
}

impl UploadReply {
    pub fn from_value(value: &Value) -> Self {
        let field = |key: &str| value.get(key).and_then(non_empty_str);

        Self {
            file_url: field("file_url"),
            filename: field("original_filename").or_else(|| field("filename")),
            content_type: field("content_type"),
            info: field("info"),
        }
    }
}

fn non_empty_str(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// A reply is either a plain string or a list of content blocks
/// (`[{"type": "text", "text": "..."}]`), whose text parts are joined.
fn text_content(value: &Value) -> Option<String> {
    match value {
        Value::String(_) => non_empty_str(value),
        Value::Array(blocks) => {
            let parts: Vec<String> = blocks
                .iter()
                .filter_map(|block| match block {
                    Value::String(_) => non_empty_str(block),
                    Value::Object(_) => block.get("text").and_then(non_empty_str),
                    _ => None,
                })
                .collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join("\n"))
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn prefers_llm_response() {
        let reply = ChatReply::from_value(&json!({
            "status": "success",
            "llm_response": "hi there",
            "response": "ignored",
        }));
        assert_eq!(reply.text.as_deref(), Some("hi there"));
    }

    #[test]
    fn falls_back_to_response_when_llm_response_is_empty() {
        let reply = ChatReply::from_value(&json!({
            "llm_response": "  ",
            "response": "fallback",
            "model": "deepseek-r1:8b",
        }));
        assert_eq!(reply.text.as_deref(), Some("fallback"));
        assert_eq!(reply.model.as_deref(), Some("deepseek-r1:8b"));
    }

    #[test]
    fn joins_content_blocks() {
        let reply = ChatReply::from_value(&json!({
            "llm_response": [
                { "type": "text", "text": "first" },
                { "type": "image", "data": "..." },
                { "type": "text", "text": "second" },
            ]
        }));
        assert_eq!(reply.text.as_deref(), Some("first\nsecond"));
    }

    #[test]
    fn missing_reply_fields_are_none() {
        assert_eq!(ChatReply::from_value(&json!({ "status": "success" })), ChatReply::default());
        assert_eq!(ChatReply::from_value(&json!([1, 2, 3])), ChatReply::default());
    }

    #[test]
    fn upload_reply_accepts_both_filename_keys() {
        let original = UploadReply::from_value(&json!({
            "file_url": "https://x/img.png",
            "original_filename": "a.png",
        }));
        assert_eq!(original.filename.as_deref(), Some("a.png"));

        let plain = UploadReply::from_value(&json!({
            "filename": "b.pdf",
            "content_type": "application/pdf",
            "info": "File 'b.pdf' received and identified as application/pdf.",
        }));
        assert_eq!(
            plain,
            UploadReply {
                file_url: None,
                filename: Some("b.pdf".to_string()),
                content_type: Some("application/pdf".to_string()),
                info: Some("File 'b.pdf' received and identified as application/pdf.".to_string()),
            }
        );
    }
}
