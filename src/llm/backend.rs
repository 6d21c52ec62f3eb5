//! The generative backend capability consumed by the gateway.

use crate::transcript::{Part, Turn};
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Incremental text chunks of a streamed completion.
pub type TextStream = BoxStream<'static, Result<String, BackendError>>;

const CHARS_PER_TOKEN: f64 = 3.5;
const TOKENS_PER_ATTACHMENT: f64 = 258.0;

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub model_id: String,
    pub api_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("model_id", &self.model_id)
            .finish_non_exhaustive()
    }
}

/// Backend-specific failures. Never shown to callers; the gateway logs them
/// and replaces them with a generic [`GatewayError`](super::GatewayError).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Prompt blocked: {0}")]
    Blocked(String),
    #[error("Failed to decode backend response: {0}")]
    Decode(String),
    #[error("Stream interrupted: {0}")]
    Stream(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            BackendError::Transport("Request timeout - the API took too long to respond".into())
        } else if e.is_connect() {
            BackendError::Transport("Connection error - unable to reach the API".into())
        } else if e.is_decode() {
            BackendError::Decode(e.to_string())
        } else {
            BackendError::Transport(format!("Network error: {}", e))
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponsePart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

impl Candidate {
    /// Any finish reason other than a normal stop.
    pub fn abnormal_finish(&self) -> Option<&str> {
        self.finish_reason
            .as_deref()
            .filter(|reason| !reason.eq_ignore_ascii_case("STOP"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    #[serde(default)]
    pub block_reason: Option<String>,
}

/// One non-streamed completion, or one chunk of a streamed one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    /// Direct text, for backends that return it flat.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_feedback: Option<PromptFeedback>,
}

impl GenerateResponse {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    /// Direct text when present, else the text segments of the first
    /// candidate concatenated.
    pub fn text(&self) -> String {
        if let Some(text) = &self.text {
            return text.clone();
        }
        self.candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|part| part.text.as_deref())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn block_reason(&self) -> Option<&str> {
        self.prompt_feedback
            .as_ref()
            .and_then(|feedback| feedback.block_reason.as_deref())
    }

    pub fn abnormal_finish(&self) -> Option<&str> {
        self.candidates.first().and_then(Candidate::abnormal_finish)
    }
}

#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Input token count for `contents`. Backends without a counting
    /// endpoint fall back to a character-based estimate.
    async fn count_tokens(
        &self,
        _credentials: &Credentials,
        contents: &[Turn],
    ) -> Result<u64, BackendError> {
        Ok(approximate_tokens(contents))
    }

    async fn generate_content(
        &self,
        credentials: &Credentials,
        contents: &[Turn],
    ) -> Result<GenerateResponse, BackendError>;

    async fn stream_content(
        &self,
        credentials: &Credentials,
        contents: &[Turn],
    ) -> Result<TextStream, BackendError>;
}

/// Roughly 3.5 characters per token for text, 258 tokens per attachment.
pub fn approximate_tokens(contents: &[Turn]) -> u64 {
    let estimate: f64 = contents
        .iter()
        .flat_map(|turn| turn.parts.iter())
        .map(|part| match part {
            Part::Text(text) => text.chars().count() as f64 / CHARS_PER_TOKEN,
            Part::InlineData(_) => TOKENS_PER_ATTACHMENT,
            Part::Unrecognized(_) => 0.0,
        })
        .sum();
    estimate.round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::{Blob, Role};
    use serde_json::json;

    #[test]
    fn text_prefers_direct_field_then_first_candidate() {
        let response: GenerateResponse = serde_json::from_value(json!({
            "candidates": [
                {
                    "content": {"parts": [{"text": "Hello "}, {"text": "farmer"}]},
                    "finishReason": "STOP"
                },
                {"content": {"parts": [{"text": "ignored"}]}}
            ]
        }))
        .unwrap();
        assert_eq!(response.text(), "Hello farmer");
        assert_eq!(response.abnormal_finish(), None);
        assert_eq!(GenerateResponse::from_text("flat").text(), "flat");
    }

    #[test]
    fn metadata_exposes_block_and_finish_reasons() {
        let response: GenerateResponse = serde_json::from_value(json!({
            "candidates": [{"finishReason": "SAFETY"}],
            "promptFeedback": {"blockReason": "OTHER"}
        }))
        .unwrap();
        assert_eq!(response.text(), "");
        assert_eq!(response.block_reason(), Some("OTHER"));
        assert_eq!(response.abnormal_finish(), Some("SAFETY"));
    }

    #[test]
    fn approximation_counts_text_and_attachments() {
        let contents = vec![
            Turn::user("a".repeat(35)),
            Turn::new(
                Role::User,
                vec![Part::InlineData(Blob {
                    mime_type: "image/png".into(),
                    data: "AAA".into(),
                })],
            ),
        ];
        assert_eq!(approximate_tokens(&contents), 10 + 258);
        assert_eq!(approximate_tokens(&[]), 0);
    }

    #[test]
    fn credentials_debug_hides_key() {
        let credentials = Credentials {
            model_id: "m".into(),
            api_key: "secret".into(),
        };
        assert!(!format!("{:?}", credentials).contains("secret"));
    }
}
