//! Generative Language REST backend.

use super::backend::{BackendError, Credentials, GenerateResponse, GenerativeBackend, TextStream};
use crate::config::BackendConfig;
use crate::transcript::{Blob, Part, Role, Turn};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Serialize)]
struct ContentsRequest<'a> {
    contents: Vec<WireContent<'a>>,
}

#[derive(Serialize)]
struct WireContent<'a> {
    role: Role,
    parts: Vec<WirePart<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
enum WirePart<'a> {
    Text(&'a str),
    InlineData(&'a Blob),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CountTokensResponse {
    #[serde(default)]
    total_tokens: u64,
}

impl<'a> ContentsRequest<'a> {
    fn new(turns: &'a [Turn]) -> Self {
        let contents = turns
            .iter()
            .map(|turn| WireContent {
                role: turn.role,
                parts: turn
                    .parts
                    .iter()
                    .filter_map(|part| match part {
                        Part::Text(text) => Some(WirePart::Text(text)),
                        Part::InlineData(blob) => Some(WirePart::InlineData(blob)),
                        Part::Unrecognized(_) => None,
                    })
                    .collect(),
            })
            .collect();
        Self { contents }
    }
}

#[derive(Clone)]
pub struct GeminiBackend {
    client: Client,
    base_url: String,
}

impl GeminiBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| BackendError::Transport(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, model_id: &str, method: &str) -> String {
        let model = model_id.strip_prefix("models/").unwrap_or(model_id);
        format!("{}/models/{}:{}", self.base_url, model, method)
    }

    async fn post(
        &self,
        url: &str,
        credentials: &Credentials,
        contents: &[Turn],
    ) -> Result<Response, BackendError> {
        let response = self
            .client
            .post(url)
            .header(API_KEY_HEADER, &credentials.api_key)
            .header("Content-Type", "application/json")
            .json(&ContentsRequest::new(contents))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(status_error(status.as_u16(), &body))
    }
}

fn status_error(status: u16, body: &str) -> BackendError {
    if let Ok(feedback) = serde_json::from_str::<GenerateResponse>(body) {
        if let Some(reason) = feedback.block_reason() {
            return BackendError::Blocked(reason.to_string());
        }
    }

    let message = match status {
        401 => "Authentication failed - check your API key".to_string(),
        403 => "Access forbidden - insufficient permissions".to_string(),
        429 => "Rate limit exceeded - too many requests".to_string(),
        500..=599 => format!("Server error: {}", body),
        _ => format!("HTTP error: {}", body),
    };
    BackendError::Status { status, message }
}

/// Text carried by one SSE line, if any.
fn parse_sse_line(line: &str) -> Option<Result<String, BackendError>> {
    let data = line.trim().strip_prefix("data:")?.trim();
    if data.is_empty() || data == "[DONE]" {
        return None;
    }
    match serde_json::from_str::<GenerateResponse>(data) {
        Ok(chunk) => {
            if let Some(reason) = chunk.block_reason() {
                return Some(Err(BackendError::Blocked(reason.to_string())));
            }
            let text = chunk.text();
            (!text.is_empty()).then_some(Ok(text))
        }
        Err(e) => Some(Err(BackendError::Decode(e.to_string()))),
    }
}

/// Pumps an SSE byte stream into `tx`, one item per text-bearing line.
///
/// Bytes are buffered until a full line is available, so multi-byte
/// characters split across network chunks decode intact.
async fn forward_sse<S, B, E>(bytes: S, tx: mpsc::Sender<Result<String, BackendError>>)
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: fmt::Display,
{
    futures::pin_mut!(bytes);
    let mut buffer: Vec<u8> = Vec::new();

    while let Some(chunk) = bytes.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                warn!(error = %e, "Stream error");
                let _ = tx.send(Err(BackendError::Stream(e.to_string()))).await;
                return;
            }
        };
        buffer.extend_from_slice(chunk.as_ref());

        while let Some(pos) = buffer.iter().position(|&byte| byte == b'\n') {
            let line: Vec<u8> = buffer.drain(..=pos).collect();
            if !send_line(&tx, &line).await {
                debug!("Stream consumer went away");
                return;
            }
        }
    }

    if !buffer.is_empty() {
        send_line(&tx, &buffer).await;
    }
}

/// `false` once the receiver is gone.
async fn send_line(tx: &mpsc::Sender<Result<String, BackendError>>, line: &[u8]) -> bool {
    match parse_sse_line(&String::from_utf8_lossy(line)) {
        Some(item) => tx.send(item).await.is_ok(),
        None => true,
    }
}

#[async_trait]
impl GenerativeBackend for GeminiBackend {
    #[instrument(skip(self, credentials, contents), fields(model = %credentials.model_id))]
    async fn count_tokens(
        &self,
        credentials: &Credentials,
        contents: &[Turn],
    ) -> Result<u64, BackendError> {
        let url = self.endpoint(&credentials.model_id, "countTokens");
        let counted: CountTokensResponse =
            self.post(&url, credentials, contents).await?.json().await?;
        Ok(counted.total_tokens)
    }

    #[instrument(skip(self, credentials, contents), fields(model = %credentials.model_id))]
    async fn generate_content(
        &self,
        credentials: &Credentials,
        contents: &[Turn],
    ) -> Result<GenerateResponse, BackendError> {
        let url = self.endpoint(&credentials.model_id, "generateContent");
        let response = self.post(&url, credentials, contents).await?;
        Ok(response.json().await?)
    }

    #[instrument(skip(self, credentials, contents), fields(model = %credentials.model_id))]
    async fn stream_content(
        &self,
        credentials: &Credentials,
        contents: &[Turn],
    ) -> Result<TextStream, BackendError> {
        let url = format!(
            "{}?alt=sse",
            self.endpoint(&credentials.model_id, "streamGenerateContent")
        );
        let response = self.post(&url, credentials, contents).await?;
        let (tx, mut rx) = mpsc::channel(100);
        tokio::spawn(forward_sse(response.bytes_stream(), tx));

        let stream = futures::stream::poll_fn(move |cx| rx.poll_recv(cx));
        Ok(Box::pin(stream))
    }
}
