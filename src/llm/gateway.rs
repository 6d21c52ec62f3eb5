use super::backend::{Credentials, GenerativeBackend, TextStream};
use super::sanitize::Content;
use super::{BackendError, GatewayError, TokenUsage};
use crate::config::ModelConfig;
use crate::transcript::Turn;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// A fully resolved completion.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub usage: TokenUsage,
}

pub enum Invocation {
    Complete(Completion),
    /// Live response; the caller consumes it.
    Streaming { stream: TextStream, input_tokens: u64 },
}

impl std::fmt::Debug for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Invocation::Complete(completion) => {
                f.debug_tuple("Complete").field(completion).finish()
            }
            Invocation::Streaming { input_tokens, .. } => f
                .debug_struct("Streaming")
                .field("input_tokens", input_tokens)
                .finish_non_exhaustive(),
        }
    }
}

/// Single entry point to the generative backend. No retries.
#[derive(Clone)]
pub struct ModelGateway {
    backend: Arc<dyn GenerativeBackend>,
}

impl ModelGateway {
    pub fn new(backend: Arc<dyn GenerativeBackend>) -> Self {
        Self { backend }
    }

    #[instrument(skip(self, content, model), fields(model = ?model.model_id))]
    pub async fn invoke(
        &self,
        content: Content,
        model: &ModelConfig,
        stream: bool,
    ) -> Result<Invocation, GatewayError> {
        let credentials = model.credentials().map_err(|e| {
            error!(error = %e, "Refusing to call the AI model");
            e
        })?;

        let contents = content.normalize();
        if contents.is_empty() {
            warn!("No valid content to send to the AI model");
            return Err(GatewayError::EmptyContent);
        }

        let input_tokens = self.estimate(&credentials, &contents).await;
        info!(model = %credentials.model_id, stream, input_tokens, "Calling AI model");

        if stream {
            let stream = self
                .backend
                .stream_content(&credentials, &contents)
                .await
                .map_err(|e| backend_failure(&credentials, e))?;
            return Ok(Invocation::Streaming {
                stream,
                input_tokens,
            });
        }

        let response = self
            .backend
            .generate_content(&credentials, &contents)
            .await
            .map_err(|e| backend_failure(&credentials, e))?;

        let text = response.text();
        if text.is_empty() {
            warn!(model = %credentials.model_id, "AI response was empty or inaccessible");
            if let Some(reason) = response.block_reason() {
                error!(reason, "AI response blocked");
                return Err(GatewayError::Blocked(reason.to_string()));
            }
            if let Some(reason) = response.abnormal_finish() {
                error!(reason, "AI generation finished abnormally");
                return Err(GatewayError::AbnormalFinish(reason.to_string()));
            }
            return Err(GatewayError::EmptyResponse);
        }

        let output_tokens = self.estimate(&credentials, &[Turn::model(text.as_str())]).await;
        info!(
            model = %credentials.model_id,
            input_tokens,
            output_tokens,
            "AI model call succeeded"
        );

        Ok(Invocation::Complete(Completion {
            text,
            usage: TokenUsage::new(input_tokens, output_tokens),
        }))
    }

    /// Non-streaming [`invoke`](Self::invoke).
    pub async fn complete(
        &self,
        content: impl Into<Content>,
        model: &ModelConfig,
    ) -> Result<Completion, GatewayError> {
        match self.invoke(content.into(), model, false).await? {
            Invocation::Complete(completion) => Ok(completion),
            Invocation::Streaming { .. } => Err(GatewayError::Unavailable),
        }
    }

    async fn estimate(&self, credentials: &Credentials, contents: &[Turn]) -> u64 {
        match self.backend.count_tokens(credentials, contents).await {
            Ok(count) => {
                debug!(count, "Estimated tokens");
                count
            }
            Err(e) => {
                warn!(model = %credentials.model_id, error = %e, "Could not estimate tokens");
                0
            }
        }
    }
}

fn backend_failure(credentials: &Credentials, e: BackendError) -> GatewayError {
    error!(model = %credentials.model_id, error = %e, "AI model call failed");
    match e {
        BackendError::Blocked(_) => GatewayError::PromptBlocked,
        _ => GatewayError::Unavailable,
    }
}
