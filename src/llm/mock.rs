//! In-memory backend for tests: replays queued replies and records every
//! transcript it receives.

use super::backend::{
    approximate_tokens, BackendError, Credentials, GenerateResponse, GenerativeBackend, TextStream,
};
use crate::transcript::Turn;
use async_trait::async_trait;
use futures::stream;
use std::collections::VecDeque;
use std::sync::Mutex;

pub enum ScriptedReply {
    Response(GenerateResponse),
    Failure(BackendError),
}

#[derive(Default)]
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<ScriptedReply>>,
    calls: Mutex<Vec<Vec<Turn>>>,
    models: Mutex<Vec<String>>,
    failing_token_counts: bool,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let backend = Self::new();
        for reply in replies {
            backend.push_text(reply);
        }
        backend
    }

    pub fn failing_token_counts(mut self) -> Self {
        self.failing_token_counts = true;
        self
    }

    pub fn push(&self, reply: ScriptedReply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn push_text(&self, text: impl Into<String>) {
        self.push(ScriptedReply::Response(GenerateResponse::from_text(text)));
    }

    pub fn push_failure(&self, error: BackendError) {
        self.push(ScriptedReply::Failure(error));
    }

    /// Every transcript sent to `generate_content`/`stream_content`, in order.
    pub fn calls(&self) -> Vec<Vec<Turn>> {
        self.calls.lock().unwrap().clone()
    }

    /// Model id of every generation call, in order.
    pub fn models(&self) -> Vec<String> {
        self.models.lock().unwrap().clone()
    }

    fn next(
        &self,
        credentials: &Credentials,
        contents: &[Turn],
    ) -> Result<GenerateResponse, BackendError> {
        self.calls.lock().unwrap().push(contents.to_vec());
        self.models.lock().unwrap().push(credentials.model_id.clone());
        match self.replies.lock().unwrap().pop_front() {
            Some(ScriptedReply::Response(response)) => Ok(response),
            Some(ScriptedReply::Failure(error)) => Err(error),
            None => Err(BackendError::Transport("no scripted reply left".into())),
        }
    }
}

#[async_trait]
impl GenerativeBackend for ScriptedBackend {
    async fn count_tokens(
        &self,
        _credentials: &Credentials,
        contents: &[Turn],
    ) -> Result<u64, BackendError> {
        if self.failing_token_counts {
            return Err(BackendError::Status {
                status: 503,
                message: "token counter unavailable".into(),
            });
        }
        Ok(approximate_tokens(contents))
    }

    async fn generate_content(
        &self,
        credentials: &Credentials,
        contents: &[Turn],
    ) -> Result<GenerateResponse, BackendError> {
        self.next(credentials, contents)
    }

    async fn stream_content(
        &self,
        credentials: &Credentials,
        contents: &[Turn],
    ) -> Result<TextStream, BackendError> {
        let text = self.next(credentials, contents)?.text();
        let chunks: Vec<Result<String, BackendError>> = text
            .split_inclusive(' ')
            .map(|chunk| Ok(chunk.to_string()))
            .collect();
        Ok(Box::pin(stream::iter(chunks)))
    }
}
