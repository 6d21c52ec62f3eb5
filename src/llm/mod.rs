//! # Model gateway
//!
//! Everything that talks to the generative backend goes through here.
//!
//! ```text
//! Content → sanitize → count tokens → backend.generate → resolve text → Completion
//! ```
//!
//! - `backend`: the [`GenerativeBackend`] capability and its response shapes
//! - `gemini`: the REST implementation used in production
//! - `sanitize`: outbound content normalization
//! - `gateway`: [`ModelGateway`], error normalization and token accounting

pub mod backend;
pub mod gateway;
pub mod gemini;
pub mod sanitize;

#[cfg(test)]
pub(crate) mod mock;

pub use backend::{
    approximate_tokens, BackendError, Credentials, GenerateResponse, GenerativeBackend, TextStream,
};
pub use gateway::{Completion, Invocation, ModelGateway};
pub use gemini::GeminiBackend;
pub use sanitize::Content;

use crate::errors::ErrorClass;
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign};
use thiserror::Error;

/// Caller-visible gateway failures.
///
/// Display strings are safe to show to end users; the underlying backend
/// cause is only logged.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    #[error("AI service API key not configured")]
    MissingCredential,
    #[error("AI service model name not configured")]
    MissingModel,
    #[error("No valid content to send")]
    EmptyContent,
    #[error("AI response blocked due to: {0}")]
    Blocked(String),
    #[error("AI generation issue: {0}")]
    AbnormalFinish(String),
    #[error("AI response was empty")]
    EmptyResponse,
    #[error("AI request blocked by safety filters")]
    PromptBlocked,
    #[error("AI service encountered an unexpected error")]
    Unavailable,
}

impl GatewayError {
    pub fn class(&self) -> ErrorClass {
        match self {
            GatewayError::MissingCredential | GatewayError::MissingModel => {
                ErrorClass::Configuration
            }
            GatewayError::EmptyContent => ErrorClass::Format,
            _ => ErrorClass::Backend,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }
}

impl Add for TokenUsage {
    type Output = TokenUsage;

    fn add(self, other: TokenUsage) -> TokenUsage {
        TokenUsage {
            input_tokens: self.input_tokens + other.input_tokens,
            output_tokens: self.output_tokens + other.output_tokens,
        }
    }
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, other: TokenUsage) {
        *self = *self + other;
    }
}
