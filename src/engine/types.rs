//! Shared structs.

use crate::errors::ErrorClass;
use crate::llm::{GatewayError, TokenUsage};
use crate::preprocessing::EnvironmentContext;
use crate::protocol::{Classification, Tag};
use crate::transcript::{Entry, Turn};
use serde_json::{Map, Value};
use thiserror::Error;

/// One inbound chat request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatTurn {
    pub message: String,
    /// Caller-owned history, without the new message.
    pub history: Vec<Entry>,
    pub use_paid_tier: bool,
    pub context: EnvironmentContext,
}

/// Where the `<gen>` sub-protocol ended for one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionPhase {
    Normal,
    Resolving,
    SuccessAnnounced,
    FailureAnnounced,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatOutcome {
    /// `<r>` content of the reply, `"..."` when absent.
    pub response: String,
    /// History with the new user message, the raw model reply and any
    /// resolution notice pair appended. Caller items that are not turns
    /// stay where they were.
    pub history: Vec<Entry>,
    pub classification: Option<Classification>,
    pub visuals: Option<Map<String, Value>>,
    pub usage: TokenUsage,
    pub visuals_usage: Option<TokenUsage>,
    pub phase: ResolutionPhase,
}

/// Synthetic notice pair reporting a `<gen>` resolution to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Announcement {
    Success,
    Failure { detail: Option<String> },
}

impl Announcement {
    pub fn phase(&self) -> ResolutionPhase {
        match self {
            Announcement::Success => ResolutionPhase::SuccessAnnounced,
            Announcement::Failure { .. } => ResolutionPhase::FailureAnnounced,
        }
    }

    /// User-role system notice followed by the model's acknowledgement.
    pub fn turns(&self) -> [Turn; 2] {
        let (notice, ack) = match self {
            Announcement::Success => (
                "System notice: the requested visuals were generated successfully and are \
                 already on the user's screen. Use them as reference while the conversation \
                 continues."
                    .to_string(),
                "Understood. If the user cannot see the visuals I will ask them to reload the page.",
            ),
            Announcement::Failure { detail } => (
                format!(
                    "System notice: generating the requested visuals failed{}. Tell the user \
                     and continue the conversation; do not request another generation until \
                     they ask again.",
                    detail
                        .as_deref()
                        .map(|detail| format!(" ({})", detail))
                        .unwrap_or_default()
                ),
                "Understood. I will let the user know the visuals could not be generated and carry on.",
            ),
        };
        [
            Turn::user(Tag::Guidance.wrap(&notice)),
            Turn::model(Tag::GuidanceReply.wrap(ack)),
        ]
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChatError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl ChatError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ChatError::Gateway(e) => e.class(),
        }
    }
}
