//! Turns a `<gen>` directive into structured visuals data through a nested
//! call to the generation persona.

pub mod literal;

use crate::config::ModelConfig;
use crate::errors::{ErrorClass, FormatError};
use crate::llm::{GatewayError, ModelGateway, TokenUsage};
use crate::personalities::{PrimingPair, VISUALS_GENERATOR};
use crate::protocol::{decode_tag, GenerationDirective, Tag};
use crate::transcript::Turn;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{error, info, instrument, warn};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScheduleError {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl ScheduleError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ScheduleError::Format(e) => e.class(),
            ScheduleError::Gateway(e) => e.class(),
        }
    }

    /// Detail that may be relayed to the model in a failure notice.
    /// Format errors stay internal.
    pub fn notice_detail(&self) -> Option<String> {
        match self {
            ScheduleError::Gateway(e) => Some(e.to_string()),
            ScheduleError::Format(_) => None,
        }
    }
}

/// Decoded `<data>` object plus the usage of the call that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleResult {
    pub data: Map<String, Value>,
    pub usage: TokenUsage,
}

#[derive(Clone)]
pub struct ScheduleResolver {
    gateway: ModelGateway,
    model: ModelConfig,
    persona: PrimingPair,
}

impl ScheduleResolver {
    pub fn new(gateway: ModelGateway, model: ModelConfig) -> Self {
        Self {
            gateway,
            model,
            persona: VISUALS_GENERATOR,
        }
    }

    /// Parses the raw `<gen>` payload, then resolves it. Arity errors never
    /// reach the backend.
    #[instrument(skip(self))]
    pub async fn resolve(&self, raw_directive: &str) -> Result<ScheduleResult, ScheduleError> {
        let directive: GenerationDirective = raw_directive.parse().map_err(|e: FormatError| {
            error!(error = %e, "Invalid generation directive");
            e
        })?;
        self.resolve_directive(&directive).await
    }

    pub async fn resolve_directive(
        &self,
        directive: &GenerationDirective,
    ) -> Result<ScheduleResult, ScheduleError> {
        info!(
            crop = %directive.crop_name,
            generation_type = %directive.generation_type,
            kind = ?directive.kind(),
            "Requesting visuals data"
        );

        let transcript = self.persona.prime([Turn::user(directive.summary())]);
        let completion = self
            .gateway
            .complete(transcript, &self.model)
            .await
            .map_err(|e| {
                warn!(error = %e, "Visuals generation call failed");
                e
            })?;

        let payload = decode_tag(&completion.text, Tag::Data).filter(|data| !data.is_empty());
        let Some(payload) = payload else {
            error!(reply_len = completion.text.len(), "Generation reply has no <data> tag");
            return Err(FormatError::MissingDataTag.into());
        };

        let data = literal::parse_object(&payload).map_err(|e| {
            error!(error = %e, "Failed to parse <data> payload");
            e
        })?;
        info!(keys = data.len(), "Parsed visuals data");

        Ok(ScheduleResult {
            data,
            usage: completion.usage,
        })
    }
}
