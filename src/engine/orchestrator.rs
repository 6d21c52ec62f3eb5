//! High-level coordinator: inject → model → decode → resolve `<gen>`.

use super::types::{Announcement, ChatError, ChatOutcome, ChatTurn, ResolutionPhase};
use crate::config::Config;
use crate::llm::ModelGateway;
use crate::preprocessing::ContextInjector;
use crate::protocol::{TaggedDocument, CHAT_TAGS};
use crate::schedule::ScheduleResolver;
use crate::transcript::{Entry, Turn};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Reply used when the model omits `<r>`.
pub const MISSING_REPLY: &str = "...";

#[derive(Clone)]
pub struct ChatOrchestrator {
    gateway: ModelGateway,
    injector: Arc<ContextInjector>,
    resolver: ScheduleResolver,
    config: Arc<Config>,
}

impl ChatOrchestrator {
    pub fn new(gateway: ModelGateway, config: Arc<Config>) -> Self {
        let resolver = ScheduleResolver::new(gateway.clone(), config.accessory.clone());
        Self {
            gateway,
            injector: Arc::new(ContextInjector::default()),
            resolver,
            config,
        }
    }

    /// Drive one conversational turn.
    #[instrument(
        skip(self, turn),
        fields(request_id = %Uuid::new_v4(), paid = turn.use_paid_tier)
    )]
    pub async fn respond(&self, turn: ChatTurn) -> Result<ChatOutcome, ChatError> {
        let ChatTurn {
            message,
            mut history,
            use_paid_tier,
            context,
        } = turn;

        history.push(Turn::user(message).into());
        let outbound = self.injector.build(&history, &context);

        let completion = self
            .gateway
            .complete(outbound, self.config.chat_model(use_paid_tier))
            .await?;

        let document = TaggedDocument::decode(&completion.text, &CHAT_TAGS);
        history.push(Turn::model(completion.text.as_str()).into());

        let mut phase = ResolutionPhase::Normal;
        let mut visuals = None;
        let mut visuals_usage = None;

        if let Some(directive) = document.directive() {
            phase = ResolutionPhase::Resolving;
            debug!(?phase, directive, "Generation directive detected");

            let announcement = match self.resolver.resolve(directive).await {
                Ok(result) => {
                    visuals = Some(result.data);
                    visuals_usage = Some(result.usage);
                    Announcement::Success
                }
                Err(e) => {
                    warn!(error = %e, class = ?e.class(), "Visuals generation failed");
                    Announcement::Failure {
                        detail: e.notice_detail(),
                    }
                }
            };

            history.extend(announcement.turns().into_iter().map(Entry::from));
            phase = announcement.phase();
        }

        let classification = document.classification();
        info!(
            ?classification,
            ?phase,
            input_tokens = completion.usage.input_tokens,
            output_tokens = completion.usage.output_tokens,
            "Chat turn complete"
        );

        Ok(ChatOutcome {
            response: document.reply().unwrap_or(MISSING_REPLY).to_string(),
            history,
            classification,
            visuals,
            usage: completion.usage,
            visuals_usage,
            phase,
        })
    }
}
