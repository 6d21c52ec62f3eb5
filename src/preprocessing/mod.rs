//! Outbound turn construction.
//!
//! Wraps the newest user turn in protocol tags, attaches the environment
//! clause and primes the transcript with the advisor persona.

pub mod cleaner;
pub mod context;

pub use cleaner::{Cleaner, CleanerError};
pub use context::{EnvironmentContext, NO_CONTEXT};

use crate::personalities::{PrimingPair, FARM_ADVISOR};
use crate::protocol::Tag;
use crate::transcript::{Entry, Part, Role};
use tracing::debug;

/// Asks the model for `<cls>`. Only ever attached to the terminal turn.
pub const CLASSIFY_REQUEST: &str = "Classify the overall chat direction at this point (FI/MF/GT).";

pub struct ContextInjector {
    persona: PrimingPair,
}

impl Default for ContextInjector {
    fn default() -> Self {
        Self::new(FARM_ADVISOR)
    }
}

impl ContextInjector {
    pub fn new(persona: PrimingPair) -> Self {
        Self { persona }
    }

    /// Returns the transcript to send; `transcript` itself is not touched.
    ///
    /// An empty transcript is returned empty. Without any user turn the
    /// copy is only primed. Items that are not turns are carried along for
    /// the gateway to drop.
    pub fn build(&self, transcript: &[Entry], context: &EnvironmentContext) -> Vec<Entry> {
        if transcript.is_empty() {
            return Vec::new();
        }

        let mut entries = transcript.to_vec();
        let last_user = entries.iter().rposition(|entry| {
            entry
                .as_turn()
                .is_some_and(|turn| turn.role == Role::User)
        });

        if let Some(index) = last_user {
            let terminal = index == entries.len() - 1;
            let mut tags = Tag::Guidance.wrap(&format!("System Context: {}", context.clause()));
            if terminal {
                tags.push_str(&Tag::Guidance.wrap(CLASSIFY_REQUEST));
            }
            debug!(index, terminal, "Injecting context into user turn");

            if let Some(turn) = entries[index].as_turn_mut() {
                match turn.first_text_index() {
                    Some(part) => {
                        if let Part::Text(original) = &turn.parts[part] {
                            let wrapped = format!("{}{}", Tag::Prompt.wrap(original), tags);
                            turn.parts[part] = Part::Text(wrapped);
                        }
                    }
                    None => turn.parts.push(Part::Text(tags)),
                }
            }
        }

        self.persona
            .turns()
            .into_iter()
            .map(Entry::from)
            .chain(entries)
            .collect()
    }
}
