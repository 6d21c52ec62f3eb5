//! Public façade for the engine layer.

pub mod orchestrator;
pub mod types;

pub use orchestrator::{ChatOrchestrator, MISSING_REPLY};
pub use types::{Announcement, ChatError, ChatOutcome, ChatTurn, ResolutionPhase};

#[cfg(test)]
mod tests;
