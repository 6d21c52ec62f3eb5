//! Persona priming pairs.
//!
//! Each persona is a fixed instruction/acknowledgement exchange prepended to
//! what the model sees. Priming turns are never returned to callers.

use crate::transcript::Turn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimingPair {
    pub name: &'static str,
    pub instruction: &'static str,
    pub acknowledgment: &'static str,
}

impl PrimingPair {
    pub fn turns(&self) -> [Turn; 2] {
        [Turn::user(self.instruction), Turn::model(self.acknowledgment)]
    }

    /// Priming pair followed by `transcript`.
    pub fn prime(&self, transcript: impl IntoIterator<Item = Turn>) -> Vec<Turn> {
        self.turns().into_iter().chain(transcript).collect()
    }
}

/// Conversational farming advisor speaking the tag protocol.
pub const FARM_ADVISOR: PrimingPair = PrimingPair {
    name: "farm_advisor",
    instruction: include_str!("farm_advisor.md"),
    acknowledgment: "Understood. As Oscar I will give farmers clear, practical guidance \
        that fits their location, soil readings and season, keep every answer short and \
        easy to follow, and follow the tag protocol on every reply.",
};

/// Structured schedule/timeline generator answering in a `<data>` tag.
pub const VISUALS_GENERATOR: PrimingPair = PrimingPair {
    name: "visuals_generator",
    instruction: include_str!("visuals_generator.md"),
    acknowledgment: "Understood. Send me the farm details and the request, and I will \
        answer with a single <data> object in the required structure, grounded in \
        established agronomic knowledge.",
};
