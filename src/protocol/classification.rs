use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Coarse label for the overall direction of a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    /// General farming insights.
    FI,
    /// The user's own farm.
    MF,
    /// Non-farming topics.
    GT,
}

impl Classification {
    /// Lenient parse of a `<cls>` capture (`" mf."` -> `MF`).
    pub fn parse(raw: &str) -> Option<Self> {
        let label = raw
            .trim()
            .trim_matches(|c: char| !c.is_ascii_alphanumeric())
            .to_ascii_uppercase();
        match label.as_str() {
            "FI" => Some(Classification::FI),
            "MF" => Some(Classification::MF),
            "GT" => Some(Classification::GT),
            _ => {
                warn!(label = raw, "Ignoring unknown conversation classification");
                None
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Classification::FI => "FI",
            Classification::MF => "MF",
            Classification::GT => "GT",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
