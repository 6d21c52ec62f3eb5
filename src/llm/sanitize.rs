//! Outbound content normalization.

use crate::transcript::{Entry, Part, Role, Turn};
use tracing::warn;

/// What a caller hands to the gateway.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Prompt(String),
    Entries(Vec<Entry>),
}

impl From<&str> for Content {
    fn from(prompt: &str) -> Self {
        Content::Prompt(prompt.to_string())
    }
}

impl From<String> for Content {
    fn from(prompt: String) -> Self {
        Content::Prompt(prompt)
    }
}

impl From<Vec<Turn>> for Content {
    fn from(turns: Vec<Turn>) -> Self {
        Content::Entries(turns.into_iter().map(Entry::from).collect())
    }
}

impl From<Vec<Entry>> for Content {
    fn from(entries: Vec<Entry>) -> Self {
        Content::Entries(entries)
    }
}

impl Content {
    /// Turns safe to send: a bare prompt becomes one user turn. History items
    /// that are not turns, unrecognized parts and turns left without parts
    /// are dropped.
    pub fn normalize(self) -> Vec<Turn> {
        match self {
            Content::Prompt(prompt) => vec![Turn::new(Role::User, vec![Part::Text(prompt)])],
            Content::Entries(entries) => entries
                .into_iter()
                .filter_map(|entry| match entry {
                    Entry::Turn(turn) => sanitize_turn(turn),
                    Entry::Unrecognized(item) => {
                        warn!(%item, "Dropping history item that is not a turn");
                        None
                    }
                })
                .collect(),
        }
    }
}

fn sanitize_turn(turn: Turn) -> Option<Turn> {
    let role = turn.role;
    let parts: Vec<Part> = turn
        .parts
        .into_iter()
        .filter(|part| match part {
            Part::Text(_) | Part::InlineData(_) => true,
            Part::Unrecognized(value) => {
                let keys: Vec<&str> = value
                    .as_object()
                    .map(|map| map.keys().map(String::as_str).collect())
                    .unwrap_or_default();
                warn!(?role, ?keys, "Dropping unrecognized message part");
                false
            }
        })
        .collect();

    if parts.is_empty() {
        warn!(?role, "Dropping turn with no valid parts");
        return None;
    }
    Some(Turn::new(role, parts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::Blob;
    use serde_json::json;

    #[test]
    fn prompt_becomes_single_user_turn() {
        assert_eq!(Content::from("hello").normalize(), vec![Turn::user("hello")]);
    }

    #[test]
    fn malformed_parts_and_empty_turns_are_dropped() {
        let attachment = Part::InlineData(Blob {
            mime_type: "image/png".into(),
            data: "AAA".into(),
        });
        let malformed = Part::from_value(json!({"inline_data": {"mime_type": "image/png"}}));

        let turns = vec![
            Turn::new(
                Role::User,
                vec![Part::text("look"), attachment.clone(), malformed.clone()],
            ),
            Turn::new(Role::Model, vec![malformed]),
        ];

        let sanitized = Content::from(turns).normalize();
        assert_eq!(sanitized.len(), 1);
        assert_eq!(sanitized[0].parts, vec![Part::text("look"), attachment]);
    }

    #[test]
    fn history_items_that_are_not_turns_are_not_sent() {
        let entries = vec![
            Entry::Turn(Turn::user("hi")),
            Entry::Unrecognized(json!({"role": "system", "parts": ["be terse"]})),
            Entry::Unrecognized(json!(42)),
            Entry::Turn(Turn::model("<r>hello</r>")),
        ];

        assert_eq!(
            Content::from(entries).normalize(),
            vec![Turn::user("hi"), Turn::model("<r>hello</r>")]
        );
    }
}
