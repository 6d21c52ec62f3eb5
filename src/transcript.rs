//! Conversation data model shared by every stage.
//!
//! A transcript is an ordered `Vec<Entry>` owned by the caller: turns, plus
//! caller items that are not turns, kept verbatim. Stages never mutate one in
//! place; they build and return extended copies.

use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// Inline binary attachment (base64 payload plus its MIME type).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blob {
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    pub data: String,
}

/// One segment of a turn.
///
/// `Unrecognized` keeps whatever the caller sent so it can be handed back in
/// the returned history; the gateway drops it before anything is sent out.
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    InlineData(Blob),
    Unrecognized(Value),
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text(text.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Decodes a caller-supplied part. Never fails.
    pub fn from_value(value: Value) -> Self {
        let recognized = match &value {
            Value::String(text) => Some(Part::Text(text.clone())),
            Value::Object(map) => Self::from_object(map),
            _ => None,
        };
        recognized.unwrap_or(Part::Unrecognized(value))
    }

    fn from_object(map: &Map<String, Value>) -> Option<Part> {
        if map.len() == 1 {
            if let Some(Value::String(text)) = map.get("text") {
                return Some(Part::Text(text.clone()));
            }
        }

        let inline = map.get("inlineData").or_else(|| map.get("inline_data"))?;
        let inline = inline.as_object()?;
        let mime_type = inline
            .get("mimeType")
            .or_else(|| inline.get("mime_type"))
            .and_then(Value::as_str)?;
        let data = inline.get("data").and_then(Value::as_str)?;

        Some(Part::InlineData(Blob {
            mime_type: mime_type.to_string(),
            data: data.to_string(),
        }))
    }
}

impl Serialize for Part {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Part::Text(text) => serializer.serialize_str(text),
            Part::InlineData(blob) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("inlineData", blob)?;
                map.end()
            }
            Part::Unrecognized(value) => value.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Part {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(Part::from_value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Turn {
    pub fn new(role: Role, parts: Vec<Part>) -> Self {
        Self { role, parts }
    }

    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self::new(role, vec![Part::text(text)])
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::text(Role::User, text)
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self::text(Role::Model, text)
    }

    /// Index of the first textual part, if any.
    pub fn first_text_index(&self) -> Option<usize> {
        self.parts.iter().position(|part| matches!(part, Part::Text(_)))
    }

    /// Decodes one caller-supplied history item.
    ///
    /// `None` for items that are not objects, carry no valid `role`, or have
    /// no `parts`. `parts` may be a list or a bare string.
    pub fn from_value(value: &Value) -> Option<Turn> {
        let map = value.as_object()?;
        let role = map
            .get("role")
            .and_then(|role| Role::deserialize(role).ok())?;
        let parts = match map.get("parts")? {
            Value::Array(items) => items.iter().cloned().map(Part::from_value).collect(),
            Value::String(text) => vec![Part::Text(text.clone())],
            _ => return None,
        };
        Some(Turn { role, parts })
    }
}

/// One item of a caller-owned history.
///
/// Items that do not decode as a turn are kept verbatim so the caller gets
/// its history back in the shape it was sent; the gateway never sends them.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Turn(Turn),
    Unrecognized(Value),
}

impl Entry {
    pub fn from_value(value: Value) -> Self {
        match Turn::from_value(&value) {
            Some(turn) => Entry::Turn(turn),
            None => {
                warn!(item = %value, "Keeping history item that is not a valid turn");
                Entry::Unrecognized(value)
            }
        }
    }

    pub fn as_turn(&self) -> Option<&Turn> {
        match self {
            Entry::Turn(turn) => Some(turn),
            Entry::Unrecognized(_) => None,
        }
    }

    pub fn as_turn_mut(&mut self) -> Option<&mut Turn> {
        match self {
            Entry::Turn(turn) => Some(turn),
            Entry::Unrecognized(_) => None,
        }
    }

    pub fn into_turn(self) -> Option<Turn> {
        match self {
            Entry::Turn(turn) => Some(turn),
            Entry::Unrecognized(_) => None,
        }
    }
}

impl From<Turn> for Entry {
    fn from(turn: Turn) -> Self {
        Entry::Turn(turn)
    }
}

impl Serialize for Entry {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Entry::Turn(turn) => turn.serialize(serializer),
            Entry::Unrecognized(value) => value.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Entry {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(Entry::from_value)
    }
}

/// Decodes a caller-supplied history list. Never drops an item.
pub fn decode_history(items: Vec<Value>) -> Vec<Entry> {
    items.into_iter().map(Entry::from_value).collect()
}
