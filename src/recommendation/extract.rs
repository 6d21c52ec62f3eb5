//! Tag-stream extraction of crop blocks.
//!
//! The reformatted analysis is tokenized into `<field>...</field>` spans and
//! folded into blocks, each opened by a `<crop>` span. A block missing any
//! field is dropped on its own; it never borrows fields from its neighbour.

use crate::errors::FormatError;
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropDetails {
    pub description: String,
    /// Percentage in `[0, 100]`.
    pub survivability: f64,
    pub reasons: Vec<String>,
    pub challenges: Vec<String>,
}

/// Crop name -> details, in document order.
pub type CropRecommendations = IndexMap<String, CropDetails>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Crop,
    Description,
    Challenges,
    Survivability,
    Reasons,
}

impl Field {
    fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "crop" => Some(Field::Crop),
            "description" => Some(Field::Description),
            "challenges" => Some(Field::Challenges),
            "survivability" => Some(Field::Survivability),
            "reasons" => Some(Field::Reasons),
            _ => None,
        }
    }
}

fn tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)<(/?)(crop|description|challenges|survivability|reasons)>")
            .expect("crop tag pattern is a valid regex")
    })
}

/// Closed `<field>...</field>` spans in document order.
fn spans(text: &str) -> Vec<(Field, &str)> {
    let mut spans = Vec::new();
    let mut open: Option<(Field, usize)> = None;

    for captures in tag_pattern().captures_iter(text) {
        let (Some(whole), Some(name)) = (captures.get(0), captures.get(2)) else {
            continue;
        };
        let Some(field) = Field::parse(name.as_str()) else {
            continue;
        };
        let closing = captures.get(1).is_some_and(|slash| !slash.as_str().is_empty());

        match (closing, open) {
            (false, pending) => {
                if let Some((unclosed, _)) = pending {
                    warn!(field = ?unclosed, "Discarding unclosed crop field");
                }
                open = Some((field, whole.end()));
            }
            (true, Some((opened, start))) if opened == field => {
                spans.push((field, text[start..whole.start()].trim()));
                open = None;
            }
            (true, _) => warn!(field = ?field, "Ignoring stray closing tag"),
        }
    }
    spans
}

#[derive(Default)]
struct Block<'a> {
    name: &'a str,
    description: Option<&'a str>,
    challenges: Option<&'a str>,
    survivability: Option<&'a str>,
    reasons: Option<&'a str>,
}

impl<'a> Block<'a> {
    fn set(&mut self, field: Field, value: &'a str) {
        let slot = match field {
            Field::Crop => return,
            Field::Description => &mut self.description,
            Field::Challenges => &mut self.challenges,
            Field::Survivability => &mut self.survivability,
            Field::Reasons => &mut self.reasons,
        };
        slot.get_or_insert(value);
    }

    /// `Ok(None)` for an incomplete block.
    fn finish(self) -> Result<Option<(String, CropDetails)>, FormatError> {
        let (Some(description), Some(challenges), Some(survivability), Some(reasons)) =
            (self.description, self.challenges, self.survivability, self.reasons)
        else {
            warn!(crop = self.name, "Dropping incomplete crop block");
            return Ok(None);
        };
        if self.name.is_empty() {
            warn!("Dropping crop block without a name");
            return Ok(None);
        }

        Ok(Some((
            self.name.to_string(),
            CropDetails {
                description: description.to_string(),
                survivability: parse_survivability(survivability)?,
                reasons: bullets(reasons),
                challenges: bullets(challenges),
            },
        )))
    }
}

/// Parses every complete crop block in `text`.
pub fn extract_crops(text: &str) -> Result<CropRecommendations, FormatError> {
    let mut crops = CropRecommendations::new();
    let mut current: Option<Block> = None;

    for (field, value) in spans(text) {
        match field {
            Field::Crop => {
                flush(current.take(), &mut crops)?;
                current = Some(Block {
                    name: value,
                    ..Default::default()
                });
            }
            _ => match current.as_mut() {
                Some(block) => block.set(field, value),
                None => warn!(field = ?field, "Ignoring field outside a crop block"),
            },
        }
    }
    flush(current.take(), &mut crops)?;

    if crops.is_empty() {
        return Err(FormatError::NoCropsExtracted);
    }
    Ok(crops)
}

fn flush(block: Option<Block<'_>>, crops: &mut CropRecommendations) -> Result<(), FormatError> {
    if let Some((name, details)) = block.map(Block::finish).transpose()?.flatten() {
        if crops.insert(name.clone(), details).is_some() {
            warn!(crop = %name, "Duplicate crop name, keeping the later block");
        }
    }
    Ok(())
}

/// `"20%"` -> `20.0`. Values outside `[0, 100]` are clamped.
pub fn parse_survivability(raw: &str) -> Result<f64, FormatError> {
    let number = raw.trim().trim_matches('%').trim();
    let value: f64 = number
        .parse()
        .ok()
        .filter(|value: &f64| value.is_finite())
        .ok_or_else(|| FormatError::NonNumericSurvivability(raw.trim().to_string()))?;

    if !(0.0..=100.0).contains(&value) {
        warn!(value, "Clamping survivability into [0, 100]");
        return Ok(value.clamp(0.0, 100.0));
    }
    Ok(value)
}

/// One entry per non-blank line, bullet markers removed.
fn bullets(raw: &str) -> Vec<String> {
    raw.lines()
        .map(|line| strip_bullet(line.trim()).to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

/// Drops one leading `-`, `*` or `•` marker, but only when whitespace (or
/// nothing) follows it: `-2°C frosts` keeps its sign.
fn strip_bullet(line: &str) -> &str {
    let mut chars = line.chars();
    match chars.next() {
        Some('-' | '*' | '•') => {
            let rest = chars.as_str();
            if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                rest.trim_start()
            } else {
                line
            }
        }
        _ => line,
    }
}
