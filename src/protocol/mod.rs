//! The tag micro-language carried inside model text.
//!
//! The codec only ever *parses* model output; outbound text is produced by
//! fixed templates (see [`Tag::wrap`]), so there is no round-trip guarantee.

pub mod classification;
pub mod directive;

pub use classification::Classification;
pub use directive::{GenerationDirective, GenerationType};

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Closed tag vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    /// `<p>` user query.
    Prompt,
    /// `<g>` injected system context or rules.
    Guidance,
    /// `<r>` assistant reply to a `<p>`.
    Reply,
    /// `<gr>` acknowledgement of a `<g>`.
    GuidanceReply,
    /// `<cls>` conversation classification.
    Classification,
    /// `<gen>` structured generation directive.
    Generate,
    /// `<data>` payload of the generation sub-protocol.
    Data,
}

/// Tags interpreted in a conversational reply.
pub const CHAT_TAGS: [Tag; 6] = [
    Tag::Prompt,
    Tag::Guidance,
    Tag::Reply,
    Tag::GuidanceReply,
    Tag::Classification,
    Tag::Generate,
];

impl Tag {
    pub const ALL: [Tag; 7] = [
        Tag::Prompt,
        Tag::Guidance,
        Tag::Reply,
        Tag::GuidanceReply,
        Tag::Classification,
        Tag::Generate,
        Tag::Data,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Tag::Prompt => "p",
            Tag::Guidance => "g",
            Tag::Reply => "r",
            Tag::GuidanceReply => "gr",
            Tag::Classification => "cls",
            Tag::Generate => "gen",
            Tag::Data => "data",
        }
    }

    /// Template helper: `<tag>inner</tag>`.
    pub fn wrap(self, inner: &str) -> String {
        format!("<{0}>{1}</{0}>", self.name(), inner)
    }

    fn pattern(self) -> &'static Regex {
        static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
        let patterns = PATTERNS.get_or_init(|| {
            Tag::ALL
                .iter()
                .map(|tag| {
                    let name = regex::escape(tag.name());
                    Regex::new(&format!(r"(?s)<{name}>(.*?)</{name}>"))
                        .expect("tag pattern is a valid regex")
                })
                .collect()
        });
        &patterns[self as usize]
    }
}

/// Trimmed inner text of the first `<tag>...</tag>` in `text`.
///
/// Inner content is returned verbatim, nested tags included.
pub fn decode_tag(text: &str, tag: Tag) -> Option<String> {
    tag.pattern()
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map(|inner| inner.as_str().trim().to_string())
}

/// Decoded view of one model reply: requested tag -> first captured value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaggedDocument {
    values: HashMap<Tag, Option<String>>,
}

impl TaggedDocument {
    /// Decoding never fails; at worst every tag maps to `None`.
    pub fn decode(text: &str, tags: &[Tag]) -> Self {
        let values = tags
            .iter()
            .map(|&tag| (tag, decode_tag(text, tag)))
            .collect();
        Self { values }
    }

    pub fn get(&self, tag: Tag) -> Option<&str> {
        self.values.get(&tag).and_then(|value| value.as_deref())
    }

    /// Like [`get`](Self::get) but treats an empty capture as absent.
    pub fn non_empty(&self, tag: Tag) -> Option<&str> {
        self.get(tag).filter(|value| !value.is_empty())
    }

    pub fn reply(&self) -> Option<&str> {
        self.non_empty(Tag::Reply)
    }

    pub fn classification(&self) -> Option<Classification> {
        self.get(Tag::Classification).and_then(Classification::parse)
    }

    pub fn directive(&self) -> Option<&str> {
        self.non_empty(Tag::Generate)
    }
}
