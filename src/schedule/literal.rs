//! Permissive object-literal parsing for `<data>` payloads.
//!
//! Accepts strict JSON first. Otherwise normalizes the literal dialect models
//! tend to drift into (single quotes, `True/False/None`, tuples, comments,
//! trailing commas) and retries.

use crate::errors::FormatError;
use serde_json::{Map, Value};
use std::iter::Peekable;
use std::str::Chars;

/// Parses `raw` into a JSON object.
pub fn parse_object(raw: &str) -> Result<Map<String, Value>, FormatError> {
    let body = strip_code_fence(raw);
    let value = match serde_json::from_str::<Value>(body) {
        Ok(value) => value,
        Err(_) => serde_json::from_str::<Value>(&normalize(body))
            .map_err(|e| FormatError::InvalidPayload(e.to_string()))?,
    };

    match value {
        Value::Object(map) => Ok(map),
        other => Err(FormatError::InvalidPayload(format!(
            "expected an object, found {}",
            kind(&other)
        ))),
    }
}

/// Drops a surrounding Markdown fence (```` ```json ... ``` ````).
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end().trim_end_matches("```").trim()
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn normalize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' | '\'' => copy_string(c, &mut chars, &mut out),
            '#' => skip_line(&mut chars),
            '/' if chars.peek() == Some(&'/') => skip_line(&mut chars),
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                skip_block_comment(&mut chars);
            }
            '(' => out.push('['),
            ')' | ']' | '}' => {
                drop_trailing_comma(&mut out);
                out.push(if c == ')' { ']' } else { c });
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut word = String::from(c);
                while let Some(&next) = chars.peek() {
                    if next.is_ascii_alphanumeric() || next == '_' {
                        word.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                out.push_str(match word.as_str() {
                    "True" => "true",
                    "False" => "false",
                    "None" => "null",
                    _ => word.as_str(),
                });
            }
            _ => out.push(c),
        }
    }
    out
}

/// Re-emits a string literal with double quotes.
fn copy_string(quote: char, chars: &mut Peekable<Chars<'_>>, out: &mut String) {
    out.push('"');
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('\'') => out.push('\''),
                Some(escaped) => {
                    out.push('\\');
                    out.push(escaped);
                }
                None => out.push_str("\\\\"),
            },
            '"' if quote == '\'' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            c if c == quote => break,
            c => out.push(c),
        }
    }
    out.push('"');
}

fn skip_line(chars: &mut Peekable<Chars<'_>>) {
    for c in chars.by_ref() {
        if c == '\n' {
            break;
        }
    }
}

fn skip_block_comment(chars: &mut Peekable<Chars<'_>>) {
    while let Some(c) = chars.next() {
        if c == '*' && chars.peek() == Some(&'/') {
            chars.next();
            break;
        }
    }
}

fn drop_trailing_comma(out: &mut String) {
    let kept = out.trim_end().len();
    if out[..kept].ends_with(',') {
        out.truncate(kept - 1);
    }
}
