//! Structured-output recovery
//!
//! Converts model output into a typed record:
//! pre-parsed value → strict JSON → first fenced block → fallback.
//! Never fails; the fallback always carries a preview of the raw text.

use crate::llm::Completion;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

/// A recovered value together with the path that produced it
#[derive(Debug, Clone, PartialEq)]
pub enum Recovered<T> {
    /// Backend returned an already-parsed value
    Typed(T),
    /// Raw text was valid JSON
    Parsed(T),
    /// JSON found inside a fenced code block
    Fenced(T),
    /// Nothing parsed; built by the caller's fallback
    Fallback(T),
}

impl<T> Recovered<T> {
    pub fn into_inner(self) -> T {
        match self {
            Recovered::Typed(v)
            | Recovered::Parsed(v)
            | Recovered::Fenced(v)
            | Recovered::Fallback(v) => v,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Recovered::Fallback(_))
    }

    pub fn source(&self) -> &'static str {
        match self {
            Recovered::Typed(_) => "typed",
            Recovered::Parsed(_) => "parsed",
            Recovered::Fenced(_) => "fenced",
            Recovered::Fallback(_) => "fallback",
        }
    }
}

/// Recover a `T` from a completion, invoking `fallback` with the raw text
/// only when every parse attempt fails.
pub fn recover<T, F>(completion: &Completion, fallback: F) -> Recovered<T>
where
    T: DeserializeOwned,
    F: FnOnce(&str) -> T,
{
    if let Some(value) = &completion.parsed {
        match serde_json::from_value::<T>(value.clone()) {
            Ok(typed) => return Recovered::Typed(typed),
            Err(e) => debug!(error = %e, "Pre-parsed value did not match target shape"),
        }
    }

    let text = completion.text.trim();

    if let Ok(parsed) = serde_json::from_str::<T>(text) {
        return Recovered::Parsed(parsed);
    }

    if let Some(block) = extract_fenced_block(text) {
        match serde_json::from_str::<T>(block) {
            Ok(parsed) => return Recovered::Fenced(parsed),
            Err(e) => debug!(error = %e, "Fenced block did not parse"),
        }
    }

    warn!(
        preview = %preview(text, 120),
        "Structured output unparsable, using fallback"
    );

    Recovered::Fallback(fallback(text))
}

/// Contents of the first triple-backtick block, with an optional
/// language label (```json) stripped.
pub fn extract_fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];
    let end = after_fence.find("```")?;
    let block = &after_fence[..end];

    // A label is the run of non-whitespace right after the opening fence
    let body = match block.find(|c: char| c.is_whitespace()) {
        Some(idx) if !block[..idx].contains('{') && !block[..idx].contains('[') => &block[idx..],
        _ => block,
    };

    Some(body.trim())
}

/// First `max_chars` characters of `text` (char-boundary safe)
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
