//! Pulls a JSON payload out of free-form model text.
//!
//! Tried in order: a fence tagged `json`, any fence, then the span from the
//! first `{` to the last `}`. The first non-empty match wins.

use serde_json::Value;
use tracing::debug;

use crate::error::{ReadingError, Result};

/// Fence delimiter.
const FENCE: &str = "```";
/// Characters of model output kept in extraction errors.
const PREVIEW_CHARS: usize = 120;

/// Finds the structured block in `text`.
#[must_use]
pub fn extract_json(text: &str) -> Option<&str> {
    tagged_fence(text)
        .or_else(|| any_fence(text))
        .or_else(|| brace_span(text))
}

/// Extracts and parses, keeping extraction and syntax failures distinct.
///
/// # Errors
/// Returns [`ReadingError::Extraction`] when nothing resembling JSON is
/// present and [`ReadingError::Parse`] when the block is malformed.
pub fn extract_and_parse(text: &str, purpose: &str) -> Result<Value> {
    let Some(block) = extract_json(text) else {
        debug!("No JSON block in {purpose} output ({} chars)", text.len());
        return Err(ReadingError::Extraction {
            purpose: purpose.to_owned(),
            preview: text.chars().take(PREVIEW_CHARS).collect(),
        });
    };
    serde_json::from_str(block).map_err(|error| ReadingError::from_json(&error))
}

/// Body of the first fence whose info string is `json`.
fn tagged_fence(text: &str) -> Option<&str> {
    let mut rest = text;
    while let Some(open) = rest.find(FENCE) {
        let after = &rest[open + FENCE.len()..];
        let (info, body_start) = split_info_line(after);
        if info.eq_ignore_ascii_case("json") {
            return fence_body(&after[body_start..]);
        }
        rest = after;
    }
    None
}

/// Body of the first fence of any kind.
fn any_fence(text: &str) -> Option<&str> {
    let open = text.find(FENCE)?;
    let after = &text[open + FENCE.len()..];
    let (_, body_start) = split_info_line(after);
    fence_body(&after[body_start..])
}

/// Splits the info string from a fence opening; returns it and the body offset.
fn split_info_line(after_fence: &str) -> (&str, usize) {
    match after_fence.find('\n') {
        Some(newline) => (after_fence[..newline].trim(), newline + 1),
        None => (after_fence.trim(), after_fence.len()),
    }
}

/// Trimmed text up to the closing fence, or `None` if empty or unclosed.
fn fence_body(body: &str) -> Option<&str> {
    let close = body.find(FENCE)?;
    let trimmed = body[..close].trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Span from the first `{` to the last `}`.
fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}
