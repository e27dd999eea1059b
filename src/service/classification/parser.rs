//! Extraction of the JSON object from a raw model reply

use serde_json::{Map, Value};

use crate::service::classification::error::ParseError;

/// Character limit for raw text carried in errors and logs
pub const RAW_EXCERPT_LIMIT: usize = 200;

/// Truncate text to `limit` characters for logging
pub fn truncate_for_log(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((end, _)) => format!("{}…", &text[..end]),
        None => text.to_string(),
    }
}

/// Decode exactly one JSON object from a model reply
///
/// Tolerates surrounding prose and fenced code blocks. A top-level array is rejected
/// even when it contains objects, and so is a reply holding several objects.
pub fn parse_response(raw: &str) -> Result<Map<String, Value>, ParseError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(parse_error("empty response", raw));
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return match value {
            Value::Object(map) => Ok(map),
            other => Err(parse_error(
                &format!("expected a JSON object, found {}", value_kind(&other)),
                raw,
            )),
        };
    }

    // The fenced block wins when it holds an object; otherwise the whole reply is scanned
    for candidate in fenced_block(trimmed).into_iter().chain(std::iter::once(trimmed)) {
        match extract_objects(candidate) {
            Extracted::One(map) => return Ok(map),
            Extracted::Many(n) => {
                return Err(parse_error(
                    &format!("found {} JSON objects, expected exactly one", n),
                    raw,
                ));
            }
            Extracted::Nothing => {}
        }
    }

    Err(parse_error("no JSON object found", raw))
}

enum Extracted {
    One(Map<String, Value>),
    Many(usize),
    Nothing,
}

fn extract_objects(text: &str) -> Extracted {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(text) {
        return Extracted::One(map);
    }

    let mut objects = scan_top_level_objects(text);
    match objects.len() {
        0 => Extracted::Nothing,
        1 => Extracted::One(objects.remove(0)),
        n => Extracted::Many(n),
    }
}

fn parse_error(reason: &str, raw: &str) -> ParseError {
    ParseError {
        reason: reason.to_string(),
        raw_excerpt: truncate_for_log(raw, RAW_EXCERPT_LIMIT),
    }
}

/// Contents of the first fenced block, if the text has one
///
/// An info string (e.g. `json`) is skipped only when the rest of the opening line is a
/// bare word; an inline fence such as ```{...}``` keeps its content from the first byte.
fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after_open = &text[open + 3..];

    let content = match after_open.find('\n') {
        Some(eol) if is_info_string(&after_open[..eol]) => &after_open[eol + 1..],
        _ => after_open,
    };

    Some(match content.find("```") {
        Some(close) => content[..close].trim(),
        None => content.trim(),
    })
}

fn is_info_string(line: &str) -> bool {
    line.trim()
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Collect every JSON object that starts at top level in free text
///
/// Arrays are consumed whole so objects nested inside them are not picked out.
fn scan_top_level_objects(text: &str) -> Vec<Map<String, Value>> {
    let mut found = Vec::new();
    let mut pos = 0;

    while pos < text.len() {
        let Some(offset) = text[pos..].find(['{', '[']) else {
            break;
        };
        let start = pos + offset;

        let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        match stream.next() {
            Some(Ok(value)) => {
                if let Value::Object(map) = value {
                    found.push(map);
                }
                pos = start + stream.byte_offset();
            }
            // Not valid JSON from here; brackets are ASCII so the next byte is a boundary
            _ => pos = start + 1,
        }
    }

    found
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
