//! Pulls one `TIMELINE_EVENT: {...}` record out of a free-text model reply.
//!
//! The object after the marker is found with a brace-depth scan that skips
//! quoted strings, so a `}` inside a string value does not end the capture
//! early. Only the first marker is considered; if its object is incomplete or
//! not valid JSON the reply is returned untouched.

use crate::models::timeline::TimelineEvent;
use log::{ debug, warn };
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use uuid::Uuid;

pub const TIMELINE_MARKER: &str = "TIMELINE_EVENT:";

static MARKER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"TIMELINE_EVENT:\s*\{").expect("marker pattern is valid")
});

#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    /// Reply text to show and store. The marker span is removed only when an
    /// event was parsed.
    pub text: String,
    pub event: Option<TimelineEvent>,
}

impl Extraction {
    fn untouched(raw: &str) -> Self {
        Self { text: raw.to_string(), event: None }
    }
}

pub fn generate_event_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn extract_timeline_event(raw: &str) -> Extraction {
    let Some(found) = MARKER_RE.find(raw) else {
        return Extraction::untouched(raw);
    };

    // The regex match ends just past the opening brace.
    let open = found.end() - 1;
    let Some(close) = find_object_end(raw, open) else {
        warn!("Failed to parse timeline event: unterminated object after {}", TIMELINE_MARKER);
        return Extraction::untouched(raw);
    };

    let event = match parse_event(&raw[open..close]) {
        Ok(event) => event,
        Err(e) => {
            warn!("Failed to parse timeline event: {}", e);
            return Extraction::untouched(raw);
        }
    };

    debug!("Extracted timeline event '{}' ({})", event.title, event.id);
    let mut text = String::with_capacity(raw.len());
    text.push_str(&raw[..found.start()]);
    text.push_str(&raw[close..]);

    Extraction {
        text: text.trim().to_string(),
        event: Some(event),
    }
}

/// Returns the byte offset just past the `}` that closes the object opened at
/// `open`, or `None` if the text ends first.
fn find_object_end(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, byte) in text.as_bytes()[open..].iter().enumerate() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + offset + 1);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_event(span: &str) -> Result<TimelineEvent, serde_json::Error> {
    let mut fields = match serde_json::from_str::<Value>(span)? {
        Value::Object(fields) => fields,
        // Unreachable for a span that starts with '{', but keep the type honest.
        other => {
            return serde_json::from_value::<TimelineEvent>(other);
        }
    };

    let id = match fields.get("id") {
        Some(Value::String(id)) if !id.trim().is_empty() => id.clone(),
        _ => generate_event_id(),
    };
    fields.insert("id".to_string(), Value::String(id));

    serde_json::from_value(Value::Object(fields))
}
