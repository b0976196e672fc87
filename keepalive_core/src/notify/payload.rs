//! Permissive reading of `notify.message` payloads.
//!
//! The backend sends loosely shaped JSON. Nothing here fails: every lookup
//! that does not find a usable value falls through to the next candidate and
//! finally to a default.
//!
//! Title: `chatName` → `chat.name` → app name.
//! Body: `message.content` (string) → `message.content.text` →
//! `message.content.body` → any other scalar `message.content` → placeholder.

use serde_json::{Map, Value};

pub const DEFAULT_BODY: &str = "you have a new message";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub title: String,
    pub body: String,
}

/// Accepts a JSON object, or a string holding a JSON object.
pub fn parse_payload(raw: &Value) -> Option<Map<String, Value>> {
    match raw {
        Value::Object(map) => Some(map.clone()),
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => Some(map),
            Ok(_) => None,
            Err(e) => {
                log::debug!("Payload string is not JSON: {}", e);
                None
            }
        },
        _ => None,
    }
}

pub fn render(raw: &Value, default_title: &str) -> RenderedMessage {
    let Some(json) = parse_payload(raw) else {
        return RenderedMessage {
            title: default_title.to_string(),
            body: DEFAULT_BODY.to_string(),
        };
    };

    let title = json
        .get("chatName")
        .and_then(scalar_text)
        .or_else(|| json.get("chat")?.get("name").and_then(scalar_text))
        .unwrap_or_else(|| default_title.to_string());

    let body = json
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(content_text)
        .unwrap_or_else(|| DEFAULT_BODY.to_string());

    RenderedMessage { title, body }
}

fn content_text(content: &Value) -> Option<String> {
    match content {
        Value::Object(obj) => obj
            .get("text")
            .and_then(scalar_text)
            .or_else(|| obj.get("body").and_then(scalar_text)),
        other => scalar_text(other),
    }
}

/// Non-blank string (trimmed), or a number/bool rendered as text.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
