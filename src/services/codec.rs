use crate::models::{QueueMessage, UploadRequest};
use crate::services::bus::{OutboundMessage, RawMessage};
use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Prefix marking internal-only field names
const INTERNAL_PREFIX: char = '_';

/// Internal type names that never leak into decoding errors
const INTERNAL_TYPE_NAMES: &[&str] = &["QueueMessage", "UploadRequest", "UploadData"];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Empty message")]
    Empty,

    #[error("Malformed message: {0}")]
    Malformed(String),

    #[error("Invalid parameter, {0}")]
    InvalidParameter(String),
}

/// Parse an inbound envelope into a typed request.
pub fn decode(raw: RawMessage) -> Result<UploadRequest, DecodeError> {
    let value = match raw {
        RawMessage::Structured(Value::Null) => return Err(DecodeError::Empty),
        RawMessage::Structured(value) => value,
        RawMessage::Text(text) => {
            if text.trim().is_empty() {
                return Err(DecodeError::Empty);
            }
            serde_json::from_str(&text).map_err(|e| DecodeError::Malformed(scrub(&e.to_string())))?
        }
    };

    serde_json::from_value(value).map_err(|e| DecodeError::InvalidParameter(scrub(&e.to_string())))
}

/// Build the canonical outbound envelope `{messageId, messageType, data}`.
pub fn encode<T: Serialize>(
    request_id: &str,
    message_type: &str,
    data: &T,
) -> Result<OutboundMessage, serde_json::Error> {
    let data = match serde_json::to_value(data)? {
        Value::Object(map) => Value::Object(normalize_keys(map)),
        other => other,
    };

    Ok(QueueMessage {
        message_id: request_id.to_string(),
        message_type: message_type.to_string(),
        message: None,
        published_date: Some(Utc::now()),
        data,
    })
}

/// Strip one leading internal marker from every top-level field name.
pub fn normalize_keys(fields: Map<String, Value>) -> Map<String, Value> {
    fields
        .into_iter()
        .map(|(key, value)| match key.strip_prefix(INTERNAL_PREFIX) {
            Some(stripped) => (stripped.to_string(), value),
            None => (key, value),
        })
        .collect()
}

fn scrub(message: &str) -> String {
    let mut scrubbed = message.to_string();
    for name in INTERNAL_TYPE_NAMES {
        scrubbed = scrubbed
            .replace(&format!("struct {}", name), "an object")
            .replace(name, "message");
    }
    scrubbed
}
