//! Chat wire frames.
//!
//! Inbound: a UTF-8 JSON object with a required string `message` field.
//! Unknown keys are ignored. Outbound: exactly `message`, `username`, and
//! `timestamp`, identical for every subscriber including the sender.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ProtocolError;
use crate::models::ChatMessage;

/// Render a persistence timestamp as ISO-8601 (`2026-01-01T00:00:00.000000+00:00`).
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// A decoded client → server frame.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct InboundFrame {
    /// Raw message text, untrimmed.
    pub message: String,
}

impl InboundFrame {
    /// Parse a text frame.
    ///
    /// Only a JSON object is accepted; arrays are not decoded by position.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let malformed = |e: serde_json::Error| ProtocolError::MalformedJson(e.to_string());
        match serde_json::from_str::<Value>(text).map_err(malformed)? {
            object @ Value::Object(_) => serde_json::from_value(object).map_err(malformed),
            other => Err(ProtocolError::MalformedJson(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Decode a binary frame as UTF-8, then parse it.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let text = std::str::from_utf8(bytes).map_err(|_| ProtocolError::InvalidUtf8)?;
        Self::parse(text)
    }

    /// The trimmed body, or `None` for blank submissions.
    pub fn body(&self) -> Option<&str> {
        let trimmed = self.message.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// A server → client broadcast frame.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundFrame {
    /// Message body.
    pub message: String,
    /// Author display name.
    pub username: String,
    /// ISO-8601 persistence timestamp.
    pub timestamp: String,
}

impl OutboundFrame {
    /// Build the broadcast frame for a freshly persisted message.
    pub fn for_message(message: &ChatMessage, username: &str) -> Self {
        Self {
            message: message.body.clone(),
            username: username.to_string(),
            timestamp: format_timestamp(message.created_at),
        }
    }

    /// Serialize to the JSON text sent on the wire.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
