//! The message model shared by the radio session and the command bridge.

use serde_json::{Map, Value};

use crate::tags;

/// Reserved payload key carrying the message tag.
pub const TAG_KEY: &str = "msg";

/// Canonical key for the solar panel voltage.
pub const SOLAR_KEY: &str = "SOLAR";

/// Corrupted rendering of [`SOLAR_KEY`] produced by old site firmware.
pub const LEGACY_SOLAR_KEY: &str = "SOLA(1)R";

/// Payload fields keyed by name, in the order they were inserted or received.
pub type Fields = Map<String, Value>;

/// A command or telemetry message.
///
/// Equality ignores field order. `signal_strength` is link-layer metadata: it
/// is stamped on received messages and never encoded.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Message intent, e.g. `VOLTAGE` or `RELAY_ON`.
    pub tag: String,
    /// Application payload.
    pub fields: Fields,
    /// RSSI of the packet this message was decoded from, in dBm.
    pub signal_strength: Option<i32>,
}

impl Message {
    /// Create a message with the given tag and no fields.
    pub fn new(tag: impl Into<String>) -> Self {
        Message {
            tag: tag.into(),
            fields: Fields::new(),
            signal_strength: None,
        }
    }

    /// The synthetic "nothing heard" message.
    pub fn no_message() -> Self {
        Message::new(tags::NO_MESSAGE)
    }

    /// The synthetic "heard garbage" message.
    pub fn invalid_message() -> Self {
        Message::new(tags::INVALID_MESSAGE)
    }

    /// Add a field, replacing any existing value under the same key.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Attach the signal strength of the packet this message arrived in.
    pub fn with_signal_strength(mut self, rssi: i32) -> Self {
        self.signal_strength = Some(rssi);
        self
    }

    /// Look up a field by key.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// True for NOMESSAGE and INVALIDMESSAGE.
    pub fn is_synthetic(&self) -> bool {
        tags::is_synthetic(&self.tag)
    }
}

/// Map a field key to its canonical spelling.
pub fn canonical_key(key: &str) -> &str {
    if key == LEGACY_SOLAR_KEY {
        SOLAR_KEY
    } else {
        key
    }
}

/// Rewrite legacy keys in a field map, preserving order.
///
/// When both the legacy and the canonical key are present the canonical
/// value is kept.
pub fn rewrite_legacy_keys(fields: &Fields) -> Fields {
    let mut out = Fields::with_capacity(fields.len());
    for (key, value) in fields {
        let canonical = canonical_key(key);
        if canonical != key && fields.contains_key(canonical) {
            continue;
        }
        out.insert(canonical.to_string(), value.clone());
    }
    out
}

/// Render a field value as plain text (strings unquoted).
pub fn field_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
