//! Message encoding and decoding.
//!
//! ## Wire Format
//!
//! A single flat JSON object, UTF-8, optionally followed by a line terminator
//! (the site firmware transmits with `println`):
//!
//! | Key       | Type            | Description                      |
//! |-----------|-----------------|----------------------------------|
//! | `msg`     | string          | Message tag (required)           |
//! | any other | number / string | Application field                |
//!
//! Signal strength is never part of the payload.

use serde_json::{Map, Value};

use crate::{rewrite_legacy_keys, DecodeError, DecodeResult, Fields, Message, TAG_KEY};

/// Maximum payload size accepted by the decoder (SX127x FIFO size).
pub const MAX_PAYLOAD_SIZE: usize = 255;

// ============================================================================
// Encoding
// ============================================================================

/// Encode a message to its wire representation.
///
/// A field named `msg` is never emitted; the tag always wins.
pub fn encode_message(message: &Message) -> Vec<u8> {
    let mut object = Map::with_capacity(message.fields.len() + 1);
    object.insert(TAG_KEY.to_string(), Value::String(message.tag.clone()));
    for (key, value) in &message.fields {
        if key == TAG_KEY {
            continue;
        }
        object.insert(key.clone(), value.clone());
    }
    Value::Object(object).to_string().into_bytes()
}

// ============================================================================
// Decoding
// ============================================================================

/// Decode a wire payload into a message.
///
/// Legacy field keys are rewritten to their canonical form. The returned
/// message has no signal strength; the receiver stamps it.
pub fn decode_message(data: &[u8]) -> DecodeResult<Message> {
    if data.len() > MAX_PAYLOAD_SIZE {
        return Err(DecodeError::malformed(format!(
            "payload too large: {} bytes (max {})",
            data.len(),
            MAX_PAYLOAD_SIZE
        )));
    }
    decode_record(data)
}

/// Decode a message without the radio payload size limit.
///
/// Used for stored records, which carry extra metadata fields.
pub fn decode_record(data: &[u8]) -> DecodeResult<Message> {
    let trimmed = trim_payload(data);
    if trimmed.is_empty() {
        return Err(DecodeError::malformed("empty payload"));
    }

    let value: Value =
        serde_json::from_slice(trimmed).map_err(|e| DecodeError::malformed(e.to_string()))?;
    let Value::Object(object) = value else {
        return Err(DecodeError::malformed("payload is not an object"));
    };

    let tag = match object.get(TAG_KEY) {
        Some(Value::String(tag)) if !tag.is_empty() => tag.clone(),
        Some(_) => return Err(DecodeError::malformed("`msg` is not a non-empty string")),
        None => return Err(DecodeError::malformed("missing `msg` key")),
    };

    let mut raw = Fields::with_capacity(object.len().saturating_sub(1));
    for (key, value) in object {
        if key == TAG_KEY {
            continue;
        }
        if !is_scalar(&value) {
            return Err(DecodeError::malformed(format!(
                "field `{}` is not a number or string",
                key
            )));
        }
        raw.insert(key, value);
    }
    let fields = rewrite_legacy_keys(&raw);

    Ok(Message {
        tag,
        fields,
        signal_strength: None,
    })
}

/// Strip trailing line terminators, NUL padding and surrounding whitespace.
fn trim_payload(data: &[u8]) -> &[u8] {
    let is_pad = |b: &u8| b.is_ascii_whitespace() || *b == 0;
    let start = data.iter().position(|b| !is_pad(b)).unwrap_or(data.len());
    let end = data.iter().rposition(|b| !is_pad(b)).map_or(start, |i| i + 1);
    &data[start..end]
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::Number(_) | Value::String(_))
}
