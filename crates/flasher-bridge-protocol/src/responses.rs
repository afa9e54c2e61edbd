//! Response formatting.
//!
//! A successful reply is one line: the command name (with its effective
//! argument), a single UTC timestamp, then each reply field as
//! ` <lowercased key> <value>` in the order the flasher sent them.

use chrono::{DateTime, Utc};
use flasher_message::{field_text, rewrite_legacy_keys, Fields, Message, TAG_KEY};

/// Sentinel sent when the flasher never answered, or answered unintelligibly.
pub const NO_RESPONSE: &str = "NO RESPONSE FROM FLASHER\n";

/// Timestamp format used in every response line.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Reply field carrying the site's own timestamp; replaced by ours.
pub const TIME_KEY: &str = "time";

/// Format a timestamp with second precision.
pub fn format_timestamp(now: DateTime<Utc>) -> String {
    now.format(TIMESTAMP_FORMAT).to_string()
}

/// Render reply fields as ` key value` pairs.
///
/// Skips `time` and `msg`, lowercases keys, rewrites legacy keys, and keeps
/// values on one line.
pub fn render_fields(fields: &Fields) -> String {
    let mut out = String::new();
    for (key, value) in &rewrite_legacy_keys(fields) {
        if key == TIME_KEY || key == TAG_KEY {
            continue;
        }
        let text = field_text(value).replace(['\r', '\n'], " ");
        out.push(' ');
        out.push_str(&key.to_lowercase());
        out.push(' ');
        out.push_str(&text);
    }
    out
}

/// Response for an unknown command.
pub fn unrecognized_command(input: &str, names: &[&str]) -> String {
    format!(
        "{}: unrecognized command\nPossible commands: {}\n",
        input,
        names.join(" ")
    )
}

/// Response for a malformed argument.
pub fn invalid_argument(input: &str, token: &str) -> String {
    format!("{}: invalid argument '{}'\n", input, token)
}

/// Response when the tower radio could not transmit at all.
pub fn transmit_failed(reason: &str) -> String {
    format!("TRANSMIT FAILED: {}\n", reason.replace(['\r', '\n'], " "))
}

/// Render a response-log record (which carries its own `time`) as a line.
pub fn format_record(record: &Message) -> String {
    if record.is_synthetic() {
        return NO_RESPONSE.to_string();
    }
    let mut line = record.tag.clone();
    if let Some(time) = record.field(TIME_KEY) {
        line.push(' ');
        line.push_str(&field_text(time));
    }
    line.push_str(&render_fields(&record.fields));
    if let Some(rssi) = record.signal_strength {
        line.push_str(&format!(" rssi {}", rssi));
    }
    line.push('\n');
    line
}
