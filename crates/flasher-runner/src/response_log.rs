//! Append-only audit log of flasher replies.
//!
//! One JSON object per line: the wire form of the reply, plus `time` (when
//! the tower recorded it) and `rssi` (when the signal strength is known).
//!
//! ```text
//! {"msg":"VOLTAGE","SOLAR":13.099,"BATT1":12.6,"time":"2024-05-01 17:04:40","rssi":-70}
//! ```

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use flasher_bridge_protocol::{format_timestamp, TIME_KEY};
use flasher_message::{decode_record, Message, TAG_KEY};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{trace, warn};

use crate::RunnerResult;

/// Record key holding the signal strength.
pub const RSSI_KEY: &str = "rssi";

/// The response log file.
///
/// Appends are serialized through a mutex so concurrent writers never
/// interleave partial lines.
#[derive(Debug)]
pub struct ResponseLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ResponseLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ResponseLog {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record for `message`, stamped with `now`.
    pub fn append(&self, message: &Message, now: DateTime<Utc>) -> RunnerResult<()> {
        let mut record = serde_json::Map::new();
        record.insert(TAG_KEY.to_string(), Value::String(message.tag.clone()));
        for (key, value) in &message.fields {
            if key == TAG_KEY || key == TIME_KEY || key == RSSI_KEY {
                continue;
            }
            record.insert(key.clone(), value.clone());
        }
        record.insert(TIME_KEY.to_string(), Value::String(format_timestamp(now)));
        if let Some(rssi) = message.signal_strength {
            record.insert(RSSI_KEY.to_string(), Value::from(rssi));
        }
        let line = Value::Object(record).to_string();

        let _guard = self.lock.lock();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)?;
        trace!("logged {} to {}", message.tag, self.path.display());
        Ok(())
    }

    /// Read back the final record, if any.
    ///
    /// `rssi` is restored as the signal strength; `time` stays a field.
    /// A final line that cannot be decoded reads as INVALIDMESSAGE.
    pub fn last(&self) -> RunnerResult<Option<Message>> {
        let contents = {
            let _guard = self.lock.lock();
            match std::fs::read_to_string(&self.path) {
                Ok(contents) => contents,
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
                Err(e) => return Err(e.into()),
            }
        };

        let Some(line) = contents.lines().rev().find(|line| !line.trim().is_empty()) else {
            return Ok(None);
        };

        let mut message = match decode_record(line.as_bytes()) {
            Ok(message) => message,
            Err(e) => {
                warn!("unreadable record in {}: {}", self.path.display(), e);
                return Ok(Some(Message::invalid_message()));
            }
        };
        if let Some(rssi) = message.fields.remove(RSSI_KEY) {
            message.signal_strength = rssi.as_i64().and_then(|v| i32::try_from(v).ok());
        }
        Ok(Some(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use flasher_message::tags;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT: AtomicUsize = AtomicUsize::new(0);

    fn temp_log() -> ResponseLog {
        let n = NEXT.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "flasher-response-log-{}-{}.txt",
            std::process::id(),
            n
        ));
        let _ = std::fs::remove_file(&path);
        ResponseLog::new(path)
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 17, 4, 40).unwrap()
    }

    #[test]
    fn test_last_of_missing_file() {
        let log = temp_log();
        assert_eq!(log.last().unwrap(), None);
    }

    #[test]
    fn test_append_writes_one_json_line() {
        let log = temp_log();
        let reply = Message::new(tags::VOLTAGE)
            .with_field("SOLAR", 3.5)
            .with_field("BATT1", 4.1)
            .with_signal_strength(-70);
        log.append(&reply, at()).unwrap();

        let contents = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(
            contents,
            "{\"msg\":\"VOLTAGE\",\"SOLAR\":3.5,\"BATT1\":4.1,\"time\":\"2024-05-01 17:04:40\",\"rssi\":-70}\n"
        );
        let _ = std::fs::remove_file(log.path());
    }

    #[test]
    fn test_last_returns_final_record() {
        let log = temp_log();
        log.append(&Message::new(tags::RELAY_ON), at()).unwrap();
        log.append(&Message::no_message(), at()).unwrap();
        log.append(
            &Message::new(tags::RELAY_OFF).with_signal_strength(-91),
            at(),
        )
        .unwrap();

        let last = log.last().unwrap().unwrap();
        assert_eq!(last.tag, tags::RELAY_OFF);
        assert_eq!(last.signal_strength, Some(-91));
        assert_eq!(last.field(TIME_KEY), Some(&Value::from("2024-05-01 17:04:40")));
        assert!(last.field(RSSI_KEY).is_none());
        let _ = std::fs::remove_file(log.path());
    }

    #[test]
    fn test_last_rewrites_legacy_key() {
        let log = temp_log();
        std::fs::write(
            log.path(),
            "{\"msg\":\"VOLTAGE\",\"SOLA(1)R\":3.5,\"time\":\"2024-05-01 17:04:40\"}\n\n",
        )
        .unwrap();
        let last = log.last().unwrap().unwrap();
        assert_eq!(last.field("SOLAR"), Some(&Value::from(3.5)));
        let _ = std::fs::remove_file(log.path());
    }

    #[test]
    fn test_corrupt_last_line_is_invalid_message() {
        let log = temp_log();
        std::fs::write(log.path(), "{\"msg\":\"VOLTAGE\"}\n{\"msg\":\"VOLT").unwrap();
        assert_eq!(log.last().unwrap(), Some(Message::invalid_message()));
        let _ = std::fs::remove_file(log.path());
    }

    #[test]
    fn test_concurrent_appends_do_not_interleave() {
        let log = std::sync::Arc::new(temp_log());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let log = log.clone();
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        let msg = Message::new(tags::VOLTAGE).with_field("worker", i);
                        log.append(&msg, at()).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let contents = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(contents.lines().count(), 100);
        for line in contents.lines() {
            assert!(decode_record(line.as_bytes()).is_ok());
        }
        let _ = std::fs::remove_file(log.path());
    }
}
