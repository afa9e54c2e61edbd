//! Tower and simulated-site configuration.
//!
//! Loaded from YAML. Every section has defaults, so an empty file (or no
//! file at all) yields a working setup:
//!
//! ```yaml
//! bridge:
//!   bind_addr: "0.0.0.0:9999"
//!   default_flash_secs: 20
//! radio:
//!   reply_timeout_secs: 10
//! site:
//!   voltage_channels:
//!     - { key: SOLAR, pin: 35, volts_per_count: 0.00425 }
//! response_log: /var/log/flasher/responses.txt
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use flasher_bridge_protocol::{RadioAction, MAX_FLASH_SECS};
use flasher_message::SOLAR_KEY;
use flasher_radio::{SessionConfig, VoltageChannel};
use serde::{Deserialize, Serialize};

use crate::{radio_worker, RunnerError, RunnerResult};

/// Upper bound on every configured timeout or delay (one day).
pub const MAX_TIMEOUT_SECS: u64 = 86_400;

/// Slowest accepted clock for flash holds.
pub const MIN_SPEED_MULTIPLIER: f64 = 0.01;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlasherConfig {
    pub bridge: BridgeConfig,
    pub radio: RadioConfig,
    pub site: SiteConfig,
    pub link: LinkConfig,
    /// Audit log of flasher replies.
    pub response_log: PathBuf,
}

impl Default for FlasherConfig {
    fn default() -> Self {
        FlasherConfig {
            bridge: BridgeConfig::default(),
            radio: RadioConfig::default(),
            site: SiteConfig::default(),
            link: LinkConfig::default(),
            response_log: PathBuf::from("response_logs.txt"),
        }
    }
}

impl FlasherConfig {
    /// Load and validate a YAML configuration file.
    pub fn load(path: &Path) -> RunnerResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse and validate YAML text.
    pub fn from_yaml(contents: &str) -> RunnerResult<Self> {
        let config: FlasherConfig = if contents.trim().is_empty() {
            FlasherConfig::default()
        } else {
            serde_yaml::from_str(contents)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> RunnerResult<()> {
        let flash = self.bridge.default_flash_secs;
        if !(1..=MAX_FLASH_SECS).contains(&flash) {
            return Err(RunnerError::Config(format!(
                "bridge.default_flash_secs must be between 1 and {}, got {}",
                MAX_FLASH_SECS, flash
            )));
        }
        if self.radio.reply_timeout_secs == 0 {
            return Err(RunnerError::Config(
                "radio.reply_timeout_secs must be positive".to_string(),
            ));
        }
        if self.radio.poll_interval_ms == 0 {
            return Err(RunnerError::Config(
                "radio.poll_interval_ms must be positive".to_string(),
            ));
        }
        let timeouts = [
            ("radio.reply_timeout_secs", self.radio.reply_timeout_secs),
            ("radio.msg_timeout_secs", self.radio.msg_timeout_secs),
            ("radio.poll_interval_ms", self.radio.poll_interval_ms / 1000),
            ("bridge.settle_delay_secs", self.bridge.settle_delay_secs),
            ("bridge.read_timeout_secs", self.bridge.read_timeout_secs),
        ];
        for (name, secs) in timeouts {
            if secs > MAX_TIMEOUT_SECS {
                return Err(RunnerError::Config(format!(
                    "{} is longer than {} seconds",
                    name, MAX_TIMEOUT_SECS
                )));
            }
        }
        let speed = self.radio.speed_multiplier;
        if !(speed.is_finite() && speed >= MIN_SPEED_MULTIPLIER) {
            return Err(RunnerError::Config(format!(
                "radio.speed_multiplier must be at least {}, got {}",
                MIN_SPEED_MULTIPLIER, speed
            )));
        }
        self.site.flasher_pin()?;
        Ok(())
    }
}

/// Command bridge (TCP) settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub bind_addr: String,
    /// On-time used by `FLASH` without an argument.
    pub default_flash_secs: u32,
    /// Slack added to the radio budget before giving up on a request.
    pub settle_delay_secs: u64,
    /// How long to wait for a client to send its request line.
    pub read_timeout_secs: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            bind_addr: "127.0.0.1:9999".to_string(),
            default_flash_secs: 10,
            settle_delay_secs: 10,
            read_timeout_secs: 5,
        }
    }
}

impl BridgeConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

/// Radio session timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioConfig {
    /// How long to wait for a reply to one command.
    pub reply_timeout_secs: u64,
    pub poll_interval_ms: u64,
    /// Length of one unattended listen window at the site.
    pub msg_timeout_secs: u64,
    /// Wall-clock speed-up applied to flash hold times (1.0 = real time).
    pub speed_multiplier: f64,
}

impl Default for RadioConfig {
    fn default() -> Self {
        RadioConfig {
            reply_timeout_secs: 10,
            poll_interval_ms: 100,
            msg_timeout_secs: 60,
            speed_multiplier: 1.0,
        }
    }
}

impl RadioConfig {
    pub fn reply_timeout(&self) -> Duration {
        Duration::from_secs(self.reply_timeout_secs)
    }

    pub fn msg_timeout(&self) -> Duration {
        Duration::from_secs(self.msg_timeout_secs)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            reply_timeout: self.reply_timeout(),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }

    /// Wall-clock time to hold the flasher relay on.
    pub fn hold_time(&self, on_secs: u32) -> Duration {
        radio_worker::hold_time(on_secs, self.speed_multiplier)
    }

    /// Worst-case radio time for an action: one reply timeout per command
    /// plus the hold time for a flash.
    pub fn budget(&self, action: RadioAction) -> Duration {
        match action {
            RadioAction::QueryVoltage => self.reply_timeout(),
            RadioAction::Flash { on_secs } => {
                self.reply_timeout().saturating_mul(2).saturating_add(self.hold_time(on_secs))
            }
        }
    }
}

/// One ADC channel sampled by the site's VOLTAGE handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoltageChannelConfig {
    pub key: String,
    pub pin: u8,
    pub volts_per_count: f64,
}

impl From<&VoltageChannelConfig> for VoltageChannel {
    fn from(config: &VoltageChannelConfig) -> Self {
        VoltageChannel::new(config.key.clone(), config.pin, config.volts_per_count)
    }
}

/// Flasher site hardware layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Relay name to GPIO pin.
    pub relays: BTreeMap<String, u8>,
    /// Which relay drives the flasher.
    pub flasher_relay: String,
    pub voltage_channels: Vec<VoltageChannelConfig>,
    /// Hard-reset the site after a listen window with no valid command.
    pub reset_on_silence: bool,
    /// Raw ADC readings reported by the simulated site, by pin.
    pub simulated_adc_counts: BTreeMap<u8, f64>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        let relays = [("flasher_pin", 14), ("hv_pin", 27), ("batt1_pin", 33), ("batt2_pin", 32)]
            .into_iter()
            .map(|(name, pin)| (name.to_string(), pin))
            .collect();
        SiteConfig {
            relays,
            flasher_relay: "flasher_pin".to_string(),
            voltage_channels: vec![
                VoltageChannelConfig {
                    key: SOLAR_KEY.to_string(),
                    pin: 35,
                    volts_per_count: 4.25e-3,
                },
                VoltageChannelConfig {
                    key: "BATT1".to_string(),
                    pin: 34,
                    volts_per_count: 4.28e-3,
                },
            ],
            reset_on_silence: true,
            simulated_adc_counts: [(35, 3082.0), (34, 2944.0)].into_iter().collect(),
        }
    }
}

impl SiteConfig {
    /// GPIO pin of the flasher relay.
    pub fn flasher_pin(&self) -> RunnerResult<u8> {
        self.relays.get(&self.flasher_relay).copied().ok_or_else(|| {
            RunnerError::Config(format!(
                "site.flasher_relay '{}' is not one of the configured relays",
                self.flasher_relay
            ))
        })
    }

    pub fn channels(&self) -> Vec<VoltageChannel> {
        self.voltage_channels.iter().map(VoltageChannel::from).collect()
    }
}

/// Simulated radio link settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Signal strength reported for every received packet.
    pub rssi_dbm: i32,
    /// Drop everything the site transmits (simulates an out-of-range site).
    pub drop_replies: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig {
            rssi_dbm: -70,
            drop_replies: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_yaml_is_default() {
        let config = FlasherConfig::from_yaml("").unwrap();
        assert_eq!(config, FlasherConfig::default());
        assert_eq!(config.bridge.bind_addr, "127.0.0.1:9999");
        assert_eq!(config.site.flasher_pin().unwrap(), 14);
    }

    #[test]
    fn test_partial_yaml_keeps_other_defaults() {
        let config = FlasherConfig::from_yaml(
            "bridge:\n  default_flash_secs: 20\nradio:\n  poll_interval_ms: 50\n",
        )
        .unwrap();
        assert_eq!(config.bridge.default_flash_secs, 20);
        assert_eq!(config.bridge.settle_delay_secs, 10);
        assert_eq!(config.radio.poll_interval_ms, 50);
        assert_eq!(config.radio.reply_timeout_secs, 10);
        assert_eq!(config.response_log, PathBuf::from("response_logs.txt"));
    }

    #[test]
    fn test_rejects_out_of_range_flash_default() {
        for secs in [0, 61] {
            let yaml = format!("bridge:\n  default_flash_secs: {}\n", secs);
            assert!(matches!(
                FlasherConfig::from_yaml(&yaml),
                Err(RunnerError::Config(_))
            ));
        }
    }

    #[test]
    fn test_rejects_zero_timings() {
        assert!(FlasherConfig::from_yaml("radio:\n  poll_interval_ms: 0\n").is_err());
        assert!(FlasherConfig::from_yaml("radio:\n  reply_timeout_secs: 0\n").is_err());
        assert!(FlasherConfig::from_yaml("radio:\n  speed_multiplier: 0.0\n").is_err());
    }

    #[test]
    fn test_rejects_oversized_timings() {
        let huge = "radio:\n  reply_timeout_secs: 18446744073709551615\n";
        assert!(matches!(FlasherConfig::from_yaml(huge), Err(RunnerError::Config(_))));
        let slow = "radio:\n  speed_multiplier: 0.001\n";
        assert!(matches!(FlasherConfig::from_yaml(slow), Err(RunnerError::Config(_))));
        assert!(FlasherConfig::from_yaml("bridge:\n  read_timeout_secs: 86400\n").is_ok());
        assert!(FlasherConfig::from_yaml("bridge:\n  read_timeout_secs: 86401\n").is_err());
    }

    #[test]
    fn test_budget_saturates() {
        let radio = RadioConfig {
            speed_multiplier: 0.0,
            ..RadioConfig::default()
        };
        assert_eq!(radio.budget(RadioAction::Flash { on_secs: 60 }), Duration::MAX);
    }

    #[test]
    fn test_rejects_unknown_flasher_relay() {
        let err = FlasherConfig::from_yaml("site:\n  flasher_relay: strobe\n").unwrap_err();
        assert!(err.to_string().contains("strobe"));
    }

    #[test]
    fn test_malformed_yaml() {
        assert!(matches!(
            FlasherConfig::from_yaml("bridge: [1, 2"),
            Err(RunnerError::Yaml(_))
        ));
    }

    #[test]
    fn test_budget() {
        let radio = RadioConfig {
            speed_multiplier: 2.0,
            ..RadioConfig::default()
        };
        assert_eq!(radio.budget(RadioAction::QueryVoltage), Duration::from_secs(10));
        assert_eq!(
            radio.budget(RadioAction::Flash { on_secs: 60 }),
            Duration::from_secs(50)
        );
    }

    #[test]
    fn test_default_channels() {
        let channels = SiteConfig::default().channels();
        assert_eq!(channels.len(), 2);
        assert_eq!(channels[0].key, "SOLAR");
        assert_eq!(channels[0].pin, 35);
        assert_eq!(channels[1].key, "BATT1");
    }
}
