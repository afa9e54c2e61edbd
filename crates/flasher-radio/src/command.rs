//! Command handlers selected by message tag.

use flasher_message::{encode_message, field_text, tags, Message};
use tracing::debug;

use crate::{Peripherals, RadioResult, Transport};

/// One analog channel sampled by the voltage query.
#[derive(Debug, Clone, PartialEq)]
pub struct VoltageChannel {
    /// Field key the reading is reported under (e.g. `SOLAR`).
    pub key: String,
    /// ADC pin.
    pub pin: u8,
    /// Volts per raw ADC count.
    pub volts_per_count: f64,
}

impl VoltageChannel {
    /// Create a channel description.
    pub fn new(key: impl Into<String>, pin: u8, volts_per_count: f64) -> Self {
        VoltageChannel {
            key: key.into(),
            pin,
            volts_per_count,
        }
    }
}

/// What a handler may touch while executing.
pub struct CommandContext<'a> {
    /// Radio used to send replies.
    pub transport: &'a mut dyn Transport,
    /// Local hardware.
    pub peripherals: &'a mut dyn Peripherals,
}

/// A handler for one message tag.
///
/// Handlers are stateless apart from the pins they were built with.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Energize a relay and acknowledge.
    RelayOn {
        /// Relay pin.
        pin: u8,
    },
    /// De-energize a relay and acknowledge.
    RelayOff {
        /// Relay pin.
        pin: u8,
    },
    /// Sample the configured channels and reply with the voltages.
    VoltageQuery {
        /// Channels to sample, in reply order.
        channels: Vec<VoltageChannel>,
    },
    /// Record a peer's reply; no side effect beyond display.
    Acknowledge,
    /// Nothing was heard before the deadline.
    NoMessage,
    /// A packet was heard but could not be used.
    InvalidMessage,
}

impl Command {
    /// Short handler name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Command::RelayOn { .. } => "RelayOn",
            Command::RelayOff { .. } => "RelayOff",
            Command::VoltageQuery { .. } => "VoltageQuery",
            Command::Acknowledge => "Acknowledge",
            Command::NoMessage => "NoMessage",
            Command::InvalidMessage => "InvalidMessage",
        }
    }

    /// Lines to show on the local display for `message`.
    pub fn describe(&self, message: &Message) -> Vec<String> {
        match self {
            Command::NoMessage => vec![tags::NO_MESSAGE.to_string(), "timed out".to_string()],
            Command::InvalidMessage => vec![message.tag.clone(), "invalid message".to_string()],
            _ => {
                let mut lines = vec![message.tag.clone(), "confirmed".to_string()];
                for (key, value) in &message.fields {
                    lines.push(format!("{} {}", key, field_text(value)));
                }
                if let Some(rssi) = message.signal_strength {
                    lines.push(format!("rssi {}", rssi));
                }
                lines
            }
        }
    }

    /// Run the handler. Returns the reply transmitted to the peer, if any.
    pub fn execute(
        &self,
        message: &Message,
        ctx: &mut CommandContext<'_>,
    ) -> RadioResult<Option<Message>> {
        let reply = match self {
            Command::RelayOn { pin } => {
                ctx.peripherals.set_relay(*pin, true);
                Some(Message::new(message.tag.clone()))
            }
            Command::RelayOff { pin } => {
                ctx.peripherals.set_relay(*pin, false);
                Some(Message::new(message.tag.clone()))
            }
            Command::VoltageQuery { channels } => {
                let mut reply = Message::new(tags::VOLTAGE);
                for channel in channels {
                    let volts = ctx.peripherals.read_adc(channel.pin) * channel.volts_per_count;
                    reply = reply.with_field(channel.key.clone(), round_millivolts(volts));
                }
                Some(reply)
            }
            Command::Acknowledge | Command::NoMessage | Command::InvalidMessage => None,
        };

        if let Some(ref reply) = reply {
            debug!("{} replying with {}", self.name(), reply.tag);
            ctx.transport.transmit(&encode_message(reply))?;
        }
        Ok(reply)
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::RelayOn { pin } => write!(f, "RelayOn(pin {})", pin),
            Command::RelayOff { pin } => write!(f, "RelayOff(pin {})", pin),
            other => f.write_str(other.name()),
        }
    }
}

fn round_millivolts(volts: f64) -> f64 {
    (volts * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{simulated_link_pair, SimulatedPeripherals};
    use flasher_message::decode_message;
    use std::collections::HashMap;

    #[test]
    fn test_relay_on_energizes_and_acknowledges() {
        let (mut site, mut tower) = simulated_link_pair(-70);
        let mut hw = SimulatedPeripherals::new(HashMap::new());
        let mut ctx = CommandContext {
            transport: &mut site,
            peripherals: &mut hw,
        };

        let msg = Message::new(tags::RELAY_ON).with_field("time", 5);
        let reply = Command::RelayOn { pin: 14 }.execute(&msg, &mut ctx).unwrap();

        assert_eq!(reply, Some(Message::new(tags::RELAY_ON)));
        assert!(hw.relay(14));
        let sent = decode_message(&tower.try_receive().unwrap()).unwrap();
        assert_eq!(sent.tag, tags::RELAY_ON);
    }

    #[test]
    fn test_voltage_query_scales_counts() {
        let (mut site, mut tower) = simulated_link_pair(-70);
        let mut hw = SimulatedPeripherals::new(HashMap::from([(35, 1000.0), (34, 2000.0)]));
        let mut ctx = CommandContext {
            transport: &mut site,
            peripherals: &mut hw,
        };
        let cmd = Command::VoltageQuery {
            channels: vec![
                VoltageChannel::new("SOLAR", 35, 4.25e-3),
                VoltageChannel::new("BATT1", 34, 4.28e-3),
            ],
        };

        cmd.execute(&Message::new(tags::VOLTAGE), &mut ctx).unwrap();

        let sent = decode_message(&tower.try_receive().unwrap()).unwrap();
        assert_eq!(sent.field("SOLAR").and_then(|v| v.as_f64()), Some(4.25));
        assert_eq!(sent.field("BATT1").and_then(|v| v.as_f64()), Some(8.56));
        let keys: Vec<&str> = sent.fields.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["SOLAR", "BATT1"]);
    }

    #[test]
    fn test_synthetic_handlers_do_not_transmit() {
        let (mut site, mut tower) = simulated_link_pair(-70);
        let mut hw = SimulatedPeripherals::default();
        let mut ctx = CommandContext {
            transport: &mut site,
            peripherals: &mut hw,
        };

        for cmd in [Command::NoMessage, Command::InvalidMessage, Command::Acknowledge] {
            assert_eq!(cmd.execute(&Message::no_message(), &mut ctx).unwrap(), None);
        }
        assert!(tower.try_receive().is_none());
    }

    #[test]
    fn test_describe_lists_fields_and_rssi() {
        let msg = Message::new(tags::VOLTAGE)
            .with_field("SOLAR", 3.5)
            .with_signal_strength(-88);
        assert_eq!(
            Command::Acknowledge.describe(&msg),
            vec!["VOLTAGE", "confirmed", "SOLAR 3.5", "rssi -88"]
        );
        assert_eq!(
            Command::NoMessage.describe(&Message::no_message()),
            vec!["NOMESSAGE", "timed out"]
        );
    }
}
