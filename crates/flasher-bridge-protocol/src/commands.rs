//! Bridge request parsing and the command set.
//!
//! A request line is split on whitespace. The first token selects the
//! command (exact, upper-case match); the remaining tokens must be
//! non-negative decimal integers. Parsing has no side effects, so an
//! unknown or malformed request never reaches the radio.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use flasher_message::Message;

use crate::{format_timestamp, render_fields, BridgeError, BridgeResult, NO_RESPONSE};

/// Hard upper bound on the flasher on-time, in seconds.
pub const MAX_FLASH_SECS: u32 = 60;

/// On-time used when `FLASH` is given no argument and nothing is configured.
pub const DEFAULT_FLASH_SECS: u32 = 10;

/// Names of the commands the bridge accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandName {
    /// `FLASH [secs]`: run one relay on/off cycle.
    Flash,
    /// `VOLTAGE`: read the site's voltage channels.
    Voltage,
}

impl CommandName {
    /// All commands, in the order they are advertised.
    pub const ALL: [CommandName; 2] = [CommandName::Flash, CommandName::Voltage];

    /// The name as typed on the control connection.
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandName::Flash => "FLASH",
            CommandName::Voltage => "VOLTAGE",
        }
    }
}

impl FromStr for CommandName {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CommandName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or(())
    }
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed request line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// The command selected by the first token.
    pub name: CommandName,
    /// The remaining tokens, parsed as decimal integers.
    pub args: Vec<u64>,
    /// The request as received, trimmed.
    pub input: String,
}

impl Request {
    /// Parse a request line.
    pub fn parse(line: &str) -> BridgeResult<Request> {
        let input = line.trim();
        let mut tokens = input.split_whitespace();

        let name = tokens
            .next()
            .and_then(|token| token.parse::<CommandName>().ok())
            .ok_or_else(|| BridgeError::UnknownCommand {
                input: input.to_string(),
            })?;

        let args = tokens
            .map(|token| {
                token
                    .parse::<u64>()
                    .map_err(|_| BridgeError::InvalidArgument {
                        input: input.to_string(),
                        token: token.to_string(),
                    })
            })
            .collect::<BridgeResult<Vec<_>>>()?;

        Ok(Request {
            name,
            args,
            input: input.to_string(),
        })
    }
}

/// What the tower radio must do to satisfy a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioAction {
    /// Relay on, hold for `on_secs`, relay off.
    Flash { on_secs: u32 },
    /// Ask the site for its voltages.
    QueryVoltage,
}

/// The `FLASH [seconds]` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashCommand {
    default_secs: u32,
    max_secs: u32,
    last_secs: Option<u32>,
}

impl FlashCommand {
    pub fn new(default_secs: u32) -> Self {
        Self {
            default_secs,
            max_secs: MAX_FLASH_SECS,
            last_secs: None,
        }
    }

    /// On-time for the given arguments: the first argument or the default,
    /// never above the maximum. Extra arguments are ignored.
    pub fn effective_secs(&self, args: &[u64]) -> u32 {
        let requested = args.first().copied().unwrap_or(self.default_secs as u64);
        requested.min(self.max_secs as u64) as u32
    }

    pub fn default_secs(&self) -> u32 {
        self.default_secs.min(self.max_secs)
    }

    /// On-time of the most recent validated request.
    pub fn last_secs(&self) -> Option<u32> {
        self.last_secs
    }
}

/// The `VOLTAGE` command. Arguments are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoltageCommand;

/// A command the bridge can run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeCommand {
    Flash(FlashCommand),
    Voltage(VoltageCommand),
}

impl BridgeCommand {
    pub fn name(&self) -> CommandName {
        match self {
            BridgeCommand::Flash(_) => CommandName::Flash,
            BridgeCommand::Voltage(_) => CommandName::Voltage,
        }
    }

    /// Turn request arguments into a radio action, remembering what was
    /// decided so the reply can echo it.
    pub fn validate(&mut self, args: &[u64]) -> RadioAction {
        match self {
            BridgeCommand::Flash(flash) => {
                let on_secs = flash.effective_secs(args);
                flash.last_secs = Some(on_secs);
                RadioAction::Flash { on_secs }
            }
            BridgeCommand::Voltage(_) => RadioAction::QueryVoltage,
        }
    }

    /// Render the response line for a flasher reply.
    ///
    /// Synthetic replies (nothing heard, or garbage heard) render as
    /// [`NO_RESPONSE`].
    pub fn format_reply(&self, reply: &Message, now: DateTime<Utc>) -> String {
        if reply.is_synthetic() {
            return NO_RESPONSE.to_string();
        }
        let head = match self {
            BridgeCommand::Flash(flash) => format!(
                "{} {}",
                CommandName::Flash,
                flash.last_secs.unwrap_or_else(|| flash.default_secs())
            ),
            BridgeCommand::Voltage(_) => CommandName::Voltage.to_string(),
        };
        format!(
            "{} {}{}\n",
            head,
            format_timestamp(now),
            render_fields(&reply.fields)
        )
    }
}

/// The fixed set of bridge commands, one instance per name.
#[derive(Debug, Clone)]
pub struct BridgeCommandSet {
    flash: BridgeCommand,
    voltage: BridgeCommand,
}

impl BridgeCommandSet {
    pub fn new(default_flash_secs: u32) -> Self {
        Self {
            flash: BridgeCommand::Flash(FlashCommand::new(default_flash_secs)),
            voltage: BridgeCommand::Voltage(VoltageCommand),
        }
    }

    pub fn get(&self, name: CommandName) -> &BridgeCommand {
        match name {
            CommandName::Flash => &self.flash,
            CommandName::Voltage => &self.voltage,
        }
    }

    pub fn get_mut(&mut self, name: CommandName) -> &mut BridgeCommand {
        match name {
            CommandName::Flash => &mut self.flash,
            CommandName::Voltage => &mut self.voltage,
        }
    }

    /// Command names in advertised order.
    pub fn names(&self) -> Vec<&'static str> {
        CommandName::ALL.iter().map(CommandName::as_str).collect()
    }
}

impl Default for BridgeCommandSet {
    fn default() -> Self {
        Self::new(DEFAULT_FLASH_SECS)
    }
}
