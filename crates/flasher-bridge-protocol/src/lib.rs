//! Incline Flasher Command Bridge Protocol
//!
//! This crate provides the text protocol operators use to drive the flasher
//! site through the control tower. It is deliberately tiny: one connection
//! carries one request line and receives one response line.
//!
//! # Protocol Overview
//!
//! - **Request** (operator → tower): `<COMMAND> [arg1] [arg2] ...`, where
//!   `COMMAND` is an upper-case command name and the arguments are decimal
//!   integers.
//! - **Response** (tower → operator): a single newline-terminated line.
//!
//! # Commands
//!
//! - `FLASH [seconds]`: fire the flasher for the given on-time (default from
//!   configuration, never more than [`MAX_FLASH_SECS`]).
//! - `VOLTAGE`: report the site's solar and battery voltages.
//!
//! # Responses
//!
//! ```text
//! FLASH 60 2024-05-01 17:03:12
//! VOLTAGE 2024-05-01 17:04:40 solar 13.1 batt1 12.6
//! NO RESPONSE FROM FLASHER
//! BOGUS: unrecognized command
//! Possible commands: FLASH VOLTAGE
//! ```
//!
//! # Example
//!
//! ```rust
//! use flasher_bridge_protocol::{BridgeCommandSet, RadioAction, Request};
//!
//! let mut commands = BridgeCommandSet::new(10);
//! let request = Request::parse("FLASH 120").unwrap();
//! let action = commands.get_mut(request.name).validate(&request.args);
//! assert_eq!(action, RadioAction::Flash { on_secs: 60 });
//! ```

mod codec;
mod commands;
mod error;
mod responses;

pub use codec::*;
pub use commands::*;
pub use error::*;
pub use responses::*;
