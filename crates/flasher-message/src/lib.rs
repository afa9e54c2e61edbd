//! Incline flasher radio messages.
//!
//! Every packet exchanged between the control tower and the flasher site is a
//! flat JSON object. The reserved key `msg` carries the message tag, every
//! other key is an application field:
//!
//! ```text
//! {"msg":"VOLTAGE","SOLAR":3.5,"BATT1":4.1}
//! ```
//!
//! Two tags are synthetic and never travel over the air as real content:
//! [`tags::NO_MESSAGE`] (nothing was heard before the deadline) and
//! [`tags::INVALID_MESSAGE`] (something was heard but could not be decoded).
//!
//! # Example
//!
//! ```rust
//! use flasher_message::{decode_message, encode_message, tags, Message};
//!
//! let msg = Message::new(tags::VOLTAGE).with_field("SOLAR", 3.5);
//! let bytes = encode_message(&msg);
//! assert_eq!(decode_message(&bytes).unwrap(), msg);
//! ```

mod codec;
mod error;
mod message;

pub use codec::*;
pub use error::*;
pub use message::*;

/// Well-known message tags.
pub mod tags {
    /// Synthetic tag: no packet arrived before the listen deadline.
    pub const NO_MESSAGE: &str = "NOMESSAGE";
    /// Synthetic tag: a packet arrived but could not be decoded.
    pub const INVALID_MESSAGE: &str = "INVALIDMESSAGE";
    /// Switch the flasher relay on.
    pub const RELAY_ON: &str = "RELAY_ON";
    /// Switch the flasher relay off.
    pub const RELAY_OFF: &str = "RELAY_OFF";
    /// Sample the site voltages.
    pub const VOLTAGE: &str = "VOLTAGE";

    /// Returns true for tags generated locally rather than received from a peer.
    pub fn is_synthetic(tag: &str) -> bool {
        tag == NO_MESSAGE || tag == INVALID_MESSAGE
    }
}
