//! Radio command/response protocol for the incline flasher.
//!
//! The control tower and the flasher site talk over a half-duplex LoRa link.
//! A [`RadioSession`] sends one tagged command, listens for a bounded time for
//! a tagged reply, and dispatches whatever it ends up with to the handler the
//! [`CommandRegistry`] holds for that tag. Every recoverable condition resolves
//! to a synthetic message:
//!
//! | Condition                  | Dispatched tag    |
//! |----------------------------|-------------------|
//! | nothing heard before deadline | `NOMESSAGE`    |
//! | packet failed to decode    | `INVALIDMESSAGE`  |
//! | tag not in the registry    | handled by `InvalidMessage` |
//!
//! Only a failure to transmit at all is reported as an error.
//!
//! The transceiver, relays, ADC and display are external collaborators behind
//! the [`Transport`] and [`Peripherals`] traits.

mod command;
mod error;
mod link;
mod peripherals;
mod registry;
mod session;
mod transport;

pub use command::*;
pub use error::*;
pub use link::*;
pub use peripherals::*;
pub use registry::*;
pub use session::*;
pub use transport::*;
