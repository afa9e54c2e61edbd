//! Radio transceiver interface.

use crate::TransportError;

/// Raw packet access to a radio transceiver.
///
/// Implementations wrap the physical driver (or a simulated link). All
/// operations are synchronous; `try_receive` must not block.
pub trait Transport {
    /// Transmit one packet.
    fn transmit(&mut self, payload: &[u8]) -> Result<(), TransportError>;

    /// Return the next received packet, if one is waiting.
    fn try_receive(&mut self) -> Option<Vec<u8>>;

    /// RSSI of the most recently received packet, in dBm.
    fn signal_strength(&self) -> i32;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn transmit(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        (**self).transmit(payload)
    }

    fn try_receive(&mut self) -> Option<Vec<u8>> {
        (**self).try_receive()
    }

    fn signal_strength(&self) -> i32 {
        (**self).signal_strength()
    }
}
