//! In-process simulated radio link.
//!
//! Two [`SimulatedLink`] ends are joined by a pair of channels so a tower
//! session and a site session can run against each other without hardware.

use crossbeam_channel::{Receiver, Sender};
use tracing::trace;

use crate::{Transport, TransportError};

/// One end of a simulated point-to-point radio link.
#[derive(Debug, Clone)]
pub struct SimulatedLink {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
    rssi_dbm: i32,
    drop_outgoing: bool,
}

/// Create a connected pair of link ends. Both report `rssi_dbm` for every
/// packet they receive.
pub fn simulated_link_pair(rssi_dbm: i32) -> (SimulatedLink, SimulatedLink) {
    let (a_tx, b_rx) = crossbeam_channel::unbounded();
    let (b_tx, a_rx) = crossbeam_channel::unbounded();
    (
        SimulatedLink {
            tx: a_tx,
            rx: a_rx,
            rssi_dbm,
            drop_outgoing: false,
        },
        SimulatedLink {
            tx: b_tx,
            rx: b_rx,
            rssi_dbm,
            drop_outgoing: false,
        },
    )
}

impl SimulatedLink {
    /// Silently lose every packet this end transmits (a dead antenna).
    pub fn with_drop_outgoing(mut self, drop_outgoing: bool) -> Self {
        self.drop_outgoing = drop_outgoing;
        self
    }
}

impl Transport for SimulatedLink {
    fn transmit(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        if self.drop_outgoing {
            trace!("simulated link dropped {} bytes", payload.len());
            return Ok(());
        }
        self.tx
            .send(payload.to_vec())
            .map_err(|_| TransportError::new("simulated peer disconnected"))
    }

    fn try_receive(&mut self) -> Option<Vec<u8>> {
        self.rx.try_recv().ok()
    }

    fn signal_strength(&self) -> i32 {
        self.rssi_dbm
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_is_bidirectional() {
        let (mut a, mut b) = simulated_link_pair(-60);
        a.transmit(b"ping").unwrap();
        b.transmit(b"pong").unwrap();
        assert_eq!(b.try_receive(), Some(b"ping".to_vec()));
        assert_eq!(a.try_receive(), Some(b"pong".to_vec()));
        assert_eq!(a.try_receive(), None);
        assert_eq!(a.signal_strength(), -60);
    }

    #[test]
    fn test_drop_outgoing() {
        let (a, mut b) = simulated_link_pair(-60);
        let mut a = a.with_drop_outgoing(true);
        a.transmit(b"lost").unwrap();
        assert_eq!(b.try_receive(), None);
    }

    #[test]
    fn test_transmit_to_dropped_peer_fails() {
        let (mut a, b) = simulated_link_pair(-60);
        drop(b);
        assert!(a.transmit(b"anyone?").is_err());
    }
}
