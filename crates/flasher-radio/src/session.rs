//! The send/listen/dispatch state machine.
//!
//! ```text
//! Idle ─send─▶ Sending ─▶ Listening ─packet─▶ Decoding ─▶ Dispatching ─▶ Idle
//!                             │                                ▲
//!                             └──────────timeout───────────────┘ (NOMESSAGE)
//! ```

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use flasher_message::{decode_message, encode_message, tags, Message};
use flasher_metrics::{metric_defs, MetricLabels};
use tracing::{debug, info, trace, warn};

use crate::{CommandContext, CommandRegistry, Peripherals, RadioResult, Transport};

/// Timing parameters for a session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionConfig {
    /// How long to listen for a reply after sending.
    pub reply_timeout: Duration,
    /// Delay between receive polls.
    pub poll_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            reply_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Where the session is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No cycle in flight.
    Idle,
    /// Handing a command to the transport.
    Sending,
    /// Polling for a reply.
    Listening,
    /// Parsing a received packet.
    Decoding,
    /// Running the handler for a message.
    Dispatching,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Sending => "sending",
            SessionState::Listening => "listening",
            SessionState::Decoding => "decoding",
            SessionState::Dispatching => "dispatching",
        };
        f.write_str(name)
    }
}

/// Result of dispatching one message.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    /// The message that was dispatched (possibly synthetic).
    pub message: Message,
    /// Name of the handler that ran.
    pub handler: &'static str,
    /// Reply transmitted by the handler, if any.
    pub reply: Option<Message>,
}

impl Dispatch {
    /// True when a real peer message was handled.
    pub fn heard_peer(&self) -> bool {
        !self.message.is_synthetic()
    }
}

/// Tally of a [`RadioSession::listen_for_duration`] window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListenSummary {
    /// Listen/dispatch cycles run.
    pub cycles: u32,
    /// Cycles that handled a peer message.
    pub handled: u32,
    /// Cycles that timed out.
    pub silent: u32,
    /// Cycles that received an undecodable packet.
    pub invalid: u32,
    /// The final dispatch of the window.
    pub last: Option<Dispatch>,
}

impl ListenSummary {
    /// Whether any peer message was handled during the window.
    pub fn heard_anything(&self) -> bool {
        self.handled > 0
    }
}

/// One end of the radio link.
///
/// Only one cycle can be in flight: every cycle borrows the session mutably,
/// and the session owns its transport. Callers that share a session queue
/// their requests (see the tower radio worker).
pub struct RadioSession<T, P> {
    transport: T,
    peripherals: P,
    registry: Arc<CommandRegistry>,
    config: SessionConfig,
    state: SessionState,
    labels: MetricLabels,
}

impl<T: Transport, P: Peripherals> RadioSession<T, P> {
    /// Create an idle session.
    pub fn new(
        transport: T,
        peripherals: P,
        registry: Arc<CommandRegistry>,
        config: SessionConfig,
    ) -> Self {
        let labels = MetricLabels::new(registry.role().as_str());
        RadioSession {
            transport,
            peripherals,
            registry,
            config,
            state: SessionState::Idle,
            labels,
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Session timing.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The handler registry.
    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// Mutable access to the local hardware.
    pub fn peripherals_mut(&mut self) -> &mut P {
        &mut self.peripherals
    }

    /// Mutable access to the transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Send `message` and wait up to the configured reply timeout.
    pub fn send_command(&mut self, message: Message) -> RadioResult<Dispatch> {
        let timeout = self.config.reply_timeout;
        self.send_command_with_timeout(message, timeout)
    }

    /// Send `message` and wait up to `timeout` for a reply, then dispatch it.
    ///
    /// Returns [`RadioError::Transmit`](crate::RadioError::Transmit) if the transport refuses the packet;
    /// every other outcome is a [`Dispatch`].
    pub fn send_command_with_timeout(
        &mut self,
        message: Message,
        timeout: Duration,
    ) -> RadioResult<Dispatch> {
        self.state = SessionState::Sending;
        debug!("[{}] sending {}", self.labels.role, message.tag);
        if let Err(e) = self.transport.transmit(&encode_message(&message)) {
            warn!("[{}] transmit of {} failed: {}", self.labels.role, message.tag, e);
            self.state = SessionState::Idle;
            return Err(e.into());
        }
        metrics::counter!(
            metric_defs::RADIO_COMMANDS_SENT.name,
            &self.labels.with(&[("tag", message.tag.clone())])
        )
        .increment(1);

        let reply = self.listen(timeout);
        self.dispatch(reply)
    }

    /// Poll the transport until a usable packet arrives or `timeout` elapses.
    ///
    /// Never fails: silence yields NOMESSAGE and garbage yields INVALIDMESSAGE.
    /// A decoded NOMESSAGE from a peer is ignored.
    pub fn listen(&mut self, timeout: Duration) -> Message {
        self.state = SessionState::Listening;
        // No deadline when `timeout` runs past the end of the clock.
        let deadline = Instant::now().checked_add(timeout);

        loop {
            if let Some(packet) = self.transport.try_receive() {
                if let Some(message) = self.decode_packet(&packet) {
                    return message;
                }
                self.state = SessionState::Listening;
            }

            let left = deadline
                .map_or(Duration::MAX, |d| d.saturating_duration_since(Instant::now()));
            if left.is_zero() {
                trace!("[{}] listen timed out after {:?}", self.labels.role, timeout);
                metrics::counter!(metric_defs::RADIO_TIMEOUTS.name, &self.labels.to_labels())
                    .increment(1);
                return Message::no_message();
            }
            thread::sleep(self.config.poll_interval.min(left));
        }
    }

    /// Decode a received packet. `None` means "keep listening".
    fn decode_packet(&mut self, packet: &[u8]) -> Option<Message> {
        if packet.is_empty() {
            return None;
        }
        self.state = SessionState::Decoding;
        let rssi = self.transport.signal_strength();

        match decode_message(packet) {
            Ok(message) if message.tag == tags::NO_MESSAGE => {
                debug!("[{}] ignoring NOMESSAGE from peer", self.labels.role);
                None
            }
            Ok(message) => {
                metrics::counter!(
                    metric_defs::RADIO_MESSAGES_RECEIVED.name,
                    &self.labels.with(&[("tag", message.tag.clone())])
                )
                .increment(1);
                metrics::histogram!(metric_defs::RADIO_RX_RSSI.name, &self.labels.to_labels())
                    .record(rssi as f64);
                Some(message.with_signal_strength(rssi))
            }
            Err(e) => {
                warn!("[{}] {} ({} bytes)", self.labels.role, e, packet.len());
                metrics::counter!(
                    metric_defs::RADIO_INVALID_MESSAGES.name,
                    &self.labels.to_labels()
                )
                .increment(1);
                Some(Message::invalid_message().with_signal_strength(rssi))
            }
        }
    }

    /// Run the handler registered for the message's tag.
    pub fn dispatch(&mut self, message: Message) -> RadioResult<Dispatch> {
        self.state = SessionState::Dispatching;
        let registry = Arc::clone(&self.registry);
        let command = registry.lookup(&message.tag);
        debug!("[{}] dispatching {} to {}", self.labels.role, message.tag, command);

        self.peripherals.display_lines(&command.describe(&message));
        let mut ctx = CommandContext {
            transport: &mut self.transport,
            peripherals: &mut self.peripherals,
        };
        let result = command.execute(&message, &mut ctx);
        self.state = SessionState::Idle;

        Ok(Dispatch {
            reply: result?,
            handler: command.name(),
            message,
        })
    }

    /// Listen and dispatch repeatedly for up to `window` of wall-clock time.
    ///
    /// Used by unattended site loops. What silence means (e.g. a hard reset)
    /// is up to the caller.
    pub fn listen_for_duration(&mut self, window: Duration) -> RadioResult<ListenSummary> {
        let start = Instant::now();
        let mut summary = ListenSummary::default();

        while start.elapsed() < window {
            let remaining = window.saturating_sub(start.elapsed());
            let message = self.listen(self.config.reply_timeout.min(remaining));
            let dispatch = self.dispatch(message)?;

            summary.cycles += 1;
            match dispatch.message.tag.as_str() {
                tags::NO_MESSAGE => summary.silent += 1,
                tags::INVALID_MESSAGE => summary.invalid += 1,
                _ => summary.handled += 1,
            }
            summary.last = Some(dispatch);
        }

        info!(
            "[{}] listen window done: {} cycles, {} handled, {} silent, {} invalid",
            self.labels.role, summary.cycles, summary.handled, summary.silent, summary.invalid
        );
        Ok(summary)
    }
}
