//! Metrics infrastructure for the incline flasher controller.
//!
//! Every metric is declared once as a [`Metric`] constant in [`metric_defs`]
//! so names cannot drift between the radio session and the bridge. Recording
//! goes through the `metrics` facade and is a no-op until a recorder is
//! installed.
//!
//! # Example
//!
//! ```rust
//! use flasher_metrics::{metric_defs, MetricLabels};
//!
//! let labels = MetricLabels::new("tower");
//! metrics::counter!(metric_defs::RADIO_COMMANDS_SENT.name, &labels.to_labels()).increment(1);
//! ```

pub use metrics;

use metrics::{describe_counter, describe_histogram, Unit};

/// What a metric records. The controller only counts events and samples
/// distributions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Histogram,
}

/// A metric declaration: name, kind, and the metadata handed to the recorder.
#[derive(Debug, Clone)]
pub struct Metric {
    /// Dotted name, e.g. `flasher.radio.timeouts`.
    pub name: &'static str,
    pub kind: MetricKind,
    pub description: &'static str,
    pub unit: Option<Unit>,
    /// Label keys recorded alongside the metric.
    pub labels: &'static [&'static str],
}

impl Metric {
    const fn new(name: &'static str, kind: MetricKind) -> Self {
        Self {
            name,
            kind,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    pub const fn counter(name: &'static str) -> Self {
        Self::new(name, MetricKind::Counter)
    }

    pub const fn histogram(name: &'static str) -> Self {
        Self::new(name, MetricKind::Histogram)
    }

    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    pub const fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    pub const fn with_labels(mut self, labels: &'static [&'static str]) -> Self {
        self.labels = labels;
        self
    }

    /// Register the description (and unit, if any) with the installed recorder.
    pub fn describe(&self) {
        match (self.kind, self.unit) {
            (MetricKind::Counter, Some(unit)) => {
                describe_counter!(self.name, unit, self.description);
            }
            (MetricKind::Counter, None) => {
                describe_counter!(self.name, self.description);
            }
            (MetricKind::Histogram, Some(unit)) => {
                describe_histogram!(self.name, unit, self.description);
            }
            (MetricKind::Histogram, None) => {
                describe_histogram!(self.name, self.description);
            }
        }
    }
}

/// All metric definitions for the controller.
pub mod metric_defs {
    use super::{Metric, Unit};

    // ========================================================================
    // Radio Session Metrics
    // ========================================================================

    /// Commands transmitted by a radio session.
    pub const RADIO_COMMANDS_SENT: Metric = Metric::counter("flasher.radio.commands_sent")
        .with_description("Commands transmitted over the radio link")
        .with_unit(Unit::Count)
        .with_labels(&["role", "tag"]);

    /// Valid replies or commands received.
    pub const RADIO_MESSAGES_RECEIVED: Metric = Metric::counter("flasher.radio.messages_received")
        .with_description("Decodable messages received over the radio link")
        .with_unit(Unit::Count)
        .with_labels(&["role", "tag"]);

    /// Listen windows that ended without a valid message.
    pub const RADIO_TIMEOUTS: Metric = Metric::counter("flasher.radio.timeouts")
        .with_description("Listen windows that expired without a valid message")
        .with_unit(Unit::Count)
        .with_labels(&["role"]);

    /// Packets that failed to decode.
    pub const RADIO_INVALID_MESSAGES: Metric = Metric::counter("flasher.radio.invalid_messages")
        .with_description("Received packets that could not be decoded")
        .with_unit(Unit::Count)
        .with_labels(&["role"]);

    /// Signal strength of received packets.
    pub const RADIO_RX_RSSI: Metric = Metric::histogram("flasher.radio.rx_rssi_dbm")
        .with_description("Received signal strength in dBm")
        .with_labels(&["role"]);

    // ========================================================================
    // Command Bridge Metrics
    // ========================================================================

    /// Control-connection requests handled.
    pub const BRIDGE_REQUESTS: Metric = Metric::counter("flasher.bridge.requests")
        .with_description("Command bridge requests handled")
        .with_unit(Unit::Count)
        .with_labels(&["command"]);

    /// Requests naming an unknown command.
    pub const BRIDGE_UNKNOWN_COMMANDS: Metric = Metric::counter("flasher.bridge.unknown_commands")
        .with_description("Command bridge requests with an unrecognized command")
        .with_unit(Unit::Count);

    /// Requests answered with the no-response sentinel.
    pub const BRIDGE_NO_RESPONSE: Metric = Metric::counter("flasher.bridge.no_response")
        .with_description("Command bridge requests the flasher never answered")
        .with_unit(Unit::Count)
        .with_labels(&["command"]);

    /// Time from request to reply.
    pub const BRIDGE_REQUEST_LATENCY: Metric = Metric::histogram("flasher.bridge.request_latency_s")
        .with_description("Command bridge request latency in seconds")
        .with_unit(Unit::Seconds)
        .with_labels(&["command"]);

    /// All metrics, for registration.
    pub const ALL: &[&Metric] = &[
        &RADIO_COMMANDS_SENT,
        &RADIO_MESSAGES_RECEIVED,
        &RADIO_TIMEOUTS,
        &RADIO_INVALID_MESSAGES,
        &RADIO_RX_RSSI,
        &BRIDGE_REQUESTS,
        &BRIDGE_UNKNOWN_COMMANDS,
        &BRIDGE_NO_RESPONSE,
        &BRIDGE_REQUEST_LATENCY,
    ];
}

/// Labels identifying which side of the link recorded a metric.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricLabels {
    /// Deployment role: `tower` or `site`.
    pub role: String,
}

impl MetricLabels {
    /// Creates labels for the given deployment role.
    pub fn new(role: impl Into<String>) -> Self {
        Self { role: role.into() }
    }

    /// Returns labels as key-value pairs for use with the metrics crate.
    pub fn to_labels(&self) -> Vec<(&'static str, String)> {
        vec![("role", self.role.clone())]
    }

    /// Returns labels with additional key-value pairs.
    pub fn with(&self, extra: &[(&'static str, String)]) -> Vec<(&'static str, String)> {
        let mut labels = self.to_labels();
        labels.extend_from_slice(extra);
        labels
    }
}

/// Describes all metrics. Call once at startup after installing a recorder.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_labels() {
        let labels = MetricLabels::new("tower");
        assert_eq!(labels.to_labels(), vec![("role", "tower".to_string())]);
    }

    #[test]
    fn test_with_extra_labels() {
        let labels = MetricLabels::new("site");
        let extended = labels.with(&[("tag", "VOLTAGE".to_string())]);

        assert_eq!(extended.len(), 2);
        assert!(extended.contains(&("tag", "VOLTAGE".to_string())));
    }

    #[test]
    fn test_metric_definitions() {
        assert_eq!(metric_defs::RADIO_TIMEOUTS.name, "flasher.radio.timeouts");
        assert_eq!(metric_defs::RADIO_TIMEOUTS.kind, MetricKind::Counter);
        assert_eq!(metric_defs::RADIO_RX_RSSI.kind, MetricKind::Histogram);
        assert_eq!(metric_defs::BRIDGE_REQUEST_LATENCY.unit, Some(Unit::Seconds));
        assert_eq!(metric_defs::BRIDGE_REQUESTS.labels, &["command"]);
    }

    #[test]
    fn test_all_metric_names_unique() {
        let mut names: Vec<&str> = metric_defs::ALL.iter().map(|m| m.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), metric_defs::ALL.len());
    }

    #[test]
    fn test_every_metric_is_described() {
        for metric in metric_defs::ALL {
            assert!(!metric.description.is_empty(), "{} has no description", metric.name);
            assert!(metric.name.starts_with("flasher."));
        }
    }

    #[test]
    fn test_describe_without_recorder() {
        describe_metrics();
    }
}
