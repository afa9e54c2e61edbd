//! Tower radio worker.
//!
//! The tower's radio session lives on one dedicated thread. Requests arrive
//! over a crossbeam channel and are served strictly in order, so only one
//! radio cycle is ever in flight. Each request carries its own oneshot reply
//! channel; the outcome goes back to that requester alone. Every completed
//! dispatch along the way (both halves of a flash cycle) is appended to the
//! response log.
//!
//! ```text
//! bridge task ──RadioJob──► worker thread ──► RadioSession ──► Transport
//!      ▲                         │
//!      └──────oneshot────────────┘──► ResponseLog
//! ```

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::Utc;
use crossbeam_channel::{Receiver, Sender};
use flasher_bridge_protocol::RadioAction;
use flasher_message::{tags, Message};
use flasher_radio::{Dispatch, Peripherals, RadioError, RadioResult, RadioSession, Transport};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::{ResponseLog, RunnerError, RunnerResult};

/// Field on RELAY_ON carrying the requested on-time in seconds.
pub const FLASH_TIME_KEY: &str = "time";

/// Outcome of one radio action: the reply (possibly synthetic) or a
/// transmit failure.
pub type RadioOutcome = RadioResult<Message>;

/// Work for the radio thread.
#[derive(Debug)]
pub enum RadioJob {
    /// Perform an action and report the outcome.
    Run {
        action: RadioAction,
        reply: oneshot::Sender<RadioOutcome>,
    },
    /// Stop the thread.
    Shutdown,
}

/// Cloneable handle used by bridge tasks to reach the radio thread.
#[derive(Debug, Clone)]
pub struct RadioHandle {
    jobs: Sender<RadioJob>,
}

impl RadioHandle {
    /// Queue an action and wait for its outcome.
    pub async fn run(&self, action: RadioAction) -> RadioOutcome {
        let (reply, outcome) = oneshot::channel();
        self.jobs
            .send(RadioJob::Run { action, reply })
            .map_err(|_| RadioError::WorkerStopped)?;
        outcome.await.map_err(|_| RadioError::WorkerStopped)?
    }
}

/// The running radio thread.
pub struct RadioWorker {
    jobs: Sender<RadioJob>,
    thread: Option<JoinHandle<()>>,
}

impl RadioWorker {
    /// Spawn the radio thread around a tower session.
    ///
    /// `speed_multiplier` scales flash hold times (2.0 holds half as long).
    pub fn spawn<T, P>(
        session: RadioSession<T, P>,
        log: Arc<ResponseLog>,
        speed_multiplier: f64,
    ) -> RunnerResult<Self>
    where
        T: Transport + Send + 'static,
        P: Peripherals + Send + 'static,
    {
        if !(speed_multiplier.is_finite() && speed_multiplier > 0.0) {
            return Err(RunnerError::Config(format!(
                "speed multiplier must be positive, got {}",
                speed_multiplier
            )));
        }
        let (jobs, rx) = crossbeam_channel::unbounded();
        let thread = thread::Builder::new()
            .name("tower-radio".to_string())
            .spawn(move || run_worker(session, rx, log, speed_multiplier))?;
        Ok(RadioWorker {
            jobs,
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> RadioHandle {
        RadioHandle {
            jobs: self.jobs.clone(),
        }
    }

    /// Stop the thread after the job in progress, then join it.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let _ = self.jobs.send(RadioJob::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("tower radio thread panicked");
            }
        }
    }
}

impl Drop for RadioWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_worker<T: Transport, P: Peripherals>(
    mut session: RadioSession<T, P>,
    jobs: Receiver<RadioJob>,
    log: Arc<ResponseLog>,
    speed_multiplier: f64,
) {
    info!("tower radio thread started");
    for job in jobs.iter() {
        match job {
            RadioJob::Run { action, reply } => {
                let outcome = perform(&mut session, action, speed_multiplier, &log);
                if let Err(e) = &outcome {
                    warn!("{:?} failed: {}", action, e);
                }
                if reply.send(outcome).is_err() {
                    debug!("requester for {:?} went away", action);
                }
            }
            RadioJob::Shutdown => break,
        }
    }
    info!("tower radio thread stopped");
}

/// Run one action against the session, logging each completed dispatch.
pub fn perform<T: Transport, P: Peripherals>(
    session: &mut RadioSession<T, P>,
    action: RadioAction,
    speed_multiplier: f64,
    log: &ResponseLog,
) -> RadioOutcome {
    match action {
        RadioAction::QueryVoltage => {
            Ok(send_logged(session, Message::new(tags::VOLTAGE), log)?.message)
        }
        RadioAction::Flash { on_secs } => flash_cycle(session, on_secs, speed_multiplier, log),
    }
}

/// `send_command`, then append the dispatched message to the log.
///
/// A failed append is logged and does not fail the command.
fn send_logged<T: Transport, P: Peripherals>(
    session: &mut RadioSession<T, P>,
    message: Message,
    log: &ResponseLog,
) -> RadioResult<Dispatch> {
    let dispatch = session.send_command(message)?;
    if let Err(e) = log.append(&dispatch.message, Utc::now()) {
        warn!("failed to append to {}: {}", log.path().display(), e);
    }
    Ok(dispatch)
}

/// Wall-clock time to keep the flasher on for `on_secs` of simulated time.
///
/// Saturates at `Duration::MAX` when the multiplier is zero or tiny.
pub fn hold_time(on_secs: u32, speed_multiplier: f64) -> Duration {
    Duration::try_from_secs_f64(on_secs as f64 / speed_multiplier).unwrap_or(Duration::MAX)
}

/// RELAY_ON, hold, RELAY_OFF.
///
/// RELAY_OFF is always sent, even when RELAY_ON went unanswered, so the
/// relay is never left energized. The outcome is the first failure, else
/// the RELAY_OFF reply.
fn flash_cycle<T: Transport, P: Peripherals>(
    session: &mut RadioSession<T, P>,
    on_secs: u32,
    speed_multiplier: f64,
    log: &ResponseLog,
) -> RadioOutcome {
    let on = send_logged(
        session,
        Message::new(tags::RELAY_ON).with_field(FLASH_TIME_KEY, on_secs),
        log,
    );
    match &on {
        Ok(dispatch) if dispatch.heard_peer() => {
            let hold = hold_time(on_secs, speed_multiplier);
            debug!("flasher on, holding for {:?}", hold);
            thread::sleep(hold);
        }
        Ok(dispatch) => warn!("RELAY_ON answered with {}", dispatch.message.tag),
        Err(e) => warn!("RELAY_ON failed: {}", e),
    }

    let off = send_logged(session, Message::new(tags::RELAY_OFF), log);
    match on {
        Err(e) => Err(e),
        Ok(dispatch) if !dispatch.heard_peer() => Ok(dispatch.message),
        Ok(_) => off.map(|dispatch| dispatch.message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flasher_message::decode_record;
    use flasher_radio::{
        simulated_link_pair, CommandRegistry, HeadlessPeripherals, SessionConfig,
        SimulatedLink, SimulatedPeripherals, VoltageChannel,
    };
    use std::collections::HashMap;

    const FLASHER_PIN: u8 = 14;

    fn fast() -> SessionConfig {
        SessionConfig {
            reply_timeout: Duration::from_millis(500),
            poll_interval: Duration::from_millis(2),
        }
    }

    fn tower(link: SimulatedLink) -> RadioSession<SimulatedLink, HeadlessPeripherals> {
        RadioSession::new(
            link,
            HeadlessPeripherals,
            Arc::new(CommandRegistry::tower()),
            fast(),
        )
    }

    /// A site that answers `cycles` commands on its own thread.
    fn spawn_site(link: SimulatedLink, cycles: usize) -> (SimulatedPeripherals, JoinHandle<()>) {
        let hardware = SimulatedPeripherals::new(HashMap::from([(35, 824.0)]));
        let registry = Arc::new(CommandRegistry::site(
            FLASHER_PIN,
            vec![VoltageChannel::new("SOLAR", 35, 4.25e-3)],
        ));
        let mut site = RadioSession::new(link, hardware.clone(), registry, fast());
        let handle = thread::spawn(move || {
            for _ in 0..cycles {
                let message = site.listen(Duration::from_secs(2));
                site.dispatch(message).unwrap();
            }
        });
        (hardware, handle)
    }

    /// Tags of every record in the log, oldest first.
    fn logged_tags(log: &ResponseLog) -> Vec<String> {
        std::fs::read_to_string(log.path())
            .unwrap_or_default()
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| decode_record(line.as_bytes()).unwrap().tag)
            .collect()
    }

    fn temp_log(name: &str) -> Arc<ResponseLog> {
        let path = std::env::temp_dir().join(format!(
            "flasher-worker-{}-{}.txt",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        Arc::new(ResponseLog::new(path))
    }

    #[test]
    fn test_voltage_query() {
        let (tower_link, site_link) = simulated_link_pair(-70);
        let (_hw, site) = spawn_site(site_link, 1);
        let mut session = tower(tower_link);
        let log = temp_log("voltage-query");

        let reply = perform(&mut session, RadioAction::QueryVoltage, 1.0, &log).unwrap();
        assert_eq!(reply.tag, tags::VOLTAGE);
        assert_eq!(reply.field("SOLAR"), Some(&serde_json::Value::from(3.502)));
        assert_eq!(reply.signal_strength, Some(-70));
        site.join().unwrap();
        assert_eq!(logged_tags(&log), vec![tags::VOLTAGE]);
        let _ = std::fs::remove_file(log.path());
    }

    #[test]
    fn test_flash_cycle_turns_relay_off() {
        let (tower_link, site_link) = simulated_link_pair(-70);
        let (hardware, site) = spawn_site(site_link, 2);
        let mut session = tower(tower_link);
        let log = temp_log("flash-cycle");

        let reply = perform(&mut session, RadioAction::Flash { on_secs: 1 }, 100.0, &log).unwrap();
        assert_eq!(reply.tag, tags::RELAY_OFF);
        site.join().unwrap();
        assert!(!hardware.relay(FLASHER_PIN));
        let _ = std::fs::remove_file(log.path());
    }

    #[test]
    fn test_flash_cycle_logs_both_dispatches() {
        let (tower_link, site_link) = simulated_link_pair(-70);
        let (_hw, site) = spawn_site(site_link, 2);
        let mut session = tower(tower_link);
        let log = temp_log("flash-records");

        perform(&mut session, RadioAction::Flash { on_secs: 1 }, 100.0, &log).unwrap();
        site.join().unwrap();

        assert_eq!(logged_tags(&log), vec![tags::RELAY_ON, tags::RELAY_OFF]);
        assert_eq!(log.last().unwrap().unwrap().signal_strength, Some(-70));
        let _ = std::fs::remove_file(log.path());
    }

    #[test]
    fn test_flash_cycle_with_unrecognized_reply_tag() {
        let (tower_link, mut site_link) = simulated_link_pair(-70);
        let peer = thread::spawn(move || {
            for _ in 0..2 {
                let deadline = std::time::Instant::now() + Duration::from_secs(2);
                while site_link.try_receive().is_none() {
                    assert!(std::time::Instant::now() < deadline, "tower never transmitted");
                    thread::sleep(Duration::from_millis(2));
                }
                site_link.transmit(br#"{"msg":"msg"}"#).unwrap();
            }
        });
        let mut session = tower(tower_link);
        let log = temp_log("unrecognized-tag");

        let reply = perform(&mut session, RadioAction::Flash { on_secs: 60 }, 600.0, &log).unwrap();
        peer.join().unwrap();

        assert_eq!(reply.tag, "msg");
        assert_eq!(logged_tags(&log), vec!["msg", "msg"]);
        let _ = std::fs::remove_file(log.path());
    }

    #[test]
    fn test_flash_cycle_without_site_is_no_message() {
        let (tower_link, _site_link) = simulated_link_pair(-70);
        let mut session = tower(tower_link);
        let log = temp_log("no-site");
        let reply = perform(&mut session, RadioAction::Flash { on_secs: 60 }, 1.0, &log).unwrap();
        assert_eq!(reply.tag, tags::NO_MESSAGE);
        // RELAY_ON timed out, then RELAY_OFF timed out.
        assert_eq!(logged_tags(&log), vec![tags::NO_MESSAGE, tags::NO_MESSAGE]);
        let _ = std::fs::remove_file(log.path());
    }

    #[test]
    fn test_transmit_failure_is_reported() {
        let (tower_link, site_link) = simulated_link_pair(-70);
        drop(site_link);
        let mut session = tower(tower_link);
        let log = temp_log("transmit-failure");
        let err = perform(&mut session, RadioAction::QueryVoltage, 1.0, &log).unwrap_err();
        assert!(matches!(err, RadioError::Transmit(_)));
        // Nothing was dispatched.
        assert!(log.last().unwrap().is_none());
    }

    #[test]
    fn test_spawn_rejects_zero_speed() {
        let (tower_link, _site_link) = simulated_link_pair(-70);
        let result = RadioWorker::spawn(tower(tower_link), temp_log("zero-speed"), 0.0);
        assert!(matches!(result, Err(RunnerError::Config(_))));
    }

    #[test]
    fn test_hold_time_saturates() {
        assert_eq!(hold_time(60, 600.0), Duration::from_millis(100));
        assert_eq!(hold_time(60, 0.0), Duration::MAX);
    }

    #[test]
    fn test_worker_logs_outcome() {
        let (tower_link, site_link) = simulated_link_pair(-70);
        let (_hw, site) = spawn_site(site_link, 1);
        let log = temp_log("logs-outcome");
        let worker = RadioWorker::spawn(tower(tower_link), log.clone(), 1.0).unwrap();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let reply = runtime
            .block_on(worker.handle().run(RadioAction::QueryVoltage))
            .unwrap();
        assert_eq!(reply.tag, tags::VOLTAGE);

        worker.shutdown();
        site.join().unwrap();
        let last = log.last().unwrap().unwrap();
        assert_eq!(last.tag, tags::VOLTAGE);
        assert_eq!(last.signal_strength, Some(-70));
        let _ = std::fs::remove_file(log.path());
    }

    #[test]
    fn test_handle_after_shutdown() {
        let (tower_link, _site_link) = simulated_link_pair(-70);
        let log = temp_log("after-shutdown");
        let worker = RadioWorker::spawn(tower(tower_link), log, 1.0).unwrap();
        let handle = worker.handle();
        worker.shutdown();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let err = runtime
            .block_on(handle.run(RadioAction::QueryVoltage))
            .unwrap_err();
        assert_eq!(err, RadioError::WorkerStopped);
    }
}
