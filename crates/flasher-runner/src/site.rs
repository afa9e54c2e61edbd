//! Unattended flasher site loop.
//!
//! The site listens in fixed windows. After each window it applies its
//! silence policy: if nothing valid arrived, the board is hard-reset to
//! recover a wedged transceiver.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use flasher_radio::{ListenSummary, Peripherals, RadioSession, Transport};
use tracing::{info, warn};

use crate::RunnerResult;

/// What the site does between listen windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SitePolicy {
    /// Length of one listen window.
    pub window: Duration,
    /// Hard-reset after a window with no valid command.
    pub reset_on_silence: bool,
}

/// Apply the silence policy to a finished window. Returns true if the site
/// was reset.
pub fn apply_silence_policy<P: Peripherals + ?Sized>(
    summary: &ListenSummary,
    peripherals: &mut P,
    policy: &SitePolicy,
) -> bool {
    if summary.heard_anything() || !policy.reset_on_silence {
        return false;
    }
    info!(
        "no valid command in {:?} ({} silent, {} invalid), resetting",
        policy.window, summary.silent, summary.invalid
    );
    peripherals.hard_reset();
    true
}

/// The site loop running on its own thread.
pub struct SiteWorker {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl SiteWorker {
    pub fn spawn<T, P>(session: RadioSession<T, P>, policy: SitePolicy) -> RunnerResult<Self>
    where
        T: Transport + Send + 'static,
        P: Peripherals + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        let thread = thread::Builder::new()
            .name("flasher-site".to_string())
            .spawn(move || run_site(session, policy, flag))?;
        Ok(SiteWorker {
            stop,
            thread: Some(thread),
        })
    }

    /// Stop after the current window and wait for the thread.
    pub fn shutdown(mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("site thread panicked");
            }
        }
    }
}

impl Drop for SiteWorker {
    fn drop(&mut self) {
        // Not joined; the current window may still have a minute to run.
        self.stop.store(true, Ordering::SeqCst);
    }
}

fn run_site<T: Transport, P: Peripherals>(
    mut session: RadioSession<T, P>,
    policy: SitePolicy,
    stop: Arc<AtomicBool>,
) {
    info!("flasher site listening in {:?} windows", policy.window);
    while !stop.load(Ordering::SeqCst) {
        match session.listen_for_duration(policy.window) {
            Ok(summary) => {
                apply_silence_policy(&summary, session.peripherals_mut(), &policy);
            }
            Err(e) => warn!("site failed to reply: {}", e),
        }
    }
    info!("flasher site stopped");
}
