//! Control tower runner for the incline flasher.
//!
//! Wires the pieces together:
//!
//! - [`RadioWorker`]: the tower's radio session on its own thread
//! - [`BridgeServer`]: the operator-facing TCP command bridge
//! - [`ResponseLog`]: append-only audit log of flasher replies
//! - [`SiteWorker`]: an in-process flasher site for running without hardware
//!
//! [`start_simulated`] builds a tower and a simulated site joined by an
//! in-memory link, which is what `flasher serve` runs.

pub mod bridge_server;
pub mod config;
mod error;
pub mod radio_worker;
pub mod response_log;
pub mod site;

use std::sync::Arc;

use flasher_radio::{
    simulated_link_pair, CommandRegistry, HeadlessPeripherals, RadioSession, SimulatedPeripherals,
};

pub use bridge_server::{send_request, BridgeServer};
pub use config::*;
pub use error::*;
pub use radio_worker::{RadioHandle, RadioJob, RadioOutcome, RadioWorker};
pub use response_log::ResponseLog;
pub use site::{SitePolicy, SiteWorker};

/// A tower radio worker talking to a simulated site.
pub struct SimulatedDeployment {
    pub radio: RadioWorker,
    pub site: SiteWorker,
    /// The site's relays, ADC and display.
    pub hardware: SimulatedPeripherals,
    pub log: Arc<ResponseLog>,
}

/// Start a tower and a simulated flasher site from `config`.
pub fn start_simulated(config: &FlasherConfig) -> RunnerResult<SimulatedDeployment> {
    config.validate()?;
    let (tower_link, site_link) = simulated_link_pair(config.link.rssi_dbm);
    let site_link = site_link.with_drop_outgoing(config.link.drop_replies);
    let log = Arc::new(ResponseLog::new(config.response_log.clone()));

    let tower = RadioSession::new(
        tower_link,
        HeadlessPeripherals,
        Arc::new(CommandRegistry::tower()),
        config.radio.session_config(),
    );
    let radio = RadioWorker::spawn(tower, log.clone(), config.radio.speed_multiplier)?;

    let hardware = SimulatedPeripherals::new(
        config
            .site
            .simulated_adc_counts
            .iter()
            .map(|(pin, count)| (*pin, *count))
            .collect(),
    );
    let registry = CommandRegistry::site(config.site.flasher_pin()?, config.site.channels());
    let site_session = RadioSession::new(
        site_link,
        hardware.clone(),
        Arc::new(registry),
        config.radio.session_config(),
    );
    let site = SiteWorker::spawn(
        site_session,
        SitePolicy {
            window: config.radio.msg_timeout(),
            reset_on_silence: config.site.reset_on_silence,
        },
    )?;

    Ok(SimulatedDeployment {
        radio,
        site,
        hardware,
        log,
    })
}
