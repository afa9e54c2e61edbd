//! Local hardware collaborators: relays, ADC, display.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

/// Maximum number of lines the site display can show at once.
pub const MAX_DISPLAY_LINES: usize = 7;

/// Hardware a command handler can act on.
pub trait Peripherals {
    /// Drive a relay output.
    fn set_relay(&mut self, pin: u8, on: bool);

    /// Read the raw ADC count on a pin.
    fn read_adc(&mut self, pin: u8) -> f64;

    /// Show lines on the local display.
    fn display_lines(&mut self, lines: &[String]);

    /// Hard-reset the device.
    fn hard_reset(&mut self);
}

impl<P: Peripherals + ?Sized> Peripherals for Box<P> {
    fn set_relay(&mut self, pin: u8, on: bool) {
        (**self).set_relay(pin, on)
    }

    fn read_adc(&mut self, pin: u8) -> f64 {
        (**self).read_adc(pin)
    }

    fn display_lines(&mut self, lines: &[String]) {
        (**self).display_lines(lines)
    }

    fn hard_reset(&mut self) {
        (**self).hard_reset()
    }
}

/// Fit display lines to the screen, replacing overlong output with a notice.
pub fn fit_display(lines: &[String]) -> Vec<String> {
    if lines.len() > MAX_DISPLAY_LINES {
        vec!["Too many lines".to_string()]
    } else {
        lines.to_vec()
    }
}

// ============================================================================
// Headless (tower side)
// ============================================================================

/// Peripherals for a node with no relays or display; everything is logged.
#[derive(Debug, Default)]
pub struct HeadlessPeripherals;

impl Peripherals for HeadlessPeripherals {
    fn set_relay(&mut self, pin: u8, on: bool) {
        warn!("No relay hardware: ignoring set_relay({}, {})", pin, on);
    }

    fn read_adc(&mut self, pin: u8) -> f64 {
        warn!("No ADC hardware: pin {} reads 0", pin);
        0.0
    }

    fn display_lines(&mut self, lines: &[String]) {
        debug!("display: {}", fit_display(lines).join(" | "));
    }

    fn hard_reset(&mut self) {
        info!("Hard reset requested on headless node; ignoring");
    }
}

// ============================================================================
// Simulated (flasher site without hardware)
// ============================================================================

/// State of simulated site hardware.
#[derive(Debug, Default, Clone)]
pub struct SimulatedHardware {
    /// Relay pin → energized.
    pub relays: HashMap<u8, bool>,
    /// ADC pin → raw count returned by `read_adc`.
    pub adc_counts: HashMap<u8, f64>,
    /// Lines currently on the display.
    pub display: Vec<String>,
    /// Number of hard resets performed.
    pub resets: u32,
}

/// In-memory stand-in for the site relays, ADC and display.
///
/// The state is shared so it can be inspected while a session owns the
/// peripherals.
#[derive(Debug, Clone, Default)]
pub struct SimulatedPeripherals {
    state: Arc<Mutex<SimulatedHardware>>,
}

impl SimulatedPeripherals {
    /// Create simulated hardware with the given raw ADC counts.
    pub fn new(adc_counts: HashMap<u8, f64>) -> Self {
        SimulatedPeripherals {
            state: Arc::new(Mutex::new(SimulatedHardware {
                adc_counts,
                ..Default::default()
            })),
        }
    }

    /// Shared handle to the hardware state.
    pub fn state(&self) -> Arc<Mutex<SimulatedHardware>> {
        self.state.clone()
    }

    /// Whether the relay on `pin` is currently energized.
    pub fn relay(&self, pin: u8) -> bool {
        self.state.lock().relays.get(&pin).copied().unwrap_or(false)
    }
}

impl Peripherals for SimulatedPeripherals {
    fn set_relay(&mut self, pin: u8, on: bool) {
        debug!("relay {} -> {}", pin, if on { "on" } else { "off" });
        self.state.lock().relays.insert(pin, on);
    }

    fn read_adc(&mut self, pin: u8) -> f64 {
        self.state.lock().adc_counts.get(&pin).copied().unwrap_or(0.0)
    }

    fn display_lines(&mut self, lines: &[String]) {
        self.state.lock().display = fit_display(lines);
    }

    fn hard_reset(&mut self) {
        let mut state = self.state.lock();
        info!("Simulated hard reset #{}", state.resets + 1);
        state.relays.clear();
        state.display.clear();
        state.resets += 1;
    }
}
