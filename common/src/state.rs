use core::cell::RefCell;
use core::str::FromStr;

#[cfg(feature = "defmt")]
use defmt::{info, warn};
use embassy_sync::blocking_mutex::Mutex;
#[cfg(not(feature = "defmt"))]
use log::{info, warn};

use crate::RawMutex;
use crate::at::framer::Line;
use crate::at::response::ResponseEvent;
use crate::gnss::GnssFix;
use crate::urc::{CME_ERROR, UrcStore, gnss_error_description};

/// Full functional reset, the module drops out of service before acknowledging.
pub const FULL_RESET_COMMAND: &str = "AT+CFUN=1,1";
/// Factory reset, also forgets every URC.
pub const FACTORY_RESET_COMMAND: &str = "AT&F1";

/// Everything the RX side learns about the modem.
#[derive(Default)]
pub struct ModemState {
    urcs: UrcStore,
    result: Line,
    last_text: Line,
    ready: bool,
    gps_on: bool,
    agnss_valid: bool,
    fix: GnssFix,
}

impl ModemState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a classified line received from the modem.
    pub fn apply(&mut self, line: &str, event: ResponseEvent) {
        match event {
            ResponseEvent::Ok(raw) | ResponseEvent::Error(raw) => self.result = raw,
            ResponseEvent::Ready => self.ready = true,
            ResponseEvent::PowerDown => {
                self.ready = false;
                self.gps_on = false;
            }
            ResponseEvent::Urc { key, value } => {
                if let Err(err) = self.urcs.update(&key, &value) {
                    warn!("Cannot store URC {}: {}", key.as_str(), err);
                }
                if key == CME_ERROR {
                    // Extended errors also complete the outstanding command
                    self.result = Line::from_str(line).unwrap_or_default();
                    info!("GNSS error description: {}", gnss_error_description(&value));
                }
            }
            ResponseEvent::NmeaSentence(sentence) => {
                if sentence.contains("RMC,") {
                    self.fix.update_from_rmc(&sentence);
                }
            }
            ResponseEvent::Unrecognized => {
                self.last_text = Line::from_str(line).unwrap_or_default();
            }
        }
    }

    /// Prepares the state for sending `command`.
    ///
    /// Clears the result slot. Resets invalidate `ready` and `gps_on` right away, a factory reset
    /// also forgets all URCs.
    pub fn prepare_command(&mut self, command: &str) {
        if command.starts_with(FULL_RESET_COMMAND) {
            self.ready = false;
            self.gps_on = false;
        } else if command.starts_with(FACTORY_RESET_COMMAND) {
            self.ready = false;
            self.gps_on = false;
            self.urcs.clear();
        }
        self.result.clear();
    }

    /// Forgets everything received so far, including URCs.
    pub fn reset(&mut self) {
        self.result.clear();
        self.last_text.clear();
        self.urcs.clear();
    }

    /// The result line of the last command, empty while none has arrived.
    pub fn result(&self) -> &Line {
        &self.result
    }

    /// The most recent line that was neither a result nor a URC, e.g. a firmware revision.
    pub fn last_text(&self) -> &Line {
        &self.last_text
    }

    pub fn clear_last_text(&mut self) {
        self.last_text.clear();
    }

    pub fn urcs(&self) -> &UrcStore {
        &self.urcs
    }

    pub fn urcs_mut(&mut self) -> &mut UrcStore {
        &mut self.urcs
    }

    pub fn ready(&self) -> bool {
        self.ready
    }

    pub fn registered(&self) -> bool {
        self.urcs.registered()
    }

    pub fn gps_on(&self) -> bool {
        self.gps_on
    }

    pub fn set_gps_on(&mut self, gps_on: bool) {
        self.gps_on = gps_on;
    }

    pub fn agnss_valid(&self) -> bool {
        self.agnss_valid
    }

    pub fn set_agnss_valid(&mut self, agnss_valid: bool) {
        self.agnss_valid = agnss_valid;
    }

    pub fn fix(&self) -> GnssFix {
        self.fix
    }

    pub fn reset_fix(&mut self) {
        self.fix = GnssFix::default();
    }
}

/// Modem state shared by the RX broker and the command side.
///
/// Every access is a short critical section that is never held across an `.await`.
pub struct SharedState(Mutex<RawMutex, RefCell<ModemState>>);

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedState {
    pub fn new() -> Self {
        Self(Mutex::new(RefCell::new(ModemState::new())))
    }

    /// Runs `f` with exclusive access to the state.
    pub fn with<R>(&self, f: impl FnOnce(&mut ModemState) -> R) -> R {
        self.0.lock(|state| f(&mut state.borrow_mut()))
    }
}
