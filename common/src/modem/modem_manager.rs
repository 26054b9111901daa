use core::str::FromStr;

#[cfg(feature = "defmt")]
use defmt::{error, info, warn};
use embassy_time::{Duration, Timer};
use heapless::{String, format};
#[cfg(not(feature = "defmt"))]
use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::at::framer::{LINE_CAPACITY, Line};
use crate::at::response::is_ok;
use crate::at::uart::{AtUart, COMMAND_TIMEOUT, Tx};
use crate::gnss::GnssFix;
use crate::modem::hw::ModemPin;
use crate::modem::module::ModuleVariant;
use crate::state::{FACTORY_RESET_COMMAND, FULL_RESET_COMMAND, SharedState};
use crate::wait::Waiter;

/// Maximum length of a formatted command.
pub const AT_COMMAND_SIZE: usize = LINE_CAPACITY;

/// Command setting the AGNSS proxy, followed by the quoted URL.
const XTRA_CFG_PREFIX: &str = "AT+QGPSCFG=\"xtra_cfg\",\"";

/// Longest AGNSS proxy URL, it has to fit into the `xtra_cfg` command with its closing quote.
pub const PROXY_URL_SIZE: usize = AT_COMMAND_SIZE - XTRA_CFG_PREFIX.len() - 1;

/// Timeout for the module to boot or to register to the network.
pub const NETWORK_TIMEOUT: Duration = Duration::from_secs(180);

/// Delay between edges on the power trigger and DTR pins.
pub const PIN_SETTLE: Duration = Duration::from_millis(100);

/// Radio Access Technology
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RAT {
    #[default]
    Ltem, // LTE-M
    NbIot, // NB-IoT
}

impl RAT {
    fn iotopmode(&self) -> u8 {
        match self {
            RAT::Ltem => 0,
            RAT::NbIot => 1,
        }
    }
}

#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LteBands {
    /// LTE-M bands bitmask. Bit `n` corresponds to band `n+1`.
    pub ltem: u128,
    /// NB-IoT bands bitmask. Bit `n` corresponds to band `n+1`.
    pub nbiot: u128,
}

impl LteBands {
    fn mask(bands: &[u32]) -> u128 {
        bands
            .iter()
            .filter(|band| **band > 0 && **band <= 128)
            .fold(0, |mask, band| mask | 1_u128 << (band - 1))
    }

    /// Sets the LTE-M bands from a slice of band numbers.
    ///
    /// This will overwrite any previously set LTE-M bands.
    /// Bands should be given as numbers, e.g., 20 for B20.
    /// Invalid band numbers (0 or > 128) are ignored.
    pub fn set_ltem_bands(&mut self, bands: &[u32]) {
        self.ltem = Self::mask(bands);
    }

    /// Sets the NB-IoT bands from a slice of band numbers, see [`LteBands::set_ltem_bands`].
    pub fn set_nbiot_bands(&mut self, bands: &[u32]) {
        self.nbiot = Self::mask(bands);
    }
}

/// Power Saving Mode timers, as 8-bit patterns of 3GPP TS 24.008.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerSavingConfig {
    /// Requested periodic TAU (T3412), e.g. "00000100".
    pub periodic_tau: String<8>,
    /// Requested active time (T3324), e.g. "00001111".
    pub active_time: String<8>,
}

/// Extended DRX settings, as 4-bit patterns of 3GPP TS 24.008.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdrxConfig {
    /// eDRX cycle, e.g. "0101".
    pub cycle: String<4>,
    /// Paging time window, e.g. "0011".
    pub paging_window: String<4>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModuleConfig {
    /// Which type of module is connected
    pub module: ModuleVariant,
    /// URL of the AGNSS data server
    pub proxy_url: String<PROXY_URL_SIZE>,
    /// Radio access technology (RAT)
    pub rat: RAT,
    /// LTE bands
    pub bands: LteBands,
    pub psm: Option<PowerSavingConfig>,
    pub edrx: Option<EdrxConfig>,
    /// Firmware revisions containing this tag are supported.
    pub firmware_tag: String<16>,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        let mut bands = LteBands::default();
        // Default band is B20 for both LTE-M and NB-IoT
        bands.set_ltem_bands(&[20]);
        bands.set_nbiot_bands(&[20]);
        Self {
            module: ModuleVariant::default(),
            proxy_url: String::from_str("https://44.228.248.147/BG950/cep_pak.bin").unwrap(),
            rat: RAT::default(),
            bands,
            psm: None,
            edrx: None,
            firmware_tag: String::from_str("RK3").unwrap(),
        }
    }
}

/// Deadlines of the driver.
#[derive(Clone, Copy, Debug)]
pub struct Timeouts {
    /// Maximum wait for the result of a command.
    pub command: Duration,
    /// Maximum wait for the module to boot or register.
    pub network: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            command: COMMAND_TIMEOUT,
            network: NETWORK_TIMEOUT,
        }
    }
}

/// Driver of a Quectel LPWA module.
///
/// Commands go through `tx`, everything the module sends must be fed to an
/// [`crate::at::uart::AtRxBroker`] sharing the same `state`.
pub struct Lpwa<'a, T: Tx, P: ModemPin> {
    uart: AtUart<'a, T>,
    pon_trig: P,
    dtr: P,
    config: ModuleConfig,
    network_timeout: Duration,
}

impl<'a, T: Tx, P: ModemPin> Lpwa<'a, T, P> {
    /// Creates a new driver.
    ///
    /// `pon_trig` is the power trigger pin used for sleep and wake-up, `dtr` the DTR line.
    pub fn new(tx: T, pon_trig: P, dtr: P, state: &'a SharedState, config: ModuleConfig) -> Self {
        Self {
            uart: AtUart::new(tx, state),
            pon_trig,
            dtr,
            config,
            network_timeout: NETWORK_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.uart = self.uart.with_timeout(timeouts.command);
        self.network_timeout = timeouts.network;
        self
    }

    pub fn with_waiter(mut self, waiter: Waiter) -> Self {
        self.uart = self.uart.with_waiter(waiter);
        self
    }

    /// Stops the driver, handing back the transport and pins.
    pub fn end(self) -> (T, P, P) {
        (self.uart.into_tx(), self.pon_trig, self.dtr)
    }

    pub fn config(&self) -> &ModuleConfig {
        &self.config
    }

    pub fn state(&self) -> &'a SharedState {
        self.uart.state()
    }

    /// Sends a command and returns its result line, see [`AtUart::send`].
    pub async fn send(&mut self, command: &str) -> crate::Result<Line> {
        self.uart.send(command).await
    }

    /// Waits until `condition` holds for the modem state.
    pub async fn wait_for(
        &self,
        condition: impl Fn(&crate::state::ModemState) -> bool,
        name: &str,
        timeout: Duration,
    ) -> bool {
        let state = self.state();
        self.uart
            .waiter()
            .wait_for(|| state.with(|state| condition(state)), name, timeout)
            .await
    }

    async fn wait_ready(&self) -> bool {
        self.wait_for(|state| state.ready(), "ready", self.network_timeout).await
    }

    /// Waits for the module to register to the network.
    pub async fn wait_registered(&self) -> bool {
        self.wait_for(|state| state.registered(), "registered", self.network_timeout).await
    }

    /// Waits for the URC `key` to arrive.
    pub async fn wait_for_urc(&self, key: &str, timeout: Duration) -> bool {
        self.wait_for(|state| state.urcs().contains(key), key, timeout).await
    }

    pub fn ready(&self) -> bool {
        self.state().with(|state| state.ready())
    }

    pub fn registered(&self) -> bool {
        self.state().with(|state| state.registered())
    }

    pub fn gps_on(&self) -> bool {
        self.state().with(|state| state.gps_on())
    }

    pub fn agnss_valid(&self) -> bool {
        self.state().with(|state| state.agnss_valid())
    }

    pub fn fix(&self) -> GnssFix {
        self.state().with(|state| state.fix())
    }

    /// The latest payload of URC `key`, empty if there is none.
    pub fn urc(&self, key: &str) -> Line {
        self.state()
            .with(|state| Line::from_str(state.urcs().get(key)).unwrap_or_default())
    }

    pub fn erase_urc(&self, key: &str) {
        self.state().with(|state| state.urcs_mut().erase(key));
    }

    /// All URCs as `KEY=value ` pairs.
    pub fn urc_list<const N: usize>(&self) -> String<N> {
        self.state().with(|state| state.urcs().dump())
    }

    /// Logs all URCs received so far.
    pub fn update(&self) {
        info!("{}", self.urc_list::<256>().as_str());
    }

    /// Wakes the module up from sleep.
    pub async fn wakeup(&mut self) {
        self.dtr.set_low();
        self.pon_trig.set_high();
        Timer::after(PIN_SETTLE).await;
    }

    /// Lets the module go to sleep.
    pub async fn sleep(&mut self) {
        self.pon_trig.set_low();
        Timer::after(PIN_SETTLE).await;
        self.dtr.set_high();
    }

    /// Resets the module back to factory defaults.
    ///
    /// Returns true if the module came back within the network timeout.
    pub async fn factory_reset(&mut self) -> crate::Result<bool> {
        self.wait_ready().await;
        self.send("AT+QGPSDEL=0").await?;
        self.send(FACTORY_RESET_COMMAND).await?;
        let ready = self.wait_ready().await;
        if !ready {
            error!("Timed out waiting for factory reset");
        }
        Ok(ready)
    }

    /// Configures the module: network, URC subscriptions, power saving and GNSS.
    ///
    /// Failed commands are logged and the configuration continues, only transport failures abort
    /// it.
    pub async fn configure(&mut self) -> crate::Result<()> {
        self.state().with(|state| state.reset());
        self.wait_ready().await;

        let family = self.config.module.family();
        if !family.gnss_mode_commands().is_empty() {
            info!("Set GNSS mode");
        }
        for command in family.gnss_mode_commands() {
            self.send(command).await?;
        }

        info!("Configure network");
        let bands = self.config.bands;
        let cmd = format!(AT_COMMAND_SIZE; "AT+QCFG=\"band\",0,{:x},{:x},1", bands.ltem, bands.nbiot)?;
        self.send(&cmd).await?;
        let cmd = format!(AT_COMMAND_SIZE; "AT+QCFG=\"iotopmode\",{},1", self.config.rat.iotopmode())?;
        self.send(&cmd).await?;
        info!("Enable AGNSS");
        self.send("AT+QGPSXTRA=1").await?;

        info!("Reset");
        self.send(FULL_RESET_COMMAND).await?;
        if !self.wait_ready().await {
            error!("Timed out waiting for modem reset");
        }

        info!("Subscribe to URC");
        self.send("AT+CMEE=2").await?;
        self.send("AT+CEREG=1").await?;
        self.send("AT+QCFG=\"psm/urc\",1").await?;
        self.configure_power_saving().await?;

        info!("Configure GNSS");
        for command in family.gnss_config_commands() {
            self.send(command).await?;
        }
        info!("Configure AGNSS proxy server");
        let cmd = xtra_cfg_command(&self.config.proxy_url)?;
        self.send(&cmd).await?;
        if let Some(size) = family.xtra_file_size() {
            let cmd = format!(AT_COMMAND_SIZE; "AT+QGPSCFG=\"xtrafilesize\",{}", size)?;
            self.send(&cmd).await?;
        }
        self.send("AT+QGPSXTRA?").await?;
        self.send("AT+QGPSXTRATIME?").await?;

        info!("Save settings");
        self.send("AT&W").await?;

        info!("Query status");
        self.send("AT+CEDRXRDP").await?;
        self.send("AT+CPSMS?").await?;
        self.check_firmware().await?;
        Ok(())
    }

    async fn configure_power_saving(&mut self) -> crate::Result<()> {
        if let Some(psm) = self.config.psm.clone() {
            info!("Configure PSM");
            let cmd = format!(
                AT_COMMAND_SIZE;
                "AT+CPSMS=1,,,\"{}\",\"{}\"",
                psm.periodic_tau.as_str(),
                psm.active_time.as_str()
            )?;
            self.send(&cmd).await?;
        }
        if let Some(edrx) = self.config.edrx.clone() {
            info!("Configure eDRX");
            let cmd = format!(AT_COMMAND_SIZE; "AT+CEDRXS=1,4,\"{}\"", edrx.cycle.as_str())?;
            self.send(&cmd).await?;
            let cmd = format!(
                AT_COMMAND_SIZE;
                "AT+QPTWEDRXS=1,4,\"{}\",\"{}\"",
                edrx.paging_window.as_str(),
                edrx.cycle.as_str()
            )?;
            self.send(&cmd).await?;
        }
        Ok(())
    }

    /// Queries the firmware revision and compares it with the expected build tag.
    ///
    /// An unsupported firmware is only logged, the driver keeps working with it.
    pub async fn check_firmware(&mut self) -> crate::Result<bool> {
        self.state().with(|state| state.clear_last_text());
        self.send("AT+QGMR").await?;
        let revision = self.state().with(|state| state.last_text().clone());
        let supported = revision.contains(self.config.firmware_tag.as_str());
        if supported {
            info!("Firmware {}", revision.as_str());
        } else {
            warn!(
                "Unsupported firmware '{}', expected '{}'",
                revision.as_str(),
                self.config.firmware_tag.as_str()
            );
        }
        Ok(supported)
    }

    /// Turns the GNSS engine on and starts a new fix.
    pub async fn start_gnss(&mut self) -> crate::Result<bool> {
        self.state().with(|state| state.reset_fix());
        let result = self.send("AT+QGPS=1,3,0,1").await?;
        let started = is_ok(&result);
        if started {
            self.state().with(|state| state.set_gps_on(true));
        } else {
            warn!("Cannot start GNSS: {}", result.as_str());
        }
        Ok(started)
    }

    /// Turns the GNSS engine off.
    pub async fn stop_gnss(&mut self) -> crate::Result<bool> {
        let result = self.send("AT+QGPSEND").await?;
        self.state().with(|state| state.set_gps_on(false));
        Ok(is_ok(&result))
    }
}

fn xtra_cfg_command(proxy_url: &str) -> crate::Result<String<AT_COMMAND_SIZE>> {
    Ok(format!(AT_COMMAND_SIZE; "{}{}\"", XTRA_CFG_PREFIX, proxy_url)?)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_bands() {
        let mut bands = LteBands::default();
        bands.set_ltem_bands(&[3, 20, 0, 129]);
        assert_eq!(bands.ltem, 0x80004);
        bands.set_nbiot_bands(&[]);
        assert_eq!(bands.nbiot, 0);
    }

    #[test]
    fn test_longest_proxy_url_fits() {
        let mut url = String::<PROXY_URL_SIZE>::new();
        while url.push('u').is_ok() {}
        let cmd = xtra_cfg_command(&url).unwrap();
        assert_eq!(cmd.len(), AT_COMMAND_SIZE);
        assert!(cmd.starts_with("AT+QGPSCFG=\"xtra_cfg\",\"uuu"));
        assert!(cmd.ends_with("uu\""));
        assert_eq!(
            xtra_cfg_command("https://44.228.248.147/BG950/cep_pak.bin").unwrap(),
            "AT+QGPSCFG=\"xtra_cfg\",\"https://44.228.248.147/BG950/cep_pak.bin\""
        );
    }

    #[test]
    fn test_default_config() {
        let config = ModuleConfig::default();
        assert_eq!(config.bands.ltem, 0x80000);
        assert_eq!(config.rat.iotopmode(), 0);
        assert_eq!(config.module, ModuleVariant::Bg950a);
        assert!(config.psm.is_none());
    }
}
