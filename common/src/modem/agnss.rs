#[cfg(feature = "defmt")]
use defmt::{info, warn};
use heapless::format;
#[cfg(not(feature = "defmt"))]
use log::{info, warn};

use crate::at::response::is_ok;
use crate::at::uart::Tx;
use crate::modem::hw::ModemPin;
use crate::modem::modem_manager::{AT_COMMAND_SIZE, Lpwa};
use crate::time::{format_xtra_time, parse_cclk};

/// URC key carrying the network clock, `+CCLK: "26/02/10,11:44:24+04"`.
const CCLK: &str = "CCLK";

impl<T: Tx, P: ModemPin> Lpwa<'_, T, P> {
    /// Starts the download of AGNSS assistance data and injects the network time.
    ///
    /// Doesn't wait for the download, use [`Lpwa::poll_agnss`] to find out when it is done.
    pub async fn start_agnss_download(&mut self) -> crate::Result<()> {
        let agnss = self.config().module.family().agnss();
        self.erase_urc(agnss.status_key);
        self.state().with(|state| state.set_agnss_valid(false));

        info!("Download AGNSS data");
        self.send(agnss.download).await?;
        self.inject_network_time().await
    }

    /// Queries the network clock and injects it as UTC time into the GNSS engine.
    pub async fn inject_network_time(&mut self) -> crate::Result<()> {
        self.erase_urc(CCLK);
        self.send("AT+CCLK?").await?;
        let clock = self.urc(CCLK);
        let utc = parse_cclk(&clock).inspect_err(|_| {
            warn!("Cannot parse network time '{}'", clock.as_str());
        })?;
        let time = format_xtra_time(&utc)?;

        let cmd = format!(AT_COMMAND_SIZE; "AT+QGPSXTRATIME=0,\"{}\",1,1,5", time.as_str())?;
        let result = self.send(&cmd).await?;
        if !is_ok(&result) {
            warn!("Cannot inject time {}: {}", time.as_str(), result.as_str());
        }
        Ok(())
    }

    /// Checks whether the AGNSS download has finished successfully.
    ///
    /// Returns true once the status URC reports success, the assistance data is then marked
    /// valid. Returns false while the download is still running or after it has failed.
    pub async fn poll_agnss(&mut self) -> crate::Result<bool> {
        let agnss = self.config().module.family().agnss();
        let status = self.urc(agnss.status_key);
        let finished = status
            .get(agnss.marker_offset..)
            .is_some_and(|rest| rest.starts_with(agnss.success_marker));
        if !finished {
            return Ok(false);
        }

        self.erase_urc(agnss.status_key);
        let result = self.send(agnss.verify).await?;
        if !is_ok(&result) {
            warn!("AGNSS verification failed: {}", result.as_str());
        }
        self.state().with(|state| state.set_agnss_valid(true));
        info!("AGNSS data downloaded");
        Ok(true)
    }
}
