use core::str::FromStr;

#[cfg(feature = "defmt")]
use defmt::{info, warn};
use embassy_time::Duration;
use heapless::{String, format};
#[cfg(not(feature = "defmt"))]
use log::{info, warn};

use crate::at::response::is_error;
use crate::at::uart::Tx;
use crate::error::Error;
use crate::modem::hw::ModemPin;
use crate::modem::modem_manager::{AT_COMMAND_SIZE, Lpwa};

/// Time to wait for the broker to acknowledge a packet.
pub const MQTT_TIMEOUT: Duration = Duration::from_secs(30);

const QMTOPEN: &str = "QMTOPEN";
const QMTCONN: &str = "QMTCONN";
const QMTPUBEX: &str = "QMTPUBEX";

/// Configuration for the MQTT client to connect to a broker.
#[derive(Clone, Debug)]
pub struct MqttConfig {
    /// The URL of the MQTT broker, e.g., "broker.emqx.io".
    pub url: String<40>,
    /// The port of the MQTT broker.
    pub port: u16,
    /// MQTT client ID.
    pub client_name: String<30>,
    /// Optional login credentials for the MQTT broker, username and password.
    pub credentials: Option<(String<20>, String<30>)>,
    /// Index of the modem's MQTT client, 0 to 5.
    pub client_idx: u8,
    /// How long to wait for each acknowledgement.
    pub timeout: Duration,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            url: String::from_str("broker.emqx.io").unwrap(),
            port: 1883,
            client_name: String::from_str("lpwa").unwrap(),
            credentials: None,
            client_idx: 0,
            timeout: MQTT_TIMEOUT,
        }
    }
}

/// An MQTT client running on the module's MQTT stack.
///
/// Every acknowledged step fails with [`Error::TimeoutError`] if its URC doesn't arrive in time,
/// with [`Error::MqttError`] if the URC reports a failure and with [`Error::AtErrorResponse`] if
/// the module rejects the command right away.
pub struct MqttClient {
    config: MqttConfig,
}

impl MqttClient {
    pub fn new(config: MqttConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MqttConfig {
        &self.config
    }

    /// Sends `command` and waits for URC `key` starting with `expected`.
    async fn request<T: Tx, P: ModemPin>(
        &self,
        lpwa: &mut Lpwa<'_, T, P>,
        command: &str,
        key: &str,
        expected: &str,
    ) -> crate::Result<()> {
        lpwa.erase_urc(key);
        let result = lpwa.send(command).await?;
        if is_error(&result) {
            warn!("{} failed: {}", command, result.as_str());
            return Err(Error::AtErrorResponse);
        }
        if !lpwa.wait_for_urc(key, self.config.timeout).await {
            warn!("No response to {}", command);
            return Err(Error::TimeoutError);
        }

        let response = lpwa.urc(key);
        if response.starts_with(expected) {
            Ok(())
        } else {
            warn!("{}: unexpected response {}", key, response.as_str());
            Err(Error::MqttError)
        }
    }

    /// Opens a network connection to the broker.
    pub async fn open<T: Tx, P: ModemPin>(&self, lpwa: &mut Lpwa<'_, T, P>) -> crate::Result<()> {
        let idx = self.config.client_idx;
        let cmd = format!(
            AT_COMMAND_SIZE;
            "AT+QMTOPEN={},\"{}\",{}",
            idx,
            self.config.url.as_str(),
            self.config.port
        )?;
        let expected = format!(8; "{},0", idx)?;
        self.request(lpwa, &cmd, QMTOPEN, &expected).await?;
        info!("Connected to {}:{}", self.config.url.as_str(), self.config.port);
        Ok(())
    }

    /// Connects the client to the broker, the network connection must be open.
    pub async fn connect<T: Tx, P: ModemPin>(
        &self,
        lpwa: &mut Lpwa<'_, T, P>,
    ) -> crate::Result<()> {
        let idx = self.config.client_idx;
        let cmd = match &self.config.credentials {
            Some((username, password)) => format!(
                AT_COMMAND_SIZE;
                "AT+QMTCONN={},\"{}\",\"{}\",\"{}\"",
                idx,
                self.config.client_name.as_str(),
                username.as_str(),
                password.as_str()
            )?,
            None => format!(
                AT_COMMAND_SIZE;
                "AT+QMTCONN={},\"{}\"",
                idx,
                self.config.client_name.as_str()
            )?,
        };
        let expected = format!(8; "{},0,0", idx)?;
        self.request(lpwa, &cmd, QMTCONN, &expected).await
    }

    /// Publishes `payload` to `topic` with QoS 0.
    pub async fn publish<T: Tx, P: ModemPin>(
        &self,
        lpwa: &mut Lpwa<'_, T, P>,
        topic: &str,
        payload: &str,
    ) -> crate::Result<()> {
        let idx = self.config.client_idx;
        let cmd = format!(
            AT_COMMAND_SIZE;
            "AT+QMTPUBEX={},0,0,0,\"{}\",\"{}\"",
            idx,
            topic,
            payload
        )?;
        let expected = format!(8; "{},0,0", idx)?;
        self.request(lpwa, &cmd, QMTPUBEX, &expected).await
    }

    /// Disconnects the client from the broker, without waiting for the acknowledgement.
    pub async fn disconnect<T: Tx, P: ModemPin>(
        &self,
        lpwa: &mut Lpwa<'_, T, P>,
    ) -> crate::Result<()> {
        let cmd = format!(AT_COMMAND_SIZE; "AT+QMTDISC={}", self.config.client_idx)?;
        lpwa.erase_urc("QMTDISC");
        lpwa.send(&cmd).await?;
        Ok(())
    }

    /// Closes the network connection, without waiting for the acknowledgement.
    pub async fn close<T: Tx, P: ModemPin>(&self, lpwa: &mut Lpwa<'_, T, P>) -> crate::Result<()> {
        let cmd = format!(AT_COMMAND_SIZE; "AT+QMTCLOSE={}", self.config.client_idx)?;
        lpwa.erase_urc("QMTCLOSE");
        lpwa.send(&cmd).await?;
        Ok(())
    }

    /// Opens the connection and connects the client.
    pub async fn start_session<T: Tx, P: ModemPin>(
        &self,
        lpwa: &mut Lpwa<'_, T, P>,
    ) -> crate::Result<()> {
        self.open(lpwa).await?;
        self.connect(lpwa).await
    }

    /// Disconnects the client and closes the connection.
    pub async fn end_session<T: Tx, P: ModemPin>(
        &self,
        lpwa: &mut Lpwa<'_, T, P>,
    ) -> crate::Result<()> {
        self.disconnect(lpwa).await?;
        self.close(lpwa).await
    }
}
