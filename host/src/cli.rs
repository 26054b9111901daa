use std::str::FromStr;

use clap::{Parser, Subcommand};
use lpwa_common::modem::modem_manager::{EdrxConfig, ModuleConfig, PowerSavingConfig, RAT};
use lpwa_common::modem::module::ModuleVariant;
use lpwa_common::modem::mqtt::MqttConfig;

use crate::error::Error;

#[derive(Parser, Debug)]
#[command(about = "Configure and exercise a Quectel LPWA module")]
pub struct Args {
    /// Serial port of the module, e.g. /dev/ttyUSB0
    #[arg(short, long)]
    pub port: String,
    #[arg(short, long, default_value_t = 115200)]
    pub baud: u32,
    /// Module variant, e.g. BG950A or BG951A
    #[arg(short, long, default_value = "BG950A")]
    pub module: ModuleVariant,
    /// Use NB-IoT instead of LTE-M
    #[arg(long)]
    pub nbiot: bool,
    /// LTE-M bands, e.g. 3,8,20
    #[arg(long, value_delimiter = ',', default_value = "20")]
    pub ltem_bands: Vec<u32>,
    /// NB-IoT bands
    #[arg(long, value_delimiter = ',', default_value = "20")]
    pub nbiot_bands: Vec<u32>,
    /// PSM timers as "TAU,ACTIVE", e.g. 00000100,00001111
    #[arg(long)]
    pub psm: Option<String>,
    /// eDRX as "CYCLE,PTW", e.g. 0101,0011
    #[arg(long)]
    pub edrx: Option<String>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Full configuration, then wait for network registration
    Configure,
    FactoryReset,
    /// Print firmware and received URCs
    Status,
    /// Wait for a GNSS fix
    Gnss {
        #[arg(long, default_value_t = 120)]
        timeout_secs: u64,
    },
    /// Download AGNSS data
    Agnss {
        #[arg(long, default_value_t = 60)]
        timeout_secs: u64,
    },
    /// Publish a single MQTT message
    Mqtt {
        #[arg(long, default_value = "broker.emqx.io")]
        url: String,
        #[arg(long, default_value_t = 1883)]
        mqtt_port: u16,
        #[arg(long, default_value = "lpwa/status")]
        topic: String,
        #[arg(long, default_value = "hello")]
        payload: String,
    },
}

fn split_pair<const N: usize>(
    value: &str,
    arg: &'static str,
) -> crate::Result<(heapless::String<N>, heapless::String<N>)> {
    let (first, second) = value.split_once(',').ok_or(Error::ArgumentError(arg))?;
    let first = heapless::String::from_str(first).map_err(|_| Error::ArgumentError(arg))?;
    let second = heapless::String::from_str(second).map_err(|_| Error::ArgumentError(arg))?;
    Ok((first, second))
}

impl Args {
    pub fn module_config(&self) -> crate::Result<ModuleConfig> {
        let mut config = ModuleConfig {
            module: self.module,
            rat: if self.nbiot { RAT::NbIot } else { RAT::Ltem },
            ..Default::default()
        };
        config.bands.set_ltem_bands(&self.ltem_bands);
        config.bands.set_nbiot_bands(&self.nbiot_bands);
        if let Some(psm) = &self.psm {
            let (periodic_tau, active_time) = split_pair(psm, "psm")?;
            config.psm = Some(PowerSavingConfig {
                periodic_tau,
                active_time,
            });
        }
        if let Some(edrx) = &self.edrx {
            let (cycle, paging_window) = split_pair(edrx, "edrx")?;
            config.edrx = Some(EdrxConfig {
                cycle,
                paging_window,
            });
        }
        Ok(config)
    }

    /// MQTT settings of the `mqtt` subcommand, the default ones otherwise.
    pub fn mqtt_config(&self) -> crate::Result<MqttConfig> {
        let mut config = MqttConfig::default();
        if let Command::Mqtt { url, mqtt_port, .. } = &self.command {
            config.url =
                heapless::String::from_str(url).map_err(|_| Error::ArgumentError("url"))?;
            config.port = *mqtt_port;
        }
        Ok(config)
    }
}
