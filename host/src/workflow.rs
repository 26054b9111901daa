use embassy_time::{Duration, Instant, Timer};
use log::{info, warn};

use lpwa_common::at::uart::Tx;
use lpwa_common::modem::hw::ModemPin;
use lpwa_common::modem::modem_manager::Lpwa;
use lpwa_common::modem::mqtt::{MqttClient, MqttConfig};

use crate::cli::Command;
use crate::error::Error;

/// Interval between checks of the AGNSS download status.
const AGNSS_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Runs `command` against the module.
pub async fn run<T: Tx, P: ModemPin>(
    lpwa: &mut Lpwa<'_, T, P>,
    command: &Command,
    mqtt_config: MqttConfig,
) -> crate::Result<()> {
    lpwa.wakeup().await;
    match command {
        Command::Configure => {
            lpwa.configure().await?;
            if !lpwa.wait_registered().await {
                return Err(Error::WorkflowTimeout("network registration"));
            }
            info!("Registered to the network");
        }
        Command::FactoryReset => {
            if !lpwa.factory_reset().await? {
                return Err(Error::WorkflowTimeout("factory reset"));
            }
        }
        Command::Status => {
            lpwa.check_firmware().await?;
            lpwa.update();
        }
        Command::Gnss { timeout_secs } => gnss_fix(lpwa, *timeout_secs).await?,
        Command::Agnss { timeout_secs } => agnss_download(lpwa, *timeout_secs).await?,
        Command::Mqtt { topic, payload, .. } => {
            let client = MqttClient::new(mqtt_config);
            client.start_session(lpwa).await?;
            let published = client.publish(lpwa, topic, payload).await;
            client.end_session(lpwa).await?;
            published?;
            info!("Published to {topic}");
        }
    }
    Ok(())
}

async fn gnss_fix<T: Tx, P: ModemPin>(
    lpwa: &mut Lpwa<'_, T, P>,
    timeout_secs: u64,
) -> crate::Result<()> {
    if !lpwa.start_gnss().await? {
        warn!("GNSS did not start, it might be running already");
    }
    let has_fix = lpwa
        .wait_for(|state| state.fix().fix_count > 0, "GNSS fix", Duration::from_secs(timeout_secs))
        .await;
    lpwa.stop_gnss().await?;
    if !has_fix {
        return Err(Error::WorkflowTimeout("GNSS fix"));
    }
    let fix = lpwa.fix();
    info!("Fix at {}: {:.6},{:.6}", fix.timestamp, fix.latitude, fix.longitude);
    Ok(())
}

async fn agnss_download<T: Tx, P: ModemPin>(
    lpwa: &mut Lpwa<'_, T, P>,
    timeout_secs: u64,
) -> crate::Result<()> {
    lpwa.start_agnss_download().await?;
    let deadline = Instant::now() + Duration::from_secs(timeout_secs);
    while Instant::now() < deadline {
        if lpwa.poll_agnss().await? {
            return Ok(());
        }
        Timer::after(AGNSS_POLL_INTERVAL).await;
    }
    Err(Error::WorkflowTimeout("AGNSS download"))
}

#[cfg(test)]
mod test_workflow {
    use super::*;
    use lpwa_common::at::fake_modem::FakeModem;
    use lpwa_common::modem::hw::NoPin;
    use lpwa_common::modem::modem_manager::ModuleConfig;
    use lpwa_common::state::SharedState;
    use lpwa_common::wait::Waiter;

    const OK: &str = "\r\nOK\r\n";

    fn fast_waiter() -> Waiter {
        Waiter::new(Duration::from_millis(1), Duration::from_secs(1), Duration::from_millis(0))
    }

    #[tokio::test]
    async fn test_mqtt_publish_failure_ends_session() {
        let state = SharedState::new();
        let modem = FakeModem::new(
            &state,
            &[
                ("AT+QMTOPEN=0,\"broker.emqx.io\",1883", "\r\nOK\r\n\r\n+QMTOPEN: 0,0\r\n"),
                ("AT+QMTCONN=0,\"lpwa\"", "\r\nOK\r\n\r\n+QMTCONN: 0,0,0\r\n"),
                ("AT+QMTPUBEX=0,0,0,0,\"t\",\"p\"", "\r\nERROR\r\n"),
                ("AT+QMTDISC=0", OK),
                ("AT+QMTCLOSE=0", OK),
            ],
        );
        let mut lpwa = Lpwa::new(modem.tx(), NoPin, NoPin, &state, ModuleConfig::default())
            .with_waiter(fast_waiter());
        let command = Command::Mqtt {
            url: "broker.emqx.io".to_owned(),
            mqtt_port: 1883,
            topic: "t".to_owned(),
            payload: "p".to_owned(),
        };
        let result = run(&mut lpwa, &command, MqttConfig::default()).await;
        assert_eq!(
            result,
            Err(Error::CommonError(lpwa_common::error::Error::AtErrorResponse))
        );
        assert!(modem.all_done());
    }

    #[tokio::test]
    async fn test_agnss_timeout() {
        let state = SharedState::new();
        let modem = FakeModem::new(
            &state,
            &[
                ("AT+QGPSCFG=\"xtra_download\"", OK),
                ("AT+CCLK?", "\r\n+CCLK: \"26/02/10,11:44:24+04\"\r\n\r\nOK\r\n"),
                ("AT+QGPSXTRATIME=0,\"2026/02/10,10:44:24\",1,1,5", OK),
            ],
        );
        let mut lpwa = Lpwa::new(modem.tx(), NoPin, NoPin, &state, ModuleConfig::default())
            .with_waiter(fast_waiter());
        let command = Command::Agnss { timeout_secs: 0 };
        let result = run(&mut lpwa, &command, MqttConfig::default()).await;
        assert_eq!(result, Err(Error::WorkflowTimeout("AGNSS download")));
        assert!(modem.all_done());
    }
}
