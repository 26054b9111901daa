use clap::Parser;
use log::{error, info};
use static_cell::StaticCell;

use lpwa_common::at::uart::AtRxBroker;
use lpwa_common::modem::hw::NoPin;
use lpwa_common::modem::modem_manager::Lpwa;
use lpwa_common::state::SharedState;
use lpwa_host::cli::Args;
use lpwa_host::serial::TokioSerial;
use lpwa_host::workflow;

static STATE: StaticCell<SharedState> = StaticCell::new();

#[tokio::main]
async fn main() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_timestamp_millis()
        .init();

    let args = Args::parse();
    if let Err(err) = run(args).await {
        error!("{err}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> lpwa_host::Result<()> {
    let config = args.module_config()?;
    let mqtt_config = args.mqtt_config()?;
    let serial = TokioSerial::new(&args.port, args.baud)?;
    info!("Connected to {} on {}", args.module, serial.port());
    let (rx, tx) = serial.split();

    let state: &'static SharedState = STATE.init(SharedState::new());
    let mut broker = AtRxBroker::new(state);
    // USB adapters don't wire the power trigger and DTR lines
    let mut lpwa = Lpwa::new(tx, NoPin, NoPin, state, config);

    tokio::select! {
        _ = broker.broker_loop(rx) => {
            error!("Modem RX stopped");
            Ok(())
        }
        result = workflow::run(&mut lpwa, &args.command, mqtt_config) => result,
    }
}
