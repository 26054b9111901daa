use embassy_futures::block_on;
use embassy_time::Duration;
use lpwa_common::at::fake_modem::FakeModem;
use lpwa_common::error::Error;
use lpwa_common::modem::hw::NoPin;
use lpwa_common::modem::modem_manager::{Lpwa, ModuleConfig};
use lpwa_common::modem::module::ModuleVariant;
use lpwa_common::state::SharedState;
use lpwa_common::wait::Waiter;

const OK: &str = "\r\nOK\r\n";
const CCLK: &str = "\r\n+CCLK: \"26/02/10,11:44:24+04\"\r\n\r\nOK\r\n";

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn fast_waiter() -> Waiter {
    Waiter::new(Duration::from_millis(1), Duration::from_secs(1), Duration::from_millis(0))
}

#[test]
fn test_agnss_download() {
    init_logger();
    let state = SharedState::new();
    let modem = FakeModem::new(
        &state,
        &[
            ("AT+QGPSCFG=\"xtra_download\"", OK),
            ("AT+CCLK?", CCLK),
            ("AT+QGPSXTRATIME=0,\"2026/02/10,10:44:24\",1,1,5", OK),
            ("AT+QGPSXTRADATA?", "\r\n+QGPSXTRADATA: 10080,\"2026/02/10,10:44:24\"\r\n\r\nOK\r\n"),
        ],
    );
    // A status left over from a previous download
    modem.unsolicited("\r\n+QGPSURC: \"XTRA_DL\",0\r\n");
    let mut lpwa = Lpwa::new(modem.tx(), NoPin, NoPin, &state, ModuleConfig::default())
        .with_waiter(fast_waiter());

    block_on(lpwa.start_agnss_download()).unwrap();
    assert!(!lpwa.agnss_valid());
    assert!(!block_on(lpwa.poll_agnss()).unwrap());

    modem.unsolicited("\r\n+QGPSURC: \"XTRA_DL\",0\r\n");
    assert!(block_on(lpwa.poll_agnss()).unwrap());
    assert!(lpwa.agnss_valid());
    assert!(lpwa.urc("QGPSURC").is_empty());
    assert!(modem.all_done());

    // Nothing more to report until the next download
    assert!(!block_on(lpwa.poll_agnss()).unwrap());
}

#[test]
fn test_agnss_download_failed() {
    init_logger();
    let state = SharedState::new();
    let modem = FakeModem::new(
        &state,
        &[
            ("AT+QGPSCFG=\"xtra_download\"", OK),
            ("AT+CCLK?", CCLK),
            ("AT+QGPSXTRATIME=0,\"2026/02/10,10:44:24\",1,1,5", "\r\n+CME ERROR: 508\r\n"),
        ],
    );
    let mut lpwa = Lpwa::new(modem.tx(), NoPin, NoPin, &state, ModuleConfig::default())
        .with_waiter(fast_waiter());

    block_on(lpwa.start_agnss_download()).unwrap();
    modem.unsolicited("\r\n+QGPSURC: \"XTRA_DL\",502\r\n");
    assert!(!block_on(lpwa.poll_agnss()).unwrap());
    modem.unsolicited("\r\n+QGPSURC: \"XTRA\"\r\n");
    assert!(!block_on(lpwa.poll_agnss()).unwrap());
    assert!(!lpwa.agnss_valid());
    assert!(modem.all_done());
}

#[test]
fn test_agnss_download_xtra_family() {
    init_logger();
    let state = SharedState::new();
    let modem = FakeModem::new(
        &state,
        &[
            ("AT+QGPSCFG=\"xtra_download\",1", OK),
            ("AT+CCLK?", "\r\n+CCLK: \"26/03/01,00:10:00-08\"\r\n\r\nOK\r\n"),
            ("AT+QGPSXTRATIME=0,\"2026/03/01,02:10:00\",1,1,5", OK),
            ("AT+QGPSXTRATIME?", OK),
        ],
    );
    let config = ModuleConfig {
        module: ModuleVariant::Bg951a,
        ..Default::default()
    };
    let mut lpwa =
        Lpwa::new(modem.tx(), NoPin, NoPin, &state, config).with_waiter(fast_waiter());

    block_on(lpwa.start_agnss_download()).unwrap();
    modem.unsolicited("\r\n+QGPSURC: \"XTRA_DL\",0\r\n");
    assert!(block_on(lpwa.poll_agnss()).unwrap());
    assert!(modem.all_done());
}

#[test]
fn test_network_time_missing() {
    init_logger();
    let state = SharedState::new();
    let modem = FakeModem::new(
        &state,
        &[
            ("AT+QGPSCFG=\"xtra_download\"", OK),
            ("AT+CCLK?", "\r\n+CCLK: \"80/00/00,00:00:00\"\r\n\r\nOK\r\n"),
            ("AT+CCLK?", "\r\nERROR\r\n"),
        ],
    );
    let mut lpwa = Lpwa::new(modem.tx(), NoPin, NoPin, &state, ModuleConfig::default())
        .with_waiter(fast_waiter());

    assert_eq!(block_on(lpwa.start_agnss_download()), Err(Error::ParseError));
    assert_eq!(block_on(lpwa.inject_network_time()), Err(Error::ParseError));
    assert!(modem.all_done());
}
