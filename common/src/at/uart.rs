#[cfg(feature = "defmt")]
use defmt::{debug, error, warn};
use embassy_time::{Duration, Instant, Timer};
use heapless::format;
#[cfg(not(feature = "defmt"))]
use log::{debug, error, warn};

use super::framer::{AT_BUF_SIZE, LINE_CAPACITY, Line, LineFramer};
use super::response::classify;
use crate::error::Error;
use crate::state::SharedState;
use crate::wait::Waiter;

/// Longest command line including its terminator.
const TX_LINE_SIZE: usize = LINE_CAPACITY + 2;

/// Default time to wait for the result of a command.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

pub trait Rx {
    /// Reads the bytes that are currently available, waiting until there is at least one.
    /// Returns the number of read bytes.
    fn read(&mut self, buf: &mut [u8]) -> impl core::future::Future<Output = crate::Result<usize>>;
}

pub trait Tx {
    /// Write bytes to the TX part of UART.
    fn write(&mut self, buffer: &[u8]) -> impl core::future::Future<Output = crate::Result<()>>;

    /// Waits until all written bytes have been transmitted.
    fn flush(&mut self) -> impl core::future::Future<Output = crate::Result<()>>;
}

/// A broker of AT replies (listening to UART RX), framing them into lines and applying them to
/// the shared modem state.
pub struct AtRxBroker<'a> {
    state: &'a SharedState,
    framer: LineFramer,
}

impl<'a> AtRxBroker<'a> {
    pub fn new(state: &'a SharedState) -> Self {
        Self {
            state,
            framer: LineFramer::new(),
        }
    }

    /// Processes all bytes received so far, applying every completed line.
    pub fn process_bytes(&mut self, bytes: &[u8]) {
        for line in self.framer.feed_all(bytes) {
            debug!("[AT] {}", line.as_str());
            let event = classify(&line);
            self.state.with(|state| state.apply(&line, event));
        }
    }

    /// A loop running AtRxBroker forever.
    ///
    /// Drains everything `rx` has available in each iteration. Read errors are logged and the
    /// loop continues after a short pause.
    ///
    /// Used mainly to plug into a `embassy_executor::task`.
    pub async fn broker_loop(&mut self, mut rx: impl Rx) {
        let mut buf = [0; AT_BUF_SIZE];
        loop {
            match rx.read(&mut buf).await {
                Ok(len) => self.process_bytes(&buf[..len]),
                Err(err) => {
                    error!("Error while reading from modem: {}", err);
                    Timer::after_millis(10).await;
                }
            }
        }
    }
}

/// Sends AT commands and collects their results.
///
/// Results are captured by [`AtRxBroker`] into the shared state, which must be running
/// concurrently (or be fed synchronously by the transport). Only one command can be in flight,
/// `send` takes `&mut self` for that reason.
pub struct AtUart<'a, T: Tx> {
    tx: T,
    state: &'a SharedState,
    waiter: Waiter,
    timeout: Duration,
}

impl<'a, T: Tx> AtUart<'a, T> {
    pub fn new(tx: T, state: &'a SharedState) -> Self {
        Self {
            tx,
            state,
            waiter: Waiter::default(),
            timeout: COMMAND_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_waiter(mut self, waiter: Waiter) -> Self {
        self.waiter = waiter;
        self
    }

    pub fn into_tx(self) -> T {
        self.tx
    }

    pub fn state(&self) -> &'a SharedState {
        self.state
    }

    pub fn waiter(&self) -> &Waiter {
        &self.waiter
    }

    async fn write_line(&mut self, command: &str) -> crate::Result<()> {
        let line = format!(TX_LINE_SIZE; "{command}\r\n")?;
        self.tx.write(line.as_bytes()).await.map_err(|_| Error::UartWriteError)?;
        self.tx.flush().await.map_err(|_| Error::UartWriteError)
    }

    /// Sends `command` and waits for its result.
    ///
    /// Returns the `OK`, `ERROR` or `+CME ERROR` line completing the command, or an empty line
    /// if none arrived within the timeout. Only transport failures are errors.
    pub async fn send(&mut self, command: &str) -> crate::Result<Line> {
        if command.len() > LINE_CAPACITY {
            return Err(Error::BufferTooSmallError);
        }
        let start = Instant::now();
        self.state.with(|state| state.prepare_command(command));
        self.write_line(command).await?;

        let state = self.state;
        let done = self
            .waiter
            .wait_for(|| state.with(|state| !state.result().is_empty()), command, self.timeout)
            .await;
        let result = state.with(|state| state.result().clone());
        if done {
            debug!(
                "{}: {}, took {}ms",
                command,
                result.as_str(),
                start.elapsed().as_millis()
            );
        } else {
            warn!("{}: no result within {}ms", command, self.timeout.as_millis());
        }
        Ok(result)
    }
}
