use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio_serial::{SerialPortBuilderExt, SerialStream};

use lpwa_common::at::uart::{Rx, Tx};
use lpwa_common::error::Error;

pub struct TokioSerial {
    serial: SerialStream,
    port: String,
}

impl TokioSerial {
    /// Opens the serial port at `port`, e.g., `/dev/ttyUSB0`.
    pub fn new(port: &str, baud_rate: u32) -> crate::Result<Self> {
        let builder = tokio_serial::new(port, baud_rate);
        let serial =
            builder.open_native_async().map_err(|_| crate::error::Error::ConnectionError)?;
        Ok(Self {
            serial,
            port: port.to_owned(),
        })
    }

    /// Returns the port path of the serial connection.
    pub fn port(&self) -> &str {
        &self.port
    }

    /// Splits the connection into halves for the RX broker and the driver.
    pub fn split(self) -> (SerialRx, SerialTx) {
        let (rx, tx) = tokio::io::split(self.serial);
        (SerialRx(rx), SerialTx(tx))
    }
}

pub struct SerialRx(ReadHalf<SerialStream>);

impl Rx for SerialRx {
    async fn read(&mut self, buf: &mut [u8]) -> lpwa_common::Result<usize> {
        match self.0.read(buf).await {
            // The port was closed, e.g. the adapter got unplugged
            Ok(0) => Err(Error::UartReadError),
            Ok(len) => Ok(len),
            Err(_) => Err(Error::UartReadError),
        }
    }
}

pub struct SerialTx(WriteHalf<SerialStream>);

impl Tx for SerialTx {
    async fn write(&mut self, buffer: &[u8]) -> lpwa_common::Result<()> {
        self.0.write_all(buffer).await.map_err(|_| Error::UartWriteError)
    }

    async fn flush(&mut self) -> lpwa_common::Result<()> {
        self.0.flush().await.map_err(|_| Error::UartWriteError)
    }
}
