use futures::future::BoxFuture;
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, StopBits};
use tracing::info;

use super::{Link, Transport};
use crate::utils::Result;

/// USB/UART gateway on a local serial port, 8N1 without flow control.
#[derive(Debug, Clone)]
pub struct SerialTransport {
    port: String,
    baud_rate: u32,
}

impl SerialTransport {
    /// A transport for `port` at `baud_rate`. The port is opened on [`Transport::open`].
    pub fn new(port: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port: port.into(),
            baud_rate,
        }
    }
}

impl Transport for SerialTransport {
    fn open(&self) -> BoxFuture<'_, Result<Link>> {
        Box::pin(async move {
            let stream = tokio_serial::new(&self.port, self.baud_rate)
                .data_bits(DataBits::Eight)
                .parity(Parity::None)
                .stop_bits(StopBits::One)
                .flow_control(FlowControl::None)
                .open_native_async()?;
            info!(port = %self.port, baud = self.baud_rate, "Opened serial gateway");

            let (reader, writer) = tokio::io::split(stream);
            Ok(Link::new(reader, writer))
        })
    }

    fn describe(&self) -> String {
        format!("{}@{}", self.port, self.baud_rate)
    }
}
