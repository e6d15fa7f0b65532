use std::time::Duration;

use futures::future::BoxFuture;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::info;

use super::{Link, Transport};
use crate::utils::{GatewayError, Result};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Ethernet/WiFi gateway reachable over TCP.
#[derive(Debug, Clone)]
pub struct IpTransport {
    host: String,
    port: u16,
}

impl IpTransport {
    /// A transport for `host:port`. No connection is made until [`Transport::open`].
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl Transport for IpTransport {
    fn open(&self) -> BoxFuture<'_, Result<Link>> {
        Box::pin(async move {
            let addr = (self.host.as_str(), self.port);
            let stream = timeout(CONNECT_TIMEOUT, TcpStream::connect(addr))
                .await
                .map_err(|_| {
                    GatewayError::Transport(format!("connect to {} timed out", self.describe()))
                })??;
            stream.set_nodelay(true)?;
            info!(endpoint = %self.describe(), "Connected to IP gateway");

            let (reader, writer) = stream.into_split();
            Ok(Link::new(reader, writer))
        })
    }

    fn describe(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
