//! The `transport` module opens byte streams to the gateway device.
//!
//! A [`Transport`] produces a fresh [`Link`] (read half + write half) every
//! time the supervisor connects. Closing is dropping: once the frame reader
//! and writer tasks end, both halves are dropped and the port or socket is
//! released. A blocked read is interrupted by cancelling the reader task.

pub mod ip;
#[cfg(feature = "serial")]
pub mod serial;
#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::config::{GatewayKind, GatewaySettings};
use crate::utils::Result;

pub use ip::IpTransport;
#[cfg(feature = "serial")]
pub use serial::SerialTransport;

/// Read half of a [`Link`].
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
/// Write half of a [`Link`].
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// An open connection to the gateway.
pub struct Link {
    pub reader: BoxedReader,
    pub writer: BoxedWriter,
}

impl Link {
    /// Box both halves of a stream.
    pub fn new(
        reader: impl AsyncRead + Send + Unpin + 'static,
        writer: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Self {
        Self {
            reader: Box::new(reader),
            writer: Box::new(writer),
        }
    }
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link").finish_non_exhaustive()
    }
}

/// Something that can open a fresh [`Link`] to the gateway.
pub trait Transport: Send + Sync {
    /// Open a new connection to the gateway.
    fn open(&self) -> BoxFuture<'_, Result<Link>>;

    /// Human-readable endpoint, used in logs.
    fn describe(&self) -> String;
}

/// Build the transport selected by `settings.kind`.
pub fn from_settings(settings: &GatewaySettings) -> Result<Arc<dyn Transport>> {
    match settings.kind {
        GatewayKind::Ip => Ok(Arc::new(IpTransport::new(
            settings.ip_address.clone(),
            settings.tcp_port,
        ))),
        #[cfg(feature = "serial")]
        GatewayKind::Serial => Ok(Arc::new(SerialTransport::new(
            settings.serial_port.clone(),
            settings.baud_rate,
        ))),
        #[cfg(not(feature = "serial"))]
        GatewayKind::Serial => Err(crate::utils::GatewayError::Transport(
            "serial support not compiled in (enable the `serial` feature)".to_string(),
        )),
    }
}
