//! The gateway engine.
//!
//! [`Gateway`] is the handle the device-model layer talks to. Internally it
//! owns one shared context (queues, node table, allocator, event bus) and a
//! [`ConnectionSupervisor`] task that opens the transport and runs, per
//! session, a frame reader, a frame writer and optionally a
//! [`NetworkSanityChecker`]. All tasks hang off one cancellation token.

mod context;
mod handler;
mod reader;
pub mod sanity;
pub mod supervisor;
pub mod writer;

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::GatewaySettings;
use crate::event::{EventListener, GatewayEvent, ListenerId};
use crate::node::Node;
use crate::protocol::Message;
use crate::transport::{self, Transport};
use crate::utils::{GatewayError, Result};

pub use context::ConnectionState;
pub use sanity::{NetworkSanityChecker, ProbeOutcome};
pub use supervisor::ConnectionSupervisor;
pub use writer::{ACK_RETRY_DELAYS_MS, MAX_RETRIES};

use context::GatewayContext;
use handler::InboundHandler;

const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to one gateway connection.
///
/// Create it with [`Gateway::new`] or [`Gateway::from_settings`], register
/// listeners, then call [`Gateway::start`]. Dropping the handle cancels every
/// task; [`Gateway::stop`] also waits for them.
pub struct Gateway {
    ctx: Arc<GatewayContext>,
    transport: Arc<dyn Transport>,
    cancel: CancellationToken,
    supervisor: Mutex<Option<JoinHandle<()>>>,
    handler_id: ListenerId,
}

impl Gateway {
    /// Create a gateway over `transport`. Nothing runs until [`Gateway::start`].
    pub fn new(settings: GatewaySettings, transport: Arc<dyn Transport>) -> Self {
        let ctx = Arc::new(GatewayContext::new(settings));
        let handler_id = ctx
            .bus
            .add_listener(Arc::new(InboundHandler::new(Arc::downgrade(&ctx))));
        Self {
            ctx,
            transport,
            cancel: CancellationToken::new(),
            supervisor: Mutex::new(None),
            handler_id,
        }
    }

    /// Build a gateway with the transport selected in `settings`.
    pub fn from_settings(settings: GatewaySettings) -> Result<Self> {
        settings.validate()?;
        let transport = transport::from_settings(&settings)?;
        Ok(Self::new(settings, transport))
    }

    /// Spawn the connection supervisor. Must be called inside a tokio runtime;
    /// calling it twice is a no-op.
    pub fn start(&self) {
        let mut supervisor = self.supervisor.lock().unwrap_or_else(PoisonError::into_inner);
        if supervisor.is_some() || self.cancel.is_cancelled() {
            return;
        }
        info!(endpoint = %self.transport.describe(), "Starting gateway");
        let task = ConnectionSupervisor::new(self.ctx.clone(), self.transport.clone());
        *supervisor = Some(tokio::spawn(task.run(self.cancel.clone())));
    }

    /// Cancel every task and wait (bounded) for them to finish.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let handle = self
            .supervisor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            let abort = handle.abort_handle();
            if timeout(STOP_TIMEOUT, handle).await.is_err() {
                warn!("Supervisor did not stop in time, aborting");
                abort.abort();
            }
        }
    }

    /// Queue a message for the gateway. Smart-sleep messages are held until
    /// their node wakes up.
    pub fn send_message(&self, message: Message) -> Result<()> {
        if !self.ctx.session_open() {
            return Err(GatewayError::NotConnected);
        }
        self.ctx.enqueue(message);
        Ok(())
    }

    /// Register a listener for every event published from now on.
    pub fn add_listener(&self, listener: Arc<dyn EventListener>) -> ListenerId {
        self.ctx.bus.add_listener(listener)
    }

    /// Unregister a listener. Returns `false` for unknown ids.
    pub fn remove_listener(&self, id: &ListenerId) -> bool {
        id != &self.handler_id && self.ctx.bus.remove_listener(id)
    }

    /// Remove every listener added through [`Gateway::add_listener`].
    pub fn clear_listeners(&self) {
        let handler_id = self.handler_id;
        self.ctx.bus.retain(|id| *id == handler_id);
    }

    /// True once the handshake has passed and until the session is torn down.
    pub fn is_connected(&self) -> bool {
        self.ctx.state() == ConnectionState::Connected
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.ctx.state()
    }

    /// Subscribe to connection state changes.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.ctx.watch_state()
    }

    /// Reserve the lowest free node id and persist it to the id cache.
    pub fn reserve_id(&self) -> Result<u8> {
        let node_id = self.ctx.allocator.reserve(&self.ctx.nodes)?;
        self.ctx.bus.publish(&GatewayEvent::IdReserved { node_id });
        Ok(node_id)
    }

    /// Force the current session down; the supervisor reconnects on its next tick.
    pub fn request_disconnect(&self) {
        self.ctx.request_disconnect("requested by caller");
    }

    /// Copies of every known node.
    pub fn nodes(&self) -> Vec<Node> {
        self.ctx.nodes.snapshot()
    }

    /// A copy of one node, if known.
    pub fn node(&self, node_id: u8) -> Option<Node> {
        self.ctx.nodes.get(node_id)
    }

    /// Messages waiting in the outbound queue, retries included.
    pub fn pending_messages(&self) -> usize {
        self.ctx.outbound.len()
    }

    /// Messages held for sleeping nodes.
    pub fn pending_smart_sleep_messages(&self) -> usize {
        self.ctx.smart_sleep.len()
    }

    /// The settings this gateway was built with.
    pub fn settings(&self) -> &GatewaySettings {
        &self.ctx.settings
    }
}

impl Drop for Gateway {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("endpoint", &self.transport.describe())
            .field("state", &self.ctx.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests;
