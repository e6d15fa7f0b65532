//! State shared by the supervisor, the session tasks and the facade.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::{Notify, watch};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::GatewaySettings;
use crate::event::{EventBus, GatewayEvent};
use crate::node::{NodeIdAllocator, NodeTable};
use crate::persistence::IdCache;
use crate::protocol::Message;
use crate::queue::{OutboundQueue, SmartSleepQueue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    /// Opening the transport.
    Connecting,
    /// Transport open, waiting for the gateway to answer I_VERSION.
    Handshaking,
    Connected,
}

#[derive(Debug)]
pub(crate) struct GatewayContext {
    pub(crate) settings: GatewaySettings,
    pub(crate) bus: EventBus,
    pub(crate) outbound: OutboundQueue,
    pub(crate) smart_sleep: SmartSleepQueue,
    pub(crate) nodes: NodeTable,
    pub(crate) allocator: NodeIdAllocator,
    state: watch::Sender<ConnectionState>,
    version_replies: watch::Sender<u64>,
    disconnect_requested: AtomicBool,
    disconnect_notify: Notify,
}

impl GatewayContext {
    pub(crate) fn new(settings: GatewaySettings) -> Self {
        let allocator = NodeIdAllocator::new(IdCache::new(settings.id_cache_path.clone()));
        Self {
            settings,
            bus: EventBus::new(),
            outbound: OutboundQueue::new(),
            smart_sleep: SmartSleepQueue::new(),
            nodes: NodeTable::new(),
            allocator,
            state: watch::Sender::new(ConnectionState::Disconnected),
            version_replies: watch::Sender::new(0),
            disconnect_requested: AtomicBool::new(false),
            disconnect_notify: Notify::new(),
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(?previous, ?state, "Connection state changed");
        }
    }

    pub(crate) fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// True while a transport session exists (handshaking or connected).
    pub(crate) fn session_open(&self) -> bool {
        matches!(
            self.state(),
            ConnectionState::Handshaking | ConnectionState::Connected
        )
    }

    pub(crate) fn request_disconnect(&self, reason: &str) {
        if !self.disconnect_requested.swap(true, Ordering::SeqCst) {
            info!(reason, "Disconnect requested");
        }
        self.disconnect_notify.notify_one();
    }

    pub(crate) fn disconnect_pending(&self) -> bool {
        self.disconnect_requested.load(Ordering::SeqCst)
    }

    pub(crate) fn take_disconnect_request(&self) -> bool {
        self.disconnect_requested.swap(false, Ordering::SeqCst)
    }

    /// Reset the disconnect flag and discard a stored wake-up, so a request
    /// made for a session that is already gone cannot trigger the next
    /// connect early.
    pub(crate) fn clear_disconnect_request(&self) {
        self.disconnect_requested.store(false, Ordering::SeqCst);
        let _ = self.disconnect_notify.notified().now_or_never();
    }

    pub(crate) async fn disconnect_notified(&self) {
        self.disconnect_notify.notified().await;
    }

    pub(crate) fn note_version_reply(&self, version: &str) {
        debug!(version, "Gateway answered I_VERSION");
        self.version_replies.send_modify(|count| *count += 1);
    }

    /// Send one I_VERSION probe and wait up to `wait` for a reply.
    ///
    /// Returns `None` if `cancel` fired first.
    pub(crate) async fn probe_version(
        &self,
        wait: Duration,
        cancel: &CancellationToken,
    ) -> Option<bool> {
        let mut replies = self.version_replies.subscribe();
        self.outbound.push(Message::version_probe());
        tokio::select! {
            _ = cancel.cancelled() => None,
            reply = timeout(wait, replies.changed()) => Some(matches!(reply, Ok(Ok(())))),
        }
    }

    /// Route a message to the smart-sleep queue or straight to the outbound queue.
    pub(crate) fn enqueue(&self, message: Message) {
        if message.smart_sleep {
            let (node_id, child_id) = (message.node_id, message.child_id);
            if let Some(replaced) = self.smart_sleep.push(message) {
                debug!(node_id, child_id, replaced = %replaced, "Replaced pending smart-sleep message");
            }
        } else {
            self.outbound.push(message);
        }
    }

    /// Publish the bridge status and flip every node's reachability to match.
    pub(crate) fn set_bridge_online(&self, online: bool) {
        self.bus
            .publish(&GatewayEvent::BridgeStatusChanged { online });
        for node_id in self.nodes.set_all_reachable(online) {
            self.bus.publish(&GatewayEvent::NodeReachabilityChanged {
                node_id,
                reachable: online,
            });
        }
    }
}
