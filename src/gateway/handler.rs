//! Engine-side reactions to inbound frames.
//!
//! Registered on the event bus ahead of any external listener. Handles node
//! bookkeeping, id requests, version replies, config/time requests and
//! smart-sleep wake-ups. Holds a weak reference so the bus does not keep the
//! context alive.

use std::sync::Weak;

use chrono::Local;
use tracing::{debug, info, warn};

use crate::event::{EventListener, GatewayEvent};
use crate::gateway::context::GatewayContext;
use crate::protocol::{BROADCAST_ID, GATEWAY_NODE_ID, Message, MessageType, NO_CHILD_ID, internal};
use crate::utils::Result;

pub(crate) struct InboundHandler {
    ctx: Weak<GatewayContext>,
}

impl InboundHandler {
    pub(crate) fn new(ctx: Weak<GatewayContext>) -> Self {
        Self { ctx }
    }
}

impl EventListener for InboundHandler {
    fn on_event(&self, event: &GatewayEvent) -> Result<()> {
        let GatewayEvent::MessageReceived(message) = event else {
            return Ok(());
        };
        if let Some(ctx) = self.ctx.upgrade() {
            handle_inbound(&ctx, message);
        }
        Ok(())
    }
}

fn handle_inbound(ctx: &GatewayContext, message: &Message) {
    if let Some(observation) = ctx.nodes.observe(message) {
        let node_id = message.node_id;
        if observation.discovered {
            info!(node_id, "Discovered new node");
            ctx.allocator.remember(node_id, &ctx.nodes);
            ctx.bus.publish(&GatewayEvent::NodeDiscovered { node_id });
        }
        if observation.became_reachable {
            ctx.bus.publish(&GatewayEvent::NodeReachabilityChanged {
                node_id,
                reachable: true,
            });
        }
    }

    if message.msg_type != MessageType::Internal {
        return;
    }

    match message.sub_type {
        internal::I_VERSION if message.node_id == GATEWAY_NODE_ID => {
            ctx.note_version_reply(&message.payload);
        }
        internal::I_ID_REQUEST
            if message.node_id == BROADCAST_ID && message.child_id == NO_CHILD_ID =>
        {
            answer_id_request(ctx);
        }
        internal::I_CONFIG if message.node_id != BROADCAST_ID => {
            let units = if ctx.settings.imperial_units { "I" } else { "M" };
            ctx.outbound.push(Message::internal(
                message.node_id,
                NO_CHILD_ID,
                internal::I_CONFIG,
                units,
            ));
        }
        internal::I_TIME if message.node_id != BROADCAST_ID => {
            // Nodes expect local wall-clock seconds, not UTC.
            let now = Local::now().naive_local().and_utc().timestamp();
            ctx.outbound.push(Message::internal(
                message.node_id,
                NO_CHILD_ID,
                internal::I_TIME,
                now.to_string(),
            ));
        }
        internal::I_HEARTBEAT_RESPONSE | internal::I_POST_SLEEP_NOTIFICATION => {
            wake_node(ctx, message.node_id);
        }
        internal::I_LOG_MESSAGE => {
            debug!(node_id = message.node_id, log = %message.payload, "Gateway log");
        }
        internal::I_GATEWAY_READY => {
            info!(startup = %message.payload, "Gateway reports ready");
        }
        _ => {}
    }
}

fn answer_id_request(ctx: &GatewayContext) {
    match ctx.allocator.reserve(&ctx.nodes) {
        Ok(node_id) => {
            ctx.outbound.push(Message::internal(
                BROADCAST_ID,
                NO_CHILD_ID,
                internal::I_ID_RESPONSE,
                node_id.to_string(),
            ));
            ctx.bus.publish(&GatewayEvent::IdReserved { node_id });
        }
        Err(e) => warn!("Ignoring id request: {e}"),
    }
}

/// Release every deferred message for a node that just woke up.
fn wake_node(ctx: &GatewayContext, node_id: u8) {
    let pending = ctx.smart_sleep.take_node(node_id);
    if pending.is_empty() {
        return;
    }
    debug!(node_id, count = pending.len(), "Node awake, releasing smart-sleep messages");
    for message in pending {
        ctx.outbound.push(message);
    }
}
