use crate::protocol::Message;

/// Everything the gateway engine reports to the device-model layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    /// A frame arrived from the gateway, in wire order.
    MessageReceived(Message),
    /// First message seen from a node id that was not in the node table.
    NodeDiscovered { node_id: u8 },
    /// A node id was handed out by the allocator.
    IdReserved { node_id: u8 },
    NodeReachabilityChanged { node_id: u8, reachable: bool },
    /// The bridge came online (handshake done) or went offline.
    BridgeStatusChanged { online: bool },
    /// An ack-requested message exhausted its retries and was dropped.
    AckNotReceived(Message),
}

impl GatewayEvent {
    /// Stable snake-case name, used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            GatewayEvent::MessageReceived(_) => "message_received",
            GatewayEvent::NodeDiscovered { .. } => "node_discovered",
            GatewayEvent::IdReserved { .. } => "id_reserved",
            GatewayEvent::NodeReachabilityChanged { .. } => "node_reachability_changed",
            GatewayEvent::BridgeStatusChanged { .. } => "bridge_status_changed",
            GatewayEvent::AckNotReceived(_) => "ack_not_received",
        }
    }
}
