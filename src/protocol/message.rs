//! Message definitions for the gateway line protocol.
//!
//! `Message` is both the wire unit and the outbound queue entry. The wire
//! fields are set by whoever builds the message and never change afterwards;
//! `retries` and `next_send` are scheduling state owned by the frame writer.

use std::fmt;
use std::str::FromStr;

use tokio::time::Instant;

use crate::utils::GatewayError;

/// Node id of the gateway itself.
pub const GATEWAY_NODE_ID: u8 = 0;

/// Broadcast / unassigned node id.
pub const BROADCAST_ID: u8 = 255;

/// Child id used for node-level (not sensor-level) messages.
pub const NO_CHILD_ID: u8 = 255;

/// Internal (`msgType == 3`) sub-types understood by the engine.
pub mod internal {
    pub const I_BATTERY_LEVEL: u8 = 0;
    pub const I_TIME: u8 = 1;
    pub const I_VERSION: u8 = 2;
    pub const I_ID_REQUEST: u8 = 3;
    pub const I_ID_RESPONSE: u8 = 4;
    pub const I_CONFIG: u8 = 6;
    pub const I_LOG_MESSAGE: u8 = 9;
    pub const I_SKETCH_NAME: u8 = 11;
    pub const I_SKETCH_VERSION: u8 = 12;
    pub const I_GATEWAY_READY: u8 = 14;
    pub const I_HEARTBEAT_REQUEST: u8 = 18;
    pub const I_HEARTBEAT_RESPONSE: u8 = 22;
    pub const I_PRE_SLEEP_NOTIFICATION: u8 = 32;
    pub const I_POST_SLEEP_NOTIFICATION: u8 = 33;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageType {
    Presentation,
    Set,
    Req,
    Internal,
    Stream,
}

impl MessageType {
    /// Numeric value on the wire.
    pub fn code(self) -> u8 {
        match self {
            MessageType::Presentation => 0,
            MessageType::Set => 1,
            MessageType::Req => 2,
            MessageType::Internal => 3,
            MessageType::Stream => 4,
        }
    }

    /// Parse a wire value; `None` for unknown types.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(MessageType::Presentation),
            1 => Some(MessageType::Set),
            2 => Some(MessageType::Req),
            3 => Some(MessageType::Internal),
            4 => Some(MessageType::Stream),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub node_id: u8,
    pub child_id: u8,
    pub msg_type: MessageType,
    pub ack: bool,
    pub sub_type: u8,
    pub payload: String,
    /// Hold the message until the node reports it is awake.
    pub smart_sleep: bool,
    /// Ask the device-model layer to restore `previous_payload` if the
    /// message is never acknowledged.
    pub revert_on_failure: bool,
    pub previous_payload: Option<String>,
    pub(crate) retries: u8,
    pub(crate) next_send: Option<Instant>,
}

impl Message {
    /// Build a message with no smart-sleep or revert handling.
    pub fn new(
        node_id: u8,
        child_id: u8,
        msg_type: MessageType,
        ack: bool,
        sub_type: u8,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            node_id,
            child_id,
            msg_type,
            ack,
            sub_type,
            payload: payload.into(),
            smart_sleep: false,
            revert_on_failure: false,
            previous_payload: None,
            retries: 0,
            next_send: None,
        }
    }

    /// Internal message without ack request.
    pub fn internal(node_id: u8, child_id: u8, sub_type: u8, payload: impl Into<String>) -> Self {
        Self::new(
            node_id,
            child_id,
            MessageType::Internal,
            false,
            sub_type,
            payload,
        )
    }

    /// The I_VERSION probe sent to the gateway for handshake and liveness checks.
    pub fn version_probe() -> Self {
        Self::internal(GATEWAY_NODE_ID, NO_CHILD_ID, internal::I_VERSION, "")
    }

    /// Hold this message until the node wakes up.
    pub fn with_smart_sleep(mut self, smart_sleep: bool) -> Self {
        self.smart_sleep = smart_sleep;
        self
    }

    /// Mark the message for revert to `previous_payload` if it is never acknowledged.
    pub fn with_revert(mut self, previous_payload: impl Into<String>) -> Self {
        self.revert_on_failure = true;
        self.previous_payload = Some(previous_payload.into());
        self
    }

    /// Number of transmissions performed so far by the frame writer.
    pub fn retries(&self) -> u8 {
        self.retries
    }

    /// True for an internal message with this sub-type.
    pub fn is_internal(&self, sub_type: u8) -> bool {
        self.msg_type == MessageType::Internal && self.sub_type == sub_type
    }

    /// Compares the fields that travel on the wire, ignoring scheduling state.
    pub fn same_frame(&self, other: &Message) -> bool {
        self.node_id == other.node_id
            && self.child_id == other.child_id
            && self.msg_type == other.msg_type
            && self.sub_type == other.sub_type
            && self.ack == other.ack
            && self.payload == other.payload
    }

    pub(crate) fn is_due(&self, now: Instant) -> bool {
        self.next_send.is_none_or(|at| at <= now)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{};{};{};{};{};{}",
            self.node_id,
            self.child_id,
            self.msg_type.code(),
            u8::from(self.ack),
            self.sub_type,
            self.payload
        )
    }
}

impl FromStr for Message {
    type Err = GatewayError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim_end_matches(['\r', '\n']);
        let fields: Vec<&str> = line.splitn(6, ';').collect();
        if fields.len() < 5 {
            return Err(GatewayError::MalformedFrame(format!(
                "expected at least 5 fields, got {}",
                fields.len()
            )));
        }

        let number = |idx: usize, name: &str| -> Result<u8, GatewayError> {
            fields[idx]
                .parse::<u8>()
                .map_err(|_| GatewayError::MalformedFrame(format!("invalid {name} '{}'", fields[idx])))
        };

        let node_id = number(0, "node id")?;
        let child_id = number(1, "child id")?;
        let msg_type = MessageType::from_code(number(2, "message type")?).ok_or_else(|| {
            GatewayError::MalformedFrame(format!("unknown message type '{}'", fields[2]))
        })?;
        let ack = match number(3, "ack flag")? {
            0 => false,
            1 => true,
            other => {
                return Err(GatewayError::MalformedFrame(format!(
                    "ack flag must be 0 or 1, got {other}"
                )));
            }
        };
        let sub_type = number(4, "sub type")?;
        let payload: String = fields
            .get(5)
            .map(|p| p.chars().filter(|c| *c != '\r' && *c != '\n').collect())
            .unwrap_or_default();

        Ok(Message::new(node_id, child_id, msg_type, ack, sub_type, payload))
    }
}
