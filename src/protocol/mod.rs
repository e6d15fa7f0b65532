//! The `protocol` module implements the MySensors serial/TCP line protocol.
//!
//! Every frame is a single ASCII line
//! `nodeId;childId;msgType;ack;subType;payload\n`. The module provides the
//! [`Message`] value type, the internal sub-type constants the engine reacts
//! to, and a `tokio_util` codec that turns a byte stream into messages.

pub mod codec;
pub mod message;

pub use codec::{GatewayCodec, decode_line, encode};
pub use message::{BROADCAST_ID, GATEWAY_NODE_ID, Message, MessageType, NO_CHILD_ID, internal};
