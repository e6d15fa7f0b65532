//! # MySensors gateway
//!
//! `mysensors_gateway` is the connection engine between a host and a
//! MySensors gateway device reachable over a serial port or TCP. It frames
//! the line-oriented wire protocol, keeps the link up with a handshake,
//! liveness probes and reconnects, rate-limits and retries outbound
//! traffic, holds messages for sleeping nodes, hands out node ids and
//! publishes everything it sees on an event bus.
//!
//! ## Core Modules
//!
//! - `protocol`: The wire `Message` and the line codec.
//! - `transport`: Opening serial and TCP links.
//! - `queue`: The outbound queue and the smart-sleep holding queue.
//! - `event`: Gateway events and the listener registry.
//! - `client`: A channel-backed event subscriber.
//! - `node`: Known nodes and node id allocation.
//! - `persistence`: The on-disk cache of handed-out node ids.
//! - `gateway`: The engine itself: supervisor, reader, writer and sanity checker.
//! - `config`: Loading settings from files and the environment.
//! - `utils`: The crate error type and logging setup.

pub mod client;
pub mod config;
pub mod event;
pub mod gateway;
pub mod node;
pub mod persistence;
pub mod protocol;
pub mod queue;
pub mod transport;
pub mod utils;

pub use event::{EventBus, EventListener, GatewayEvent, ListenerId};
pub use gateway::{ConnectionState, Gateway};
pub use protocol::{Message, MessageType};
pub use utils::{GatewayError, Result};
