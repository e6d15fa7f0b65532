//! Event distribution.
//!
//! The gateway owns exactly one [`EventBus`] and hands it to every component
//! that produces events. Listeners implement [`EventListener`] and are invoked
//! synchronously, in registration order, for every published event.

pub mod bus;
pub mod event;

pub use bus::{EventBus, EventListener, ListenerId};
pub use event::GatewayEvent;
