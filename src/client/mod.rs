//! The `client` module provides a channel-backed event consumer.
//!
//! A [`Subscriber`] is an [`EventListener`](crate::event::EventListener) that
//! forwards every gateway event into a tokio unbounded channel, so async
//! code can `recv().await` events instead of implementing a callback.

pub mod subscriber;
pub use subscriber::Subscriber;
