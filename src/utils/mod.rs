//! The `utils` module collects the pieces shared by every other module of
//! the gateway engine: the crate error type and logging setup.

pub mod error;
pub mod logging;

pub use error::{GatewayError, Result};
