use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::event::{EventListener, GatewayEvent};
use crate::utils::{GatewayError, Result};

#[derive(Debug)]
pub struct Subscriber {
    /// Label used in logs, e.g. the consuming component's name.
    pub name: String,
    sender: UnboundedSender<GatewayEvent>,
}

impl Subscriber {
    /// Wrap an existing channel sender.
    pub fn new(name: impl Into<String>, sender: UnboundedSender<GatewayEvent>) -> Self {
        Self {
            name: name.into(),
            sender,
        }
    }

    /// Create a subscriber together with the receiving end of its channel.
    pub fn channel(name: impl Into<String>) -> (Arc<Self>, UnboundedReceiver<GatewayEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self::new(name, tx)), rx)
    }
}

impl EventListener for Subscriber {
    fn on_event(&self, event: &GatewayEvent) -> Result<()> {
        self.sender.send(event.clone()).map_err(|_| {
            GatewayError::Listener(format!("subscriber '{}' dropped its receiver", self.name))
        })
    }
}
