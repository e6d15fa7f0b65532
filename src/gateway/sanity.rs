//! Liveness prober for an established session.
//!
//! A serial port or socket can stay open while the gateway firmware has
//! hung. Every `sanity_check_interval` the checker sends an I_VERSION probe;
//! `sanity_check_max_missed` consecutive unanswered probes force a
//! disconnect. Any answer resets the miss counter.

use std::sync::Arc;

use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::gateway::context::GatewayContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Answered,
    /// Unanswered; carries the current miss count.
    Missed(u32),
    /// The miss threshold was reached and a disconnect was requested.
    Disconnect,
    Cancelled,
}

#[derive(Debug)]
pub struct NetworkSanityChecker {
    ctx: Arc<GatewayContext>,
    missed: u32,
}

impl NetworkSanityChecker {
    pub(crate) fn new(ctx: Arc<GatewayContext>) -> Self {
        Self { ctx, missed: 0 }
    }

    /// Consecutive unanswered probes so far.
    pub fn missed(&self) -> u32 {
        self.missed
    }

    pub(crate) async fn probe(&mut self, cancel: &CancellationToken) -> ProbeOutcome {
        let wait = self.ctx.settings.sanity_check_reply_timeout();
        match self.ctx.probe_version(wait, cancel).await {
            None => ProbeOutcome::Cancelled,
            Some(true) => {
                if self.missed > 0 {
                    info!(missed = self.missed, "Gateway answered again");
                }
                self.missed = 0;
                ProbeOutcome::Answered
            }
            Some(false) => {
                self.missed += 1;
                let max = self.ctx.settings.sanity_check_max_missed;
                if self.missed >= max {
                    error!(missed = self.missed, "Gateway stopped answering, forcing reconnect");
                    self.ctx.request_disconnect("network sanity check failed");
                    ProbeOutcome::Disconnect
                } else {
                    warn!(missed = self.missed, max, "Gateway did not answer sanity probe");
                    ProbeOutcome::Missed(self.missed)
                }
            }
        }
    }

    pub(crate) async fn run(mut self, cancel: CancellationToken) {
        let period = self.ctx.settings.sanity_check_interval();
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            match self.probe(&cancel).await {
                ProbeOutcome::Disconnect | ProbeOutcome::Cancelled => break,
                ProbeOutcome::Answered | ProbeOutcome::Missed(_) => {}
            }
        }

        debug!("Network sanity checker stopped");
    }
}
