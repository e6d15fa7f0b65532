//! Connection supervisor.
//!
//! Drives `Disconnected -> Connecting -> Handshaking -> Connected` on a fixed
//! tick and tears the session down when a disconnect is requested. Reconnect
//! attempts are unlimited and spaced by the tick; there is no backoff at this
//! layer.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::gateway::context::{ConnectionState, GatewayContext};
use crate::gateway::reader::run_reader;
use crate::gateway::sanity::NetworkSanityChecker;
use crate::gateway::writer::run_writer;
use crate::transport::Transport;

/// Upper bound for a session task to finish after cancellation.
pub const TASK_STOP_TIMEOUT: Duration = Duration::from_secs(3);

/// The tasks of one open transport session.
struct Session {
    cancel: CancellationToken,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl Session {
    fn spawn<F>(&mut self, name: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.push((name, tokio::spawn(task)));
    }

    async fn shutdown(self) {
        self.cancel.cancel();
        for (name, handle) in self.tasks {
            let abort = handle.abort_handle();
            if timeout(TASK_STOP_TIMEOUT, handle).await.is_err() {
                warn!(task = name, "Task did not stop in time, aborting");
                abort.abort();
            }
        }
    }
}

/// Owns the transport session and drives reconnects. Spawned by
/// [`Gateway::start`](crate::gateway::Gateway::start).
pub struct ConnectionSupervisor {
    ctx: Arc<GatewayContext>,
    transport: Arc<dyn Transport>,
    session: Option<Session>,
}

impl ConnectionSupervisor {
    pub(crate) fn new(ctx: Arc<GatewayContext>, transport: Arc<dyn Transport>) -> Self {
        Self {
            ctx,
            transport,
            session: None,
        }
    }

    pub(crate) async fn run(mut self, cancel: CancellationToken) {
        let mut ticker = interval(self.ctx.settings.reconnect_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
                _ = self.ctx.disconnect_notified(), if self.session.is_some() => {}
            }

            match self.ctx.state() {
                ConnectionState::Disconnected => self.connect(&cancel).await,
                ConnectionState::Connected => {
                    if self.ctx.take_disconnect_request() {
                        self.teardown().await;
                    }
                }
                ConnectionState::Connecting | ConnectionState::Handshaking => {}
            }
        }

        self.teardown().await;
        info!("Connection supervisor stopped");
    }

    async fn connect(&mut self, cancel: &CancellationToken) {
        let endpoint = self.transport.describe();
        self.ctx.set_state(ConnectionState::Connecting);

        let link = match self.transport.open().await {
            Ok(link) => link,
            Err(e) => {
                warn!(%endpoint, "Failed to connect to gateway: {e}");
                self.ctx.set_state(ConnectionState::Disconnected);
                return;
            }
        };

        self.ctx.clear_disconnect_request();
        let mut session = Session {
            cancel: cancel.child_token(),
            tasks: Vec::new(),
        };
        session.spawn(
            "frame-reader",
            run_reader(link.reader, self.ctx.clone(), session.cancel.clone()),
        );
        session.spawn(
            "frame-writer",
            run_writer(link.writer, self.ctx.clone(), session.cancel.clone()),
        );
        self.session = Some(session);
        self.ctx.set_state(ConnectionState::Handshaking);

        if !self.ctx.settings.skip_startup_check && !self.handshake(cancel).await {
            error!(%endpoint, "Gateway did not answer the startup check");
            self.teardown().await;
            return;
        }
        if self.ctx.take_disconnect_request() {
            warn!(%endpoint, "Connection lost during startup");
            self.teardown().await;
            return;
        }

        self.ctx.set_state(ConnectionState::Connected);
        info!(%endpoint, "Bridge online");
        self.ctx.set_bridge_online(true);

        if self.ctx.settings.enable_network_sanity_check {
            if let Some(session) = self.session.as_mut() {
                let checker = NetworkSanityChecker::new(self.ctx.clone());
                let token = session.cancel.clone();
                session.spawn("sanity-checker", checker.run(token));
            }
        }
    }

    async fn handshake(&self, cancel: &CancellationToken) -> bool {
        let attempts = self.ctx.settings.startup_check_attempts;
        let wait = self.ctx.settings.startup_check_timeout();

        for attempt in 1..=attempts {
            if self.ctx.disconnect_pending() {
                return false;
            }
            match self.ctx.probe_version(wait, cancel).await {
                Some(true) => {
                    debug!(attempt, "Startup check passed");
                    return true;
                }
                Some(false) => debug!(attempt, attempts, "No answer to I_VERSION"),
                None => return false,
            }
        }
        false
    }

    /// Stop the session tasks, drop pending messages and report offline.
    async fn teardown(&mut self) {
        let was_connected = self.ctx.state() == ConnectionState::Connected;

        if let Some(session) = self.session.take() {
            session.shutdown().await;
        }
        let dropped = self.ctx.outbound.clear();
        let deferred = self.ctx.smart_sleep.clear();
        self.ctx.clear_disconnect_request();
        self.ctx.set_state(ConnectionState::Disconnected);

        if was_connected {
            info!(dropped, deferred, "Bridge offline");
            self.ctx.set_bridge_online(false);
        }
    }
}
