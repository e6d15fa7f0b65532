//! Outbound frame writer.
//!
//! Transmissions are spaced by at least `send_delay`. An ack-requested
//! message is re-queued before each transmission with a due time taken from
//! [`ACK_RETRY_DELAYS_MS`]; the reader removes it when the echo arrives.
//! After `1 + MAX_RETRIES` transmissions without an echo the message is
//! dropped and `AckNotReceived` is published.

use std::sync::Arc;
use std::time::Duration;

use futures::SinkExt;
use tokio::time::{Instant, sleep_until, timeout};
use tokio_util::codec::FramedWrite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::event::GatewayEvent;
use crate::gateway::context::GatewayContext;
use crate::protocol::GatewayCodec;
use crate::transport::BoxedWriter;

/// Retransmissions of an ack-requested message after the first attempt.
pub const MAX_RETRIES: u8 = 5;

/// Wait after transmission `n` (1-based) before transmission `n + 1`.
pub const ACK_RETRY_DELAYS_MS: [u64; MAX_RETRIES as usize] = [0, 100, 500, 1000, 2000];

const CLOSE_TIMEOUT: Duration = Duration::from_millis(500);

pub(crate) async fn run_writer(
    writer: BoxedWriter,
    ctx: Arc<GatewayContext>,
    cancel: CancellationToken,
) {
    let mut sink = FramedWrite::new(writer, GatewayCodec::new());
    let send_delay = ctx.settings.send_delay();
    let mut last_send: Option<Instant> = None;

    loop {
        if let Some(last) = last_send {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sleep_until(last + send_delay) => {}
            }
        }

        let mut message = tokio::select! {
            _ = cancel.cancelled() => break,
            message = ctx.outbound.pop_due() => message,
        };

        if message.ack {
            if message.retries > MAX_RETRIES {
                warn!(
                    frame = %message,
                    attempts = message.retries,
                    "No ack received, dropping message"
                );
                ctx.bus.publish(&GatewayEvent::AckNotReceived(message));
                continue;
            }

            message.retries += 1;
            let wait = ACK_RETRY_DELAYS_MS
                .get(usize::from(message.retries - 1))
                .copied()
                .unwrap_or(0);
            message.next_send = Some(Instant::now() + Duration::from_millis(wait));
            ctx.outbound.push(message.clone());
        }

        debug!(frame = %message, attempt = message.retries, "Sending");
        if let Err(e) = sink.send(message).await {
            warn!("Writing to gateway failed: {e}");
            ctx.request_disconnect("write error");
            break;
        }
        last_send = Some(Instant::now());
    }

    let _ = timeout(CLOSE_TIMEOUT, sink.close()).await;
    debug!("Frame writer stopped");
}
