use std::sync::Arc;

use futures::StreamExt;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::event::GatewayEvent;
use crate::gateway::context::GatewayContext;
use crate::protocol::GatewayCodec;
use crate::transport::BoxedReader;

/// Read frames until the stream ends, fails, or the session is cancelled.
///
/// Frames are published in wire order. An echoed ack removes the matching
/// outbound entry before listeners see it, so no retransmission is issued
/// for an already acknowledged message.
pub(crate) async fn run_reader(
    reader: BoxedReader,
    ctx: Arc<GatewayContext>,
    cancel: CancellationToken,
) {
    let mut frames = FramedRead::new(reader, GatewayCodec::new());

    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break,
            next = frames.next() => next,
        };

        match next {
            Some(Ok(message)) => {
                debug!(frame = %message, "Received");
                if message.ack && ctx.outbound.remove_matching(&message).is_some() {
                    debug!(frame = %message, "Ack received");
                }
                ctx.bus.publish(&GatewayEvent::MessageReceived(message));
            }
            Some(Err(e)) => {
                warn!("Reading from gateway failed: {e}");
                ctx.request_disconnect("read error");
                break;
            }
            None => {
                warn!("Gateway closed the connection");
                ctx.request_disconnect("end of stream");
                break;
            }
        }
    }

    debug!("Frame reader stopped");
}
