//! In-memory transport for tests: every `open` creates a `tokio::io::duplex`
//! pair and hands the far end to the test, which plays the gateway.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::{SinkExt, StreamExt};
use tokio::io::{DuplexStream, ReadHalf, WriteHalf};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};

use super::{Link, Transport};
use crate::utils::{GatewayError, Result};

pub(crate) struct DuplexTransport {
    peers: mpsc::UnboundedSender<DuplexStream>,
    failures_left: AtomicUsize,
    opens: Arc<AtomicUsize>,
}

impl DuplexTransport {
    pub(crate) fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<DuplexStream>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            peers: tx,
            failures_left: AtomicUsize::new(0),
            opens: Arc::new(AtomicUsize::new(0)),
        });
        (transport, rx)
    }

    /// Make the next `n` opens fail.
    pub(crate) fn fail_next(&self, n: usize) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    pub(crate) fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl Transport for DuplexTransport {
    fn open(&self) -> BoxFuture<'_, Result<Link>> {
        Box::pin(async move {
            self.opens.fetch_add(1, Ordering::SeqCst);
            let failing = self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(GatewayError::Transport("port busy".to_string()));
            }

            let (local, remote) = tokio::io::duplex(4096);
            self.peers
                .send(remote)
                .map_err(|_| GatewayError::Transport("test peer gone".to_string()))?;
            let (reader, writer) = tokio::io::split(local);
            Ok(Link::new(reader, writer))
        })
    }

    fn describe(&self) -> String {
        "duplex".to_string()
    }
}

/// The gateway side of a duplex link.
pub(crate) struct FakeGateway {
    lines: FramedRead<ReadHalf<DuplexStream>, LinesCodec>,
    sink: FramedWrite<WriteHalf<DuplexStream>, LinesCodec>,
}

impl FakeGateway {
    pub(crate) fn new(stream: DuplexStream) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self {
            lines: FramedRead::new(reader, LinesCodec::new()),
            sink: FramedWrite::new(writer, LinesCodec::new()),
        }
    }

    /// Next line written by the engine, or `None` on timeout / close.
    pub(crate) async fn next_line(&mut self, wait: Duration) -> Option<String> {
        match tokio::time::timeout(wait, self.lines.next()).await {
            Ok(Some(Ok(line))) => Some(line),
            _ => None,
        }
    }

    pub(crate) async fn send(&mut self, line: &str) {
        self.sink.send(line).await.expect("write to engine");
    }

    /// Wait for the I_VERSION probe and answer it.
    pub(crate) async fn answer_handshake(&mut self) {
        let probe = self
            .next_line(Duration::from_secs(3))
            .await
            .expect("version probe");
        assert_eq!(probe, "0;255;3;0;2;");
        self.send("0;255;3;0;2;2.3.2").await;
    }
}
