use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::io::DuplexStream;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{Instant, timeout};
use tokio_util::sync::CancellationToken;

use super::context::GatewayContext;
use super::{ACK_RETRY_DELAYS_MS, ConnectionState, Gateway, MAX_RETRIES, NetworkSanityChecker, ProbeOutcome};
use crate::client::Subscriber;
use crate::config::{GatewayKind, GatewaySettings};
use crate::event::GatewayEvent;
use crate::protocol::{Message, MessageType};
use crate::transport::testing::{DuplexTransport, FakeGateway};
use crate::utils::GatewayError;

const WAIT: Duration = Duration::from_secs(3);

fn test_settings(dir: &TempDir) -> GatewaySettings {
    GatewaySettings {
        kind: GatewayKind::Ip,
        send_delay_ms: 0,
        reconnect_interval_ms: 100,
        startup_check_attempts: 3,
        startup_check_timeout_ms: 300,
        enable_network_sanity_check: false,
        id_cache_path: dir.path().join("given_ids.json"),
        ..GatewaySettings::default()
    }
}

struct Harness {
    gateway: Gateway,
    transport: Arc<DuplexTransport>,
    peers: UnboundedReceiver<DuplexStream>,
    events: UnboundedReceiver<GatewayEvent>,
    _dir: TempDir,
}

impl Harness {
    fn start(configure: impl FnOnce(&mut GatewaySettings)) -> Self {
        let dir = TempDir::new().expect("create tempdir");
        let mut settings = test_settings(&dir);
        configure(&mut settings);

        let (transport, peers) = DuplexTransport::new();
        let gateway = Gateway::new(settings, transport.clone());
        let (subscriber, events) = Subscriber::channel("test");
        gateway.add_listener(subscriber);
        gateway.start();

        Self {
            gateway,
            transport,
            peers,
            events,
            _dir: dir,
        }
    }

    async fn next_peer(&mut self) -> FakeGateway {
        let stream = timeout(WAIT, self.peers.recv())
            .await
            .expect("transport was not opened")
            .expect("transport dropped");
        FakeGateway::new(stream)
    }

    /// Accept the next connection and complete the handshake.
    async fn connect(&mut self) -> FakeGateway {
        let mut fake = self.next_peer().await;
        fake.answer_handshake().await;
        self.wait_for(|e| matches!(e, GatewayEvent::BridgeStatusChanged { online: true }))
            .await;
        fake
    }

    async fn wait_for(&mut self, pred: impl Fn(&GatewayEvent) -> bool) -> GatewayEvent {
        let deadline = Instant::now() + WAIT;
        loop {
            let event = tokio::time::timeout_at(deadline, self.events.recv())
                .await
                .expect("timed out waiting for event")
                .expect("event channel closed");
            if pred(&event) {
                return event;
            }
        }
    }

    /// Collect every event published within `window`.
    async fn drain(&mut self, window: Duration) -> Vec<GatewayEvent> {
        let deadline = Instant::now() + window;
        let mut seen = Vec::new();
        while let Ok(Some(event)) = tokio::time::timeout_at(deadline, self.events.recv()).await {
            seen.push(event);
        }
        seen
    }
}

/// The id cache is written off-task; poll until it holds `expected`.
async fn read_cache_when(path: &std::path::Path, expected: &str) -> String {
    let deadline = Instant::now() + WAIT;
    loop {
        let contents = std::fs::read_to_string(path).unwrap_or_default();
        if contents == expected || Instant::now() >= deadline {
            return contents;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn test_handshake_brings_bridge_online() {
    let mut h = Harness::start(|_| {});
    let _fake = h.connect().await;

    assert!(h.gateway.is_connected());
    assert_eq!(h.gateway.state(), ConnectionState::Connected);
    assert_eq!(h.transport.opens(), 1);

    h.gateway.stop().await;
    assert_eq!(h.gateway.state(), ConnectionState::Disconnected);
    h.wait_for(|e| matches!(e, GatewayEvent::BridgeStatusChanged { online: false }))
        .await;
}

#[tokio::test]
async fn test_skip_startup_check_connects_without_probe() {
    let mut h = Harness::start(|s| s.skip_startup_check = true);
    let mut fake = h.next_peer().await;
    h.wait_for(|e| matches!(e, GatewayEvent::BridgeStatusChanged { online: true }))
        .await;
    assert!(fake.next_line(Duration::from_millis(200)).await.is_none());
    h.gateway.stop().await;
}

#[tokio::test]
async fn test_send_message_requires_open_session() {
    let h = Harness::start(|_| {});
    h.gateway.stop().await;
    let result = h
        .gateway
        .send_message(Message::new(1, 1, MessageType::Set, false, 2, "1"));
    assert!(matches!(result, Err(GatewayError::NotConnected)));
}

#[tokio::test]
async fn test_inbound_frames_are_published_in_wire_order() {
    let mut h = Harness::start(|_| {});
    let mut fake = h.connect().await;

    fake.send("5;1;1;0;0;23.5").await;
    fake.send("not a frame").await;
    fake.send("5;2;1;0;1;40").await;
    fake.send("6;1;1;0;0;19.0").await;

    let mut payloads = Vec::new();
    while payloads.len() < 3 {
        if let GatewayEvent::MessageReceived(msg) = h
            .wait_for(|e| matches!(e, GatewayEvent::MessageReceived(m) if m.node_id != 0))
            .await
        {
            payloads.push(msg.payload);
        }
    }
    assert_eq!(payloads, vec!["23.5", "40", "19.0"]);

    let node = h.gateway.node(5).expect("node 5 discovered");
    assert!(node.reachable);
    assert_eq!(node.child(1).unwrap().value(MessageType::Set, 0), Some("23.5"));
    h.gateway.stop().await;
}

#[tokio::test]
async fn test_id_request_assigns_lowest_free_id() {
    let mut h = Harness::start(|_| {});
    let mut fake = h.connect().await;
    let cache_path = h.gateway.settings().id_cache_path.clone();

    fake.send("2;255;3;0;11;Temp").await;
    h.wait_for(|e| matches!(e, GatewayEvent::NodeDiscovered { node_id: 2 }))
        .await;
    fake.send("3;255;3;0;11;Relay").await;
    h.wait_for(|e| matches!(e, GatewayEvent::NodeDiscovered { node_id: 3 }))
        .await;

    fake.send("255;255;3;0;3;").await;
    assert_eq!(
        fake.next_line(WAIT).await.as_deref(),
        Some("255;255;3;0;4;1")
    );
    h.wait_for(|e| matches!(e, GatewayEvent::IdReserved { node_id: 1 }))
        .await;
    assert_eq!(read_cache_when(&cache_path, "[1,2,3]").await, "[1,2,3]");

    assert_eq!(h.gateway.reserve_id().unwrap(), 4);
    h.gateway.stop().await;
}

#[tokio::test]
async fn test_config_and_time_requests_are_answered() {
    let mut h = Harness::start(|s| s.imperial_units = true);
    let mut fake = h.connect().await;

    fake.send("4;255;3;0;6;0").await;
    assert_eq!(fake.next_line(WAIT).await.as_deref(), Some("4;255;3;0;6;I"));

    fake.send("4;255;3;0;1;").await;
    let line = fake.next_line(WAIT).await.expect("time reply");
    let seconds: i64 = line
        .strip_prefix("4;255;3;0;1;")
        .expect("time reply prefix")
        .parse()
        .expect("numeric time");
    assert!(seconds > 1_600_000_000);
    h.gateway.stop().await;
}

#[tokio::test]
async fn test_unacknowledged_message_is_retried_then_dropped() {
    let mut h = Harness::start(|_| {});
    let mut fake = h.connect().await;

    let command = Message::new(7, 1, MessageType::Set, true, 2, "1").with_revert("0");
    h.gateway.send_message(command).unwrap();

    let start = Instant::now();
    let mut sent_at = Vec::new();
    for _ in 0..=MAX_RETRIES {
        let line = fake.next_line(WAIT).await.expect("retransmission");
        assert_eq!(line, "7;1;1;1;2;1");
        sent_at.push(start.elapsed());
    }

    let tolerance = Duration::from_millis(20);
    for (i, pair) in sent_at.windows(2).enumerate() {
        let gap = pair[1] - pair[0];
        let expected = Duration::from_millis(ACK_RETRY_DELAYS_MS[i]);
        assert!(
            gap + tolerance >= expected,
            "gap {i} was {gap:?}, expected at least {expected:?}"
        );
    }

    let failed = h
        .wait_for(|e| matches!(e, GatewayEvent::AckNotReceived(_)))
        .await;
    let GatewayEvent::AckNotReceived(msg) = failed else {
        unreachable!()
    };
    assert!(msg.revert_on_failure);
    assert_eq!(msg.previous_payload.as_deref(), Some("0"));
    assert_eq!(msg.retries(), MAX_RETRIES + 1);
    assert!(start.elapsed() < Duration::from_millis(3600 + 1000));

    assert!(fake.next_line(Duration::from_millis(300)).await.is_none());
    let again = h.drain(Duration::from_millis(200)).await;
    assert!(
        !again
            .iter()
            .any(|e| matches!(e, GatewayEvent::AckNotReceived(_)))
    );
    assert_eq!(h.gateway.pending_messages(), 0);
    h.gateway.stop().await;
}

#[tokio::test]
async fn test_ack_echo_stops_retransmission() {
    let mut h = Harness::start(|s| s.send_delay_ms = 50);
    let mut fake = h.connect().await;

    h.gateway
        .send_message(Message::new(7, 1, MessageType::Set, true, 2, "1"))
        .unwrap();
    assert_eq!(fake.next_line(WAIT).await.as_deref(), Some("7;1;1;1;2;1"));
    fake.send("7;1;1;1;2;1").await;

    assert!(fake.next_line(Duration::from_millis(400)).await.is_none());
    let events = h.drain(Duration::from_millis(100)).await;
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, GatewayEvent::AckNotReceived(_)))
    );
    assert_eq!(h.gateway.pending_messages(), 0);
    h.gateway.stop().await;
}

#[tokio::test]
async fn test_send_delay_spaces_transmissions() {
    let mut h = Harness::start(|s| s.send_delay_ms = 100);
    let mut fake = h.connect().await;

    for payload in ["a", "b", "c"] {
        h.gateway
            .send_message(Message::new(3, 1, MessageType::Set, false, 2, payload))
            .unwrap();
    }

    let mut stamps = Vec::new();
    for expected in ["3;1;1;0;2;a", "3;1;1;0;2;b", "3;1;1;0;2;c"] {
        assert_eq!(fake.next_line(WAIT).await.as_deref(), Some(expected));
        stamps.push(Instant::now());
    }
    for pair in stamps.windows(2) {
        assert!(pair[1] - pair[0] >= Duration::from_millis(80));
    }
    h.gateway.stop().await;
}

#[tokio::test]
async fn test_smart_sleep_delivers_latest_message_on_heartbeat() {
    let mut h = Harness::start(|_| {});
    let mut fake = h.connect().await;

    for payload in ["first", "second"] {
        h.gateway
            .send_message(
                Message::new(9, 1, MessageType::Set, false, 2, payload).with_smart_sleep(true),
            )
            .unwrap();
    }
    assert_eq!(h.gateway.pending_smart_sleep_messages(), 1);
    assert!(fake.next_line(Duration::from_millis(200)).await.is_none());

    fake.send("9;255;3;0;22;1200").await;
    assert_eq!(
        fake.next_line(WAIT).await.as_deref(),
        Some("9;1;1;0;2;second")
    );
    assert!(fake.next_line(Duration::from_millis(200)).await.is_none());
    assert_eq!(h.gateway.pending_smart_sleep_messages(), 0);
    h.gateway.stop().await;
}

#[tokio::test]
async fn test_end_of_stream_goes_offline_and_reconnects() {
    let mut h = Harness::start(|_| {});
    let mut fake = h.connect().await;

    fake.send("12;1;1;0;0;1").await;
    h.wait_for(|e| matches!(e, GatewayEvent::NodeDiscovered { node_id: 12 }))
        .await;
    h.gateway
        .send_message(Message::new(12, 1, MessageType::Set, false, 2, "1").with_smart_sleep(true))
        .unwrap();

    drop(fake);

    h.wait_for(|e| matches!(e, GatewayEvent::BridgeStatusChanged { online: false }))
        .await;
    assert_eq!(h.gateway.pending_messages(), 0);
    assert_eq!(h.gateway.pending_smart_sleep_messages(), 0);
    assert!(!h.gateway.node(12).unwrap().reachable);

    let _fake = h.connect().await;
    assert!(h.transport.opens() >= 2);
    h.wait_for(|e| {
        matches!(
            e,
            GatewayEvent::NodeReachabilityChanged {
                node_id: 12,
                reachable: true
            }
        )
    })
    .await;
    h.gateway.stop().await;
}

#[tokio::test]
async fn test_zero_reconnect_interval_still_connects() {
    let mut h = Harness::start(|s| s.reconnect_interval_ms = 0);
    let _fake = h.connect().await;
    assert!(h.gateway.is_connected());
    h.gateway.stop().await;
}

#[tokio::test]
async fn test_from_settings_rejects_zero_startup_attempts() {
    let dir = TempDir::new().unwrap();
    let settings = GatewaySettings {
        startup_check_attempts: 0,
        ..test_settings(&dir)
    };
    assert!(matches!(
        Gateway::from_settings(settings),
        Err(GatewayError::Config(_))
    ));
}

#[tokio::test]
async fn test_failed_opens_are_retried() {
    let dir = TempDir::new().unwrap();
    let (transport, mut peers) = DuplexTransport::new();
    transport.fail_next(2);
    let gateway = Gateway::new(test_settings(&dir), transport.clone());
    gateway.start();

    let stream = timeout(WAIT, peers.recv()).await.unwrap().unwrap();
    let mut fake = FakeGateway::new(stream);
    fake.answer_handshake().await;

    let mut state = gateway.watch_state();
    timeout(WAIT, state.wait_for(|s| *s == ConnectionState::Connected))
        .await
        .expect("connected")
        .unwrap();
    assert_eq!(transport.opens(), 3);
    gateway.stop().await;
}

#[tokio::test]
async fn test_unanswered_handshake_closes_and_retries() {
    let mut h = Harness::start(|_| {});

    let mut silent = h.next_peer().await;
    let mut probes = 0;
    while let Some(line) = silent.next_line(Duration::from_secs(2)).await {
        assert_eq!(line, "0;255;3;0;2;");
        probes += 1;
    }
    assert_eq!(probes, 3);

    // the failed session was closed and a new one opened
    let _fake = h.connect().await;
    assert_eq!(h.transport.opens(), 2);
    h.gateway.stop().await;
}

#[tokio::test]
async fn test_hangup_during_handshake_waits_for_next_tick() {
    let mut h = Harness::start(|s| {
        s.reconnect_interval_ms = 10_000;
        s.startup_check_timeout_ms = 300;
    });

    let peer = h.next_peer().await;
    drop(peer);

    // the next attempt belongs to the next tick, 10s away
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(h.transport.opens(), 1);
    assert_eq!(h.gateway.state(), ConnectionState::Disconnected);
    assert!(h.peers.try_recv().is_err());
    h.gateway.stop().await;
}

#[tokio::test]
async fn test_sanity_checker_disconnects_silent_gateway() {
    let mut h = Harness::start(|s| {
        s.enable_network_sanity_check = true;
        s.sanity_check_interval_ms = 100;
        s.sanity_check_reply_timeout_ms = 100;
        s.sanity_check_max_missed = 3;
    });
    let mut fake = h.connect().await;

    let mut probes = 0;
    while let Some(line) = fake.next_line(Duration::from_secs(2)).await {
        assert_eq!(line, "0;255;3;0;2;");
        probes += 1;
    }
    assert_eq!(probes, 3);
    h.wait_for(|e| matches!(e, GatewayEvent::BridgeStatusChanged { online: false }))
        .await;
    h.gateway.stop().await;
}

#[tokio::test]
async fn test_sanity_checker_resets_miss_counter_on_reply() {
    let dir = TempDir::new().unwrap();
    let mut settings = test_settings(&dir);
    settings.sanity_check_reply_timeout_ms = 50;
    settings.sanity_check_max_missed = 3;
    let ctx = Arc::new(GatewayContext::new(settings));
    let cancel = CancellationToken::new();
    let mut checker = NetworkSanityChecker::new(ctx.clone());

    assert_eq!(checker.probe(&cancel).await, ProbeOutcome::Missed(1));
    assert_eq!(checker.probe(&cancel).await, ProbeOutcome::Missed(2));

    let replier = {
        let ctx = ctx.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            ctx.note_version_reply("2.3.2");
        }
    };
    let (outcome, _) = tokio::join!(checker.probe(&cancel), replier);
    assert_eq!(outcome, ProbeOutcome::Answered);
    assert_eq!(checker.missed(), 0);

    assert_eq!(checker.probe(&cancel).await, ProbeOutcome::Missed(1));
    assert_eq!(checker.probe(&cancel).await, ProbeOutcome::Missed(2));
    assert!(!ctx.disconnect_pending());
    assert_eq!(checker.probe(&cancel).await, ProbeOutcome::Disconnect);
    assert!(ctx.disconnect_pending());

    // every probe went through the outbound queue
    assert_eq!(ctx.outbound.len(), 6);
}

#[tokio::test]
async fn test_request_disconnect_tears_down_session() {
    let mut h = Harness::start(|_| {});
    let mut fake = h.connect().await;

    h.gateway.request_disconnect();
    h.wait_for(|e| matches!(e, GatewayEvent::BridgeStatusChanged { online: false }))
        .await;
    assert!(fake.next_line(Duration::from_millis(500)).await.is_none());
    assert!(!h.gateway.is_connected());
    h.gateway.stop().await;
}

#[tokio::test]
async fn test_clear_listeners_keeps_engine_handler() {
    let mut h = Harness::start(|_| {});
    let mut fake = h.connect().await;

    h.gateway.clear_listeners();
    fake.send("255;255;3;0;3;").await;
    assert_eq!(
        fake.next_line(WAIT).await.as_deref(),
        Some("255;255;3;0;4;1")
    );
    h.gateway.stop().await;
}
