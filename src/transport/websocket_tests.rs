use crate::client::ClientRole;
use crate::config::TrackerSettings;
use crate::notifier::{EventStatus, Fanout};
use crate::submission::Gateway;
use crate::tracker::{Milestone, Tracker};
use crate::transport::hub::{DeviceRelay, Hub};
use crate::transport::message::{ClientMessage, ServerMessage};
use crate::transport::websocket::{ServerState, start_websocket_server};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{WebSocketStream, client_async};

type Ws = WebSocketStream<TcpStream>;

fn fast_settings() -> TrackerSettings {
    TrackerSettings {
        aggressive_sent_timeout_ms: 100,
        sweep_forced_sent_threshold_ms: 200,
        delivery_timeout_ms: 400,
        sweep_period_ms: 100,
        stale_record_threshold_ms: 2_000,
    }
}

async fn setup_server(settings: TrackerSettings) -> (String, Arc<Tracker>) {
    let addr = format!(
        "127.0.0.1:{}",
        portpicker::pick_unused_port().expect("No free ports")
    );

    let hub = Arc::new(Hub::new());
    let tracker = Tracker::new(settings, Arc::new(Fanout::new().with(hub.clone())));
    tracker.spawn_sweep_loop();
    let gateway = Arc::new(Gateway::new(
        tracker.clone(),
        Arc::new(DeviceRelay::new(hub.clone())),
    ));
    let state = Arc::new(ServerState {
        hub,
        gateway,
        store: None,
    });

    tokio::spawn(start_websocket_server(addr.clone(), state));

    // Give the server a moment to start up
    tokio::time::sleep(Duration::from_millis(100)).await;
    (addr, tracker)
}

async fn connect(addr: &str) -> Ws {
    let stream = TcpStream::connect(addr).await.expect("Failed to connect");
    let (mut ws, _) = client_async("ws://localhost/", stream)
        .await
        .expect("WebSocket handshake failed");
    match recv(&mut ws).await {
        ServerMessage::Welcome { .. } => {}
        other => panic!("Expected Welcome, got {other:?}"),
    }
    ws
}

async fn send(ws: &mut Ws, msg: &ClientMessage) {
    ws.send(WsMessage::Text(serde_json::to_string(msg).unwrap().into()))
        .await
        .expect("Failed to send message");
}

async fn recv(ws: &mut Ws) -> ServerMessage {
    let response = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("Timed out waiting for server message")
        .expect("Did not receive response")
        .unwrap();
    let raw_data = response.into_data();
    serde_json::from_slice(&raw_data).unwrap_or_else(|e| {
        panic!("Failed to deserialize ServerMessage from '{raw_data:?}': {e}")
    })
}

async fn connect_device(addr: &str) -> Ws {
    let mut device = connect(addr).await;
    send(
        &mut device,
        &ClientMessage::Hello {
            role: ClientRole::Device,
        },
    )
    .await;
    match recv(&mut device).await {
        ServerMessage::Welcome { role, .. } => assert_eq!(role, ClientRole::Device),
        other => panic!("Expected Welcome, got {other:?}"),
    }
    device
}

fn submit(id: &str) -> ClientMessage {
    ClientMessage::Submit {
        message_id: Some(id.to_string()),
        phone_number: "+15550100".to_string(),
        body: "hello".to_string(),
        subscription_id: None,
    }
}

#[tokio::test]
async fn test_confirmed_round_trip_over_websocket() {
    let (addr, tracker) = setup_server(TrackerSettings::default()).await;
    let mut device = connect_device(&addr).await;
    let mut web = connect(&addr).await;

    send(&mut web, &submit("m1")).await;
    match recv(&mut device).await {
        ServerMessage::Transmit { message_id, .. } => assert_eq!(message_id, "m1"),
        other => panic!("Expected Transmit, got {other:?}"),
    }
    match recv(&mut web).await {
        ServerMessage::Ack { message_id, .. } => assert_eq!(message_id, "m1"),
        other => panic!("Expected Ack, got {other:?}"),
    }

    for _ in 0..2 {
        send(
            &mut device,
            &ClientMessage::SentResult {
                message_id: Some("m1".to_string()),
                result_code: -1,
            },
        )
        .await;
    }
    send(
        &mut device,
        &ClientMessage::DeliveredResult {
            message_id: Some("m1".to_string()),
            result_code: -1,
        },
    )
    .await;

    match recv(&mut web).await {
        ServerMessage::StatusEvent(event) => {
            assert_eq!(event.milestone, Milestone::Sent);
            assert!(!event.forced);
        }
        other => panic!("Expected sent StatusEvent, got {other:?}"),
    }
    match recv(&mut web).await {
        ServerMessage::StatusEvent(event) => {
            assert_eq!(event.milestone, Milestone::Delivered);
            assert_eq!(event.status, EventStatus::Succeeded);
        }
        other => panic!("Expected delivered StatusEvent, got {other:?}"),
    }
    assert!(!tracker.contains("m1"));
}

#[tokio::test]
async fn test_silent_device_gets_forced_statuses() {
    let (addr, tracker) = setup_server(fast_settings()).await;
    let mut device = connect_device(&addr).await;
    let mut web = connect(&addr).await;

    send(&mut web, &submit("m2")).await;
    recv(&mut device).await;
    recv(&mut web).await;

    let mut milestones = Vec::new();
    for _ in 0..2 {
        match recv(&mut web).await {
            ServerMessage::StatusEvent(event) => {
                assert!(event.forced);
                assert_eq!(event.status, EventStatus::Succeeded);
                milestones.push(event.milestone);
            }
            other => panic!("Expected StatusEvent, got {other:?}"),
        }
    }
    assert_eq!(milestones, vec![Milestone::Sent, Milestone::Delivered]);
    assert!(!tracker.contains("m2"));

    // nothing else arrives for this message
    assert!(
        tokio::time::timeout(Duration::from_millis(600), web.next())
            .await
            .is_err()
    );
}

#[tokio::test]
async fn test_submit_without_device_is_refused() {
    let (addr, tracker) = setup_server(TrackerSettings::default()).await;
    let mut web = connect(&addr).await;

    send(&mut web, &submit("m3")).await;
    match recv(&mut web).await {
        ServerMessage::Error { code, .. } => assert_eq!(code, "SEND_FAILED"),
        other => panic!("Expected Error, got {other:?}"),
    }
    assert!(tracker.is_empty());
}

#[tokio::test]
async fn test_blank_phone_number_is_refused() {
    let (addr, _tracker) = setup_server(TrackerSettings::default()).await;
    let _device = connect_device(&addr).await;
    let mut web = connect(&addr).await;

    send(
        &mut web,
        &ClientMessage::Submit {
            message_id: None,
            phone_number: " ".to_string(),
            body: "hello".to_string(),
            subscription_id: None,
        },
    )
    .await;
    match recv(&mut web).await {
        ServerMessage::Error { code, .. } => assert_eq!(code, "INVALID_NUMBER"),
        other => panic!("Expected Error, got {other:?}"),
    }
}
