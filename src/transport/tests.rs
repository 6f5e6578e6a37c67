use crate::client::{Client, ClientRole};
use crate::config::TrackerSettings;
use crate::notifier::{EventStatus, Fanout};
use crate::persistence::StatusStore;
use crate::submission::Gateway;
use crate::tracker::{Milestone, Outcome, Tracker};
use crate::transport::hub::{DeviceRelay, Hub};
use crate::transport::message::{ServerMessage, StatusSource};
use crate::transport::websocket::{ServerState, handle_text};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tungstenite::protocol::Message as WsMessage;

struct Harness {
    state: ServerState,
    _dir: TempDir,
}

fn harness() -> Harness {
    let dir = TempDir::new().unwrap();
    let store = StatusStore::open(dir.path().to_str().unwrap(), None).unwrap();
    let hub = Arc::new(Hub::new());
    let notifier = Fanout::new()
        .with(Arc::new(store.clone()))
        .with(hub.clone());
    let tracker = Tracker::new(TrackerSettings::default(), Arc::new(notifier));
    let gateway = Arc::new(Gateway::new(tracker, Arc::new(DeviceRelay::new(hub.clone()))));
    Harness {
        state: ServerState {
            hub,
            gateway,
            store: Some(store),
        },
        _dir: dir,
    }
}

fn connect(hub: &Hub, role: ClientRole) -> (String, UnboundedReceiver<WsMessage>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut client = Client::new(tx);
    client.role = role;
    let id = client.id.clone();
    hub.register_client(client);
    (id, rx)
}

fn next(rx: &mut UnboundedReceiver<WsMessage>) -> ServerMessage {
    let msg = rx.try_recv().expect("expected a server message");
    serde_json::from_str(msg.to_text().unwrap()).unwrap()
}

fn submit_frame(id: &str) -> String {
    json!({
        "type": "submit",
        "message_id": id,
        "phone_number": "+15550100",
        "body": "hello"
    })
    .to_string()
}

#[tokio::test(start_paused = true)]
async fn test_hello_sets_role() {
    let h = harness();
    let (id, mut rx) = connect(&h.state.hub, ClientRole::Consumer);

    handle_text(&h.state, &id, &json!({"type": "hello", "role": "device"}).to_string());
    assert_eq!(h.state.hub.role_of(&id), Some(ClientRole::Device));
    match next(&mut rx) {
        ServerMessage::Welcome { role, .. } => assert_eq!(role, ClientRole::Device),
        other => panic!("Expected Welcome, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_submit_relays_to_device_and_acks() {
    let h = harness();
    let (_device, mut device_rx) = connect(&h.state.hub, ClientRole::Device);
    let (web, mut web_rx) = connect(&h.state.hub, ClientRole::Consumer);

    handle_text(&h.state, &web, &submit_frame("m1"));

    match next(&mut device_rx) {
        ServerMessage::Transmit {
            message_id,
            phone_number,
            ..
        } => {
            assert_eq!(message_id, "m1");
            assert_eq!(phone_number, "+15550100");
        }
        other => panic!("Expected Transmit, got {other:?}"),
    }
    match next(&mut web_rx) {
        ServerMessage::Ack {
            message_id,
            segments,
        } => {
            assert_eq!(message_id, "m1");
            assert_eq!(segments, 1);
        }
        other => panic!("Expected Ack, got {other:?}"),
    }
    assert!(h.state.gateway.tracker().contains("m1"));
}

#[tokio::test(start_paused = true)]
async fn test_submit_without_device_fails_and_tracks_nothing() {
    let h = harness();
    let (web, mut web_rx) = connect(&h.state.hub, ClientRole::Consumer);

    handle_text(&h.state, &web, &submit_frame("m1"));
    match next(&mut web_rx) {
        ServerMessage::Error { code, .. } => assert_eq!(code, "SEND_FAILED"),
        other => panic!("Expected Error, got {other:?}"),
    }
    assert!(h.state.gateway.tracker().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_sent_result_is_broadcast_to_consumers() {
    let h = harness();
    let (device, mut device_rx) = connect(&h.state.hub, ClientRole::Device);
    let (web, mut web_rx) = connect(&h.state.hub, ClientRole::Consumer);
    handle_text(&h.state, &web, &submit_frame("m2"));
    next(&mut device_rx);
    next(&mut web_rx);

    let report = json!({"type": "sent_result", "message_id": "m2", "result_code": 4}).to_string();
    handle_text(&h.state, &device, &report);
    handle_text(&h.state, &device, &report);

    match next(&mut web_rx) {
        ServerMessage::StatusEvent(event) => {
            assert_eq!(event.milestone, Milestone::Sent);
            assert_eq!(event.status, EventStatus::Failed);
            assert_eq!(event.reason.as_deref(), Some("no service"));
        }
        other => panic!("Expected StatusEvent, got {other:?}"),
    }
    assert!(web_rx.try_recv().is_err());
    // devices do not receive status events
    assert!(device_rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_result_from_consumer_is_refused() {
    let h = harness();
    let (_device, _device_rx) = connect(&h.state.hub, ClientRole::Device);
    let (web, mut web_rx) = connect(&h.state.hub, ClientRole::Consumer);
    handle_text(&h.state, &web, &submit_frame("m3"));
    next(&mut web_rx);

    handle_text(
        &h.state,
        &web,
        &json!({"type": "sent_result", "message_id": "m3", "result_code": -1}).to_string(),
    );
    match next(&mut web_rx) {
        ServerMessage::Error { code, .. } => assert_eq!(code, "NOT_A_DEVICE"),
        other => panic!("Expected Error, got {other:?}"),
    }
    let snapshot = h.state.gateway.tracker().snapshot("m3").unwrap();
    assert_eq!(snapshot.sent, None);
}

#[tokio::test(start_paused = true)]
async fn test_result_without_message_id_is_dropped_silently() {
    let h = harness();
    let (device, mut device_rx) = connect(&h.state.hub, ClientRole::Device);
    handle_text(
        &h.state,
        &device,
        &json!({"type": "sent_result", "result_code": -1}).to_string(),
    );
    assert!(device_rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_status_lookup_live_then_history() {
    let h = harness();
    let (device, mut device_rx) = connect(&h.state.hub, ClientRole::Device);
    let (web, mut web_rx) = connect(&h.state.hub, ClientRole::Consumer);
    handle_text(&h.state, &web, &submit_frame("m4"));
    next(&mut device_rx);
    next(&mut web_rx);

    handle_text(
        &h.state,
        &device,
        &json!({"type": "sent_result", "message_id": "m4", "result_code": -1}).to_string(),
    );
    next(&mut web_rx);

    let status = json!({"type": "status", "message_id": "m4"}).to_string();
    handle_text(&h.state, &web, &status);
    match next(&mut web_rx) {
        ServerMessage::StatusReport { source, sent, .. } => {
            assert_eq!(source, StatusSource::Live);
            assert_eq!(sent, Some(Outcome::Confirmed));
        }
        other => panic!("Expected StatusReport, got {other:?}"),
    }

    handle_text(
        &h.state,
        &device,
        &json!({"type": "delivered_result", "message_id": "m4", "result_code": -1}).to_string(),
    );
    next(&mut web_rx);

    handle_text(&h.state, &web, &status);
    match next(&mut web_rx) {
        ServerMessage::StatusReport {
            source, history, ..
        } => {
            assert_eq!(source, StatusSource::History);
            let history = history.unwrap();
            assert!(history.sent.is_some());
            assert_eq!(history.delivered.unwrap().status, EventStatus::Succeeded);
        }
        other => panic!("Expected StatusReport, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_status_of_unknown_message() {
    let h = harness();
    let (web, mut web_rx) = connect(&h.state.hub, ClientRole::Consumer);
    handle_text(
        &h.state,
        &web,
        &json!({"type": "status", "message_id": "nope"}).to_string(),
    );
    match next(&mut web_rx) {
        ServerMessage::StatusReport {
            source, history, ..
        } => {
            assert_eq!(source, StatusSource::Unknown);
            assert!(history.is_none());
        }
        other => panic!("Expected StatusReport, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_malformed_frame_gets_bad_request() {
    let h = harness();
    let (web, mut web_rx) = connect(&h.state.hub, ClientRole::Consumer);
    handle_text(&h.state, &web, "{not json");
    match next(&mut web_rx) {
        ServerMessage::Error { code, .. } => assert_eq!(code, "BAD_REQUEST"),
        other => panic!("Expected Error, got {other:?}"),
    }
}

#[test]
fn test_hub_broadcast_skips_other_roles() {
    let hub = Hub::new();
    let (_a, mut consumer_rx) = connect(&hub, ClientRole::Consumer);
    let (_b, mut device_rx) = connect(&hub, ClientRole::Device);

    let sent = hub.broadcast(
        ClientRole::Consumer,
        &ServerMessage::Error {
            code: "X".to_string(),
            message: "y".to_string(),
        },
    );
    assert_eq!(sent, 1);
    assert!(consumer_rx.try_recv().is_ok());
    assert!(device_rx.try_recv().is_err());
}

#[test]
fn test_hub_remove_client() {
    let hub = Hub::new();
    let (id, _rx) = connect(&hub, ClientRole::Consumer);
    assert_eq!(hub.len(), 1);
    hub.remove_client(&id);
    assert!(hub.is_empty());
    assert!(!hub.set_role(&id, ClientRole::Device));
}

#[test]
fn test_hub_broadcast_counts_only_live_consumers() {
    let hub = Hub::new();
    let (_live, mut live_rx) = connect(&hub, ClientRole::Consumer);
    let (_gone, gone_rx) = connect(&hub, ClientRole::Consumer);
    drop(gone_rx);

    let sent = hub.broadcast(
        ClientRole::Consumer,
        &ServerMessage::Error {
            code: "X".to_string(),
            message: "y".to_string(),
        },
    );
    assert_eq!(sent, 1);
    assert!(live_rx.try_recv().is_ok());
}
