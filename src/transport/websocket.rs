//! WebSocket transport
//!
//! This file implements the WebSocket server in front of the tracker.
//! Responsibilities:
//! - Accept TCP/WebSocket connections and register a `Client` for each with
//!   the `Hub`
//! - Let a connection declare itself a device (owns the radio) or a consumer
//!   (receives status events)
//! - Translate protocol JSON into gateway calls: submissions, send and
//!   delivery results, status lookups
//!
//! Malformed frames are answered with an error and logged; they never reach
//! the tracker.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::spawn;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tracing::{debug, error, info, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::client::{Client, ClientRole};
use crate::persistence::StatusStore;
use crate::submission::{Gateway, OutboundMessage};
use crate::transport::hub::Hub;
use crate::transport::message::{ClientMessage, ServerMessage, StatusSource};

/// Everything a connection handler needs.
#[derive(Debug)]
pub struct ServerState {
    pub hub: Arc<Hub>,
    pub gateway: Arc<Gateway>,
    pub store: Option<StatusStore>,
}

pub async fn start_websocket_server(addr: String, state: Arc<ServerState>) -> std::io::Result<()> {
    let listener = TcpListener::bind(&addr).await?;

    info!("WebSocket server listening on ws://{addr}");

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("Failed to accept connection: {e}");
                continue;
            }
        };
        let state = state.clone();

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    warn!("WebSocket handshake error from {peer}: {e}");
                    return;
                }
            };
            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();
            let client = Client::new(tx);
            let client_id = client.id.clone();
            let welcome = ServerMessage::Welcome {
                client_id: client_id.clone(),
                role: client.role,
            };
            client.send(&welcome);
            state.hub.register_client(client);
            debug!("{client_id} connected from {peer}");

            let cleanup_called = Arc::new(AtomicBool::new(false));

            let do_cleanup = {
                let hub = state.hub.clone();
                let client_id = client_id.clone();
                let cleanup_called = cleanup_called.clone();

                move || {
                    if !cleanup_called.swap(true, Ordering::SeqCst) {
                        hub.remove_client(&client_id);
                    }
                }
            };

            {
                let client_id = client_id.clone();
                let do_cleanup = do_cleanup.clone();

                spawn(async move {
                    while let Some(msg) = rx.recv().await {
                        if let Err(e) = ws_sender.send(msg).await {
                            warn!("Failed to send message to {client_id}: {e}");
                            break;
                        }
                    }

                    do_cleanup();
                    debug!("Send loop closed for {client_id}");
                });
            }

            while let Some(Ok(msg)) = ws_receiver.next().await {
                if msg.is_close() {
                    break;
                }
                if !msg.is_text() {
                    continue;
                }
                match msg.to_text() {
                    Ok(text) => handle_text(&state, &client_id, text),
                    Err(e) => warn!("Unreadable frame from {client_id}: {e}"),
                }
            }

            info!("{client_id} disconnected");
            do_cleanup();
        });
    }
}

/// Handles one text frame from `client_id`. Replies go through the hub.
pub fn handle_text(state: &ServerState, client_id: &str, text: &str) {
    let msg = match serde_json::from_str::<ClientMessage>(text) {
        Ok(msg) => msg,
        Err(err) => {
            warn!(
                "Invalid client message from {client_id}: {err} | {}",
                text.chars().take(100).collect::<String>()
            );
            reply_error(state, client_id, "BAD_REQUEST", &err.to_string());
            return;
        }
    };

    match msg {
        ClientMessage::Hello { role } => {
            state.hub.set_role(client_id, role);
            info!("{client_id} joined as {role:?}");
            state.hub.send_to(
                client_id,
                &ServerMessage::Welcome {
                    client_id: client_id.to_string(),
                    role,
                },
            );
        }
        ClientMessage::Submit {
            message_id,
            phone_number,
            body,
            subscription_id,
        } => {
            let message = OutboundMessage {
                message_id: message_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
                phone_number,
                body,
                subscription_id,
            };
            match state.gateway.submit(&message) {
                Ok(ack) => {
                    state.hub.send_to(
                        client_id,
                        &ServerMessage::Ack {
                            message_id: ack.message_id,
                            segments: ack.segments,
                        },
                    );
                }
                Err(err) => {
                    warn!("Submission {} refused: {err}", message.message_id);
                    reply_error(state, client_id, err.code(), &err.to_string());
                }
            }
        }
        ClientMessage::SentResult {
            message_id,
            result_code,
        } => {
            if require_device(state, client_id) {
                state.gateway.report_sent(message_id.as_deref(), result_code);
            }
        }
        ClientMessage::DeliveredResult {
            message_id,
            result_code,
        } => {
            if require_device(state, client_id) {
                state
                    .gateway
                    .report_delivered(message_id.as_deref(), result_code);
            }
        }
        ClientMessage::Status { message_id } => {
            let report = status_report(state, message_id);
            state.hub.send_to(client_id, &report);
        }
    }
}

fn status_report(state: &ServerState, message_id: String) -> ServerMessage {
    if let Some(snapshot) = state.gateway.tracker().snapshot(&message_id) {
        return ServerMessage::StatusReport {
            message_id,
            source: StatusSource::Live,
            sent: snapshot.sent,
            delivered: snapshot.delivered,
            history: None,
        };
    }

    let history = match &state.store {
        Some(store) => store.load(&message_id).unwrap_or_else(|e| {
            error!("Status lookup for {message_id} failed: {e}");
            None
        }),
        None => None,
    };
    let source = if history.is_some() {
        StatusSource::History
    } else {
        StatusSource::Unknown
    };
    ServerMessage::StatusReport {
        message_id,
        source,
        sent: None,
        delivered: None,
        history,
    }
}

fn require_device(state: &ServerState, client_id: &str) -> bool {
    if state.hub.role_of(client_id) == Some(ClientRole::Device) {
        return true;
    }
    warn!("Client {client_id} sent a result report without being a device");
    reply_error(
        state,
        client_id,
        "NOT_A_DEVICE",
        "only device connections may report results",
    );
    false
}

fn reply_error(state: &ServerState, client_id: &str, code: &str, message: &str) {
    state.hub.send_to(
        client_id,
        &ServerMessage::Error {
            code: code.to_string(),
            message: message.to_string(),
        },
    );
}
