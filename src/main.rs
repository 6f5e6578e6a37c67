//! CLI for smstrack
//!
//! Subcommands:
//! - `server`: run the WebSocket status service
//! - `client`: submit one message and print its status events (smoke test)

use std::sync::Arc;

use clap::Parser;
use smstrack::config::load_config;
use smstrack::notifier::Fanout;
use smstrack::persistence::StatusStore;
use smstrack::submission::Gateway;
use smstrack::tracker::Tracker;
use smstrack::transport::websocket::{ServerState, start_websocket_server};
use smstrack::transport::{DeviceRelay, Hub};
use smstrack::utils::logging;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "smstrack")]
enum Command {
    /// Start the WebSocket server
    Server,
    /// Submit one message and print status events until it is delivered
    Client {
        /// WebSocket server URL to connect to
        #[arg(long, default_value = "ws://127.0.0.1:8080")]
        url: String,
        /// Recipient phone number
        #[arg(long)]
        to: String,
        /// Message body
        #[arg(long)]
        body: String,
    },
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cmd = Command::parse();

    match cmd {
        Command::Server => {
            if let Err(e) = run_server().await {
                error!("Server failed: {e}");
            }
        }
        Command::Client { url, to, body } => {
            logging::init("info");
            if let Err(e) = run_client(&url, &to, &body).await {
                error!("Client failed: {e}");
            }
        }
    }
}

async fn run_server() -> Result<(), Box<dyn std::error::Error>> {
    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            logging::init("info");
            return Err(e.into());
        }
    };
    logging::init(&config.logging.level);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let ttl = i64::try_from(config.store.ttl_secs).ok();
    let store = StatusStore::open(&config.store.path, ttl)?;
    if let Err(e) = store.purge_expired() {
        warn!("Could not purge expired statuses: {e}");
    }

    let hub = Arc::new(Hub::new());
    let notifier = Fanout::new()
        .with(Arc::new(store.clone()))
        .with(hub.clone());
    let tracker = Tracker::new(config.tracker, Arc::new(notifier));
    tracker.spawn_sweep_loop();

    let gateway = Arc::new(Gateway::new(
        tracker.clone(),
        Arc::new(DeviceRelay::new(hub.clone())),
    ));
    let state = Arc::new(ServerState {
        hub,
        gateway,
        store: Some(store.clone()),
    });

    tokio::select! {
        result = start_websocket_server(addr, state) => {
            if let Err(e) = result {
                error!("WebSocket server exited: {e}");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
    }

    tracker.shutdown();
    store.flush()?;
    Ok(())
}

async fn run_client(url: &str, to: &str, body: &str) -> Result<(), Box<dyn std::error::Error>> {
    use futures_util::{SinkExt, StreamExt};
    use serde_json::json;
    use tokio_tungstenite::connect_async;
    use tokio_tungstenite::tungstenite::Message as WsMessage;

    let (mut ws_stream, _response) = connect_async(url).await?;

    let message_id = uuid::Uuid::new_v4().to_string();
    let submit = json!({
        "type": "submit",
        "message_id": message_id,
        "phone_number": to,
        "body": body,
    });
    ws_stream
        .send(WsMessage::Text(submit.to_string().into()))
        .await?;

    while let Some(msg) = ws_stream.next().await {
        let WsMessage::Text(text) = msg? else {
            continue;
        };
        println!("{text}");

        let v: serde_json::Value = serde_json::from_str(&text)?;
        let finished = match v.get("type").and_then(|t| t.as_str()) {
            Some("error") => true,
            Some("status_event") => {
                v["message_id"] == message_id.as_str()
                    && (v["milestone"] == "delivered" || v["status"] == "failed")
            }
            _ => false,
        };
        if finished {
            break;
        }
    }

    Ok(())
}
