use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::client::{Client, ClientRole};
use crate::notifier::{Notifier, StatusEvent};
use crate::submission::{OutboundMessage, Transmitter};
use crate::transport::message::ServerMessage;
use crate::utils::error::TransmitError;

/// Registry of live connections.
///
/// The hub is the consumer-facing notifier (status events fan out to every
/// consumer) and, through [`DeviceRelay`], the radio-facing transmitter.
/// Its lock only guards the client map and is never held while calling
/// into the tracker.
#[derive(Debug, Default)]
pub struct Hub {
    clients: Mutex<HashMap<String, Client>>,
}

impl Hub {
    pub fn new() -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
        }
    }

    fn clients(&self) -> MutexGuard<'_, HashMap<String, Client>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register_client(&self, client: Client) {
        self.clients().insert(client.id.clone(), client);
    }

    pub fn remove_client(&self, client_id: &str) {
        if self.clients().remove(client_id).is_some() {
            debug!("Removed client {client_id}");
        }
    }

    pub fn set_role(&self, client_id: &str, role: ClientRole) -> bool {
        match self.clients().get_mut(client_id) {
            Some(client) => {
                client.role = role;
                true
            }
            None => false,
        }
    }

    pub fn role_of(&self, client_id: &str) -> Option<ClientRole> {
        self.clients().get(client_id).map(|c| c.role)
    }

    pub fn send_to(&self, client_id: &str, msg: &ServerMessage) -> bool {
        match self.clients().get(client_id) {
            Some(client) => client.send(msg),
            None => {
                warn!("No client registered with id: {client_id}");
                false
            }
        }
    }

    /// Sends `msg` to every client with `role`; returns how many accepted it.
    pub fn broadcast(&self, role: ClientRole, msg: &ServerMessage) -> usize {
        let mut delivered = 0;
        for client in self.clients().values().filter(|c| c.role == role) {
            if client.send(msg) {
                delivered += 1;
            } else {
                warn!("Failed to send to {}", client.id);
            }
        }
        delivered
    }

    pub fn len(&self) -> usize {
        self.clients().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients().is_empty()
    }
}

impl Notifier for Hub {
    fn notify(&self, event: &StatusEvent) {
        let delivered = self.broadcast(
            ClientRole::Consumer,
            &ServerMessage::StatusEvent(event.clone()),
        );
        debug!(
            "{} event for {} sent to {delivered} consumer(s)",
            event.milestone, event.message_id
        );
    }
}

/// Transmits by handing the message to a connected device.
#[derive(Debug, Clone)]
pub struct DeviceRelay {
    hub: Arc<Hub>,
}

impl DeviceRelay {
    pub fn new(hub: Arc<Hub>) -> Self {
        Self { hub }
    }
}

impl Transmitter for DeviceRelay {
    fn transmit(&self, message: &OutboundMessage) -> Result<(), TransmitError> {
        let clients = self.hub.clients();
        let device = clients
            .values()
            .find(|c| c.role == ClientRole::Device)
            .ok_or(TransmitError::NoDevice)?;

        let request = ServerMessage::Transmit {
            message_id: message.message_id.clone(),
            phone_number: message.phone_number.clone(),
            body: message.body.clone(),
            subscription_id: message.subscription_id,
        };
        if device.send(&request) {
            debug!("Relayed {} to device {}", message.message_id, device.id);
            Ok(())
        } else {
            Err(TransmitError::ChannelClosed)
        }
    }
}
