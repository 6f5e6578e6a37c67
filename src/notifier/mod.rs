//! The `notifier` module carries accepted resolutions to whoever consumes
//! them.
//!
//! The engine calls [`Notifier::notify`] exactly once per accepted
//! `(message, milestone)` pair and never looks at a result, so sinks must
//! contain their own failures.

pub mod event;

use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

pub use event::{EventStatus, StatusEvent};

pub trait Notifier: Send + Sync {
    fn notify(&self, event: &StatusEvent);
}

/// Forwards events into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: UnboundedSender<StatusEvent>,
}

impl ChannelNotifier {
    pub fn new(sender: UnboundedSender<StatusEvent>) -> Self {
        Self { sender }
    }

    /// Convenience constructor returning the receiving half as well.
    pub fn channel() -> (Self, UnboundedReceiver<StatusEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, event: &StatusEvent) {
        if self.sender.send(event.clone()).is_err() {
            debug!(
                "Status consumer gone, dropping {} event for {}",
                event.milestone, event.message_id
            );
        }
    }
}

/// Hands every event to each sink in order.
#[derive(Default, Clone)]
pub struct Fanout {
    sinks: Vec<Arc<dyn Notifier>>,
}

impl Fanout {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn with(mut self, sink: Arc<dyn Notifier>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl Notifier for Fanout {
    fn notify(&self, event: &StatusEvent) {
        for sink in &self.sinks {
            sink.notify(event);
        }
    }
}

impl std::fmt::Debug for Fanout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fanout")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}
