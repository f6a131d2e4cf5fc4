use crate::domain::event::LifecycleEvent;
use crate::domain::ports::EventEmitter;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Emitter that records every lifecycle event as a structured log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEmitter;

#[async_trait]
impl EventEmitter for TracingEmitter {
    async fn emit(&self, event: LifecycleEvent) {
        info!(
            event = event.name(),
            order_id = %event.order_id(),
            payload = ?event,
            "lifecycle event"
        );
    }
}

/// Emitter that forwards events to an in-process consumer, such as a delivery
/// worker.
///
/// A closed receiver is logged and otherwise ignored; delivery is not the
/// engine's concern.
#[derive(Debug, Clone)]
pub struct ChannelEmitter {
    sender: mpsc::UnboundedSender<LifecycleEvent>,
}

impl ChannelEmitter {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<LifecycleEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl EventEmitter for ChannelEmitter {
    async fn emit(&self, event: LifecycleEvent) {
        if let Err(err) = self.sender.send(event) {
            warn!(event = err.0.name(), "event receiver dropped");
        }
    }
}
