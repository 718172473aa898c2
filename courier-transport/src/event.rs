use std::sync::Arc;

use courier_common::{OutboundMessage, RecipientAddress};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEventKind {
    Delivered,
    NotDelivered,
    PartiallyDelivered,
}

/// Outcome of a send as reported to [`TransportListener`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportEvent {
    pub kind: TransportEventKind,
    pub message_id: Option<String>,
    pub delivered: Vec<RecipientAddress>,
    pub undelivered: Vec<RecipientAddress>,
    pub invalid: Vec<RecipientAddress>,
}

impl TransportEvent {
    /// Every recipient of `message` delivered, nothing dropped or pending.
    pub fn delivered(message: &OutboundMessage) -> Self {
        Self {
            kind: TransportEventKind::Delivered,
            message_id: message.message_id().map(str::to_string),
            delivered: message.all_recipients(),
            undelivered: Vec::new(),
            invalid: Vec::new(),
        }
    }
}

pub trait TransportListener: Send + Sync {
    fn on_event(&self, event: &TransportEvent);
}

impl TransportListener for mpsc::UnboundedSender<TransportEvent> {
    fn on_event(&self, event: &TransportEvent) {
        // A dropped receiver just means nobody is listening any more
        let _ = self.send(event.clone());
    }
}

#[derive(Clone, Default)]
pub struct Listeners(Vec<Arc<dyn TransportListener>>);

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.0.len())
            .finish()
    }
}

impl Listeners {
    pub fn add(&mut self, listener: Arc<dyn TransportListener>) {
        self.0.push(listener);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn notify(&self, event: &TransportEvent) {
        for listener in &self.0 {
            listener.on_event(event);
        }
    }
}
