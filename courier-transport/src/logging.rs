use std::sync::Arc;

use async_trait::async_trait;
use courier_common::{OutboundMessage, RecipientAddress, RecipientList};

use crate::{DeliveryError, Listeners, Transport, TransportEvent, TransportListener};

/// A transport that only records a summary of each message.
///
/// Every send succeeds, and listeners are told that all of the message's
/// recipients (not just the ones passed to `send`) were delivered.
#[derive(Debug, Clone, Default)]
pub struct LoggingSink {
    listeners: Listeners,
}

impl LoggingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn TransportListener>) -> Self {
        self.listeners.add(listener);
        self
    }
}

#[async_trait]
impl Transport for LoggingSink {
    async fn send(
        &self,
        message: &OutboundMessage,
        recipients: &[RecipientAddress],
    ) -> Result<(), DeliveryError> {
        let subject = message.subject().unwrap_or_default();
        let to = RecipientList(recipients);

        tracing::info!(
            subject = %subject,
            to = %to,
            "Message {{subject={subject}, to={to}}}"
        );

        self.listeners.notify(&TransportEvent::delivered(message));

        Ok(())
    }
}
