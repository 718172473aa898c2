use std::sync::Arc;

use async_trait::async_trait;
use courier_common::{OutboundMessage, RecipientAddress, relay};
use courier_queue::{
    Connection, ConnectionFactory, DeliveryMode, Priority, QueueEnvelope, QueueError, QueueName,
    Session, SessionMode,
};
use serde::Deserialize;

use crate::{
    DeliveryError, Directory, LookupError, Transport,
    hints::{self, EXPIRE_HEADER, PRIORITY_HEADER},
};

fn default_connection_factory() -> String {
    "queue/connectionFactory".to_string()
}

fn default_queue() -> String {
    "queue/mail".to_string()
}

/// Directory keys a [`QueueForwarder`] resolves when it is built.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QueueTransportConfig {
    #[serde(default = "default_connection_factory")]
    pub connection_factory: String,

    #[serde(default = "default_queue")]
    pub queue: String,
}

impl Default for QueueTransportConfig {
    fn default() -> Self {
        Self {
            connection_factory: default_connection_factory(),
            queue: default_queue(),
        }
    }
}

/// Sends messages to a queue instead of delivering them.
///
/// Each send opens its own connection and transacted session, so concurrent
/// sends share nothing. Both are released again whatever the outcome.
#[derive(Debug, Clone)]
pub struct QueueForwarder {
    factory: Arc<dyn ConnectionFactory>,
    queue: QueueName,
}

impl QueueForwarder {
    pub fn new(factory: Arc<dyn ConnectionFactory>, queue: QueueName) -> Self {
        Self { factory, queue }
    }

    ///
    /// Resolve the connection factory and destination queue through the
    /// directory.
    ///
    /// # Errors
    ///
    /// If either key is unbound or bound to the wrong kind of object. No
    /// forwarder is produced in that case.
    ///
    pub fn from_directory(
        directory: &Directory,
        config: &QueueTransportConfig,
    ) -> Result<Self, LookupError> {
        let factory = directory.lookup_connection_factory(&config.connection_factory)?;
        let queue = directory.lookup_queue(&config.queue)?;

        Ok(Self::new(factory, queue))
    }

    pub const fn queue(&self) -> &QueueName {
        &self.queue
    }

    ///
    /// Turn a message into the envelope that would be enqueued for it.
    ///
    /// The expiry header becomes the time-to-live. The priority header
    /// becomes the envelope priority and is left out of the payload.
    /// Unusable header values are logged and replaced by the defaults.
    ///
    /// # Errors
    ///
    /// If the message cannot be serialized.
    ///
    pub fn build_envelope(
        message: &OutboundMessage,
        recipients: &[RecipientAddress],
    ) -> Result<QueueEnvelope, DeliveryError> {
        let time_to_live = message
            .header(EXPIRE_HEADER)
            .and_then(|value| match hints::parse_expiry(value) {
                Ok(ttl) => ttl,
                Err(e) => {
                    tracing::warn!("Error setting queue TTL: {e}");
                    None
                }
            });

        let (priority, message) = match message.header(PRIORITY_HEADER) {
            Some(value) => {
                let priority = hints::parse_priority(value).unwrap_or_else(|e| {
                    tracing::warn!("{e}");
                    Priority::DEFAULT
                });
                (priority, message.without_header(PRIORITY_HEADER))
            }
            None => (Priority::DEFAULT, message.clone()),
        };

        let mut payload = Vec::new();
        message
            .write_to(&mut payload)
            .map_err(DeliveryError::Serialization)?;

        Ok(QueueEnvelope::new(payload)
            .with_recipients(recipients.to_vec())
            .with_delivery_mode(DeliveryMode::Persistent)
            .with_priority(priority)
            .with_time_to_live(time_to_live))
    }

    async fn enqueue(
        &self,
        connection: &mut Option<Box<dyn Connection>>,
        session: &mut Option<Box<dyn Session>>,
        message: &OutboundMessage,
        recipients: &[RecipientAddress],
    ) -> Result<(), DeliveryError> {
        let conn = connection.insert(
            self.factory
                .create_connection()
                .await
                .map_err(|e| self.queue_error(e))?,
        );
        let sess = session.insert(
            conn.create_session(SessionMode::Transacted)
                .await
                .map_err(|e| self.queue_error(e))?,
        );

        let envelope = Self::build_envelope(message, recipients)?;
        relay!(
            "Enqueueing {} bytes on {} with priority {}",
            envelope.payload().len(),
            self.queue,
            envelope.priority().get()
        );

        sess.send(&self.queue, envelope)
            .await
            .map_err(|e| self.queue_error(e))?;
        sess.commit().await.map_err(|e| self.queue_error(e))
    }

    fn queue_error(&self, source: QueueError) -> DeliveryError {
        DeliveryError::Queue {
            queue: self.queue.clone(),
            source,
        }
    }
}

/// Close the session, then the connection. Failures are only logged.
async fn release(session: Option<Box<dyn Session>>, connection: Option<Box<dyn Connection>>) {
    if let Some(mut session) = session
        && let Err(e) = session.close().await
    {
        tracing::warn!("Problem closing queue session - {e}");
    }

    if let Some(mut connection) = connection
        && let Err(e) = connection.close().await
    {
        tracing::warn!("Problem closing queue connection - {e}");
    }
}

#[async_trait]
impl Transport for QueueForwarder {
    #[tracing::instrument(skip_all, fields(queue = %self.queue))]
    async fn send(
        &self,
        message: &OutboundMessage,
        recipients: &[RecipientAddress],
    ) -> Result<(), DeliveryError> {
        let mut connection = None;
        let mut session = None;

        let result = self
            .enqueue(&mut connection, &mut session, message, recipients)
            .await;

        release(session, connection).await;

        if let Err(e) = &result {
            tracing::error!("{e}");
        }

        result
    }
}
