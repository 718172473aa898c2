use async_trait::async_trait;

use crate::{QueueEnvelope, QueueName, ReceivedEnvelope, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// Sends are staged until [`Session::commit`]; closing without a commit
    /// discards them.
    Transacted,
    /// Every send is handed to the broker immediately.
    AutoAcknowledge,
}

/// Entry point into a broker: hands out fresh connections.
#[async_trait]
pub trait ConnectionFactory: Send + Sync + std::fmt::Debug {
    /// Establish a new connection to the broker.
    async fn create_connection(&self) -> Result<Box<dyn Connection>>;
}

#[async_trait]
pub trait Connection: Send {
    /// Open a session on this connection.
    async fn create_session(&mut self, mode: SessionMode) -> Result<Box<dyn Session>>;

    /// Release the connection. Closing twice is not an error.
    async fn close(&mut self) -> Result<()>;
}

#[async_trait]
pub trait Session: Send {
    /// Place an envelope on the named queue.
    async fn send(&mut self, queue: &QueueName, envelope: QueueEnvelope) -> Result<()>;

    /// Make every staged send visible to consumers as a single unit.
    async fn commit(&mut self) -> Result<()>;

    /// Discard every staged send.
    async fn rollback(&mut self) -> Result<()>;

    /// Release the session, discarding anything not yet committed.
    async fn close(&mut self) -> Result<()>;
}

/// Pulls envelopes off a single queue.
#[async_trait]
pub trait Consumer: Send + Sync {
    /// Wait until an envelope is available and take it.
    async fn receive(&self) -> Result<ReceivedEnvelope>;
}
