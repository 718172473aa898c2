//! Error types for the courier-queue crate.
//!
//! Every queue-protocol operation (connect, open a session, send, commit,
//! close, receive) reports failures through [`QueueError`].

use thiserror::Error;

use crate::QueueName;

/// Top-level queue error type.
#[derive(Debug, Error)]
pub enum QueueError {
    /// A connection to the broker could not be established.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The connection was already closed.
    #[error("Connection is closed")]
    ConnectionClosed,

    /// The session was already closed.
    #[error("Session is closed")]
    SessionClosed,

    /// Commit or rollback was requested on a non-transacted session.
    #[error("Session is not transacted")]
    NotTransacted,

    /// The destination queue does not exist on the broker.
    #[error("Unknown queue: {0}")]
    UnknownQueue(QueueName),

    /// The broker refused to take more messages.
    #[error("Queue capacity exceeded: {stored}/{capacity} messages")]
    CapacityExceeded { stored: usize, capacity: usize },

    /// Envelope encoding or decoding failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializationError),

    /// Any other broker-side failure.
    #[error("Broker error: {0}")]
    Broker(String),
}

/// Envelope wire-format errors.
#[derive(Debug, Error)]
pub enum SerializationError {
    /// Bincode serialization failed.
    #[error("Bincode encode error: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    /// Bincode deserialization failed.
    #[error("Bincode decode error: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    /// The frame decoded but carried trailing bytes.
    #[error("Corrupted envelope: {0} trailing bytes")]
    TrailingBytes(usize),
}

/// Specialized `Result` type for queue operations.
pub type Result<T> = std::result::Result<T, QueueError>;
