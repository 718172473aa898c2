//! Typed error handling for transports.
//!
//! A failed send always surfaces as a [`DeliveryError`] with the underlying
//! cause attached, so callers can walk the `source()` chain. Transports never
//! retry; that decision belongs to the caller.

use courier_queue::{QueueError, QueueName};
use thiserror::Error;

/// A send that did not complete.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// A queue-protocol operation failed: connect, open a session, send or
    /// commit. Nothing is considered sent.
    #[error("Cannot send message to queue {queue}: {source}")]
    Queue {
        queue: QueueName,
        #[source]
        source: QueueError,
    },

    /// The message could not be serialized into a payload.
    #[error("Cannot serialize message: {0}")]
    Serialization(#[source] std::io::Error),

    /// The delivery backend refused the message.
    #[error("Message rejected: {0}")]
    Rejected(String),
}

impl DeliveryError {
    /// Returns `true` if the failure happened while talking to the queue.
    #[must_use]
    pub const fn is_queue(&self) -> bool {
        matches!(self, Self::Queue { .. })
    }
}

/// Directory lookups that failed while building a transport.
#[derive(Debug, Error)]
pub enum LookupError {
    /// Nothing is bound under the key.
    #[error("Name not bound: {0}")]
    NotBound(String),

    /// Something is bound under the key, but not the kind of object asked for.
    #[error("Name {key} is bound to a {found}, expected a {expected}")]
    WrongType {
        key: String,
        expected: &'static str,
        found: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use std::error::Error as StdError;

    use super::*;

    #[test]
    fn test_queue_error_chain() {
        let err = DeliveryError::Queue {
            queue: QueueName::new("queue/mail"),
            source: QueueError::ConnectionFailed("broker down".to_string()),
        };

        assert!(err.is_queue());
        assert_eq!(
            err.to_string(),
            "Cannot send message to queue queue/mail: Connection failed: broker down"
        );
        let source = err.source().expect("cause attached");
        assert_eq!(source.to_string(), "Connection failed: broker down");
    }

    #[test]
    fn test_lookup_error_display() {
        let err = LookupError::WrongType {
            key: "queue/mail".to_string(),
            expected: "connection factory",
            found: "queue",
        };
        assert_eq!(
            err.to_string(),
            "Name queue/mail is bound to a queue, expected a connection factory"
        );
        assert_eq!(
            LookupError::NotBound("x".to_string()).to_string(),
            "Name not bound: x"
        );
    }
}
