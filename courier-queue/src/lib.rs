pub mod backends;
pub mod config;
pub mod envelope;
pub mod error;
pub mod r#trait;
pub mod types;

pub use backends::{MemoryBroker, MemoryConnection, MemoryConsumer, MemorySession};
pub use config::{BrokerConfig, MemoryConfig};
pub use envelope::{DeliveryMode, Priority, PropertyValue, QueueEnvelope, RECIPIENTS_PROPERTY};
pub use error::{QueueError, Result, SerializationError};
pub use r#trait::{Connection, ConnectionFactory, Consumer, Session, SessionMode};
pub use types::{QueueMessageId, QueueName, ReceivedEnvelope};
