use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::QueueEnvelope;

/// Name of a destination queue on the broker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueueName(String);

impl QueueName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for QueueName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Identifier the broker assigns to an envelope once it is committed.
///
/// ULIDs sort by creation time, so ids also order envelopes of equal
/// priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueueMessageId {
    id: ulid::Ulid,
}

impl QueueMessageId {
    #[must_use]
    pub fn generate() -> Self {
        Self {
            id: ulid::Ulid::new(),
        }
    }

    /// Milliseconds since the Unix epoch encoded in the id
    #[must_use]
    pub const fn timestamp_ms(&self) -> u64 {
        self.id.timestamp_ms()
    }
}

impl Display for QueueMessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ID:{}", self.id)
    }
}

/// An envelope taken off a queue by a consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedEnvelope {
    pub id: QueueMessageId,
    pub queue: QueueName,
    pub envelope: QueueEnvelope,
}
