use serde::Deserialize;

use crate::MemoryBroker;

/// Configuration for the broker the relay talks to.
///
/// # Examples
///
/// Unbounded in-process broker in RON config:
/// ```ron
/// Courier (
///     broker: Memory(()),
/// )
/// ```
///
/// With a capacity limit:
/// ```ron
/// Courier (
///     broker: Memory((
///         capacity: Some(1000),
///     )),
/// )
/// ```
#[derive(Debug, Clone, Deserialize)]
pub enum BrokerConfig {
    /// In-process broker (development and testing)
    Memory(MemoryConfig),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemoryConfig {
    /// Maximum number of stored envelopes across all queues (omit for unlimited)
    #[serde(default)]
    pub capacity: Option<usize>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self::Memory(MemoryConfig::default())
    }
}

impl BrokerConfig {
    #[must_use]
    pub fn into_broker(self) -> MemoryBroker {
        match self {
            Self::Memory(config) => config
                .capacity
                .map_or_else(MemoryBroker::new, MemoryBroker::with_capacity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_config_capacity() {
        let broker = BrokerConfig::Memory(MemoryConfig { capacity: Some(10) }).into_broker();
        assert_eq!(broker.capacity(), Some(10));

        assert_eq!(BrokerConfig::default().into_broker().capacity(), None);
    }
}
