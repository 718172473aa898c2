use std::{collections::HashMap, sync::Arc};

use courier_queue::{ConnectionFactory, QueueName};

use crate::LookupError;

/// Something that can be bound under a name in a [`Directory`].
#[derive(Debug, Clone)]
pub enum DirectoryEntry {
    ConnectionFactory(Arc<dyn ConnectionFactory>),
    Queue(QueueName),
}

impl DirectoryEntry {
    const fn kind(&self) -> &'static str {
        match self {
            Self::ConnectionFactory(_) => "connection factory",
            Self::Queue(_) => "queue",
        }
    }
}

/// Name to object resolution, consulted once while transports are built.
#[derive(Debug, Clone, Default)]
pub struct Directory {
    entries: HashMap<String, DirectoryEntry>,
}

impl Directory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `entry` under `key`, replacing whatever was there.
    pub fn bind(&mut self, key: impl Into<String>, entry: DirectoryEntry) {
        self.entries.insert(key.into(), entry);
    }

    pub fn unbind(&mut self, key: &str) -> Option<DirectoryEntry> {
        self.entries.remove(key)
    }

    ///
    /// # Errors
    ///
    /// If nothing is bound under `key`.
    ///
    pub fn lookup(&self, key: &str) -> Result<&DirectoryEntry, LookupError> {
        self.entries
            .get(key)
            .ok_or_else(|| LookupError::NotBound(key.to_string()))
    }

    ///
    /// # Errors
    ///
    /// If nothing, or something other than a connection factory, is bound
    /// under `key`.
    ///
    pub fn lookup_connection_factory(
        &self,
        key: &str,
    ) -> Result<Arc<dyn ConnectionFactory>, LookupError> {
        match self.lookup(key)? {
            DirectoryEntry::ConnectionFactory(factory) => Ok(Arc::clone(factory)),
            other => Err(LookupError::WrongType {
                key: key.to_string(),
                expected: "connection factory",
                found: other.kind(),
            }),
        }
    }

    ///
    /// # Errors
    ///
    /// If nothing, or something other than a queue, is bound under `key`.
    ///
    pub fn lookup_queue(&self, key: &str) -> Result<QueueName, LookupError> {
        match self.lookup(key)? {
            DirectoryEntry::Queue(queue) => Ok(queue.clone()),
            other => Err(LookupError::WrongType {
                key: key.to_string(),
                expected: "queue",
                found: other.kind(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use courier_queue::MemoryBroker;

    use super::*;

    #[test]
    fn typed_lookups() {
        let broker = MemoryBroker::new();
        let mut directory = Directory::new();
        directory.bind(
            "queue/connectionFactory",
            DirectoryEntry::ConnectionFactory(Arc::new(broker.clone())),
        );
        directory.bind(
            "queue/mail",
            DirectoryEntry::Queue(broker.declare_queue("mail")),
        );

        assert!(directory.lookup_connection_factory("queue/connectionFactory").is_ok());
        assert_eq!(
            directory.lookup_queue("queue/mail").expect("bound"),
            QueueName::new("mail")
        );

        assert!(matches!(
            directory.lookup_queue("queue/connectionFactory"),
            Err(LookupError::WrongType { expected: "queue", .. })
        ));
        assert!(matches!(
            directory.lookup_connection_factory("queue/missing"),
            Err(LookupError::NotBound(_))
        ));

        assert!(directory.unbind("queue/mail").is_some());
        assert!(directory.lookup("queue/mail").is_err());
    }
}
