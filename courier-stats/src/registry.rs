use std::{
    fmt::{self, Display},
    sync::Arc,
};

use dashmap::{DashMap, mapref::entry::Entry};
use serde::{Deserialize, Serialize};

use crate::{Managed, RegistryError};

/// Name a managed object is registered under, e.g.
/// `courier:type=DeliveryStatistics`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectName(String);

impl ObjectName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where managed objects are published for monitoring tools.
pub trait MonitoringRegistry: Send + Sync {
    ///
    /// # Errors
    ///
    /// If `name` is already taken.
    ///
    fn register(&self, name: ObjectName, object: Arc<dyn Managed>) -> Result<(), RegistryError>;

    ///
    /// # Errors
    ///
    /// If nothing is registered under `name`.
    ///
    fn unregister(&self, name: &ObjectName) -> Result<(), RegistryError>;

    fn lookup(&self, name: &ObjectName) -> Option<Arc<dyn Managed>>;

    fn names(&self) -> Vec<ObjectName>;
}

#[derive(Default)]
pub struct InMemoryRegistry {
    objects: DashMap<ObjectName, Arc<dyn Managed>>,
}

impl fmt::Debug for InMemoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryRegistry")
            .field("names", &self.names())
            .finish()
    }
}

impl InMemoryRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl MonitoringRegistry for InMemoryRegistry {
    fn register(&self, name: ObjectName, object: Arc<dyn Managed>) -> Result<(), RegistryError> {
        match self.objects.entry(name) {
            Entry::Occupied(entry) => Err(RegistryError::AlreadyRegistered(entry.key().clone())),
            Entry::Vacant(entry) => {
                tracing::debug!(name = %entry.key(), "Registered managed object");
                entry.insert(object);
                Ok(())
            }
        }
    }

    fn unregister(&self, name: &ObjectName) -> Result<(), RegistryError> {
        self.objects
            .remove(name)
            .map(|_| tracing::debug!(%name, "Unregistered managed object"))
            .ok_or_else(|| RegistryError::NotRegistered(name.clone()))
    }

    fn lookup(&self, name: &ObjectName) -> Option<Arc<dyn Managed>> {
        self.objects.get(name).map(|entry| Arc::clone(entry.value()))
    }

    fn names(&self) -> Vec<ObjectName> {
        let mut names: Vec<ObjectName> =
            self.objects.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }
}
