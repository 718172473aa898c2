//! Error types for the courier-stats crate.

use thiserror::Error;

use crate::ObjectName;

/// Failures of the attribute interface.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ManagementError {
    #[error("Attribute {0} not found")]
    AttributeNotFound(String),

    /// Every attribute is read-only.
    #[error("Attribute {0} is read-only")]
    ReadOnly(String),

    #[error("Operation {0} not found")]
    OperationNotFound(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("An object is already registered as {0}")]
    AlreadyRegistered(ObjectName),

    #[error("No object is registered as {0}")]
    NotRegistered(ObjectName),
}

/// Lifecycle failures of the statistics service.
#[derive(Debug, Error)]
pub enum StatisticsError {
    #[error("Problem during registration of delivery statistics: {0}")]
    Register(#[source] RegistryError),

    #[error("Problem during unregistration of delivery statistics: {0}")]
    Unregister(#[source] RegistryError),
}
