//! Delivery statistics for the courier relay.
//!
//! [`DeliveryStatistics`] counts reported successes and failures, keeps the
//! most recent outcome of each kind and republishes every report as a
//! [`Notification`]. Its state is read through the [`Managed`] attribute
//! interface, which a [`MonitoringRegistry`] exposes to monitoring tools.

pub mod config;
pub mod error;
pub mod management;
pub mod notification;
pub mod outcome;
pub mod registry;
pub mod service;
pub mod statistics;

pub use config::StatisticsConfig;
pub use error::{ManagementError, RegistryError, StatisticsError};
pub use management::{
    AddressRow, Attribute, AttributeInfo, AttributeValue, CompositeType, HeaderRow, Impact,
    ItemInfo, MailInfo, Managed, ManagementInfo, NotificationInfo, OpenType, OperationInfo,
    TabularType,
};
pub use notification::{Notification, NotificationKind};
pub use outcome::{DeliveryOutcome, FailureCause};
pub use registry::{InMemoryRegistry, MonitoringRegistry, ObjectName};
pub use service::StatisticsService;
pub use statistics::DeliveryStatistics;
