use std::sync::Arc;

use courier_common::internal;

use crate::{
    DeliveryStatistics, MonitoringRegistry, ObjectName, StatisticsConfig, StatisticsError,
};

/// Registration lifecycle of a [`DeliveryStatistics`] instance.
pub struct StatisticsService {
    statistics: Arc<DeliveryStatistics>,
    registry: Arc<dyn MonitoringRegistry>,
    name: ObjectName,
}

impl std::fmt::Debug for StatisticsService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatisticsService")
            .field("name", &self.name)
            .field("statistics", &self.statistics)
            .finish_non_exhaustive()
    }
}

impl StatisticsService {
    ///
    /// Reset `statistics` and publish them in `registry`.
    ///
    /// # Errors
    ///
    /// If the registry refuses the registration. The service does not start.
    ///
    pub fn start(
        statistics: Arc<DeliveryStatistics>,
        registry: Arc<dyn MonitoringRegistry>,
        config: &StatisticsConfig,
    ) -> Result<Self, StatisticsError> {
        let name = ObjectName::new(config.object_name.clone());

        statistics.reset();
        registry
            .register(name.clone(), Arc::clone(&statistics) as _)
            .map_err(StatisticsError::Register)?;

        internal!(level = INFO, "Delivery statistics registered as {name}");

        Ok(Self {
            statistics,
            registry,
            name,
        })
    }

    pub const fn statistics(&self) -> &Arc<DeliveryStatistics> {
        &self.statistics
    }

    pub const fn name(&self) -> &ObjectName {
        &self.name
    }

    ///
    /// Remove the statistics from the registry.
    ///
    /// Shutdown always runs to completion. A failed unregistration is logged
    /// and handed back so the caller can decide whether it matters.
    ///
    /// # Errors
    ///
    /// If the registry no longer knows the name.
    ///
    pub fn shutdown(self) -> Result<(), StatisticsError> {
        match self.registry.unregister(&self.name) {
            Ok(()) => {
                internal!(level = INFO, "Delivery statistics unregistered");
                Ok(())
            }
            Err(e) => {
                let err = StatisticsError::Unregister(e);
                tracing::warn!("{err}");
                Err(err)
            }
        }
    }
}
