use serde::Deserialize;

use crate::statistics::DEFAULT_NOTIFICATION_CAPACITY;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatisticsConfig {
    /// Name the statistics are registered under
    #[serde(default = "default_object_name")]
    pub object_name: String,

    /// Notifications buffered per subscriber before the oldest are dropped
    #[serde(default = "default_notification_capacity")]
    pub notification_capacity: usize,
}

fn default_object_name() -> String {
    "courier:type=DeliveryStatistics".to_string()
}

const fn default_notification_capacity() -> usize {
    DEFAULT_NOTIFICATION_CAPACITY
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            object_name: default_object_name(),
            notification_capacity: default_notification_capacity(),
        }
    }
}
