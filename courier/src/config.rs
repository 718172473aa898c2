use std::path::Path;

use courier_queue::BrokerConfig;
use courier_stats::StatisticsConfig;
use courier_transport::QueueTransportConfig;
use serde::Deserialize;

/// Which transport outbound messages are handed to.
///
/// ```ron
/// transport: Queue((
///     connection_factory: "queue/connectionFactory",
///     queue: "queue/mail",
/// )),
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub enum TransportConfig {
    /// Log a summary of each message and report it delivered
    Logging,
    /// Forward each message onto the queue for the delivery worker
    Queue(QueueTransportConfig),
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::Queue(QueueTransportConfig::default())
    }
}

/// The worker always delivers through [`courier_transport::LoggingSink`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
    /// Run the delivery worker that drains the mail queue
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

const fn default_enabled() -> bool {
    true
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
        }
    }
}

/// Top-level relay configuration, usually read from `courier.config.ron`.
///
/// Every section is optional:
///
/// ```ron
/// Courier (
///     transport: Logging,
///     broker: Memory((capacity: Some(1000))),
///     worker: (enabled: false),
///     statistics: (object_name: "courier:type=DeliveryStatistics"),
/// )
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Courier {
    #[serde(default)]
    pub transport: TransportConfig,

    #[serde(default)]
    pub broker: BrokerConfig,

    #[serde(default)]
    pub worker: WorkerConfig,

    #[serde(default)]
    pub statistics: StatisticsConfig,
}

impl Courier {
    ///
    /// # Errors
    ///
    /// If `config` is not valid RON for this structure.
    ///
    pub fn from_ron(config: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(config)
    }

    ///
    /// # Errors
    ///
    /// If the file cannot be read or does not parse.
    ///
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("Failed to read config from {}: {}", path.display(), e)
        })?;

        Self::from_ron(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config in {}: {}", path.display(), e))
    }
}
