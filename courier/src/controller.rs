use std::sync::Arc;

use courier_common::{OutboundMessage, Signal, internal};
use courier_queue::{MemoryBroker, QueueName};
use courier_stats::{
    DeliveryStatistics, InMemoryRegistry, MonitoringRegistry, StatisticsService,
};
use courier_transport::{
    DeliveryError, Directory, DirectoryEntry, LoggingSink, QueueForwarder, Transport,
};
use tokio::{sync::broadcast, task::JoinHandle};

use crate::{
    config::{Courier, TransportConfig},
    worker::DeliveryWorker,
};

/// Directory key the broker's connection factory is bound under.
pub const CONNECTION_FACTORY_KEY: &str = "queue/connectionFactory";

/// Directory key the mail queue is bound under.
pub const MAIL_QUEUE_KEY: &str = "queue/mail";

/// Name of the mail queue on the broker.
pub const MAIL_QUEUE: &str = "mail";

/// A running relay: transport, statistics and, when forwarding to the
/// queue, the delivery worker draining it.
pub struct Relay {
    broker: MemoryBroker,
    transport: Arc<dyn Transport>,
    /// Whether `send` itself is the final delivery, rather than the worker
    direct: bool,
    statistics: Arc<DeliveryStatistics>,
    registry: Arc<InMemoryRegistry>,
    service: StatisticsService,
    shutdown: broadcast::Sender<Signal>,
    worker: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for Relay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relay")
            .field("broker", &self.broker)
            .field("direct", &self.direct)
            .field("service", &self.service)
            .finish_non_exhaustive()
    }
}

impl Courier {
    ///
    /// Build and start everything this configuration describes.
    ///
    /// Must be called from within a tokio runtime when the worker is enabled.
    ///
    /// # Errors
    ///
    /// If the statistics cannot be registered, or the configured transport
    /// cannot resolve its directory keys. Nothing is left running.
    ///
    pub fn start(self) -> anyhow::Result<Relay> {
        let broker = self.broker.into_broker();
        let queue = broker.declare_queue(MAIL_QUEUE);

        let mut directory = Directory::new();
        directory.bind(
            CONNECTION_FACTORY_KEY,
            DirectoryEntry::ConnectionFactory(Arc::new(broker.clone())),
        );
        directory.bind(MAIL_QUEUE_KEY, DirectoryEntry::Queue(queue.clone()));

        let (transport, direct): (Arc<dyn Transport>, bool) = match &self.transport {
            TransportConfig::Logging => (Arc::new(LoggingSink::new()), true),
            TransportConfig::Queue(keys) => {
                (Arc::new(QueueForwarder::from_directory(&directory, keys)?), false)
            }
        };

        let statistics = Arc::new(DeliveryStatistics::with_notification_capacity(
            self.statistics.notification_capacity,
        ));
        let registry = Arc::new(InMemoryRegistry::new());
        let service = StatisticsService::start(
            Arc::clone(&statistics),
            Arc::clone(&registry) as Arc<dyn MonitoringRegistry>,
            &self.statistics,
        )?;

        let (shutdown, _) = broadcast::channel(16);

        let worker = (self.worker.enabled && !direct).then(|| {
            let worker = DeliveryWorker::new(
                Box::new(broker.consumer(queue)),
                Arc::new(LoggingSink::new()),
                Arc::clone(&statistics),
            );
            tokio::spawn(worker.serve(shutdown.subscribe()))
        });

        internal!(level = INFO, "Relay running");

        Ok(Relay {
            broker,
            transport,
            direct,
            statistics,
            registry,
            service,
            shutdown,
            worker,
        })
    }
}

impl Relay {
    ///
    /// Hand `message` to the configured transport, addressed to every
    /// recipient the message names.
    ///
    /// # Errors
    ///
    /// Whatever the transport reports.
    ///
    pub async fn send(&self, message: &OutboundMessage) -> Result<(), DeliveryError> {
        let recipients = message.all_recipients();
        let result = self.transport.send(message, &recipients).await;

        if self.direct {
            match &result {
                Ok(()) => self.statistics.on_success(message, &recipients),
                Err(e) => self.statistics.on_failure(message, &recipients, e),
            }
        }

        result
    }

    pub const fn broker(&self) -> &MemoryBroker {
        &self.broker
    }

    pub fn mail_queue(&self) -> QueueName {
        QueueName::new(MAIL_QUEUE)
    }

    pub const fn statistics(&self) -> &Arc<DeliveryStatistics> {
        &self.statistics
    }

    pub fn registry(&self) -> Arc<dyn MonitoringRegistry> {
        Arc::clone(&self.registry) as _
    }

    pub const fn service(&self) -> &StatisticsService {
        &self.service
    }

    /// Outcomes are reported by `send` itself rather than by a worker.
    pub const fn is_direct(&self) -> bool {
        self.direct
    }

    ///
    /// Stop the worker, then unregister the statistics.
    ///
    /// Every step runs even if an earlier one failed.
    ///
    /// # Errors
    ///
    /// If the statistics could not be unregistered.
    ///
    pub async fn shutdown(self) -> anyhow::Result<()> {
        internal!("Shutting down...");

        // No receivers just means the worker is not running
        let _ = self.shutdown.send(Signal::Shutdown);

        if let Some(worker) = self.worker
            && let Err(e) = worker.await
        {
            tracing::error!("Delivery worker did not stop cleanly: {e}");
        }

        self.service.shutdown()?;

        internal!(level = INFO, "Relay stopped");
        Ok(())
    }
}
