use std::sync::Arc;

use courier_common::{OutboundMessage, Signal, internal, relay};
use courier_queue::{Consumer, QueueError, ReceivedEnvelope};
use courier_stats::DeliveryStatistics;
use courier_transport::Transport;
use tokio::sync::broadcast;

/// Outcome of handling a single envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    Delivered,
    Failed,
    /// The payload was not a message; nothing was reported.
    Dropped,
}

/// Takes envelopes off the queue and performs the final delivery.
///
/// Every delivery attempt is reported to the statistics, success or failure.
pub struct DeliveryWorker {
    consumer: Box<dyn Consumer>,
    transport: Arc<dyn Transport>,
    statistics: Arc<DeliveryStatistics>,
}

impl std::fmt::Debug for DeliveryWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryWorker")
            .field("statistics", &self.statistics)
            .finish_non_exhaustive()
    }
}

impl DeliveryWorker {
    pub fn new(
        consumer: Box<dyn Consumer>,
        transport: Arc<dyn Transport>,
        statistics: Arc<DeliveryStatistics>,
    ) -> Self {
        Self {
            consumer,
            transport,
            statistics,
        }
    }

    ///
    /// Deliver one envelope.
    ///
    /// Recipients come from the envelope's `addresses` property, or from the
    /// message itself when the property is missing.
    ///
    pub async fn handle(&self, received: &ReceivedEnvelope) -> Handled {
        let message = match OutboundMessage::parse(received.envelope.payload()) {
            Ok(message) => message,
            Err(e) => {
                tracing::error!(id = %received.id, "Dropping undecodable envelope: {e}");
                return Handled::Dropped;
            }
        };

        let recipients = received
            .envelope
            .recipients()
            .map_or_else(|| message.all_recipients(), <[_]>::to_vec);

        relay!(
            "Delivering {} to {} recipient(s)",
            received.id,
            recipients.len()
        );

        match self.transport.send(&message, &recipients).await {
            Ok(()) => {
                self.statistics.on_success(&message, &recipients);
                Handled::Delivered
            }
            Err(e) => {
                tracing::warn!(id = %received.id, "Delivery failed: {e}");
                self.statistics.on_failure(&message, &recipients, &e);
                Handled::Failed
            }
        }
    }

    ///
    /// Consume until a shutdown signal arrives or the queue goes away.
    ///
    pub async fn serve(self, mut shutdown: broadcast::Receiver<Signal>) {
        internal!("Delivery worker starting");

        loop {
            tokio::select! {
                received = self.consumer.receive() => {
                    match received {
                        Ok(received) => {
                            self.handle(&received).await;
                        }
                        Err(e @ (QueueError::ConnectionClosed | QueueError::SessionClosed | QueueError::UnknownQueue(_))) => {
                            tracing::error!("Delivery worker stopping: {e}");
                            break;
                        }
                        Err(e) => {
                            tracing::error!("Error receiving from queue: {e}");
                        }
                    }
                }
                sig = shutdown.recv() => {
                    match sig {
                        Ok(Signal::Shutdown | Signal::Finalised) | Err(broadcast::error::RecvError::Closed) => {
                            internal!("Delivery worker received shutdown signal");
                            break;
                        }
                        Err(broadcast::error::RecvError::Lagged(_)) => {}
                    }
                }
            }
        }

        internal!("Delivery worker shutdown complete");
    }
}
