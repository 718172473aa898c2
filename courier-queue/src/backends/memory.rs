use std::{
    cmp::Ordering as CmpOrdering,
    collections::{BinaryHeap, HashMap},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Instant,
};

use async_trait::async_trait;
use courier_common::relay;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::{
    Connection, ConnectionFactory, Consumer, QueueEnvelope, QueueError, QueueMessageId, QueueName,
    ReceivedEnvelope, Result, Session, SessionMode,
};

/// A committed envelope, stored as its encoded frame.
#[derive(Debug)]
struct Stored {
    id: QueueMessageId,
    priority: u8,
    sequence: u64,
    expires_at: Option<Instant>,
    frame: Vec<u8>,
}

impl PartialEq for Stored {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == CmpOrdering::Equal
    }
}

impl Eq for Stored {}

impl PartialOrd for Stored {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Stored {
    // Max-heap: higher priority first, then lower sequence (FIFO)
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

#[derive(Debug, Default)]
struct Queues {
    queues: HashMap<QueueName, BinaryHeap<Stored>>,
    sequence: u64,
    stored: usize,
}

#[derive(Debug, Default)]
struct Inner {
    queues: Mutex<Queues>,
    notify: Notify,
    capacity: Option<usize>,
    open_connections: AtomicUsize,
    open_sessions: AtomicUsize,
}

/// In-process broker.
///
/// Queues must be declared before anything can be sent to them. Committed
/// envelopes are kept as encoded frames, so everything that crosses the
/// broker goes through the same wire codec an out-of-process worker would
/// use.
///
/// # Ordering
/// Consumers receive the highest priority envelope first; envelopes of
/// equal priority come out in commit order. Envelopes whose time-to-live
/// has elapsed are dropped when they reach the head of the queue.
#[derive(Debug, Clone, Default)]
pub struct MemoryBroker {
    inner: Arc<Inner>,
}

impl MemoryBroker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A broker that refuses commits once `capacity` envelopes are stored.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                capacity: Some(capacity),
                ..Inner::default()
            }),
        }
    }

    #[must_use]
    pub fn capacity(&self) -> Option<usize> {
        self.inner.capacity
    }

    /// Create the queue if it does not exist yet.
    pub fn declare_queue(&self, name: impl Into<QueueName>) -> QueueName {
        let name = name.into();
        self.inner
            .queues
            .lock()
            .queues
            .entry(name.clone())
            .or_default();
        name
    }

    pub fn has_queue(&self, name: &QueueName) -> bool {
        self.inner.queues.lock().queues.contains_key(name)
    }

    /// Number of envelopes waiting on `queue` (expired ones included until
    /// they are reaped).
    pub fn len(&self, queue: &QueueName) -> usize {
        self.inner
            .queues
            .lock()
            .queues
            .get(queue)
            .map_or(0, BinaryHeap::len)
    }

    pub fn is_empty(&self, queue: &QueueName) -> bool {
        self.len(queue) == 0
    }

    pub fn open_connections(&self) -> usize {
        self.inner.open_connections.load(Ordering::Acquire)
    }

    pub fn open_sessions(&self) -> usize {
        self.inner.open_sessions.load(Ordering::Acquire)
    }

    pub fn consumer(&self, queue: QueueName) -> MemoryConsumer {
        MemoryConsumer {
            broker: self.clone(),
            queue,
        }
    }

    ///
    /// Take the next live envelope from `queue` without waiting.
    ///
    /// # Errors
    ///
    /// If the queue does not exist, or a stored frame no longer decodes.
    ///
    pub fn try_receive(&self, queue: &QueueName) -> Result<Option<ReceivedEnvelope>> {
        let stored = {
            let mut guard = self.inner.queues.lock();
            let queues = &mut *guard;
            let heap = queues
                .queues
                .get_mut(queue)
                .ok_or_else(|| QueueError::UnknownQueue(queue.clone()))?;

            let now = Instant::now();
            let mut next = None;
            while let Some(stored) = heap.pop() {
                queues.stored -= 1;
                if stored.expires_at.is_some_and(|at| at <= now) {
                    relay!(level = DEBUG, "Dropping expired envelope {} from {queue}", stored.id);
                    continue;
                }
                next = Some(stored);
                break;
            }
            next
        };

        stored
            .map(|stored| -> Result<ReceivedEnvelope> {
                Ok(ReceivedEnvelope {
                    id: stored.id,
                    queue: queue.clone(),
                    envelope: QueueEnvelope::decode(&stored.frame)?,
                })
            })
            .transpose()
    }

    fn ensure_queue(&self, queue: &QueueName) -> Result<()> {
        if self.has_queue(queue) {
            Ok(())
        } else {
            Err(QueueError::UnknownQueue(queue.clone()))
        }
    }

    /// Store a batch atomically: either every envelope is stored or none is.
    fn enqueue(&self, batch: Vec<(QueueName, QueueEnvelope)>) -> Result<Vec<QueueMessageId>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let now = Instant::now();
        let mut prepared = Vec::with_capacity(batch.len());
        for (queue, envelope) in batch {
            let frame = envelope.encode()?;
            let expires_at = envelope.time_to_live().map(|ttl| now + ttl);
            prepared.push((queue, envelope.priority().get(), expires_at, frame));
        }

        let ids = {
            let mut guard = self.inner.queues.lock();
            let queues = &mut *guard;

            if let Some(capacity) = self.inner.capacity
                && queues.stored + prepared.len() > capacity
            {
                return Err(QueueError::CapacityExceeded {
                    stored: queues.stored,
                    capacity,
                });
            }

            if let Some((queue, ..)) = prepared
                .iter()
                .find(|(queue, ..)| !queues.queues.contains_key(queue))
            {
                return Err(QueueError::UnknownQueue(queue.clone()));
            }

            let mut ids = Vec::with_capacity(prepared.len());
            for (queue, priority, expires_at, frame) in prepared {
                let id = QueueMessageId::generate();
                queues.sequence += 1;
                let sequence = queues.sequence;
                if let Some(heap) = queues.queues.get_mut(&queue) {
                    heap.push(Stored {
                        id,
                        priority,
                        sequence,
                        expires_at,
                        frame,
                    });
                    queues.stored += 1;
                    relay!("Stored envelope {id} on {queue} with priority {priority}");
                    ids.push(id);
                }
            }
            ids
        };

        self.inner.notify.notify_waiters();

        Ok(ids)
    }
}

#[async_trait]
impl ConnectionFactory for MemoryBroker {
    async fn create_connection(&self) -> Result<Box<dyn Connection>> {
        self.inner.open_connections.fetch_add(1, Ordering::AcqRel);
        Ok(Box::new(MemoryConnection {
            broker: self.clone(),
            closed: false,
        }))
    }
}

#[derive(Debug)]
pub struct MemoryConnection {
    broker: MemoryBroker,
    closed: bool,
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn create_session(&mut self, mode: SessionMode) -> Result<Box<dyn Session>> {
        if self.closed {
            return Err(QueueError::ConnectionClosed);
        }

        self.broker
            .inner
            .open_sessions
            .fetch_add(1, Ordering::AcqRel);

        Ok(Box::new(MemorySession {
            broker: self.broker.clone(),
            mode,
            staged: Vec::new(),
            closed: false,
        }))
    }

    async fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.broker
                .inner
                .open_connections
                .fetch_sub(1, Ordering::AcqRel);
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct MemorySession {
    broker: MemoryBroker,
    mode: SessionMode,
    staged: Vec<(QueueName, QueueEnvelope)>,
    closed: bool,
}

impl MemorySession {
    const fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(QueueError::SessionClosed)
        } else {
            Ok(())
        }
    }

    fn ensure_transacted(&self) -> Result<()> {
        self.ensure_open()?;
        if self.mode == SessionMode::Transacted {
            Ok(())
        } else {
            Err(QueueError::NotTransacted)
        }
    }
}

#[async_trait]
impl Session for MemorySession {
    async fn send(&mut self, queue: &QueueName, envelope: QueueEnvelope) -> Result<()> {
        self.ensure_open()?;
        self.broker.ensure_queue(queue)?;

        match self.mode {
            SessionMode::Transacted => {
                self.staged.push((queue.clone(), envelope));
                Ok(())
            }
            SessionMode::AutoAcknowledge => self
                .broker
                .enqueue(vec![(queue.clone(), envelope)])
                .map(|_| ()),
        }
    }

    async fn commit(&mut self) -> Result<()> {
        self.ensure_transacted()?;
        let staged = std::mem::take(&mut self.staged);
        self.broker.enqueue(staged).map(|_| ())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.ensure_transacted()?;
        self.staged.clear();
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if !self.closed {
            if !self.staged.is_empty() {
                relay!(
                    level = DEBUG,
                    "Discarding {} uncommitted envelopes on session close",
                    self.staged.len()
                );
                self.staged.clear();
            }
            self.closed = true;
            self.broker
                .inner
                .open_sessions
                .fetch_sub(1, Ordering::AcqRel);
        }
        Ok(())
    }
}

/// Waits on a single queue of a [`MemoryBroker`].
#[derive(Debug, Clone)]
pub struct MemoryConsumer {
    broker: MemoryBroker,
    queue: QueueName,
}

impl MemoryConsumer {
    pub const fn queue(&self) -> &QueueName {
        &self.queue
    }
}

#[async_trait]
impl Consumer for MemoryConsumer {
    async fn receive(&self) -> Result<ReceivedEnvelope> {
        loop {
            // Created before the check so a commit in between still wakes us
            let notified = self.broker.inner.notify.notified();

            if let Some(received) = self.broker.try_receive(&self.queue)? {
                return Ok(received);
            }

            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use courier_common::RecipientAddress;

    use super::*;
    use crate::Priority;

    fn envelope(body: &str, priority: Priority) -> QueueEnvelope {
        QueueEnvelope::new(body.as_bytes().to_vec()).with_priority(priority)
    }

    async fn transacted(broker: &MemoryBroker) -> (Box<dyn Connection>, Box<dyn Session>) {
        let mut connection = broker.create_connection().await.expect("connects");
        let session = connection
            .create_session(SessionMode::Transacted)
            .await
            .expect("session");
        (connection, session)
    }

    #[tokio::test]
    async fn test_commit_makes_sends_visible() {
        let broker = MemoryBroker::new();
        let queue = broker.declare_queue("queue/mail");
        let (mut connection, mut session) = transacted(&broker).await;

        session
            .send(&queue, envelope("one", Priority::DEFAULT))
            .await
            .expect("send");
        assert!(broker.is_empty(&queue));

        session.commit().await.expect("commit");
        assert_eq!(broker.len(&queue), 1);

        session.close().await.expect("close session");
        connection.close().await.expect("close connection");
        assert_eq!(broker.open_sessions(), 0);
        assert_eq!(broker.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_close_without_commit_discards() {
        let broker = MemoryBroker::new();
        let queue = broker.declare_queue("queue/mail");
        let (_connection, mut session) = transacted(&broker).await;

        session
            .send(&queue, envelope("lost", Priority::DEFAULT))
            .await
            .expect("send");
        session.close().await.expect("close");

        assert!(broker.is_empty(&queue));
        assert!(matches!(
            session.commit().await,
            Err(QueueError::SessionClosed)
        ));
    }

    #[tokio::test]
    async fn test_rollback_discards_staged() {
        let broker = MemoryBroker::new();
        let queue = broker.declare_queue("queue/mail");
        let (_connection, mut session) = transacted(&broker).await;

        session
            .send(&queue, envelope("gone", Priority::DEFAULT))
            .await
            .expect("send");
        session.rollback().await.expect("rollback");
        session.commit().await.expect("empty commit");

        assert!(broker.is_empty(&queue));
    }

    #[tokio::test]
    async fn test_auto_acknowledge_sends_immediately() {
        let broker = MemoryBroker::new();
        let queue = broker.declare_queue("queue/mail");
        let mut connection = broker.create_connection().await.expect("connects");
        let mut session = connection
            .create_session(SessionMode::AutoAcknowledge)
            .await
            .expect("session");

        session
            .send(&queue, envelope("now", Priority::DEFAULT))
            .await
            .expect("send");

        assert_eq!(broker.len(&queue), 1);
        assert!(matches!(
            session.commit().await,
            Err(QueueError::NotTransacted)
        ));
    }

    #[tokio::test]
    async fn test_unknown_queue_is_rejected() {
        let broker = MemoryBroker::new();
        let (_connection, mut session) = transacted(&broker).await;

        let result = session
            .send(&QueueName::new("queue/missing"), envelope("x", Priority::DEFAULT))
            .await;
        assert!(matches!(result, Err(QueueError::UnknownQueue(_))));
    }

    #[tokio::test]
    async fn test_priority_then_fifo_ordering() {
        let broker = MemoryBroker::new();
        let queue = broker.declare_queue("queue/mail");
        let (_connection, mut session) = transacted(&broker).await;

        for (body, priority) in [
            ("low", Priority::LOW),
            ("first-default", Priority::DEFAULT),
            ("high", Priority::HIGH),
            ("second-default", Priority::DEFAULT),
        ] {
            session
                .send(&queue, envelope(body, priority))
                .await
                .expect("send");
        }
        session.commit().await.expect("commit");

        let mut order = Vec::new();
        while let Some(received) = broker.try_receive(&queue).expect("receive") {
            order.push(String::from_utf8(received.envelope.into_payload()).expect("utf8"));
        }

        assert_eq!(order, ["high", "first-default", "second-default", "low"]);
    }

    #[tokio::test]
    async fn test_expired_envelopes_are_dropped() {
        let broker = MemoryBroker::new();
        let queue = broker.declare_queue("queue/mail");
        let (_connection, mut session) = transacted(&broker).await;

        session
            .send(
                &queue,
                envelope("stale", Priority::HIGH).with_time_to_live(Some(Duration::from_millis(1))),
            )
            .await
            .expect("send");
        session
            .send(&queue, envelope("fresh", Priority::LOW))
            .await
            .expect("send");
        session.commit().await.expect("commit");

        tokio::time::sleep(Duration::from_millis(20)).await;

        let received = broker
            .try_receive(&queue)
            .expect("receive")
            .expect("one live envelope");
        assert_eq!(received.envelope.payload(), b"fresh");
        assert!(broker.try_receive(&queue).expect("receive").is_none());
    }

    #[tokio::test]
    async fn test_capacity_limit_rejects_whole_commit() {
        let broker = MemoryBroker::with_capacity(2);
        let queue = broker.declare_queue("queue/mail");
        let (_connection, mut session) = transacted(&broker).await;

        for body in ["a", "b", "c"] {
            session
                .send(&queue, envelope(body, Priority::DEFAULT))
                .await
                .expect("send");
        }

        let result = session.commit().await;
        assert!(matches!(
            result,
            Err(QueueError::CapacityExceeded { capacity: 2, .. })
        ));
        assert!(broker.is_empty(&queue));
        assert_eq!(broker.capacity(), Some(2));
    }

    #[tokio::test]
    async fn test_consumer_waits_for_commit() {
        let broker = MemoryBroker::new();
        let queue = broker.declare_queue("queue/mail");
        let consumer = broker.consumer(queue.clone());

        let waiter = tokio::spawn(async move { consumer.receive().await });

        let (_connection, mut session) = transacted(&broker).await;
        session
            .send(
                &queue,
                envelope("wake", Priority::DEFAULT)
                    .with_recipients(vec![RecipientAddress::rfc822("a@example.com")]),
            )
            .await
            .expect("send");
        session.commit().await.expect("commit");

        let received = tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .expect("consumer woke up")
            .expect("task completed")
            .expect("received");

        assert_eq!(received.queue, queue);
        assert_eq!(received.envelope.payload(), b"wake");
        assert_eq!(
            received.envelope.recipients(),
            Some([RecipientAddress::rfc822("a@example.com")].as_slice())
        );
    }
}
