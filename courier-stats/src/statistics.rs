use std::{
    error::Error,
    sync::{
        Arc, LazyLock,
        atomic::{AtomicU64, Ordering},
    },
};

use chrono::{DateTime, Utc};
use courier_common::{OutboundMessage, RecipientAddress, internal};
use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::{
    Attribute, AttributeValue, DeliveryOutcome, MailInfo, Managed, ManagementError,
    ManagementInfo, Notification, NotificationKind,
    management::{AttributeInfo, Impact, NotificationInfo, OpenType, OperationInfo},
};

pub(crate) const DEFAULT_NOTIFICATION_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatisticsAttribute {
    StartDate,
    LastSuccess,
    LastFailure,
    CountSuccessful,
    CountFailure,
}

impl StatisticsAttribute {
    const ALL: [Self; 5] = [
        Self::StartDate,
        Self::LastSuccess,
        Self::LastFailure,
        Self::CountSuccessful,
        Self::CountFailure,
    ];

    const fn name(self) -> &'static str {
        match self {
            Self::StartDate => "statisticsCollectionStartDate",
            Self::LastSuccess => "lastSuccessfulMailInfo",
            Self::LastFailure => "lastFailureMailInfo",
            Self::CountSuccessful => "countSuccessful",
            Self::CountFailure => "countFailure",
        }
    }

    const fn description(self) -> &'static str {
        match self {
            Self::StartDate => "Start date",
            Self::LastSuccess => "Last successful message send",
            Self::LastFailure => "Last unsuccessful message send",
            Self::CountSuccessful => "Successful messages counter",
            Self::CountFailure => "Unsuccessful messages counter",
        }
    }

    fn open_type(self) -> OpenType {
        match self {
            Self::StartDate => OpenType::Date,
            Self::LastSuccess | Self::LastFailure => OpenType::Composite(MailInfo::open_type()),
            Self::CountSuccessful | Self::CountFailure => OpenType::Long,
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|attribute| attribute.name().eq_ignore_ascii_case(name))
    }
}

const RESET_OPERATION: &str = "reset";

static INFO: LazyLock<ManagementInfo> = LazyLock::new(|| ManagementInfo {
    class_name: "courier_stats::DeliveryStatistics",
    description: "Courier delivery statistics",
    attributes: StatisticsAttribute::ALL
        .into_iter()
        .map(|attribute| AttributeInfo {
            name: attribute.name(),
            description: attribute.description(),
            open_type: attribute.open_type(),
            readable: true,
            writable: false,
        })
        .collect(),
    operations: vec![OperationInfo {
        name: RESET_OPERATION,
        description: "Reset statistics",
        return_type: OpenType::Date,
        impact: Impact::Action,
    }],
    notifications: vec![NotificationInfo {
        name: "mail-events",
        description: "Info about emails that have been sent",
        types: NotificationKind::ALL.map(NotificationKind::as_str).to_vec(),
    }],
});

///
/// Counts and remembers reported sends.
///
/// Counters are atomic, so concurrent reports never lose updates. The two
/// last-outcome slots are last-writer-wins. A [`reset`](Self::reset) is
/// exclusive with in-flight reports, so no report that started before a
/// reset can leave a stale count or slot behind it.
///
/// One instance is created by the composition root and shared by reference
/// with everything that reports outcomes.
///
#[derive(Debug)]
pub struct DeliveryStatistics {
    /// Held shared by reports, exclusively by reset
    gate: RwLock<()>,
    started_at: RwLock<DateTime<Utc>>,
    successes: AtomicU64,
    failures: AtomicU64,
    last_success: RwLock<Option<Arc<DeliveryOutcome>>>,
    last_failure: RwLock<Option<Arc<DeliveryOutcome>>>,
    /// Never reset, so notification sequence numbers stay unique for the
    /// life of the process
    sequence: AtomicU64,
    notifications: broadcast::Sender<Notification>,
}

impl Default for DeliveryStatistics {
    fn default() -> Self {
        Self::new()
    }
}

impl DeliveryStatistics {
    pub fn new() -> Self {
        Self::with_notification_capacity(DEFAULT_NOTIFICATION_CAPACITY)
    }

    /// Subscribers that fall more than `capacity` notifications behind miss
    /// the oldest ones.
    pub fn with_notification_capacity(capacity: usize) -> Self {
        let (notifications, _) = broadcast::channel(capacity.max(1));

        Self {
            gate: RwLock::new(()),
            started_at: RwLock::new(Utc::now()),
            successes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            last_success: RwLock::new(None),
            last_failure: RwLock::new(None),
            sequence: AtomicU64::new(0),
            notifications,
        }
    }

    /// Record a successful send of `message` to `recipients`.
    pub fn on_success(&self, message: &OutboundMessage, recipients: &[RecipientAddress]) {
        let outcome = Arc::new(DeliveryOutcome::success(message, recipients));

        {
            let _gate = self.gate.read();
            self.successes.fetch_add(1, Ordering::Relaxed);
            *self.last_success.write() = Some(Arc::clone(&outcome));
        }

        self.publish(&outcome);
    }

    /// Record a failed send of `message` to `recipients`.
    pub fn on_failure(
        &self,
        message: &OutboundMessage,
        recipients: &[RecipientAddress],
        cause: &(dyn Error + 'static),
    ) {
        let outcome = Arc::new(DeliveryOutcome::failure(message, recipients, cause));

        {
            let _gate = self.gate.read();
            self.failures.fetch_add(1, Ordering::Relaxed);
            *self.last_failure.write() = Some(Arc::clone(&outcome));
        }

        self.publish(&outcome);
    }

    fn publish(&self, outcome: &DeliveryOutcome) {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let notification = Notification::from_outcome(outcome, sequence);

        tracing::debug!(
            kind = notification.kind.as_str(),
            sequence,
            "Delivery outcome recorded"
        );

        // No subscribers is fine
        let _ = self.notifications.send(notification);
    }

    /// Zero both counters, clear both slots and restart the collection
    /// window. Returns the new start date.
    pub fn reset(&self) -> DateTime<Utc> {
        let _gate = self.gate.write();

        let now = Utc::now();
        *self.started_at.write() = now;
        self.successes.store(0, Ordering::Relaxed);
        self.failures.store(0, Ordering::Relaxed);
        *self.last_success.write() = None;
        *self.last_failure.write() = None;

        internal!("Delivery statistics reset at {now}");

        now
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        *self.started_at.read()
    }

    pub fn success_count(&self) -> u64 {
        self.successes.load(Ordering::Relaxed)
    }

    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn last_success(&self) -> Option<Arc<DeliveryOutcome>> {
        self.last_success.read().clone()
    }

    pub fn last_failure(&self) -> Option<Arc<DeliveryOutcome>> {
        self.last_failure.read().clone()
    }
}

fn snapshot(outcome: Option<Arc<DeliveryOutcome>>) -> AttributeValue {
    AttributeValue::MailInfo(outcome.map(|outcome| Box::new(MailInfo::from(outcome.as_ref()))))
}

impl Managed for DeliveryStatistics {
    fn info(&self) -> &ManagementInfo {
        &INFO
    }

    fn get_attribute(&self, name: &str) -> Result<AttributeValue, ManagementError> {
        let attribute = StatisticsAttribute::from_name(name)
            .ok_or_else(|| ManagementError::AttributeNotFound(name.to_string()))?;

        Ok(match attribute {
            StatisticsAttribute::StartDate => AttributeValue::Date(self.started_at()),
            StatisticsAttribute::LastSuccess => snapshot(self.last_success()),
            StatisticsAttribute::LastFailure => snapshot(self.last_failure()),
            StatisticsAttribute::CountSuccessful => AttributeValue::Long(self.success_count()),
            StatisticsAttribute::CountFailure => AttributeValue::Long(self.failure_count()),
        })
    }

    fn set_attribute(&self, attribute: Attribute) -> Result<(), ManagementError> {
        Err(ManagementError::ReadOnly(attribute.name))
    }

    fn invoke(&self, operation: &str) -> Result<AttributeValue, ManagementError> {
        if operation.eq_ignore_ascii_case(RESET_OPERATION) {
            Ok(AttributeValue::Date(self.reset()))
        } else {
            Err(ManagementError::OperationNotFound(operation.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("refused")]
    struct Refused;

    fn message(subject: &str) -> OutboundMessage {
        OutboundMessage::builder()
            .message_id(format!("<{subject}@example.org>"))
            .subject(subject)
            .to("a@example.com")
            .build()
    }

    fn recipients() -> Vec<RecipientAddress> {
        vec![RecipientAddress::rfc822("a@example.com")]
    }

    #[test]
    fn counts_and_slots_follow_reports() {
        let statistics = DeliveryStatistics::new();

        statistics.on_success(&message("one"), &recipients());
        statistics.on_success(&message("two"), &recipients());
        statistics.on_failure(&message("three"), &recipients(), &Refused);

        assert_eq!(statistics.success_count(), 2);
        assert_eq!(statistics.failure_count(), 1);
        assert_eq!(
            statistics
                .last_success()
                .and_then(|outcome| outcome.message().subject().map(str::to_string)),
            Some("two".to_string())
        );
        assert!(statistics.last_failure().is_some_and(|outcome| outcome.is_failure()));
    }

    #[test]
    fn reset_clears_everything() {
        let statistics = DeliveryStatistics::new();
        statistics.on_success(&message("one"), &recipients());
        statistics.on_failure(&message("two"), &recipients(), &Refused);

        let before = Utc::now();
        let started = statistics.reset();

        assert!(started >= before);
        assert_eq!(statistics.started_at(), started);
        assert_eq!(statistics.success_count(), 0);
        assert_eq!(statistics.failure_count(), 0);
        assert!(statistics.last_success().is_none());
        assert!(statistics.last_failure().is_none());
    }

    #[test]
    fn attributes_match_case_insensitively() {
        let statistics = DeliveryStatistics::new();
        statistics.on_success(&message("one"), &recipients());

        assert_eq!(
            statistics.get_attribute("COUNTSUCCESSFUL"),
            Ok(AttributeValue::Long(1))
        );
        assert_eq!(
            statistics.get_attribute("countfailure"),
            Ok(AttributeValue::Long(0))
        );
        assert_eq!(
            statistics.get_attribute("lastFailureMailInfo"),
            Ok(AttributeValue::MailInfo(None))
        );

        let value = statistics
            .get_attribute("lastSuccessfulMailInfo")
            .expect("known attribute");
        assert_eq!(
            value.as_mail_info().and_then(|info| info.subject.as_deref()),
            Some("one")
        );
    }

    #[test]
    fn unknown_names_and_writes_are_rejected() {
        let statistics = DeliveryStatistics::new();

        assert_eq!(
            statistics.get_attribute("countRetries"),
            Err(ManagementError::AttributeNotFound("countRetries".to_string()))
        );
        assert_eq!(
            statistics.set_attribute(Attribute {
                name: "countSuccessful".to_string(),
                value: AttributeValue::Long(10),
            }),
            Err(ManagementError::ReadOnly("countSuccessful".to_string()))
        );
        assert_eq!(
            statistics.invoke("flush"),
            Err(ManagementError::OperationNotFound("flush".to_string()))
        );
        assert_eq!(statistics.success_count(), 0);
    }

    #[test]
    fn get_attributes_in_request_order() {
        let statistics = DeliveryStatistics::new();
        let attributes = statistics
            .get_attributes(&["countFailure", "countSuccessful"])
            .expect("both known");

        let names: Vec<&str> = attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["countFailure", "countSuccessful"]);
        assert!(statistics.get_attributes(&[]).expect("empty").is_empty());
        assert!(statistics.get_attributes(&["countFailure", "nope"]).is_err());
    }

    #[test]
    fn reset_operation_returns_start_date() {
        let statistics = DeliveryStatistics::new();
        statistics.on_success(&message("one"), &recipients());

        let value = statistics.invoke("Reset").expect("reset exists");
        assert_eq!(value.as_date(), Some(statistics.started_at()));
        assert_eq!(statistics.success_count(), 0);
    }

    #[test]
    fn schema_describes_five_read_only_attributes() {
        let statistics = DeliveryStatistics::new();
        let info = statistics.info();

        let names: Vec<&str> = info.attributes.iter().map(|a| a.name).collect();
        assert_eq!(
            names,
            [
                "statisticsCollectionStartDate",
                "lastSuccessfulMailInfo",
                "lastFailureMailInfo",
                "countSuccessful",
                "countFailure",
            ]
        );
        assert!(info.attributes.iter().all(|a| a.readable && !a.writable));
        assert_eq!(
            info.attribute("COUNTFAILURE").map(|a| &a.open_type),
            Some(&OpenType::Long)
        );
        assert!(info.operation("reset").is_some());
        assert_eq!(
            info.notifications[0].types,
            ["send-success", "send-failure"]
        );
    }

    #[tokio::test]
    async fn notifications_carry_increasing_sequence_numbers() {
        let statistics = DeliveryStatistics::new();
        let mut notifications = statistics.subscribe();

        statistics.on_success(&message("one"), &recipients());
        statistics.reset();
        statistics.on_failure(&message("two"), &recipients(), &Refused);

        let first = notifications.recv().await.expect("first");
        let second = notifications.recv().await.expect("second");

        assert_eq!(first.kind, NotificationKind::SendSuccess);
        assert_eq!(first.sequence, 1);
        assert_eq!(second.kind, NotificationKind::SendFailure);
        assert_eq!(second.sequence, 2);
        assert_eq!(second.message, "Exception:refused");
    }
}
