use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::DeliveryOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NotificationKind {
    #[serde(rename = "send-success")]
    SendSuccess,
    #[serde(rename = "send-failure")]
    SendFailure,
}

impl NotificationKind {
    pub const ALL: [Self; 2] = [Self::SendSuccess, Self::SendFailure];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SendSuccess => "send-success",
            Self::SendFailure => "send-failure",
        }
    }
}

/// A reported send, republished to subscribers of [`DeliveryStatistics`].
///
/// [`DeliveryStatistics`]: crate::DeliveryStatistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub kind: NotificationKind,
    /// `Message-ID` of the reported message, when it has one.
    pub source: Option<String>,
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub user_data: String,
}

impl Notification {
    pub(crate) fn from_outcome(outcome: &DeliveryOutcome, sequence: u64) -> Self {
        let (kind, message) = outcome.failure_cause().map_or_else(
            || (NotificationKind::SendSuccess, "Sent".to_string()),
            |cause| {
                (
                    NotificationKind::SendFailure,
                    format!("Exception:{}", cause.summary()),
                )
            },
        );

        let mut user_data = format!(
            "Subject:{}\n",
            outcome.message().subject().unwrap_or_default()
        );
        for recipient in outcome.recipients() {
            let _ = writeln!(user_data, "{recipient}");
        }

        Self {
            kind,
            source: outcome.message().message_id().map(str::to_string),
            sequence,
            timestamp: outcome.timestamp(),
            message,
            user_data,
        }
    }
}

#[cfg(test)]
mod tests {
    use courier_common::{OutboundMessage, RecipientAddress};
    use pretty_assertions::assert_eq;

    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("commit refused")]
    struct Refused;

    fn message() -> OutboundMessage {
        OutboundMessage::builder()
            .message_id("<7@example.org>")
            .subject("Weekly")
            .build()
    }

    #[test]
    fn success_notification() {
        let recipients = [
            RecipientAddress::rfc822("a@example.com"),
            RecipientAddress::news("comp.lang.rust"),
        ];
        let outcome = DeliveryOutcome::success(&message(), &recipients);
        let notification = Notification::from_outcome(&outcome, 3);

        assert_eq!(notification.kind, NotificationKind::SendSuccess);
        assert_eq!(notification.source.as_deref(), Some("<7@example.org>"));
        assert_eq!(notification.sequence, 3);
        assert_eq!(notification.message, "Sent");
        assert_eq!(
            notification.user_data,
            "Subject:Weekly\na@example.com\ncomp.lang.rust\n"
        );
    }

    #[test]
    fn failure_notification_embeds_the_cause() {
        let outcome = DeliveryOutcome::failure(&message(), &[], &Refused);
        let notification = Notification::from_outcome(&outcome, 1);

        assert_eq!(notification.kind, NotificationKind::SendFailure);
        assert_eq!(notification.message, "Exception:commit refused");
        assert_eq!(notification.user_data, "Subject:Weekly\n");
    }
}
