use std::{error::Error, fmt::Write};

use chrono::{DateTime, Utc};
use courier_common::{OutboundMessage, RecipientAddress};

/// Rendered form of the error a failed send reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureCause {
    summary: String,
    description: String,
}

impl FailureCause {
    /// Capture `error` and every `source()` beneath it.
    pub fn from_error(error: &(dyn Error + 'static)) -> Self {
        let summary = error.to_string();
        let mut description = summary.clone();

        let mut source = error.source();
        while let Some(cause) = source {
            let _ = write!(description, "\nCaused by: {cause}");
            source = cause.source();
        }

        Self {
            summary,
            description,
        }
    }

    /// The top-level error message.
    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// The top-level message followed by one `Caused by:` line per cause.
    pub fn description(&self) -> &str {
        &self.description
    }
}

/// A single reported send, as kept in the last-success and last-failure slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    message: OutboundMessage,
    recipients: Vec<RecipientAddress>,
    failure: Option<FailureCause>,
    timestamp: DateTime<Utc>,
}

impl DeliveryOutcome {
    pub fn success(message: &OutboundMessage, recipients: &[RecipientAddress]) -> Self {
        Self {
            message: message.clone(),
            recipients: recipients.to_vec(),
            failure: None,
            timestamp: Utc::now(),
        }
    }

    pub fn failure(
        message: &OutboundMessage,
        recipients: &[RecipientAddress],
        cause: &(dyn Error + 'static),
    ) -> Self {
        Self {
            failure: Some(FailureCause::from_error(cause)),
            ..Self::success(message, recipients)
        }
    }

    pub const fn message(&self) -> &OutboundMessage {
        &self.message
    }

    pub fn recipients(&self) -> &[RecipientAddress] {
        &self.recipients
    }

    pub const fn failure_cause(&self) -> Option<&FailureCause> {
        self.failure.as_ref()
    }

    pub const fn is_failure(&self) -> bool {
        self.failure.is_some()
    }

    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("Cannot send message to queue mail")]
    struct Outer(#[source] Inner);

    #[derive(Debug, thiserror::Error)]
    #[error("Connection failed: broker down")]
    struct Inner;

    #[test]
    fn description_walks_the_cause_chain() {
        let cause = FailureCause::from_error(&Outer(Inner));

        assert_eq!(cause.summary(), "Cannot send message to queue mail");
        assert_eq!(
            cause.description(),
            "Cannot send message to queue mail\nCaused by: Connection failed: broker down"
        );
    }

    #[test]
    fn failure_outcome_keeps_message_and_recipients() {
        let message = OutboundMessage::builder().subject("Hi").build();
        let recipients = [RecipientAddress::rfc822("a@example.com")];

        let outcome = DeliveryOutcome::failure(&message, &recipients, &Inner);
        assert!(outcome.is_failure());
        assert_eq!(outcome.message().subject(), Some("Hi"));
        assert_eq!(outcome.recipients(), recipients.as_slice());

        assert!(!DeliveryOutcome::success(&message, &recipients).is_failure());
    }
}
