use async_trait::async_trait;
use courier_common::{OutboundMessage, RecipientAddress};

use crate::DeliveryError;

/// A pluggable backend that takes a composed message and the resolved
/// recipients for this send.
///
/// Address validation happens before a transport is invoked; implementations
/// may assume `recipients` is non-empty and well-formed. The message is only
/// borrowed for the duration of the call.
#[async_trait]
pub trait Transport: Send + Sync {
    /// # Errors
    ///
    /// A [`DeliveryError`] carrying the underlying cause if the message could
    /// not be delivered or handed on.
    async fn send(
        &self,
        message: &OutboundMessage,
        recipients: &[RecipientAddress],
    ) -> Result<(), DeliveryError>;
}
