//! Error types for the courier-common crate.

use thiserror::Error;

/// Errors that can occur while turning raw bytes into an [`OutboundMessage`].
///
/// [`OutboundMessage`]: crate::OutboundMessage
#[derive(Debug, Error)]
pub enum MessageParseError {
    /// The header block could not be parsed.
    #[error("Invalid message headers: {0}")]
    Headers(#[from] mailparse::MailParseError),

    /// The message has no headers at all.
    #[error("Message has no headers")]
    Empty,
}
