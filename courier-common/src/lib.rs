pub mod address;
pub mod error;
pub mod logging;
pub mod message;

pub use address::{AddressKind, RecipientAddress, RecipientList};
pub use error::MessageParseError;
pub use message::{Header, Headers, MessageBuilder, OutboundMessage};
pub use tracing;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Shutdown,
    Finalised,
}
