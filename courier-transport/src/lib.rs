//! Transports: pluggable backends that take a composed message and either
//! deliver it or hand it to another delivery mechanism.
//!
//! - [`LoggingSink`] records a one-line summary and reports every recipient
//!   as delivered.
//! - [`QueueForwarder`] serializes the message into a [`QueueEnvelope`] and
//!   enqueues it for a downstream delivery worker.
//!
//! [`QueueEnvelope`]: courier_queue::QueueEnvelope

mod directory;
mod error;
mod event;
mod forwarder;
pub mod hints;
mod logging;
mod transport;

pub use directory::{Directory, DirectoryEntry};
pub use error::{DeliveryError, LookupError};
pub use event::{Listeners, TransportEvent, TransportEventKind, TransportListener};
pub use forwarder::{QueueForwarder, QueueTransportConfig};
pub use hints::{EXPIRE_HEADER, HintError, PRIORITY_HEADER};
pub use logging::LoggingSink;
pub use transport::Transport;
