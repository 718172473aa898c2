//! Composition root of the courier relay.
//!
//! [`config::Courier`] is the RON configuration. Starting it produces a
//! [`controller::Relay`]: the configured transport, the delivery statistics
//! registered for monitoring and, when forwarding to the queue, a
//! [`worker::DeliveryWorker`] performing the final delivery.

pub mod config;
pub mod controller;
pub mod worker;

pub use config::{Courier, TransportConfig, WorkerConfig};
pub use controller::Relay;
pub use worker::{DeliveryWorker, Handled};
