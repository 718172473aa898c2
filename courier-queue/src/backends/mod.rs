mod memory;

pub use memory::{MemoryBroker, MemoryConnection, MemoryConsumer, MemorySession};
