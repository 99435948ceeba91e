// src/queue/mod.rs

//! Named, fixed-message-size, bounded queues and the namespace that holds them.

pub mod channel;
pub mod handle;
pub mod registry;

pub use channel::{QueueAttributes, DEFAULT_QUEUE_CAPACITY};
pub use handle::{QueueReader, QueueWriter};
pub use registry::{Registry, RegistryLimits};
