//! courier - A minimal in-process actor runtime on Tokio.
//!
//! Actors own one or more named mailboxes. Each mailbox is a bounded queue of
//! fixed-size messages, and a single worker per actor waits on all of them at
//! once and runs the bound handlers one at a time.

pub mod actor;
pub mod error;
pub mod message;
pub mod queue;

// Re-export core types for user convenience
pub use actor::{
  handler_fn, Actor, ActorOptions, ActorState, Handler, HandlerFailurePolicy, MailboxDef, RawHandler,
};
pub use error::CourierError;
pub use message::{decode_record, encode_record, Record};
pub use queue::{QueueAttributes, QueueReader, QueueWriter, Registry, RegistryLimits, DEFAULT_QUEUE_CAPACITY};

// --- Top-Level Functions ---

const VERSION_MAJOR: i32 = 0;
const VERSION_MINOR: i32 = 1;
const VERSION_PATCH: i32 = 0;

/// Returns the library version as a tuple (major, minor, patch).
pub fn version() -> (i32, i32, i32) {
  (VERSION_MAJOR, VERSION_MINOR, VERSION_PATCH)
}

/// Sends one message to `name` on the global registry.
pub async fn send_to(name: &str, payload: &[u8]) -> Result<(), CourierError> {
  Registry::global().send_to(name, payload).await
}

/// Encodes `record` and sends it to `name` on the global registry.
pub async fn send_record_to<M: Record>(name: &str, record: &M) -> Result<(), CourierError> {
  Registry::global().send_record_to(name, record).await
}

/// Removes `name` from the global registry.
pub fn unlink(name: &str) -> Result<(), CourierError> {
  Registry::global().unlink(name)
}
