use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive] // Allows adding more variants later without breaking change
pub enum CourierError {
  // --- Invalid Input ---
  #[error("Invalid argument provided: {0}")]
  InvalidArgument(String), // EINVAL: empty name, zero message size, empty mailbox set

  #[error("Message size mismatch on queue {queue}: expected {expected} bytes, got {actual}")]
  MessageSizeMismatch {
    queue: String,
    expected: usize,
    actual: usize,
  }, // EMSGSIZE

  #[error("Invalid message format for operation: {0}")]
  InvalidMessage(String),

  // --- Namespace Errors ---
  #[error("Queue not found: {0}")]
  QueueNotFound(String), // ENOENT
  #[error("Queue has been closed: {0}")]
  QueueClosed(String), // EBADF once the channel is destroyed

  // --- Resource Limits ---
  #[error("Queue is full: {0}")]
  QueueFull(String), // EAGAIN for non-blocking sends
  #[error("Resource limit reached: {0}")]
  ResourceLimitReached(String), // msgsize_max / msg_max / queues_max

  // --- Worker Errors ---
  #[error("Failed to start actor worker: {0}")]
  SpawnFailed(String),

  // --- State Errors ---
  #[error("Operation is invalid for the current actor state: {0}")]
  InvalidState(&'static str),

  // --- Timeouts ---
  #[error("Operation timed out")]
  Timeout,

  // --- Internal Errors ---
  #[error("Internal library error: {0}")]
  Internal(String),
}

impl CourierError {
  /// Returns `true` when the error was caused by the caller's input rather than
  /// by a resource or runtime failure.
  pub fn is_invalid_input(&self) -> bool {
    matches!(
      self,
      CourierError::InvalidArgument(_) | CourierError::MessageSizeMismatch { .. } | CourierError::InvalidMessage(_)
    )
  }

  pub(crate) fn invalid(msg: impl Into<String>) -> Self {
    CourierError::InvalidArgument(msg.into())
  }
}

pub type Result<T, E = CourierError> = std::result::Result<T, E>;
