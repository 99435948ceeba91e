// src/actor/options.rs

use crate::queue::DEFAULT_QUEUE_CAPACITY;

use std::time::Duration;

/// Default time `Actor::close` waits for the worker before aborting it.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// What the worker does when a handler panics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandlerFailurePolicy {
  /// Log the panic, drop the message and keep dispatching.
  #[default]
  Isolate,
  /// Log the panic and stop the worker; the actor reports `Failed`.
  StopActor,
}

/// Per-actor configuration.
#[derive(Debug, Clone)]
pub struct ActorOptions {
  /// Capacity of every mailbox queue the actor opens.
  pub capacity: usize,
  /// How long `close` waits for the worker to acknowledge the stop request.
  pub close_timeout: Duration,
  pub handler_failure: HandlerFailurePolicy,
  /// Runtime the worker is spawned on. `None` uses the caller's current runtime.
  pub runtime: Option<tokio::runtime::Handle>,
}

impl Default for ActorOptions {
  fn default() -> Self {
    Self {
      capacity: DEFAULT_QUEUE_CAPACITY,
      close_timeout: DEFAULT_CLOSE_TIMEOUT,
      handler_failure: HandlerFailurePolicy::Isolate,
      runtime: None,
    }
  }
}

impl ActorOptions {
  pub fn with_capacity(mut self, capacity: usize) -> Self {
    self.capacity = capacity;
    self
  }

  pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
    self.close_timeout = timeout;
    self
  }

  pub fn with_handler_failure(mut self, policy: HandlerFailurePolicy) -> Self {
    self.handler_failure = policy;
    self
  }

  pub fn with_runtime(mut self, runtime: tokio::runtime::Handle) -> Self {
    self.runtime = Some(runtime);
    self
  }
}
