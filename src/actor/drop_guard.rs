// src/actor/drop_guard.rs

use crate::actor::ActorState;

use std::sync::Arc;

use tokio::sync::watch;

/// Marks the actor `Failed` if the worker future is dropped before it returns,
/// i.e. it was aborted or a panic escaped the dispatch loop.
pub(crate) struct WorkerDropGuard {
  actor: Arc<str>,
  state: Arc<watch::Sender<ActorState>>,
  returned: bool,
}

impl WorkerDropGuard {
  pub(crate) fn new(actor: Arc<str>, state: Arc<watch::Sender<ActorState>>) -> Self {
    Self {
      actor,
      state,
      returned: false,
    }
  }

  /// Called on the normal return path.
  pub(crate) fn waive(&mut self) {
    self.returned = true;
  }
}

impl Drop for WorkerDropGuard {
  fn drop(&mut self) {
    if !self.returned {
      tracing::debug!(actor = %self.actor, "Worker stopping abnormally (aborted or unwound)");
      self.state.send_replace(ActorState::Failed);
    }
  }
}
