// src/actor/mod.rs

//! Actors: a named worker plus the mailboxes it dispatches from.

pub(crate) mod dispatch;
pub(crate) mod drop_guard;
pub mod lifecycle;
pub mod mailbox;
pub mod options;

pub use lifecycle::Actor;
pub use mailbox::{handler_fn, FnHandler, Handler, MailboxDef, RawHandler};
pub use options::{ActorOptions, HandlerFailurePolicy, DEFAULT_CLOSE_TIMEOUT};

use std::fmt;

/// Observable lifecycle state of an [`Actor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActorState {
  Uninitialized,
  /// Mailboxes are being opened.
  Opening,
  /// The worker is dispatching.
  Running,
  /// `close` has been requested and the worker is being joined.
  Closing,
  Closed,
  /// The worker stopped on its own: a mailbox wait failed, a handler panicked
  /// under `HandlerFailurePolicy::StopActor`, or the task was aborted.
  Failed,
}

impl ActorState {
  /// Whether the worker is known to be gone.
  pub fn is_terminal(self) -> bool {
    matches!(self, ActorState::Closed | ActorState::Failed)
  }
}

impl fmt::Display for ActorState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      ActorState::Uninitialized => "uninitialized",
      ActorState::Opening => "opening",
      ActorState::Running => "running",
      ActorState::Closing => "closing",
      ActorState::Closed => "closed",
      ActorState::Failed => "failed",
    };
    f.write_str(s)
  }
}
