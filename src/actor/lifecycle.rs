// src/actor/lifecycle.rs

use crate::actor::dispatch::{DispatchLoop, ExitReason, WorkerExit};
use crate::actor::mailbox::{Mailbox, MailboxBinding, MailboxDef};
use crate::actor::options::ActorOptions;
use crate::actor::ActorState;
use crate::error::CourierError;
use crate::queue::Registry;

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A running actor: one worker task dispatching from one or more mailboxes,
/// with exclusive ownership of a user context `C`.
///
/// Initialization is all-or-nothing. Either every mailbox is opened and the
/// worker is running, or nothing stays linked in the registry.
///
/// Stop an actor with [`close`](Self::close), which hands the context back.
/// Dropping it instead requests the stop and unlinks its mailboxes without
/// waiting for the worker.
pub struct Actor<C: Send + 'static> {
  name: Arc<str>,
  registry: Registry,
  bindings: Vec<MailboxBinding>,
  stop: CancellationToken,
  worker: Option<JoinHandle<WorkerExit<C>>>,
  state: Arc<watch::Sender<ActorState>>,
  close_timeout: Duration,
}

impl<C: Send + 'static> Actor<C> {
  /// Opens every mailbox on the global registry and starts the worker on the
  /// current Tokio runtime.
  pub fn init(name: &str, mailboxes: Vec<MailboxDef<C>>, context: C) -> Result<Self, CourierError> {
    Self::init_with(Registry::global(), ActorOptions::default(), name, mailboxes, context)
  }

  /// Opens every mailbox on `registry` and starts the worker.
  ///
  /// Mailboxes are opened in order. If one fails, or no runtime is available to
  /// spawn the worker, every mailbox opened so far is closed and unlinked and
  /// the error is returned.
  pub fn init_with(
    registry: &Registry,
    options: ActorOptions,
    name: &str,
    mailboxes: Vec<MailboxDef<C>>,
    context: C,
  ) -> Result<Self, CourierError> {
    validate_definitions(name, &mailboxes)?;

    let (state_tx, _) = watch::channel(ActorState::Uninitialized);
    let state = Arc::new(state_tx);
    let name: Arc<str> = Arc::from(name);

    state.send_replace(ActorState::Opening);
    tracing::debug!(actor = %name, mailboxes = mailboxes.len(), capacity = options.capacity, "Opening actor mailboxes");

    let mut opened: Vec<Mailbox<C>> = Vec::with_capacity(mailboxes.len());
    for def in mailboxes {
      let queue = def.name().to_string();
      match def.open(registry, options.capacity) {
        Ok(mailbox) => opened.push(mailbox),
        Err(e) => {
          tracing::error!(actor = %name, queue = %queue, error = %e, "Failed to open mailbox; rolling back");
          rollback(registry, &name, opened);
          state.send_replace(ActorState::Uninitialized);
          return Err(e);
        }
      }
    }

    let runtime = match options.runtime.clone() {
      Some(handle) => handle,
      None => match tokio::runtime::Handle::try_current() {
        Ok(handle) => handle,
        Err(e) => {
          tracing::error!(actor = %name, error = %e, "No runtime to start the worker on; rolling back");
          rollback(registry, &name, opened);
          state.send_replace(ActorState::Uninitialized);
          return Err(CourierError::SpawnFailed(e.to_string()));
        }
      },
    };

    let bindings = opened.iter().map(Mailbox::binding).collect();
    let stop = CancellationToken::new();
    let dispatch = DispatchLoop {
      actor: name.clone(),
      mailboxes: opened,
      policy: options.handler_failure,
      stop: stop.clone(),
      state: state.clone(),
    };

    // Running before spawn so a worker that fails immediately is not overwritten.
    state.send_replace(ActorState::Running);
    let worker = runtime.spawn(dispatch.run(context));
    tracing::debug!(actor = %name, "Actor running");

    Ok(Self {
      name,
      registry: registry.clone(),
      bindings,
      stop,
      worker: Some(worker),
      state,
      close_timeout: options.close_timeout,
    })
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// Queue names of the actor's mailboxes, in definition order.
  pub fn mailbox_names(&self) -> Vec<&str> {
    self.bindings.iter().map(|b| b.name.as_str()).collect()
  }

  pub fn state(&self) -> ActorState {
    *self.state.borrow()
  }

  /// Subscribes to state transitions.
  pub fn state_changes(&self) -> watch::Receiver<ActorState> {
    self.state.subscribe()
  }

  /// Stops the worker and unlinks every mailbox.
  ///
  /// Waits up to the configured close timeout for the worker to exit, then
  /// aborts it. Returns the context if the worker returned it.
  pub async fn close(mut self) -> Option<C> {
    self.state.send_replace(ActorState::Closing);
    tracing::debug!(actor = %self.name, "Closing actor");
    self.stop.cancel();

    // `self.worker` keeps the handle until the join completes; `Drop` finishes
    // teardown if this future is abandoned before then.
    let context = match self.worker.as_mut() {
      Some(worker) => match tokio::time::timeout(self.close_timeout, &mut *worker).await {
        Ok(Ok(exit)) => {
          if exit.reason != ExitReason::Stopped {
            tracing::debug!(actor = %self.name, reason = ?exit.reason, "Worker had already stopped");
          }
          Some(exit.context)
        }
        Ok(Err(e)) => {
          tracing::error!(actor = %self.name, error = %e, "Worker task ended abnormally");
          None
        }
        Err(_) => {
          tracing::warn!(
            actor = %self.name,
            timeout = ?self.close_timeout,
            "Worker did not stop within close timeout; aborting"
          );
          worker.abort();
          let _ = worker.await;
          None
        }
      },
      None => None,
    };
    self.worker = None;

    self.unlink_mailboxes();
    self.state.send_replace(ActorState::Closed);
    tracing::debug!(actor = %self.name, "Actor closed");
    context
  }

  fn unlink_mailboxes(&mut self) {
    for binding in std::mem::take(&mut self.bindings) {
      self.registry.unlink_if_current(&binding.name, binding.channel_id);
    }
  }
}

impl<C: Send + 'static> Drop for Actor<C> {
  fn drop(&mut self) {
    if self.worker.take().is_some() {
      tracing::debug!(actor = %self.name, "Actor dropped without completing close; stopping worker");
      self.stop.cancel();
    }
    self.unlink_mailboxes();
    let terminal = self.state.borrow().is_terminal();
    if !terminal {
      self.state.send_replace(ActorState::Closed);
    }
  }
}

impl<C: Send + 'static> fmt::Debug for Actor<C> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Actor")
      .field("name", &self.name)
      .field("mailboxes", &self.mailbox_names())
      .field("state", &self.state())
      .finish_non_exhaustive()
  }
}

fn validate_definitions<C: Send + 'static>(name: &str, mailboxes: &[MailboxDef<C>]) -> Result<(), CourierError> {
  if name.is_empty() {
    return Err(CourierError::invalid("actor name must not be empty"));
  }
  if mailboxes.is_empty() {
    return Err(CourierError::invalid(format!("actor {} declares no mailboxes", name)));
  }
  let mut seen = HashSet::with_capacity(mailboxes.len());
  for def in mailboxes {
    if def.name().is_empty() {
      return Err(CourierError::invalid(format!("actor {} declares a mailbox with an empty name", name)));
    }
    if def.message_size() == 0 {
      return Err(CourierError::invalid(format!(
        "mailbox {} of actor {} declared with zero message size",
        def.name(),
        name
      )));
    }
    if !seen.insert(def.name()) {
      return Err(CourierError::invalid(format!(
        "actor {} declares mailbox {} more than once",
        name,
        def.name()
      )));
    }
  }
  Ok(())
}

/// Closes and unlinks mailboxes opened by a failed `init`.
fn rollback<C: Send + 'static>(registry: &Registry, actor: &str, opened: Vec<Mailbox<C>>) {
  for mailbox in opened {
    let binding = mailbox.binding();
    mailbox.reader.close();
    registry.unlink_if_current(&binding.name, binding.channel_id);
    tracing::debug!(actor = %actor, queue = %binding.name, "Rolled back mailbox");
  }
}
