// src/actor/dispatch.rs

//! The per-actor worker: waits on every mailbox at once and runs handlers one
//! at a time.

use crate::actor::drop_guard::WorkerDropGuard;
use crate::actor::mailbox::Mailbox;
use crate::actor::options::HandlerFailurePolicy;
use crate::actor::ActorState;
use crate::error::CourierError;

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use bytes::Bytes;
use futures::FutureExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Why the dispatch loop returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ExitReason {
  /// The stop token was cancelled.
  Stopped,
  /// Waiting on the mailbox set failed; the actor cannot make progress.
  WaitFailed(CourierError),
  /// A handler panicked under `HandlerFailurePolicy::StopActor`.
  HandlerPanicked { queue: String },
}

/// Returned by the worker task so `close` can hand the context back.
pub(crate) struct WorkerExit<C> {
  pub(crate) context: C,
  pub(crate) reason: ExitReason,
}

pub(crate) struct DispatchLoop<C: Send + 'static> {
  pub(crate) actor: Arc<str>,
  pub(crate) mailboxes: Vec<Mailbox<C>>,
  pub(crate) policy: HandlerFailurePolicy,
  pub(crate) stop: CancellationToken,
  pub(crate) state: Arc<watch::Sender<ActorState>>,
}

impl<C: Send + 'static> DispatchLoop<C> {
  /// Runs until the stop token is cancelled or the loop fails.
  pub(crate) async fn run(self, mut context: C) -> WorkerExit<C> {
    let mut guard = WorkerDropGuard::new(self.actor.clone(), self.state.clone());
    tracing::debug!(actor = %self.actor, mailboxes = self.mailboxes.len(), "Dispatch loop starting");

    let reason = loop {
      let woken = tokio::select! {
        biased;
        _ = self.stop.cancelled() => break ExitReason::Stopped,
        woken = wait_any(&self.mailboxes) => woken,
      };

      let (ready, payload) = match woken {
        Ok(ready) => ready,
        Err((idx, e)) => {
          tracing::error!(
            actor = %self.actor,
            queue = %self.mailboxes[idx].name,
            error = %e,
            "Mailbox wait failed; dispatch loop terminating"
          );
          break ExitReason::WaitFailed(e);
        }
      };

      if let Err(reason) = self.dispatch(ready, &mut context, payload).await {
        break reason;
      }

      if let Err(reason) = self.sweep(ready, &mut context).await {
        break reason;
      }
    };

    match &reason {
      ExitReason::Stopped => {
        tracing::debug!(actor = %self.actor, "Dispatch loop stopped on request");
      }
      ExitReason::WaitFailed(_) | ExitReason::HandlerPanicked { .. } => {
        self.state.send_replace(ActorState::Failed);
      }
    }
    guard.waive();
    WorkerExit { context, reason }
  }

  /// Services every other mailbox that already holds a message, once each.
  async fn sweep(&self, woken: usize, context: &mut C) -> Result<(), ExitReason> {
    for idx in 0..self.mailboxes.len() {
      if idx == woken {
        continue;
      }
      if self.stop.is_cancelled() {
        return Ok(());
      }
      match self.mailboxes[idx].reader.try_recv() {
        Ok(Some(payload)) => self.dispatch(idx, context, payload).await?,
        Ok(None) => {}
        Err(e) => {
          tracing::warn!(
            actor = %self.actor,
            queue = %self.mailboxes[idx].name,
            error = %e,
            "Receive failed; skipping mailbox"
          );
        }
      }
    }
    Ok(())
  }

  async fn dispatch(&self, idx: usize, context: &mut C, payload: Bytes) -> Result<(), ExitReason> {
    let mailbox = &self.mailboxes[idx];
    if payload.len() != mailbox.message_size {
      tracing::warn!(
        actor = %self.actor,
        queue = %mailbox.name,
        expected = mailbox.message_size,
        actual = payload.len(),
        "Received message size differs from mailbox definition"
      );
    }
    tracing::trace!(actor = %self.actor, queue = %mailbox.name, size = payload.len(), "Dispatching message");

    let outcome = AssertUnwindSafe(mailbox.handler.handle(context, payload))
      .catch_unwind()
      .await;
    let Err(panic) = outcome else {
      return Ok(());
    };

    tracing::error!(
      actor = %self.actor,
      queue = %mailbox.name,
      panic = %panic_message(panic.as_ref()),
      policy = ?self.policy,
      "Handler panicked"
    );
    match self.policy {
      HandlerFailurePolicy::Isolate => Ok(()),
      HandlerFailurePolicy::StopActor => Err(ExitReason::HandlerPanicked {
        queue: mailbox.name.clone(),
      }),
    }
  }
}

/// Waits until any mailbox yields a message. On failure, reports which mailbox failed.
async fn wait_any<C: Send + 'static>(mailboxes: &[Mailbox<C>]) -> Result<(usize, Bytes), (usize, CourierError)> {
  let waits = mailboxes
    .iter()
    .enumerate()
    .map(|(idx, mailbox)| Box::pin(async move { (idx, mailbox.reader.recv().await) }));
  let ((idx, result), _, _) = futures::future::select_all(waits).await;
  result.map(|payload| (idx, payload)).map_err(|e| (idx, e))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
  if let Some(s) = panic.downcast_ref::<&str>() {
    (*s).to_string()
  } else if let Some(s) = panic.downcast_ref::<String>() {
    s.clone()
  } else {
    "non-string panic payload".to_string()
  }
}
