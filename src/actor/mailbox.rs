// src/actor/mailbox.rs

//! Mailbox definitions and the handler traits they bind.

use crate::error::CourierError;
use crate::message::{decode_record, Record};
use crate::queue::{QueueReader, Registry};

use std::fmt;
use std::marker::PhantomData;

use async_trait::async_trait;
use bytes::Bytes;

/// Handles decoded records of type `M` arriving on one mailbox.
///
/// Handlers of one actor run strictly one at a time on that actor's worker and
/// get exclusive access to the actor's context.
#[async_trait]
pub trait Handler<C: Send + 'static, M: Record>: Send + Sync + 'static {
  async fn handle(&self, ctx: &mut C, msg: M);
}

/// Handles raw payload bytes arriving on one mailbox.
#[async_trait]
pub trait RawHandler<C: Send + 'static>: Send + Sync + 'static {
  async fn handle(&self, ctx: &mut C, payload: Bytes);
}

/// Adapts a synchronous closure into a [`Handler`] or [`RawHandler`].
pub struct FnHandler<F>(F);

/// Wraps `f` so it can be bound to a mailbox.
///
/// ```
/// use courier::{handler_fn, MailboxDef};
///
/// struct Counter {
///   ticks: u32,
/// }
///
/// let def: MailboxDef<Counter> = MailboxDef::new::<u32, _>("/ticks", handler_fn(|ctx: &mut Counter, tick: u32| {
///   ctx.ticks += tick;
/// }));
/// assert_eq!(def.message_size(), 4);
/// ```
pub fn handler_fn<F>(f: F) -> FnHandler<F> {
  FnHandler(f)
}

#[async_trait]
impl<C, M, F> Handler<C, M> for FnHandler<F>
where
  C: Send + 'static,
  M: Record,
  F: Fn(&mut C, M) + Send + Sync + 'static,
{
  async fn handle(&self, ctx: &mut C, msg: M) {
    (self.0)(ctx, msg)
  }
}

#[async_trait]
impl<C, F> RawHandler<C> for FnHandler<F>
where
  C: Send + 'static,
  F: Fn(&mut C, Bytes) + Send + Sync + 'static,
{
  async fn handle(&self, ctx: &mut C, payload: Bytes) {
    (self.0)(ctx, payload)
  }
}

/// Decodes payloads into `M` before handing them to a typed handler.
struct TypedHandler<M, H> {
  queue: String,
  handler: H,
  _record: PhantomData<fn() -> M>,
}

#[async_trait]
impl<C, M, H> RawHandler<C> for TypedHandler<M, H>
where
  C: Send + 'static,
  M: Record,
  H: Handler<C, M>,
{
  async fn handle(&self, ctx: &mut C, payload: Bytes) {
    match decode_record::<M>(&payload) {
      Ok(msg) => self.handler.handle(ctx, msg).await,
      Err(e) => {
        tracing::error!(queue = %self.queue, error = %e, "Dropping payload that does not decode as the mailbox record");
      }
    }
  }
}

/// Static binding of a queue name, a message size and a handler, declared by an
/// actor before it is initialized.
pub struct MailboxDef<C: Send + 'static> {
  name: String,
  message_size: usize,
  handler: Box<dyn RawHandler<C>>,
}

impl<C: Send + 'static> MailboxDef<C> {
  /// Binds records of type `M` on queue `name`. The message size is `M::SIZE`.
  pub fn new<M, H>(name: &str, handler: H) -> Self
  where
    M: Record,
    H: Handler<C, M>,
  {
    let name = name.to_string();
    Self {
      handler: Box::new(TypedHandler {
        queue: name.clone(),
        handler,
        _record: PhantomData,
      }),
      name,
      message_size: M::SIZE,
    }
  }

  /// Binds raw `message_size`-byte payloads on queue `name`.
  pub fn raw<H>(name: &str, message_size: usize, handler: H) -> Self
  where
    H: RawHandler<C>,
  {
    Self {
      name: name.to_string(),
      message_size,
      handler: Box::new(handler),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn message_size(&self) -> usize {
    self.message_size
  }

  /// Opens the reader for this definition.
  pub(crate) fn open(self, registry: &Registry, capacity: usize) -> Result<Mailbox<C>, CourierError> {
    let reader = registry.open_reader(&self.name, self.message_size, capacity)?;
    Ok(Mailbox {
      name: self.name,
      message_size: self.message_size,
      reader,
      handler: self.handler,
    })
  }
}

impl<C: Send + 'static> fmt::Debug for MailboxDef<C> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MailboxDef")
      .field("name", &self.name)
      .field("message_size", &self.message_size)
      .finish_non_exhaustive()
  }
}

/// A mailbox whose reader is open. Owned by the actor's worker.
pub(crate) struct Mailbox<C: Send + 'static> {
  pub(crate) name: String,
  pub(crate) message_size: usize,
  pub(crate) reader: QueueReader,
  pub(crate) handler: Box<dyn RawHandler<C>>,
}

impl<C: Send + 'static> Mailbox<C> {
  pub(crate) fn binding(&self) -> MailboxBinding {
    MailboxBinding {
      name: self.name.clone(),
      channel_id: self.reader.channel_id(),
    }
  }
}

/// What the actor keeps to unlink a mailbox after its worker is gone.
#[derive(Debug, Clone)]
pub(crate) struct MailboxBinding {
  pub(crate) name: String,
  pub(crate) channel_id: u64,
}
