// src/queue/handle.rs

//! Reader and writer handles onto a queue.

use crate::error::CourierError;
use crate::message::{decode_record, encode_record, Record};
use crate::queue::channel::{Channel, QueueAttributes};

use std::fmt;
use std::sync::Arc;

use async_channel::{TryRecvError, TrySendError};
use bytes::Bytes;

/// Receiving handle returned by [`Registry::open_reader`](crate::queue::Registry::open_reader).
///
/// Dropping the handle closes it. The queue itself stays in the namespace until
/// it is unlinked.
pub struct QueueReader {
  channel: Arc<Channel>,
}

impl QueueReader {
  pub(crate) fn new(channel: Arc<Channel>) -> Self {
    Self { channel }
  }

  pub fn name(&self) -> &str {
    &self.channel.name
  }

  pub fn attributes(&self) -> QueueAttributes {
    self.channel.attrs
  }

  pub fn message_size(&self) -> usize {
    self.channel.attrs.message_size
  }

  /// Number of messages currently queued.
  pub fn pending(&self) -> usize {
    self.channel.len()
  }

  pub(crate) fn channel_id(&self) -> u64 {
    self.channel.id
  }

  /// Waits for the next message.
  ///
  /// Fails with `QueueClosed` once the queue generation has been destroyed and
  /// everything queued before that has been drained.
  pub async fn recv(&self) -> Result<Bytes, CourierError> {
    self
      .channel
      .rx
      .recv()
      .await
      .map_err(|_| CourierError::QueueClosed(self.channel.name.clone()))
  }

  /// Takes a message if one is queued. `Ok(None)` means the queue is empty.
  pub fn try_recv(&self) -> Result<Option<Bytes>, CourierError> {
    match self.channel.rx.try_recv() {
      Ok(payload) => Ok(Some(payload)),
      Err(TryRecvError::Empty) => Ok(None),
      Err(TryRecvError::Closed) => Err(CourierError::QueueClosed(self.channel.name.clone())),
    }
  }

  /// Receives and decodes the next message as `M`.
  pub async fn recv_record<M: Record>(&self) -> Result<M, CourierError> {
    let payload = self.recv().await?;
    decode_record(&payload)
  }

  /// Releases this handle. Equivalent to dropping it: the release happens when
  /// `self` goes out of scope here, the queue itself stays linked.
  pub fn close(self) {
    tracing::trace!(queue = %self.channel.name, "Queue reader closed");
  }
}

impl fmt::Debug for QueueReader {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("QueueReader")
      .field("name", &self.channel.name)
      .field("attrs", &self.channel.attrs)
      .finish()
  }
}

/// Sending handle returned by [`Registry::open_writer`](crate::queue::Registry::open_writer).
pub struct QueueWriter {
  channel: Arc<Channel>,
}

impl QueueWriter {
  pub(crate) fn new(channel: Arc<Channel>) -> Self {
    Self { channel }
  }

  pub fn name(&self) -> &str {
    &self.channel.name
  }

  pub fn attributes(&self) -> QueueAttributes {
    self.channel.attrs
  }

  fn check_payload(&self, payload: &[u8]) -> Result<(), CourierError> {
    if payload.len() != self.channel.attrs.message_size {
      return Err(CourierError::MessageSizeMismatch {
        queue: self.channel.name.clone(),
        expected: self.channel.attrs.message_size,
        actual: payload.len(),
      });
    }
    Ok(())
  }

  /// Enqueues one message, suspending while the queue is at capacity.
  pub async fn send(&self, payload: &[u8]) -> Result<(), CourierError> {
    self.check_payload(payload)?;
    self
      .channel
      .tx
      .send(Bytes::copy_from_slice(payload))
      .await
      .map_err(|_| CourierError::QueueClosed(self.channel.name.clone()))?;
    tracing::trace!(queue = %self.channel.name, size = payload.len(), "Message enqueued");
    Ok(())
  }

  /// Blocking variant of [`send`](Self::send) for threads outside the async runtime.
  /// Must not be called from within an async task.
  pub fn send_blocking(&self, payload: &[u8]) -> Result<(), CourierError> {
    self.check_payload(payload)?;
    self
      .channel
      .tx
      .send_blocking(Bytes::copy_from_slice(payload))
      .map_err(|_| CourierError::QueueClosed(self.channel.name.clone()))
  }

  /// Enqueues one message without waiting; a full queue yields `QueueFull`.
  pub fn try_send(&self, payload: &[u8]) -> Result<(), CourierError> {
    self.check_payload(payload)?;
    match self.channel.tx.try_send(Bytes::copy_from_slice(payload)) {
      Ok(()) => Ok(()),
      Err(TrySendError::Full(_)) => Err(CourierError::QueueFull(self.channel.name.clone())),
      Err(TrySendError::Closed(_)) => Err(CourierError::QueueClosed(self.channel.name.clone())),
    }
  }

  /// Encodes and enqueues a record.
  pub async fn send_record<M: Record>(&self, record: &M) -> Result<(), CourierError> {
    let payload = encode_record(record)?;
    self.send(&payload).await
  }

  /// Releases this handle. Equivalent to dropping it: the release happens when
  /// `self` goes out of scope here, the queue itself stays linked.
  pub fn close(self) {
    tracing::trace!(queue = %self.channel.name, "Queue writer closed");
  }
}

impl fmt::Debug for QueueWriter {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("QueueWriter")
      .field("name", &self.channel.name)
      .field("attrs", &self.channel.attrs)
      .finish()
  }
}
