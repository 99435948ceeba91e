// src/queue/channel.rs

//! The bounded channel behind one queue name, based on `async-channel`.

use bytes::Bytes;

/// Default number of messages a queue holds before senders are suspended.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// Attributes fixed when a queue is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueAttributes {
  /// Exact size in bytes of every message on the queue.
  pub message_size: usize,
  /// Maximum number of queued messages.
  pub capacity: usize,
}

impl QueueAttributes {
  /// Builds attributes, mapping a zero capacity to [`DEFAULT_QUEUE_CAPACITY`].
  pub fn new(message_size: usize, capacity: usize) -> Self {
    Self {
      message_size,
      capacity: if capacity > 0 { capacity } else { DEFAULT_QUEUE_CAPACITY },
    }
  }
}

/// Shared state of one queue generation. Readers, writers and the registry entry
/// all hold an `Arc<Channel>`; both channel ends live here so the channel only
/// closes when it is explicitly destroyed.
#[derive(Debug)]
pub(crate) struct Channel {
  /// Generation id, unique within a registry.
  pub(crate) id: u64,
  pub(crate) name: String,
  pub(crate) attrs: QueueAttributes,
  pub(crate) tx: async_channel::Sender<Bytes>,
  pub(crate) rx: async_channel::Receiver<Bytes>,
}

impl Channel {
  pub(crate) fn new(id: u64, name: &str, attrs: QueueAttributes) -> Self {
    let (tx, rx) = async_channel::bounded(attrs.capacity.max(1));
    Self {
      id,
      name: name.to_string(),
      attrs,
      tx,
      rx,
    }
  }

  /// Destroys this generation: pending senders fail, readers drain what is left
  /// and then observe the closure.
  pub(crate) fn destroy(&self) {
    self.tx.close();
  }

  pub(crate) fn len(&self) -> usize {
    self.rx.len()
  }
}
