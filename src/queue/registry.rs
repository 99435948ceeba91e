// src/queue/registry.rs

use crate::error::CourierError;
use crate::message::{encode_record, Record};
use crate::queue::channel::{Channel, QueueAttributes, DEFAULT_QUEUE_CAPACITY};
use crate::queue::handle::{QueueReader, QueueWriter};

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;

/// Process-wide namespace used by the convenience functions at the crate root.
static GLOBAL_REGISTRY: Lazy<Registry> = Lazy::new(Registry::default);

/// Upper bounds enforced when a queue is created. Defaults follow the Linux
/// mqueue limits (`msgsize_max`, `HARD_MSGMAX`, `queues_max`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryLimits {
  pub max_message_size: usize,
  pub max_capacity: usize,
  pub max_queues: usize,
}

impl Default for RegistryLimits {
  fn default() -> Self {
    Self {
      max_message_size: 8192,
      max_capacity: 65_536,
      max_queues: 256,
    }
  }
}

#[derive(Debug)]
struct RegistryInner {
  /// Live namespace entries. Key is the queue name (e.g. "/sensor_tick").
  queues: parking_lot::RwLock<HashMap<String, Arc<Channel>>>,
  next_channel_id: AtomicU64,
  limits: RegistryLimits,
}

/// A flat namespace of named, fixed-message-size, bounded queues.
///
/// Two handles opened under the same name share one channel. Readers define a
/// queue's attributes: [`open_reader`](Self::open_reader) always recreates the
/// queue. Writers validate: [`open_writer`](Self::open_writer) reuses an
/// existing queue and rejects a different message size.
///
/// Registries are cheap to clone; clones share the namespace.
#[derive(Clone)]
pub struct Registry {
  inner: Arc<RegistryInner>,
}

impl Default for Registry {
  fn default() -> Self {
    Self::new(RegistryLimits::default())
  }
}

impl Registry {
  pub fn new(limits: RegistryLimits) -> Self {
    Self {
      inner: Arc::new(RegistryInner {
        queues: parking_lot::RwLock::new(HashMap::new()),
        next_channel_id: AtomicU64::new(1),
        limits,
      }),
    }
  }

  /// The process-wide registry.
  pub fn global() -> &'static Registry {
    &GLOBAL_REGISTRY
  }

  pub fn limits(&self) -> RegistryLimits {
    self.inner.limits
  }

  fn validate(&self, name: &str, attrs: &QueueAttributes) -> Result<(), CourierError> {
    if name.is_empty() {
      return Err(CourierError::invalid("queue name must not be empty"));
    }
    if attrs.message_size == 0 {
      return Err(CourierError::invalid(format!("queue {} declared with zero message size", name)));
    }
    let limits = &self.inner.limits;
    if attrs.message_size > limits.max_message_size {
      return Err(CourierError::ResourceLimitReached(format!(
        "message size {} for {} exceeds limit {}",
        attrs.message_size, name, limits.max_message_size
      )));
    }
    if attrs.capacity > limits.max_capacity {
      return Err(CourierError::ResourceLimitReached(format!(
        "capacity {} for {} exceeds limit {}",
        attrs.capacity, name, limits.max_capacity
      )));
    }
    Ok(())
  }

  fn create_channel(
    &self,
    queues: &mut HashMap<String, Arc<Channel>>,
    name: &str,
    attrs: QueueAttributes,
  ) -> Result<Arc<Channel>, CourierError> {
    if queues.len() >= self.inner.limits.max_queues {
      return Err(CourierError::ResourceLimitReached(format!(
        "queue count limit {} reached while creating {}",
        self.inner.limits.max_queues, name
      )));
    }
    let id = self.inner.next_channel_id.fetch_add(1, Ordering::Relaxed);
    let channel = Arc::new(Channel::new(id, name, attrs));
    queues.insert(name.to_string(), channel.clone());
    tracing::debug!(
      queue = %name,
      channel_id = id,
      message_size = attrs.message_size,
      capacity = attrs.capacity,
      "Queue created"
    );
    Ok(channel)
  }

  /// Creates `name` for receiving, destroying any previous instance so the
  /// requested attributes always win. A `capacity` of zero selects
  /// [`DEFAULT_QUEUE_CAPACITY`].
  pub fn open_reader(&self, name: &str, message_size: usize, capacity: usize) -> Result<QueueReader, CourierError> {
    let attrs = QueueAttributes::new(message_size, capacity);
    self.validate(name, &attrs)?;

    let mut queues = self.inner.queues.write();
    if let Some(stale) = queues.remove(name) {
      stale.destroy();
      if stale.attrs != attrs {
        tracing::warn!(
          queue = %name,
          old_message_size = stale.attrs.message_size,
          new_message_size = attrs.message_size,
          "Recreating queue with different attributes"
        );
      } else {
        tracing::debug!(queue = %name, channel_id = stale.id, "Replacing existing queue instance");
      }
    }
    let channel = self.create_channel(&mut queues, name, attrs)?;
    Ok(QueueReader::new(channel))
  }

  /// Opens `name` for sending, creating it with the given attributes if absent.
  ///
  /// An existing queue keeps its capacity; a different `message_size` is
  /// rejected with `MessageSizeMismatch`.
  pub fn open_writer(&self, name: &str, message_size: usize, capacity: usize) -> Result<QueueWriter, CourierError> {
    let attrs = QueueAttributes::new(message_size, capacity);
    self.validate(name, &attrs)?;

    if let Some(existing) = self.inner.queues.read().get(name) {
      return Self::attach_writer(existing, &attrs);
    }

    let mut queues = self.inner.queues.write();
    // Re-check: another opener may have created it between the two locks.
    if let Some(existing) = queues.get(name) {
      return Self::attach_writer(existing, &attrs);
    }
    let channel = self.create_channel(&mut queues, name, attrs)?;
    Ok(QueueWriter::new(channel))
  }

  fn attach_writer(existing: &Arc<Channel>, requested: &QueueAttributes) -> Result<QueueWriter, CourierError> {
    if existing.attrs.message_size != requested.message_size {
      return Err(CourierError::MessageSizeMismatch {
        queue: existing.name.clone(),
        expected: existing.attrs.message_size,
        actual: requested.message_size,
      });
    }
    if existing.attrs.capacity != requested.capacity {
      tracing::trace!(
        queue = %existing.name,
        capacity = existing.attrs.capacity,
        requested = requested.capacity,
        "Writer attached with existing queue capacity"
      );
    }
    Ok(QueueWriter::new(existing.clone()))
  }

  /// Opens a writer, sends one message and closes the writer.
  pub async fn send_to(&self, name: &str, payload: &[u8]) -> Result<(), CourierError> {
    let writer = self.open_writer(name, payload.len(), DEFAULT_QUEUE_CAPACITY)?;
    let result = writer.send(payload).await;
    writer.close();
    result
  }

  /// Blocking variant of [`send_to`](Self::send_to) for threads outside the async runtime.
  pub fn send_to_blocking(&self, name: &str, payload: &[u8]) -> Result<(), CourierError> {
    let writer = self.open_writer(name, payload.len(), DEFAULT_QUEUE_CAPACITY)?;
    let result = writer.send_blocking(payload);
    writer.close();
    result
  }

  /// Encodes `record` and sends it to `name` through an on-demand writer.
  pub async fn send_record_to<M: Record>(&self, name: &str, record: &M) -> Result<(), CourierError> {
    let payload = encode_record(record)?;
    self.send_to(name, &payload).await
  }

  /// Removes `name` from the namespace. Open handles keep working on the
  /// unlinked queue until they are closed.
  pub fn unlink(&self, name: &str) -> Result<(), CourierError> {
    match self.inner.queues.write().remove(name) {
      Some(channel) => {
        tracing::debug!(queue = %name, channel_id = channel.id, "Queue unlinked");
        Ok(())
      }
      None => Err(CourierError::QueueNotFound(name.to_string())),
    }
  }

  /// Unlinks `name` only if it still refers to the channel generation `channel_id`.
  /// Returns whether an entry was removed.
  pub(crate) fn unlink_if_current(&self, name: &str, channel_id: u64) -> bool {
    let mut queues = self.inner.queues.write();
    match queues.get(name) {
      Some(channel) if channel.id == channel_id => {
        queues.remove(name);
        tracing::debug!(queue = %name, channel_id, "Queue unlinked");
        true
      }
      Some(channel) => {
        tracing::debug!(
          queue = %name,
          channel_id,
          current_channel_id = channel.id,
          "Queue was recreated by another opener; leaving it linked"
        );
        false
      }
      None => false,
    }
  }

  pub fn contains(&self, name: &str) -> bool {
    self.inner.queues.read().contains_key(name)
  }

  /// Attributes of the queue currently linked under `name`.
  pub fn attributes(&self, name: &str) -> Option<QueueAttributes> {
    self.inner.queues.read().get(name).map(|c| c.attrs)
  }

  /// Number of linked queues.
  pub fn len(&self) -> usize {
    self.inner.queues.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Pushes bytes straight into the linked channel, bypassing writer validation.
  #[cfg(test)]
  pub(crate) fn inject_unchecked(&self, name: &str, payload: &[u8]) -> bool {
    match self.inner.queues.read().get(name) {
      Some(channel) => channel.tx.try_send(bytes::Bytes::copy_from_slice(payload)).is_ok(),
      None => false,
    }
  }
}

impl fmt::Debug for Registry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Registry")
      .field("queues", &self.len())
      .field("limits", &self.inner.limits)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tokio_test::{assert_pending, assert_ready_ok, task};

  #[test]
  fn open_reader_rejects_invalid_configuration() {
    let registry = Registry::default();
    assert!(matches!(
      registry.open_reader("", 4, 10),
      Err(CourierError::InvalidArgument(_))
    ));
    assert!(matches!(
      registry.open_reader("/zero", 0, 10),
      Err(CourierError::InvalidArgument(_))
    ));
    assert!(registry.is_empty());
  }

  #[test]
  fn zero_capacity_selects_default() {
    let registry = Registry::default();
    let reader = registry.open_reader("/default_cap", 4, 0).unwrap();
    assert_eq!(reader.attributes().capacity, DEFAULT_QUEUE_CAPACITY);
  }

  #[test]
  fn limits_are_resource_failures() {
    let registry = Registry::new(RegistryLimits {
      max_message_size: 16,
      max_capacity: 4,
      max_queues: 1,
    });
    let err = registry.open_reader("/big", 32, 1).unwrap_err();
    assert!(matches!(err, CourierError::ResourceLimitReached(_)));
    assert!(!err.is_invalid_input());
    assert!(matches!(
      registry.open_reader("/deep", 4, 5),
      Err(CourierError::ResourceLimitReached(_))
    ));

    let _first = registry.open_reader("/one", 4, 1).unwrap();
    assert!(matches!(
      registry.open_writer("/two", 4, 1),
      Err(CourierError::ResourceLimitReached(_))
    ));
    // Recreating an existing name does not count against the limit.
    assert!(registry.open_reader("/one", 8, 1).is_ok());
  }

  #[test]
  fn reader_recreates_queue_with_new_attributes() {
    let registry = Registry::default();
    let writer = registry.open_writer("/recreate", 4, 10).unwrap();
    writer.try_send(&[1, 2, 3, 4]).unwrap();

    let reader = registry.open_reader("/recreate", 8, 3).unwrap();
    assert_eq!(registry.attributes("/recreate"), Some(QueueAttributes::new(8, 3)));
    assert_eq!(reader.pending(), 0);
    // The writer held the destroyed generation.
    assert!(matches!(writer.try_send(&[0; 4]), Err(CourierError::QueueClosed(_))));
  }

  #[test]
  fn writer_validates_message_size_of_existing_queue() {
    let registry = Registry::default();
    let _reader = registry.open_reader("/sized", 8, 10).unwrap();
    let err = registry.open_writer("/sized", 4, 10).unwrap_err();
    assert_eq!(
      err,
      CourierError::MessageSizeMismatch {
        queue: "/sized".into(),
        expected: 8,
        actual: 4,
      }
    );
    // Capacity of the existing queue wins.
    let writer = registry.open_writer("/sized", 8, 99).unwrap();
    assert_eq!(writer.attributes().capacity, 10);
  }

  #[test]
  fn send_rejects_wrong_size_payload() {
    let registry = Registry::default();
    let _reader = registry.open_reader("/exact", 4, 10).unwrap();
    let writer = registry.open_writer("/exact", 4, 10).unwrap();
    assert!(matches!(
      writer.try_send(&[0; 3]),
      Err(CourierError::MessageSizeMismatch { expected: 4, actual: 3, .. })
    ));
  }

  #[tokio::test]
  async fn send_to_round_trips_bytes() {
    let registry = Registry::default();
    let reader = registry.open_reader("/courier_test_q", 8, 4).unwrap();
    registry.send_to("/courier_test_q", b"abcdefgh").await.unwrap();
    let got = reader.recv().await.unwrap();
    assert_eq!(&got[..], b"abcdefgh");
    assert_eq!(reader.try_recv().unwrap(), None);
  }

  #[test]
  fn unlink_keeps_live_handles_working() {
    let registry = Registry::default();
    let reader = registry.open_reader("/unlinked", 2, 10).unwrap();
    let writer = registry.open_writer("/unlinked", 2, 10).unwrap();

    registry.unlink("/unlinked").unwrap();
    assert!(!registry.contains("/unlinked"));
    assert!(matches!(
      registry.unlink("/unlinked"),
      Err(CourierError::QueueNotFound(_))
    ));

    writer.try_send(&[7, 7]).unwrap();
    assert_eq!(reader.try_recv().unwrap().as_deref(), Some(&[7u8, 7][..]));

    // A new opener gets a fresh, unrelated queue.
    let fresh = registry.open_writer("/unlinked", 2, 10).unwrap();
    fresh.try_send(&[1, 1]).unwrap();
    assert_eq!(reader.try_recv().unwrap(), None);
  }

  #[test]
  fn unlink_if_current_ignores_newer_generation() {
    let registry = Registry::default();
    let old = registry.open_reader("/gen", 4, 10).unwrap();
    let old_id = old.channel_id();
    let new = registry.open_reader("/gen", 4, 10).unwrap();

    assert!(!registry.unlink_if_current("/gen", old_id));
    assert!(registry.contains("/gen"));
    assert!(registry.unlink_if_current("/gen", new.channel_id()));
    assert!(!registry.contains("/gen"));
  }

  #[test]
  fn destroyed_generation_drains_then_reports_closed() {
    let registry = Registry::default();
    let old = registry.open_reader("/drain", 1, 10).unwrap();
    registry.open_writer("/drain", 1, 10).unwrap().try_send(&[9]).unwrap();
    let _new = registry.open_reader("/drain", 1, 10).unwrap();

    assert_eq!(old.try_recv().unwrap().as_deref(), Some(&[9u8][..]));
    assert!(matches!(old.try_recv(), Err(CourierError::QueueClosed(_))));
  }

  #[test]
  fn full_queue_suspends_sender_until_a_slot_drains() {
    let registry = Registry::default();
    let reader = registry.open_reader("/backpressure", 1, 10).unwrap();
    let writer = registry.open_writer("/backpressure", 1, 10).unwrap();

    for i in 0..10u8 {
      writer.try_send(&[i]).unwrap();
    }
    assert!(matches!(writer.try_send(&[10]), Err(CourierError::QueueFull(_))));

    let mut eleventh = task::spawn(writer.send(&[10]));
    assert_pending!(eleventh.poll());

    assert_eq!(reader.try_recv().unwrap().as_deref(), Some(&[0u8][..]));
    assert!(eleventh.is_woken());
    assert_ready_ok!(eleventh.poll());
    assert_eq!(reader.pending(), 10);
  }

  #[test]
  fn blocking_send_from_plain_thread() {
    let registry = Registry::default();
    let reader = registry.open_reader("/blocking", 4, 2).unwrap();
    let producer = registry.clone();
    let handle = std::thread::spawn(move || {
      for i in 0..4u32 {
        producer.send_to_blocking("/blocking", &i.to_le_bytes()).unwrap();
      }
    });

    let mut seen = Vec::new();
    while seen.len() < 4 {
      let payload = futures::executor::block_on(reader.recv()).unwrap();
      seen.push(u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]));
    }
    handle.join().unwrap();
    assert_eq!(seen, vec![0, 1, 2, 3]);
  }
}
