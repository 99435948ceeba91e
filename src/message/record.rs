// src/message/record.rs

use crate::error::CourierError;

use bytes::{Buf, BufMut, Bytes, BytesMut};

/// A fixed-size, unframed payload.
///
/// Queues carry raw byte records with no header, type tag or version. The
/// binding between a queue name and the record layout is a contract between
/// the sender and the mailbox definition; `Record` makes that contract a type.
///
/// Implementations must write exactly `SIZE` bytes in `encode` and accept only
/// `SIZE`-byte buffers in `decode`. Multi-byte fields are little-endian.
pub trait Record: Sized + Send + 'static {
  /// Encoded length in bytes. Used as the queue's message size.
  const SIZE: usize;

  fn encode(&self, buf: &mut BytesMut);

  fn decode(buf: &[u8]) -> Result<Self, CourierError>;
}

/// Encodes `record` into a freshly allocated buffer of exactly `M::SIZE` bytes.
pub fn encode_record<M: Record>(record: &M) -> Result<Bytes, CourierError> {
  let mut buf = BytesMut::with_capacity(M::SIZE);
  record.encode(&mut buf);
  if buf.len() != M::SIZE {
    return Err(CourierError::InvalidMessage(format!(
      "{} encoded {} bytes, declared size is {}",
      std::any::type_name::<M>(),
      buf.len(),
      M::SIZE
    )));
  }
  Ok(buf.freeze())
}

/// Decodes a record after checking the buffer length against `M::SIZE`.
pub fn decode_record<M: Record>(buf: &[u8]) -> Result<M, CourierError> {
  if buf.len() != M::SIZE {
    return Err(CourierError::InvalidMessage(format!(
      "{} expects {} bytes, got {}",
      std::any::type_name::<M>(),
      M::SIZE,
      buf.len()
    )));
  }
  M::decode(buf)
}

impl<const N: usize> Record for [u8; N] {
  const SIZE: usize = N;

  fn encode(&self, buf: &mut BytesMut) {
    buf.put_slice(self);
  }

  fn decode(buf: &[u8]) -> Result<Self, CourierError> {
    <[u8; N]>::try_from(buf).map_err(|_| CourierError::InvalidMessage(format!("expected {} raw bytes", N)))
  }
}

macro_rules! impl_numeric_record {
  ($($ty:ty => $put:ident, $get:ident;)*) => {
    $(
      impl Record for $ty {
        const SIZE: usize = std::mem::size_of::<$ty>();

        fn encode(&self, buf: &mut BytesMut) {
          buf.$put(*self);
        }

        fn decode(mut buf: &[u8]) -> Result<Self, CourierError> {
          if buf.len() != Self::SIZE {
            return Err(CourierError::InvalidMessage(format!(
              "{} expects {} bytes, got {}",
              stringify!($ty),
              Self::SIZE,
              buf.len()
            )));
          }
          Ok(buf.$get())
        }
      }
    )*
  };
}

impl_numeric_record! {
  u8 => put_u8, get_u8;
  i32 => put_i32_le, get_i32_le;
  u32 => put_u32_le, get_u32_le;
  i64 => put_i64_le, get_i64_le;
  u64 => put_u64_le, get_u64_le;
  f32 => put_f32_le, get_f32_le;
  f64 => put_f64_le, get_f64_le;
}
