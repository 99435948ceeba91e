// src/message/mod.rs

//! Fixed-size message records carried by queues.

pub mod record;

pub use record::{decode_record, encode_record, Record};
