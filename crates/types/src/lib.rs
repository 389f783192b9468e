//! Core types for the metakv transactional key-value store.
//!
//! This crate provides the foundational types shared by the server, the
//! client SDK, and the wire-format crate:
//! - Key-value entry and read-set shapes ([`kv`])
//! - Byte-string key ordering helpers ([`key`])
//! - Fixed-width counter encoding ([`counter`])
//!
//! Keys are arbitrary non-empty byte strings compared in unsigned
//! lexicographic order. Values are opaque byte strings. Versions are
//! per-key `u64` counters assigned by the server; `0` is reserved for the
//! absent state and is never stored.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod counter;
pub mod key;
pub mod kv;

pub use kv::{CommitOutcome, Entry, ObservedEntry, Put, ReadRange, WRITE_CONFLICT};
