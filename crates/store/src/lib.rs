//! metakv-store: the canonical ordered key-value store behind a metakv
//! server.
//!
//! The store is an ordered map `key → (value, version)` with four
//! operations:
//!
//! - **get** — point lookup returning the value and version
//! - **range** — ascending scan over `[start, end)` with an optional cap,
//!   optionally suppressing values (keys-only)
//! - **commit** — the OCC critical section: re-validate a read-set, then
//!   apply puts and deletes all-or-nothing
//! - **reset** — wipe every entry
//!
//! Versions are per-key and strictly monotonic across successful commits:
//! a put of a present key bumps `ver` by one, a put of an absent key
//! creates it at `ver = 1`, and a delete removes the entry entirely so a
//! later re-create starts over at `1`. There is no global sequence.
//!
//! # Concurrency
//!
//! Reads take a shared lock and may run concurrently with each other;
//! `commit` and `reset` take the exclusive lock, so no partial commit is
//! ever visible and the critical section is mutually exclusive with
//! itself. `commit` is a synchronous method — a hosting environment with
//! its own transactional primitive can wrap it directly.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod store;

pub use store::{CommitError, Store};
