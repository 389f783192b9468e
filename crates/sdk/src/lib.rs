//! Client SDK for the metakv transactional key-value store.
//!
//! The SDK multiplexes every request over one ordered full-duplex framed
//! channel and runs short optimistic transactions against the remote
//! store: reads record `(key, version)` observations, writes are buffered
//! locally, and a single commit RPC validates and applies everything
//! atomically. Conflicts are retried transparently up to the caller's
//! budget.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use metakv_sdk::{Client, ClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> metakv_sdk::Result<()> {
//!     let config = ClientConfig::builder()
//!         .with_endpoint("127.0.0.1:9876")
//!         .build()?;
//!     let client = Client::connect(config).await?;
//!
//!     client.transaction(10, |txn| async move {
//!         let dir = txn.get(b"dir/1").await?;
//!         txn.set(b"dir/1/name", b"home");
//!         txn.incr_by(b"total_inodes", 1).await?;
//!         Ok(())
//!     }).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                 Client (public API)                  │
//! │  .transaction() │ .reset_all() │ .scan_prefix()      │
//! ├──────────────────────────────────────────────────────┤
//! │                 Transaction runtime                  │
//! │  buffered writes │ observed read-set │ retry loop    │
//! ├──────────────────────────────────────────────────────┤
//! │               Connection multiplexer                 │
//! │  id → waiter map │ single writer │ single reader     │
//! ├──────────────────────────────────────────────────────┤
//! │            Reconnect supervisor (backoff)            │
//! └──────────────────────────────────────────────────────┘
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backoff;
mod client;
mod config;
mod connection;
mod error;
mod txn;

// Public API exports
pub use client::{Client, InitInfo};
pub use config::{ClientConfig, ClientConfigBuilder, ReconnectPolicy};
pub use error::{Result, SdkError};
pub use txn::Txn;
