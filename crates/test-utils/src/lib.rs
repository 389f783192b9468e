//! Shared test utilities for metakv crates.
//!
//! This crate provides common test helpers to reduce boilerplate across
//! test modules:
//!
//! - [`TestServer`] - In-process metakv server on an ephemeral port
//! - [`assert_eventually`] - Poll a condition until it's true or timeout

#![deny(unsafe_code)]

mod assertions;
mod server;

pub use assertions::assert_eventually;
pub use server::TestServer;
