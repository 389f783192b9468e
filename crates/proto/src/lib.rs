//! Wire-format types and conversions for the metakv protocol.
//!
//! This crate provides:
//! - The protobuf envelope and message cases ([`wire`])
//! - Length-delimited frame codec configuration ([`frame`])
//! - Bidirectional conversions between domain types and wire types
//!   ([`convert`])
//!
//! # Architecture
//!
//! The wire types are hand-maintained prost derives rather than build-time
//! generated code, so the crate builds without `protoc`; the field numbers
//! in [`wire`] are the schema and MUST remain stable across versions.
//! Consumers needing only the envelope (the SDK, the server session) depend
//! on this crate without pulling in storage internals.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod convert;
pub mod frame;
pub mod wire;

pub use wire::{Envelope, envelope};
