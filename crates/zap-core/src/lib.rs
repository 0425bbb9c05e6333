//! Core domain + coordination layer for zapsender.
//!
//! This crate is intentionally transport-agnostic. The chat session (pairing,
//! encryption, wire encoding) lives behind the `SessionClient` port and is
//! implemented in adapter crates.

pub mod app;
pub mod bomber;
pub mod config;
pub mod console;
pub mod dispatcher;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod messaging;
pub mod scheduler;
pub mod supervisor;
pub mod watcher;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{Error, Result};
