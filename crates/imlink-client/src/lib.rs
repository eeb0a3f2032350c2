//! imlink client library entry.
//!
//! This crate wires the websocket transport, request correlator and session
//! flow into one reactor (`Client`). UI code calls its operations and drains
//! its events; it is also consumed by the `imlink-chat` binary and by
//! integration tests.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod client;
pub mod config;
pub mod dispatch;
pub mod events;
pub mod session;
pub mod transport;

pub use client::Client;
pub use events::ClientEvent;
