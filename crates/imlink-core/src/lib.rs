//! imlink core: transport-agnostic envelope codec and error types.
//!
//! This crate defines the wire-level contract (the JSON envelope) and the
//! error surface shared by the client runtime and any tooling. It carries no
//! transport or runtime dependencies so it can be reused in multiple contexts.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths must surface as typed errors so a client does not crash
//! on malformed input from the peer.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;

/// Shared result type.
pub use error::{ImLinkError, Result};
pub use protocol::text::Envelope;
