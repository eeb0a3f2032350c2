//! Transport layer (WebSocket client).
//!
//! The socket is driven by one spawned I/O task per connect attempt. That task
//! never touches client state: it posts `TransportEvent`s onto a single
//! unbounded queue which the owning context drains and feeds to
//! `Connection::handle_transport`.

pub mod codec;
pub mod connection;
pub mod link;
pub mod ws;

pub use connection::{Connection, ConnectionEvent, ConnectionState};
pub use link::{Link, Outbound, Transport, TransportEvent};
pub use ws::WsTransport;
