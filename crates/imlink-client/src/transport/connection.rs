//! Connection state machine.
//!
//! ```text
//! Disconnected --connect--> Connecting --opened--> Connected --close--> Closing
//!      ^                        |                      |                   |
//!      +-------- failed --------+---- closed/failed ---+---- closed -------+
//! ```
//!
//! The connection never retries on its own. Every transition is queued as a
//! `ConnectionEvent` for the owning context to pick up via `next_emitted`.

use std::collections::VecDeque;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use url::Url;

use imlink_core::error::{ConnectError, SendError, TransportError};

use crate::transport::link::{Link, LinkEvent, Outbound, Transport, TransportEvent};

const CLOSE_NORMAL: u16 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Closing,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Closing => "closing",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    Connected,
    Disconnected,
    StateChanged(ConnectionState),
    TextReceived(String),
    BinaryReceived(Bytes),
    ErrorOccurred(TransportError),
}

pub struct Connection {
    transport: Arc<dyn Transport>,
    state: ConnectionState,
    url: Option<Url>,
    /// Bumped per connect attempt; events from older attempts are dropped.
    generation: u64,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
    outbound: Option<mpsc::UnboundedSender<Outbound>>,
    emitted: VecDeque<ConnectionEvent>,
}

impl Connection {
    /// Returns the connection and the receiving end of its transport queue.
    pub fn new(transport: Arc<dyn Transport>) -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let conn = Self {
            transport,
            state: ConnectionState::Disconnected,
            url: None,
            generation: 0,
            events_tx,
            outbound: None,
            emitted: VecDeque::new(),
        };
        (conn, events_rx)
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// URL of the most recent connect attempt.
    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    /// Start a connect attempt. Must be called from within a tokio runtime.
    pub fn connect(&mut self, url: &str) -> Result<(), ConnectError> {
        if self.state != ConnectionState::Disconnected {
            tracing::warn!(state = self.state.as_str(), "already connected or connecting");
            return Ok(());
        }
        let url = parse_ws_url(url)?;

        self.generation += 1;
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        self.outbound = Some(out_tx);
        self.url = Some(url.clone());
        self.set_state(ConnectionState::Connecting);

        tracing::info!(%url, generation = self.generation, "connecting");
        let link = Link::new(self.generation, self.events_tx.clone(), out_rx);
        let transport = Arc::clone(&self.transport);
        tokio::spawn(async move {
            transport.run(url, link).await;
        });
        Ok(())
    }

    /// Queue one text frame for delivery.
    pub fn send(&self, payload: String) -> Result<(), SendError> {
        if self.state != ConnectionState::Connected {
            tracing::warn!(state = self.state.as_str(), "not connected, cannot send data");
            return Err(SendError::NotConnected);
        }
        let out = self.outbound.as_ref().ok_or(SendError::NotConnected)?;
        tracing::debug!(bytes = payload.len(), "sending text frame");
        out.send(Outbound::Text(payload))
            .map_err(|_| SendError::NotConnected)
    }

    /// Request an orderly shutdown. No-op unless connected.
    pub fn close(&mut self, code: Option<u16>, reason: Option<String>) {
        if self.state != ConnectionState::Connected {
            return;
        }
        self.set_state(ConnectionState::Closing);
        let frame = Outbound::Close {
            code: code.unwrap_or(CLOSE_NORMAL),
            reason: reason.unwrap_or_default(),
        };
        let delivered = self
            .outbound
            .as_ref()
            .map(|out| out.send(frame).is_ok())
            .unwrap_or(false);
        if !delivered {
            // I/O task already gone; nothing will confirm the teardown.
            self.teardown(None);
        }
    }

    /// Apply one event posted by the I/O task.
    pub fn handle_transport(&mut self, ev: TransportEvent) {
        if ev.generation != self.generation {
            tracing::debug!(
                event_generation = ev.generation,
                generation = self.generation,
                "dropping event from superseded connection"
            );
            return;
        }
        match ev.event {
            LinkEvent::Opened => {
                if self.state == ConnectionState::Connecting {
                    tracing::info!("connected to server");
                    self.set_state(ConnectionState::Connected);
                    self.emitted.push_back(ConnectionEvent::Connected);
                }
            }
            LinkEvent::Text(s) => {
                if self.is_open() {
                    tracing::debug!(bytes = s.len(), "received text frame");
                    self.emitted.push_back(ConnectionEvent::TextReceived(s));
                }
            }
            LinkEvent::Binary(b) => {
                if self.is_open() {
                    tracing::debug!(bytes = b.len(), "received binary frame");
                    self.emitted.push_back(ConnectionEvent::BinaryReceived(b));
                }
            }
            LinkEvent::Closed => self.teardown(None),
            LinkEvent::Failed(err) => self.teardown(Some(err)),
        }
    }

    /// Pop the next queued event.
    pub fn next_emitted(&mut self) -> Option<ConnectionEvent> {
        self.emitted.pop_front()
    }

    fn is_open(&self) -> bool {
        matches!(self.state, ConnectionState::Connected | ConnectionState::Closing)
    }

    fn teardown(&mut self, err: Option<TransportError>) {
        if self.state == ConnectionState::Disconnected && err.is_none() {
            return;
        }
        let was_open = self.is_open();
        self.outbound = None;

        if let Some(err) = err {
            tracing::warn!(kind = err.kind.as_str(), error = %err.message, "socket error");
            self.emitted.push_back(ConnectionEvent::ErrorOccurred(err));
        }
        self.set_state(ConnectionState::Disconnected);
        if was_open {
            tracing::info!("disconnected from server");
            self.emitted.push_back(ConnectionEvent::Disconnected);
        }
    }

    fn set_state(&mut self, next: ConnectionState) {
        if self.state == next {
            return;
        }
        tracing::debug!(from = self.state.as_str(), to = next.as_str(), "connection state");
        self.state = next;
        self.emitted.push_back(ConnectionEvent::StateChanged(next));
    }
}

/// Accept only absolute `ws://` / `wss://` URLs with a host.
pub fn parse_ws_url(raw: &str) -> Result<Url, ConnectError> {
    let url = Url::parse(raw).map_err(|_| ConnectError::InvalidAddress(raw.to_owned()))?;
    let scheme_ok = matches!(url.scheme(), "ws" | "wss");
    let host_ok = url.host_str().map(|h| !h.is_empty()).unwrap_or(false);
    if !scheme_ok || !host_ok {
        return Err(ConnectError::InvalidAddress(raw.to_owned()));
    }
    Ok(url)
}
