//! Client reactor: the single owning context for connection, correlator and
//! session state.
//!
//! All mutation happens inside `Client` methods. I/O tasks only post onto the
//! transport queue, which `next_event` drains one event at a time.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::Instant;

use imlink_core::error::{ConnectError, SessionError};
use imlink_core::protocol::{binary_to_text, FrameKind};

use crate::config::ClientConfig;
use crate::dispatch::Correlator;
use crate::events::ClientEvent;
use crate::session::{DisplayLine, LoginState, SessionFlow};
use crate::transport::{
    Connection, ConnectionEvent, ConnectionState, Transport, TransportEvent, WsTransport,
};

const CONNECTION_CLOSED: &str = "connection closed";

pub struct Client {
    cfg: ClientConfig,
    conn: Connection,
    inbox: mpsc::UnboundedReceiver<TransportEvent>,
    correlator: Correlator,
    session: SessionFlow,
    events: VecDeque<ClientEvent>,
}

impl Client {
    /// Client over the tokio-tungstenite transport.
    pub fn new(cfg: ClientConfig) -> Self {
        let transport = Arc::new(WsTransport::new(
            cfg.server.keepalive(),
            cfg.server.close_timeout(),
        ));
        Self::with_transport(cfg, transport)
    }

    pub fn with_transport(cfg: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        let (conn, inbox) = Connection::new(transport);
        Self {
            correlator: Correlator::with_timeout(cfg.login.timeout()),
            session: SessionFlow::new(&cfg.login),
            cfg,
            conn,
            inbox,
            events: VecDeque::new(),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.cfg
    }

    pub fn state(&self) -> ConnectionState {
        self.conn.state()
    }

    pub fn login_state(&self) -> LoginState {
        self.session.login_state()
    }

    /// Number of correlated requests awaiting a response.
    pub fn pending_requests(&self) -> usize {
        self.correlator.len()
    }

    /// Connect to the configured server.
    pub fn connect(&mut self) -> Result<(), ConnectError> {
        let url = self.cfg.server.url();
        self.connect_to(&url)
    }

    pub fn connect_to(&mut self, url: &str) -> Result<(), ConnectError> {
        let res = self.conn.connect(url);
        self.pump();
        res
    }

    pub fn login(&mut self, username: &str, password: &str) -> Result<(), SessionError> {
        let url = self.cfg.server.url();
        let res = self
            .session
            .login(&mut self.conn, &self.correlator, &url, username, password);
        self.pump();
        res
    }

    pub fn send_message(&mut self, conversation_id: &str, text: &str) -> Result<(), SessionError> {
        let res = self.session.send_message(&self.conn, conversation_id, text);
        if let Err(SessionError::Send(e)) = &res {
            self.events.push_back(ClientEvent::ErrorOccurred(e.to_string()));
        }
        self.pump();
        res
    }

    pub fn close(&mut self) {
        self.conn.close(None, None);
        self.pump();
    }

    pub fn close_with(&mut self, code: u16, reason: &str) {
        self.conn.close(Some(code), Some(reason.to_owned()));
        self.pump();
    }

    /// Connectivity check against local state only.
    pub fn probe(&self) -> (ConnectionState, DisplayLine) {
        let state = self.conn.state();
        let line = if state == ConnectionState::Connected {
            DisplayLine::status("connectivity: connected")
        } else {
            DisplayLine::status("connectivity: not connected")
        };
        (state, line)
    }

    /// Next already-queued event, without waiting.
    pub fn try_next_event(&mut self) -> Option<ClientEvent> {
        self.events.pop_front()
    }

    /// Wait for the next event. Cancel-safe.
    pub async fn next_event(&mut self) -> Option<ClientEvent> {
        loop {
            if let Some(ev) = self.events.pop_front() {
                return Some(ev);
            }
            let deadline = self.correlator.next_deadline();
            tokio::select! {
                ev = self.inbox.recv() => {
                    let ev = ev?;
                    self.conn.handle_transport(ev);
                    self.pump();
                }
                _ = sleep_until(deadline) => {
                    self.correlator.expire(Instant::now());
                    self.session.drain_outcomes();
                    self.events.extend(self.session.take_events());
                }
            }
        }
    }

    fn pump(&mut self) {
        while let Some(ev) = self.conn.next_emitted() {
            match ev {
                ConnectionEvent::StateChanged(state) => {
                    self.events.push_back(ClientEvent::StateChanged(state));
                }
                ConnectionEvent::Connected => {
                    self.events.push_back(ClientEvent::Connected);
                    self.session.on_connected(&self.conn, &self.correlator);
                }
                ConnectionEvent::Disconnected => {
                    self.events.push_back(ClientEvent::Disconnected);
                    self.correlator.cancel_all(CONNECTION_CLOSED);
                    self.session.on_connection_lost(CONNECTION_CLOSED);
                }
                ConnectionEvent::TextReceived(payload) => {
                    self.session
                        .on_payload(&self.correlator, &payload, FrameKind::Text);
                }
                ConnectionEvent::BinaryReceived(payload) => {
                    self.session
                        .on_payload(&self.correlator, &binary_to_text(&payload), FrameKind::Binary);
                }
                ConnectionEvent::ErrorOccurred(err) => {
                    self.events.push_back(ClientEvent::ErrorOccurred(err.message.clone()));
                    self.correlator.cancel_all(&err.message);
                    self.session.on_connection_lost(&err.message);
                }
            }
            self.events.extend(self.session.take_events());
        }
        self.events.extend(self.session.take_events());
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(d).await,
        None => std::future::pending::<()>().await,
    }
}
