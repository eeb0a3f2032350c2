//! Login handshake and chat exchange.
//!
//! Login: `Idle -> LoggingIn -> {Succeeded, Failed} -> Idle`, one attempt in
//! flight at a time. The flow borrows the connection and correlator per call
//! and never owns them. Login replies come back through correlator callbacks
//! that post onto this flow's own queue; `drain_outcomes` applies them.
//!
//! Chat: `send_message` is fire-and-forget. Inbound envelopes the correlator
//! does not claim are rendered as received lines; undecodable frames are
//! rendered raw.

use std::collections::VecDeque;

use serde_json::{Map, Value};
use tokio::sync::mpsc;

use imlink_core::error::SessionError;
use imlink_core::protocol::{text, text::Envelope, FrameKind};

use crate::config::LoginSection;
use crate::dispatch::{Correlator, Dispatch, Reply};
use crate::events::ClientEvent;
use crate::session::login::{self, LoginState, SessionContext};
use crate::session::render::DisplayLine;
use crate::transport::{Connection, ConnectionState};

const AUTH: &str = "AUTH";
const LOGIN: &str = "LOGIN";
const MESSAGE: &str = "MESSAGE";
const SEND: &str = "SEND";

#[derive(Debug)]
enum LoginOutcome {
    Reply(Reply),
    Failed { request_id: String, reason: String },
}

pub struct SessionFlow {
    state: LoginState,
    ctx: Option<SessionContext>,
    failure_message: String,
    default_username: String,
    outcomes_tx: mpsc::UnboundedSender<LoginOutcome>,
    outcomes_rx: mpsc::UnboundedReceiver<LoginOutcome>,
    events: VecDeque<ClientEvent>,
}

impl SessionFlow {
    pub fn new(cfg: &LoginSection) -> Self {
        let (outcomes_tx, outcomes_rx) = mpsc::unbounded_channel();
        Self {
            state: LoginState::Idle,
            ctx: None,
            failure_message: cfg.failure_message.clone(),
            default_username: cfg.default_username.clone(),
            outcomes_tx,
            outcomes_rx,
            events: VecDeque::new(),
        }
    }

    pub fn login_state(&self) -> LoginState {
        self.state
    }

    pub fn context(&self) -> Option<&SessionContext> {
        self.ctx.as_ref()
    }

    /// Start a login. Connects first when needed; the request goes out on `connected`.
    pub fn login(
        &mut self,
        conn: &mut Connection,
        correlator: &Correlator,
        url: &str,
        username: &str,
        password: &str,
    ) -> Result<(), SessionError> {
        if self.state == LoginState::LoggingIn {
            tracing::warn!("login rejected, another login is in flight");
            return Err(SessionError::LoginInFlight);
        }

        let username = match username.trim() {
            "" => self.default_username.clone(),
            name => name.to_owned(),
        };
        tracing::info!(%username, "start login request");
        self.ctx = Some(SessionContext::new(username, password));
        self.state = LoginState::LoggingIn;

        if conn.state() == ConnectionState::Connected {
            self.issue_login(conn, correlator);
            return Ok(());
        }
        if let Err(e) = conn.connect(url) {
            tracing::warn!(error = %e, "login aborted, bad server address");
            self.ctx = None;
            self.state = LoginState::Idle;
            return Err(e.into());
        }
        Ok(())
    }

    pub fn on_connected(&mut self, conn: &Connection, correlator: &Correlator) {
        if self.state == LoginState::LoggingIn {
            self.issue_login(conn, correlator);
        }
    }

    /// Connection errored or went away. Call after the correlator's `cancel_all`.
    pub fn on_connection_lost(&mut self, reason: &str) {
        self.drain_outcomes();
        if self.state == LoginState::LoggingIn {
            self.finish_failure(reason.to_owned());
        }
    }

    /// Handle one inbound frame payload.
    pub fn on_payload(&mut self, correlator: &Correlator, payload: &str, kind: FrameKind) {
        match text::decode(payload) {
            Ok(envelope) => match correlator.dispatch_incoming(envelope) {
                Dispatch::Handled { .. } => self.drain_outcomes(),
                Dispatch::Unmatched(envelope) => {
                    self.emit(ClientEvent::MessageDisplay(DisplayLine::received(&envelope)));
                }
            },
            Err(e) => {
                tracing::warn!(
                    source = kind.as_str(),
                    error = %e,
                    %payload,
                    "protocol parse failed"
                );
                self.emit(ClientEvent::MessageDisplay(DisplayLine::raw(kind, payload)));
            }
        }
    }

    /// Send one chat line. No reply is correlated.
    pub fn send_message(
        &mut self,
        conn: &Connection,
        conversation_id: &str,
        text: &str,
    ) -> Result<(), SessionError> {
        let content = text.trim();
        if content.is_empty() {
            return Err(SessionError::EmptyMessage);
        }

        let mut data = Map::new();
        data.insert("conversation_id".into(), Value::from(conversation_id));
        data.insert("content".into(), Value::from(content));
        conn.send(text::encode(MESSAGE, SEND, data, None))?;

        tracing::info!(%conversation_id, "MESSAGE SEND");
        self.emit(ClientEvent::MessageDisplay(DisplayLine::sent(content)));
        Ok(())
    }

    /// Apply login outcomes posted by correlator callbacks.
    pub fn drain_outcomes(&mut self) {
        while let Ok(outcome) = self.outcomes_rx.try_recv() {
            match outcome {
                LoginOutcome::Reply(reply) => self.on_login_reply(reply),
                LoginOutcome::Failed { request_id, reason } => {
                    if self.awaiting(&request_id) {
                        self.finish_failure(reason);
                    }
                }
            }
        }
    }

    pub fn take_events(&mut self) -> impl Iterator<Item = ClientEvent> + '_ {
        self.events.drain(..)
    }

    fn issue_login(&mut self, conn: &Connection, correlator: &Correlator) {
        let Some(ctx) = self.ctx.as_mut() else {
            return;
        };
        if ctx.pending_request_id.is_some() {
            return;
        }
        let Some(credentials) = ctx.credentials.take() else {
            return;
        };

        let mut data = Map::new();
        data.insert("username".into(), Value::from(ctx.pending_username.as_str()));
        data.insert("password".into(), Value::from(credentials.expose()));
        drop(credentials);
        let mut envelope = Envelope::new(AUTH, LOGIN, data);
        let Some(payload) = login::encode_secret(&mut envelope) else {
            self.finish_failure(self.failure_message.clone());
            return;
        };

        let request_id = envelope.request_id.clone();
        let resolve_tx = self.outcomes_tx.clone();
        let fail_tx = self.outcomes_tx.clone();
        let fail_id = request_id.clone();
        let issued = correlator.issue_with_failure(
            &envelope,
            move |reply| {
                let _ = resolve_tx.send(LoginOutcome::Reply(reply));
            },
            move |reason| {
                let _ = fail_tx.send(LoginOutcome::Failed {
                    request_id: fail_id,
                    reason,
                });
            },
        );
        if let Err(e) = issued {
            self.finish_failure(e.to_string());
            return;
        }
        ctx.pending_request_id = Some(request_id.clone());

        // The transport gets its own copy; ours is wiped when `payload` drops.
        match conn.send(String::clone(&payload)) {
            Ok(()) => tracing::info!(%request_id, "AUTH LOGIN sent"),
            Err(e) => {
                correlator.cancel(&request_id, &e.to_string());
                self.drain_outcomes();
            }
        }
    }

    fn on_login_reply(&mut self, reply: Reply) {
        if !self.awaiting(&reply.envelope.request_id) {
            return;
        }
        let data = &reply.envelope.data;
        let message = data
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .unwrap_or_else(|| self.failure_message.clone());

        if !reply.confirmed {
            self.finish_failure(message);
            return;
        }
        if data.get("ok").and_then(Value::as_bool) == Some(true) {
            self.finish_success();
        } else {
            self.finish_failure(message);
        }
    }

    fn awaiting(&self, request_id: &str) -> bool {
        self.state == LoginState::LoggingIn
            && self.ctx.as_ref().map(|c| c.awaits(request_id)).unwrap_or(false)
    }

    fn finish_success(&mut self) {
        let username = self.ctx.take().map(|c| c.pending_username).unwrap_or_default();
        self.state = LoginState::Succeeded;
        tracing::info!(%username, "login success");
        self.emit(ClientEvent::LoginSuccess(username));
        self.state = LoginState::Idle;
    }

    fn finish_failure(&mut self, reason: String) {
        self.ctx = None;
        self.state = LoginState::Failed;
        tracing::warn!(%reason, "login failed");
        self.emit(ClientEvent::LoginFailure(reason));
        self.state = LoginState::Idle;
    }

    fn emit(&mut self, event: ClientEvent) {
        self.events.push_back(event);
    }
}
