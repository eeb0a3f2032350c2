//! Translation between tungstenite messages and transport-level frames.
//!
//! - Text / Binary are surfaced as payloads
//! - Ping / Pong / Close are surfaced for lifecycle handling
//! - tungstenite errors are classified into `TransportErrorKind`

use std::io;

use bytes::Bytes;
use tokio_tungstenite::tungstenite::{
    self,
    error::ProtocolError,
    protocol::{frame::coding::CloseCode, CloseFrame},
    Message,
};

use imlink_core::error::{TransportError, TransportErrorKind};

use crate::transport::link::Outbound;

#[derive(Debug)]
pub enum Inbound {
    Text(String),
    Binary(Bytes),
    Ping(Bytes),
    Pong(Bytes),
    Close(Option<(u16, String)>),
}

/// `None` for raw frames, which only appear when writing.
pub fn decode(msg: Message) -> Option<Inbound> {
    match msg {
        Message::Text(s) => Some(Inbound::Text(s.as_str().to_owned())),
        Message::Binary(b) => Some(Inbound::Binary(b)),
        Message::Ping(b) => Some(Inbound::Ping(b)),
        Message::Pong(b) => Some(Inbound::Pong(b)),
        Message::Close(frame) => Some(Inbound::Close(
            frame.map(|f| (u16::from(f.code), f.reason.as_str().to_owned())),
        )),
        Message::Frame(_) => None,
    }
}

pub fn encode(out: Outbound) -> Message {
    match out {
        Outbound::Text(s) => Message::Text(s.into()),
        Outbound::Close { code, reason } => Message::Close(Some(CloseFrame {
            code: CloseCode::from(code),
            reason: reason.into(),
        })),
    }
}

/// True for errors that just mean "the close handshake finished".
pub fn is_clean_close(err: &tungstenite::Error) -> bool {
    matches!(
        err,
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed
    )
}

pub fn map_error(err: tungstenite::Error) -> TransportError {
    let kind = match &err {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
            TransportErrorKind::Closed
        }
        tungstenite::Error::Io(e) => match e.kind() {
            io::ErrorKind::ConnectionRefused => TransportErrorKind::Refused,
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof => TransportErrorKind::PeerReset,
            _ => TransportErrorKind::Io,
        },
        tungstenite::Error::Protocol(ProtocolError::ResetWithoutClosingHandshake) => {
            TransportErrorKind::PeerReset
        }
        tungstenite::Error::Protocol(_) | tungstenite::Error::Capacity(_) => {
            TransportErrorKind::Protocol
        }
        tungstenite::Error::Http(_)
        | tungstenite::Error::HttpFormat(_)
        | tungstenite::Error::Url(_) => TransportErrorKind::Handshake,
        _ => TransportErrorKind::Io,
    };
    TransportError::new(kind, err.to_string())
}
