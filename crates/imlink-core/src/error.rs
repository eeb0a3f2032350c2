//! Shared error types across imlink crates.

use thiserror::Error;

/// Stable machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Inbound text was not a JSON object.
    Malformed,
    /// A required envelope field was absent or had the wrong JSON kind.
    MissingField,
    /// Connect target could not be used as a WebSocket URL.
    InvalidAddress,
    /// Send attempted while the connection is not open.
    NotConnected,
    /// A request id was issued twice while still pending.
    DuplicateId,
    /// Network / socket level failure.
    Transport,
    /// Chat message was blank after trimming.
    EmptyMessage,
    /// A login is already in flight.
    LoginInFlight,
    /// Invalid configuration.
    BadConfig,
    /// Unsupported config version.
    UnsupportedVersion,
}

impl ErrorCode {
    /// String representation used in logs and test vectors.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Malformed => "MALFORMED",
            ErrorCode::MissingField => "MISSING_FIELD",
            ErrorCode::InvalidAddress => "INVALID_ADDRESS",
            ErrorCode::NotConnected => "NOT_CONNECTED",
            ErrorCode::DuplicateId => "DUPLICATE_ID",
            ErrorCode::Transport => "TRANSPORT",
            ErrorCode::EmptyMessage => "EMPTY_MESSAGE",
            ErrorCode::LoginInFlight => "LOGIN_IN_FLIGHT",
            ErrorCode::BadConfig => "BAD_CONFIG",
            ErrorCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
        }
    }
}

/// Envelope decoding failure. Decoding is all-or-nothing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("malformed envelope: {0}")]
    Malformed(String),
    #[error("envelope missing required field: {0}")]
    MissingField(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error("invalid websocket address: {0}")]
    InvalidAddress(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("websocket is not connected")]
    NotConnected,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CorrelatorError {
    #[error("request id already pending: {0}")]
    DuplicateId(String),
}

/// Coarse classification of socket failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Peer refused the TCP connection.
    Refused,
    /// Connection reset or aborted by the peer.
    PeerReset,
    /// HTTP upgrade / websocket handshake rejected.
    Handshake,
    /// Websocket protocol violation.
    Protocol,
    /// Any other I/O failure (including name resolution).
    Io,
    /// Socket closed underneath us.
    Closed,
}

impl TransportErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TransportErrorKind::Refused => "refused",
            TransportErrorKind::PeerReset => "peer_reset",
            TransportErrorKind::Handshake => "handshake",
            TransportErrorKind::Protocol => "protocol",
            TransportErrorKind::Io => "io",
            TransportErrorKind::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Errors surfaced synchronously by session operations (`login`, `send_message`).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("message is empty")]
    EmptyMessage,
    #[error("a login is already in progress")]
    LoginInFlight,
    #[error(transparent)]
    Connect(#[from] ConnectError),
    #[error(transparent)]
    Send(#[from] SendError),
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, ImLinkError>;

/// Unified error type used by core and client.
#[derive(Debug, Error)]
pub enum ImLinkError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Connect(#[from] ConnectError),
    #[error(transparent)]
    Send(#[from] SendError),
    #[error(transparent)]
    Correlator(#[from] CorrelatorError),
    #[error("transport: {0}")]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("config: {0}")]
    Config(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
}

impl ImLinkError {
    /// Map error to its stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            ImLinkError::Decode(DecodeError::Malformed(_)) => ErrorCode::Malformed,
            ImLinkError::Decode(DecodeError::MissingField(_)) => ErrorCode::MissingField,
            ImLinkError::Connect(_) => ErrorCode::InvalidAddress,
            ImLinkError::Send(_) => ErrorCode::NotConnected,
            ImLinkError::Correlator(_) => ErrorCode::DuplicateId,
            ImLinkError::Transport(_) => ErrorCode::Transport,
            ImLinkError::Session(e) => e.code(),
            ImLinkError::Config(_) => ErrorCode::BadConfig,
            ImLinkError::UnsupportedVersion => ErrorCode::UnsupportedVersion,
        }
    }
}

impl SessionError {
    pub fn code(&self) -> ErrorCode {
        match self {
            SessionError::EmptyMessage => ErrorCode::EmptyMessage,
            SessionError::LoginInFlight => ErrorCode::LoginInFlight,
            SessionError::Connect(_) => ErrorCode::InvalidAddress,
            SessionError::Send(_) => ErrorCode::NotConnected,
        }
    }
}

impl DecodeError {
    pub fn code(&self) -> ErrorCode {
        match self {
            DecodeError::Malformed(_) => ErrorCode::Malformed,
            DecodeError::MissingField(_) => ErrorCode::MissingField,
        }
    }
}
