use std::fmt;

use serde_json::Value;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use imlink_core::protocol::text::Envelope;

/// Login sub-flow state. `Succeeded`/`Failed` are transient: the flow
/// reports the outcome and returns to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoginState {
    #[default]
    Idle,
    LoggingIn,
    Succeeded,
    Failed,
}

/// Password held only until the login request is encoded. Wiped on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    password: String,
}

impl Credentials {
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
        }
    }

    pub fn expose(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credentials(<redacted>)")
    }
}

/// One login attempt, alive between "login initiated" and "login resolved".
#[derive(Debug)]
pub struct SessionContext {
    pub pending_username: String,
    pub pending_request_id: Option<String>,
    pub credentials: Option<Credentials>,
}

impl SessionContext {
    pub fn new(username: String, password: &str) -> Self {
        Self {
            pending_username: username,
            pending_request_id: None,
            credentials: Some(Credentials::new(password)),
        }
    }

    /// Whether `request_id` is the login request this attempt is waiting on.
    pub fn awaits(&self, request_id: &str) -> bool {
        self.pending_request_id.as_deref() == Some(request_id)
    }
}

/// Serialize an envelope carrying secrets into a buffer that is wiped on
/// drop, then wipe every string value in its `data`.
///
/// The buffer is sized up front so it never reallocates and leaves a
/// partial copy behind.
pub fn encode_secret(envelope: &mut Envelope) -> Option<Zeroizing<String>> {
    let capacity = 128
        + envelope.msg_type.len()
        + envelope.action.len()
        + envelope.request_id.len()
        + envelope
            .data
            .iter()
            .map(|(k, v)| k.len() + v.as_str().map_or(32, |s| s.len() * 6))
            .sum::<usize>();
    let mut buf = Zeroizing::new(Vec::with_capacity(capacity));
    let written = serde_json::to_writer(&mut *buf, &*envelope);
    wipe_strings(envelope);
    if let Err(e) = written {
        tracing::error!(error = %e, "failed to encode login request");
        return None;
    }

    match String::from_utf8(std::mem::take(&mut *buf)) {
        Ok(text) => Some(Zeroizing::new(text)),
        Err(e) => {
            let mut bytes = e.into_bytes();
            bytes.zeroize();
            None
        }
    }
}

fn wipe_strings(envelope: &mut Envelope) {
    for value in envelope.data.values_mut() {
        if let Value::String(s) = value {
            s.zeroize();
        }
    }
}
