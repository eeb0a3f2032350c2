//! Display lines for the conversation view.

use std::fmt;

use chrono::{DateTime, Local};
use serde_json::{Map, Value};

use imlink_core::protocol::{text::Envelope, FrameKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    /// Decoded inbound envelope.
    Received { msg_type: String, action: String },
    /// Frame that failed to decode, shown verbatim.
    Raw(FrameKind),
    /// Local echo of an outgoing chat message.
    Sent,
    /// Client-side status (connectivity probe).
    Status,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DisplayLine {
    pub at: DateTime<Local>,
    pub kind: LineKind,
    pub text: String,
}

impl DisplayLine {
    fn now(kind: LineKind, text: String) -> Self {
        Self {
            at: Local::now(),
            kind,
            text,
        }
    }

    pub fn received(envelope: &Envelope) -> Self {
        Self::now(
            LineKind::Received {
                msg_type: envelope.msg_type.clone(),
                action: envelope.action.clone(),
            },
            display_text(&envelope.data),
        )
    }

    pub fn raw(kind: FrameKind, payload: &str) -> Self {
        Self::now(LineKind::Raw(kind), payload.to_owned())
    }

    pub fn sent(content: &str) -> Self {
        Self::now(LineKind::Sent, content.to_owned())
    }

    pub fn status(text: impl Into<String>) -> Self {
        Self::now(LineKind::Status, text.into())
    }
}

impl fmt::Display for DisplayLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.at.format("%H:%M:%S"))?;
        match &self.kind {
            LineKind::Received { msg_type, action } => {
                write!(f, "[{msg_type}/{action}] {}", self.text)
            }
            LineKind::Raw(kind) => write!(f, "{} raw: {}", kind.as_str(), self.text),
            LineKind::Sent => write!(f, "sent: {}", self.text),
            LineKind::Status => f.write_str(&self.text),
        }
    }
}

/// Text shown for an inbound payload.
///
/// Content precedence: `echo.content`, then `content`, then the whole `data`
/// object as compact JSON. `ok` and `message`, when present, are prefixed.
pub fn display_text(data: &Map<String, Value>) -> String {
    let content = data
        .get("echo")
        .and_then(|echo| echo.get("content"))
        .and_then(Value::as_str)
        .or_else(|| data.get("content").and_then(Value::as_str))
        .map(str::to_owned)
        .unwrap_or_else(|| Value::Object(data.clone()).to_string());

    let mut parts = Vec::with_capacity(3);
    if let Some(ok) = data.get("ok").and_then(Value::as_bool) {
        parts.push(if ok { "ok=true".to_owned() } else { "ok=false".to_owned() });
    }
    if let Some(message) = data.get("message").and_then(Value::as_str) {
        parts.push(message.to_owned());
    }
    parts.push(content);
    parts.join(" ").trim().to_owned()
}
