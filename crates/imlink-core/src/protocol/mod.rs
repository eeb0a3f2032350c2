//! Protocol modules.
//!
//! The wire format is a single JSON envelope per websocket frame. Text and
//! binary frames carry the same envelope; binary payloads are read as UTF-8.
//!
//! All parsers are panic-free: malformed input is reported as `DecodeError`
//! so a hostile or buggy peer cannot crash the client.

pub mod text;

/// Which websocket frame kind a payload arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Text,
    Binary,
}

impl FrameKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FrameKind::Text => "text",
            FrameKind::Binary => "binary",
        }
    }
}

/// Normalize a binary frame to text. Invalid sequences become U+FFFD.
pub fn binary_to_text(payload: &[u8]) -> String {
    String::from_utf8_lossy(payload).into_owned()
}
