//! Envelope codec (JSON).
//!
//! Wire shape: `{"type","action","request_id","data"}`, compact UTF-8, one
//! object per frame. Decoding is all-or-nothing: an object missing any of the
//! four fields (or carrying one with the wrong JSON kind) is rejected.

use serde::Serialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::error::DecodeError;

/// Protocol envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    /// Coarse category (field name is `type` in JSON), e.g. `AUTH`.
    #[serde(rename = "type")]
    pub msg_type: String,
    /// Verb within the category, e.g. `LOGIN`.
    pub action: String,
    /// Correlation token.
    pub request_id: String,
    /// Action-specific payload; insertion order is preserved.
    pub data: Map<String, Value>,
}

impl Envelope {
    /// Build an envelope with a freshly generated request id.
    pub fn new(
        msg_type: impl Into<String>,
        action: impl Into<String>,
        data: Map<String, Value>,
    ) -> Self {
        Self::with_request_id(msg_type, action, new_request_id(), data)
    }

    pub fn with_request_id(
        msg_type: impl Into<String>,
        action: impl Into<String>,
        request_id: impl Into<String>,
        data: Map<String, Value>,
    ) -> Self {
        Self {
            msg_type: msg_type.into(),
            action: action.into(),
            request_id: request_id.into(),
            data,
        }
    }

    /// `type` and `action` are both non-empty.
    pub fn is_valid(&self) -> bool {
        !self.msg_type.is_empty() && !self.action.is_empty()
    }

    /// True when `type`/`action` equal the given pair.
    pub fn is(&self, msg_type: &str, action: &str) -> bool {
        self.msg_type == msg_type && self.action == action
    }

    /// Compact JSON text for this envelope.
    pub fn to_text(&self) -> String {
        json!({
            "type": self.msg_type,
            "action": self.action,
            "request_id": self.request_id,
            "data": self.data,
        })
        .to_string()
    }
}

/// Fresh random correlation token (UUID v4, hyphenated, no braces).
pub fn new_request_id() -> String {
    Uuid::new_v4().hyphenated().to_string()
}

/// Encode an envelope. A missing or empty `request_id` is replaced by a new one.
pub fn encode(
    msg_type: &str,
    action: &str,
    data: Map<String, Value>,
    request_id: Option<&str>,
) -> String {
    let request_id = match request_id {
        Some(id) if !id.is_empty() => id.to_owned(),
        _ => new_request_id(),
    };
    Envelope::with_request_id(msg_type, action, request_id, data).to_text()
}

/// Decode one frame payload into an envelope.
pub fn decode(payload: &str) -> Result<Envelope, DecodeError> {
    let value: Value =
        serde_json::from_str(payload).map_err(|e| DecodeError::Malformed(e.to_string()))?;
    let Value::Object(mut obj) = value else {
        return Err(DecodeError::Malformed("envelope is not a json object".into()));
    };

    let msg_type = take_string(&mut obj, "type")?;
    let action = take_string(&mut obj, "action")?;
    let request_id = take_string(&mut obj, "request_id")?;
    let data = match obj.remove("data") {
        Some(Value::Object(map)) => map,
        _ => return Err(DecodeError::MissingField("data")),
    };
    if !obj.is_empty() {
        tracing::trace!(extra = ?obj.keys().collect::<Vec<_>>(), "ignoring unknown envelope keys");
    }

    Ok(Envelope {
        msg_type,
        action,
        request_id,
        data,
    })
}

fn take_string(obj: &mut Map<String, Value>, field: &'static str) -> Result<String, DecodeError> {
    match obj.remove(field) {
        Some(Value::String(s)) => Ok(s),
        _ => Err(DecodeError::MissingField(field)),
    }
}
