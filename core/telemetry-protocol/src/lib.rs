//! Wire types for the search telemetry collector.
//!
//! Shared by the recorder and anything that consumes its POST bodies, so the
//! two sides cannot drift apart. The collector stays the authority on what it
//! accepts; `EventPayload::validate` only encodes the structural minimum.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const MAX_PAYLOAD_BYTES: usize = 256 * 1024; // 256KB
pub const MAX_ACTION_LEN: usize = 64;

/// Timing metadata derived from the navigation trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMeta {
    /// Index of the trail step the event was recorded against.
    pub trail_step: usize,
    /// Milliseconds between the start and the end of the latest transition.
    pub prep_time: i64,
    /// Milliseconds between the end of the latest transition and the event.
    pub load_time: i64,
    #[serde(default)]
    pub client_version: Option<String>,
}

/// The JSON body POSTed for every accepted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventPayload {
    #[serde(default)]
    pub last_action: Option<String>,
    pub action: String,
    #[serde(default)]
    pub lang: Option<String>,
    pub logged_in: bool,
    pub data: Value,
    pub meta: EventMeta,
    pub session_id: String,
    pub session_start: String,
    pub action_no: u64,
    pub hist: usize,
}

/// Optional response body; lets the collector hand back its own view of the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ServerAck {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub action_no: Option<u64>,
}

impl ServerAck {
    pub fn is_empty(&self) -> bool {
        self.session_id.is_none() && self.action_no.is_none()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Checks an action label on its own, before any session state is touched.
pub fn validate_action(action: &str) -> Result<(), ErrorInfo> {
    if action.trim().is_empty() {
        return Err(ErrorInfo::new("invalid_action", "action is required"));
    }
    if action.len() > MAX_ACTION_LEN {
        return Err(ErrorInfo::new(
            "invalid_action",
            format!("action must be {} characters or fewer", MAX_ACTION_LEN),
        ));
    }
    Ok(())
}

impl EventPayload {
    pub fn validate(&self) -> Result<(), ErrorInfo> {
        validate_action(&self.action)?;

        if self.session_id.trim().is_empty() {
            return Err(ErrorInfo::new(
                "missing_field",
                "session_id is required",
            ));
        }

        if DateTime::parse_from_rfc3339(&self.session_start).is_err() {
            return Err(ErrorInfo::new(
                "invalid_timestamp",
                "session_start must be RFC3339",
            ));
        }

        if self.action_no == 0 {
            return Err(ErrorInfo::new(
                "invalid_action_no",
                "action_no starts at 1",
            ));
        }

        if self.hist == 0 || self.meta.trail_step >= self.hist {
            return Err(ErrorInfo::new(
                "invalid_meta",
                "trail_step must index into a non-empty history",
            ));
        }

        Ok(())
    }

    /// Serializes the payload, refusing bodies the collector would drop.
    pub fn to_body(&self) -> Result<Vec<u8>, ErrorInfo> {
        let body = serde_json::to_vec(self).map_err(|err| {
            ErrorInfo::new("invalid_payload", format!("failed to serialize: {}", err))
        })?;
        if body.len() > MAX_PAYLOAD_BYTES {
            return Err(ErrorInfo::new(
                "payload_too_large",
                format!("payload is {} bytes (max {})", body.len(), MAX_PAYLOAD_BYTES),
            ));
        }
        Ok(body)
    }
}

/// Reads a collector response leniently.
///
/// Anything that is not an object with at least one usable field yields `None`;
/// a blank `session_id` or a zero `action_no` is treated as absent.
pub fn parse_ack(body: &str) -> Option<ServerAck> {
    let value: Value = serde_json::from_str(body.trim()).ok()?;
    let object = value.as_object()?;

    let session_id = object
        .get("session_id")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string);
    let action_no = object
        .get("action_no")
        .and_then(|value| {
            value
                .as_u64()
                .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
        })
        .filter(|n| *n > 0);

    let ack = ServerAck {
        session_id,
        action_no,
    };
    (!ack.is_empty()).then_some(ack)
}
