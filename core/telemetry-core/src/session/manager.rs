//! Session lifecycle and duplicate suppression.
//!
//! ```text
//!            no record / unreadable / idle > timeout
//!   Absent ─────────────────────────────────────────► Active (action 1)
//!                                                      │  ▲
//!                         accepted event: count += 1   └──┘
//!                         duplicate (action, hash): no change
//! ```
//!
//! Every admission is a read-modify-write of the stored record. Callers hold
//! the manager behind a `Mutex` so admissions and server reconciliation never
//! interleave.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use telemetry_protocol::ServerAck;
use tracing::{debug, info, warn};

use super::types::Session;
use crate::error::{Result, TelemetryError};
use crate::storage::SessionStorage;

/// Digest of the serialized event data. Identical serializations are
/// indistinguishable, which is exactly what duplicate suppression compares.
pub fn payload_hash(data: &Value) -> String {
    let serialized = data.to_string();
    format!("{:x}", md5::compute(serialized.as_bytes()))
}

/// What the tracker needs to stamp on an accepted event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedEvent {
    pub session_id: String,
    pub session_start: DateTime<Utc>,
    pub action_no: u64,
    /// The action accepted before this one, if any, in this session.
    pub last_action: Option<String>,
    pub new_session: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Accepted(AcceptedEvent),
    Duplicate,
}

pub struct SessionManager {
    storage: Arc<dyn SessionStorage>,
    key: String,
    timeout: Duration,
}

impl SessionManager {
    pub fn new(storage: Arc<dyn SessionStorage>, key: &str, timeout_secs: i64) -> Self {
        Self {
            storage,
            key: key.to_string(),
            timeout: Duration::seconds(timeout_secs),
        }
    }

    /// Reads the stored session. Unreadable records are treated as absent.
    pub fn current(&self) -> Result<Option<Session>> {
        let Some(content) = self.storage.get(&self.key)? else {
            return Ok(None);
        };
        match serde_json::from_str::<Session>(&content) {
            Ok(session) => Ok(Some(session)),
            Err(err) => {
                warn!(error = %err, "Discarding unreadable session record");
                Ok(None)
            }
        }
    }

    fn persist(&self, session: &Session) -> Result<()> {
        let content = serde_json::to_string(session).map_err(|source| TelemetryError::Json {
            context: "serialize session".to_string(),
            source,
        })?;
        self.storage.set(&self.key, &content)
    }

    /// Accepts or suppresses `(action, data)` and persists the outcome.
    pub fn admit(&mut self, action: &str, data: &Value, now: DateTime<Utc>) -> Result<Admission> {
        let hash = payload_hash(data);

        let (mut session, new_session) = match self.current()? {
            Some(session) if !session.is_expired(now, self.timeout) => (session, false),
            Some(expired) => {
                info!(
                    previous_session = %expired.id,
                    idle_secs = now.signed_duration_since(expired.last_active_at).num_seconds(),
                    "Session expired; starting a new one"
                );
                (Session::start(now), true)
            }
            None => (Session::start(now), true),
        };

        if !new_session && session.is_duplicate(action, &hash) {
            debug!(action = %action, session_id = %session.id, "Suppressing duplicate event");
            return Ok(Admission::Duplicate);
        }

        let last_action = session.last_action.take();
        if !new_session {
            session.last_action_count += 1;
        }
        session.last_active_at = now;
        session.last_action = Some(action.to_string());
        session.last_payload_hash = Some(hash);
        self.persist(&session)?;

        Ok(Admission::Accepted(AcceptedEvent {
            session_id: session.id,
            session_start: session.created_at,
            action_no: session.last_action_count,
            last_action,
            new_session,
        }))
    }

    /// Adopts server-assigned values for the session an event was sent under.
    ///
    /// Only applied while the stored record still has the id and action count
    /// that were sent; anything accepted in between wins. Returns whether the
    /// record changed.
    pub fn reconcile(
        &mut self,
        sent_session_id: &str,
        sent_action_no: u64,
        ack: &ServerAck,
    ) -> Result<bool> {
        let Some(mut session) = self.current()? else {
            return Ok(false);
        };
        if session.id != sent_session_id || session.last_action_count != sent_action_no {
            debug!(
                sent_session_id = %sent_session_id,
                current_session_id = %session.id,
                "Skipping reconciliation for a superseded event"
            );
            return Ok(false);
        }

        let mut changed = false;
        if let Some(server_id) = ack.session_id.as_deref() {
            if server_id != session.id {
                session.id = server_id.to_string();
                changed = true;
            }
        }
        if let Some(server_no) = ack.action_no {
            if server_no != session.last_action_count {
                session.last_action_count = server_no;
                changed = true;
            }
        }

        if changed {
            debug!(
                session_id = %session.id,
                action_no = session.last_action_count,
                "Reconciled session with collector"
            );
            self.persist(&session)?;
        }
        Ok(changed)
    }
}
