//! Persisted session record.
//!
//! Stored as JSON text under a fixed key in tab-scoped storage. Fields are
//! defaulted so that a record written by an older client still loads.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    #[serde(default)]
    pub last_action: Option<String>,
    #[serde(default = "default_action_count")]
    pub last_action_count: u64,
    #[serde(default)]
    pub last_payload_hash: Option<String>,
}

fn default_action_count() -> u64 {
    1
}

impl Session {
    pub fn start(now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: now,
            last_active_at: now,
            last_action: None,
            last_action_count: 1,
            last_payload_hash: None,
        }
    }

    /// Expired when inactive for strictly longer than `timeout`.
    pub fn is_expired(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        now.signed_duration_since(self.last_active_at) > timeout
    }

    pub fn is_duplicate(&self, action: &str, payload_hash: &str) -> bool {
        self.last_action.as_deref() == Some(action)
            && self.last_payload_hash.as_deref() == Some(payload_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_starts_at_action_one() {
        let now = Utc::now();
        let session = Session::start(now);
        assert_eq!(session.created_at, now);
        assert_eq!(session.last_active_at, now);
        assert_eq!(session.last_action_count, 1);
        assert!(session.last_action.is_none());
        assert!(uuid::Uuid::parse_str(&session.id).is_ok());
    }

    #[test]
    fn expiry_boundary() {
        let now = Utc::now();
        let timeout = Duration::seconds(1800);
        let session = Session::start(now);

        assert!(!session.is_expired(now + Duration::seconds(1800), timeout));
        assert!(session.is_expired(now + Duration::seconds(1801), timeout));
    }

    #[test]
    fn duplicate_requires_action_and_hash() {
        let mut session = Session::start(Utc::now());
        assert!(!session.is_duplicate("search", "abc"));

        session.last_action = Some("search".into());
        session.last_payload_hash = Some("abc".into());
        assert!(session.is_duplicate("search", "abc"));
        assert!(!session.is_duplicate("search", "abd"));
        assert!(!session.is_duplicate("refinement", "abc"));
    }

    #[test]
    fn loads_record_with_missing_optional_fields() {
        let session: Session = serde_json::from_str(
            r#"{"id":"s-1","created_at":"2026-01-30T12:00:00Z","last_active_at":"2026-01-30T12:05:00Z"}"#,
        )
        .unwrap();
        assert_eq!(session.last_action_count, 1);
        assert!(session.last_payload_hash.is_none());
    }
}
