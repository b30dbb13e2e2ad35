//! EventTracker - assembles outbound payloads and hands them to the transport.
//!
//! The tracker owns the per-tab context: the navigation trail, the session
//! manager (behind a mutex shared with dispatch workers), the identity source
//! and the language cache. `track` either rejects the call, suppresses it as a
//! duplicate, or dispatches it on a detached worker thread.

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use chrono::{DateTime, Utc};
use serde_json::Value;
use telemetry_protocol::{validate_action, EventMeta, EventPayload, MAX_PAYLOAD_BYTES};
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::config::TelemetryConfig;
use crate::error::{Result, TelemetryError};
use crate::session::{Admission, SessionManager};
use crate::sources::{IdentitySource, NullIdentity};
use crate::trail::NavigationTrail;
use crate::transport::{OutboundRequest, Transport};

/// How a finished send went, as seen by the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchStatus {
    Sent { reconciled: bool },
    Failed(String),
}

/// Handle to an in-flight send. Dropping it detaches the worker.
#[derive(Debug)]
pub struct DispatchHandle {
    worker: Option<JoinHandle<DispatchStatus>>,
}

impl DispatchHandle {
    pub fn is_finished(&self) -> bool {
        self.worker
            .as_ref()
            .map_or(true, |worker| worker.is_finished())
    }

    /// Blocks until the send finishes. Hosts never need this; tools and tests do.
    pub fn wait(self) -> Option<DispatchStatus> {
        self.worker.and_then(|worker| worker.join().ok())
    }
}

#[derive(Debug)]
pub enum TrackOutcome {
    Dispatched {
        session_id: String,
        action_no: u64,
        handle: DispatchHandle,
    },
    Suppressed,
}

impl TrackOutcome {
    pub fn is_dispatched(&self) -> bool {
        matches!(self, TrackOutcome::Dispatched { .. })
    }

    /// Waits for the send, if there was one.
    pub fn wait(self) -> Option<DispatchStatus> {
        match self {
            TrackOutcome::Dispatched { handle, .. } => handle.wait(),
            TrackOutcome::Suppressed => None,
        }
    }
}

pub struct EventTracker {
    config: TelemetryConfig,
    trail: NavigationTrail,
    session: Arc<Mutex<SessionManager>>,
    transport: Arc<dyn Transport>,
    identity: Arc<dyn IdentitySource>,
    clock: Arc<dyn Clock>,
    cached_language: Option<String>,
}

impl EventTracker {
    pub fn new(
        config: TelemetryConfig,
        session: SessionManager,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let cached_language = config.default_language.clone();
        Self {
            config,
            trail: NavigationTrail::new(),
            session: Arc::new(Mutex::new(session)),
            transport,
            identity: Arc::new(NullIdentity),
            clock,
            cached_language,
        }
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    pub fn trail(&self) -> &NavigationTrail {
        &self.trail
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn set_client_version(&mut self, version: &str) {
        self.config.client_version = Some(version.to_string());
    }

    pub fn set_identity_source(&mut self, identity: Arc<dyn IdentitySource>) {
        self.identity = identity;
    }

    /// Appends a trail step ending now. `started_at` defaults to now.
    pub fn record_navigation(
        &mut self,
        from_state: &str,
        to_state: &str,
        params: Value,
        started_at: Option<DateTime<Utc>>,
    ) -> usize {
        let now = self.clock.now();
        self.trail
            .record_transition(from_state, to_state, params, started_at.unwrap_or(now), now)
    }

    /// Runs `f` with exclusive access to the session manager.
    pub fn with_session<T>(&self, f: impl FnOnce(&mut SessionManager) -> Result<T>) -> Result<T> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| TelemetryError::LockPoisoned)?;
        f(&mut session)
    }

    /// Prefers the identity source and remembers what it said, so the last
    /// known language survives the source going away.
    fn language(&mut self) -> Option<String> {
        if self.identity.is_available() {
            if let Some(language) = self.identity.user_language() {
                self.cached_language = Some(language);
            }
        }
        self.cached_language.clone()
    }

    fn logged_in(&self) -> bool {
        self.identity.is_available() && self.identity.is_logged_in()
    }

    pub fn track(&mut self, action: &str, data: Value) -> Result<TrackOutcome> {
        let step = self.trail.latest().ok_or(TelemetryError::EmptyTrail)?;
        // Anything that can reject the event must run before admit mutates the session.
        validate_action(action).map_err(|e| TelemetryError::InvalidPayload(e.to_string()))?;
        let data_len = data.to_string().len();
        if data_len > MAX_PAYLOAD_BYTES {
            return Err(TelemetryError::InvalidPayload(format!(
                "data is {} bytes (max {})",
                data_len, MAX_PAYLOAD_BYTES
            )));
        }
        let now = self.clock.now();
        let meta = EventMeta {
            trail_step: self.trail.len() - 1,
            prep_time: step.prep_time_ms(),
            load_time: step.load_time_ms(now),
            client_version: self.config.client_version.clone(),
        };

        let accepted = match self.with_session(|session| session.admit(action, &data, now))? {
            Admission::Accepted(accepted) => accepted,
            Admission::Duplicate => return Ok(TrackOutcome::Suppressed),
        };

        let payload = EventPayload {
            last_action: accepted.last_action,
            action: action.to_string(),
            lang: self.language(),
            logged_in: self.logged_in(),
            data,
            meta,
            session_id: accepted.session_id.clone(),
            session_start: accepted.session_start.to_rfc3339(),
            action_no: accepted.action_no,
            hist: self.trail.len(),
        };
        payload
            .validate()
            .map_err(|e| TelemetryError::InvalidPayload(e.to_string()))?;

        debug!(
            action = %action,
            session_id = %accepted.session_id,
            action_no = accepted.action_no,
            "Dispatching event"
        );
        let handle = self.dispatch(OutboundRequest {
            endpoint: self.config.endpoint.clone(),
            payload,
        });

        Ok(TrackOutcome::Dispatched {
            session_id: accepted.session_id,
            action_no: accepted.action_no,
            handle,
        })
    }

    fn dispatch(&self, request: OutboundRequest) -> DispatchHandle {
        let transport = Arc::clone(&self.transport);
        let session = Arc::clone(&self.session);

        let spawned = thread::Builder::new()
            .name("telemetry-dispatch".to_string())
            .spawn(move || send_and_reconcile(transport.as_ref(), &session, &request));

        match spawned {
            Ok(worker) => DispatchHandle {
                worker: Some(worker),
            },
            Err(err) => {
                warn!(error = %err, "Failed to spawn dispatch worker");
                DispatchHandle { worker: None }
            }
        }
    }
}

fn send_and_reconcile(
    transport: &dyn Transport,
    session: &Mutex<SessionManager>,
    request: &OutboundRequest,
) -> DispatchStatus {
    let ack = match transport.send(request) {
        Ok(ack) => ack,
        Err(err) => {
            debug!(action = %request.payload.action, error = %err, "Telemetry send failed");
            return DispatchStatus::Failed(err.to_string());
        }
    };

    let Some(ack) = ack else {
        return DispatchStatus::Sent { reconciled: false };
    };

    let reconciled = match session.lock() {
        Ok(mut manager) => manager
            .reconcile(&request.payload.session_id, request.payload.action_no, &ack)
            .unwrap_or_else(|err| {
                debug!(error = %err, "Session reconciliation failed");
                false
            }),
        Err(_) => false,
    };
    DispatchStatus::Sent { reconciled }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::TransportError;
    use crate::sources::StaticIdentity;
    use crate::storage::MemoryStorage;
    use crate::transport::MemoryTransport;
    use chrono::Duration;
    use serde_json::json;
    use telemetry_protocol::ServerAck;

    struct FailingTransport;

    impl Transport for FailingTransport {
        fn send(
            &self,
            _request: &OutboundRequest,
        ) -> std::result::Result<Option<ServerAck>, TransportError> {
            Err(TransportError::Request("connection refused".into()))
        }
    }

    fn tracker_with(
        transport: Arc<dyn Transport>,
        config: TelemetryConfig,
    ) -> (EventTracker, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let session = SessionManager::new(
            Arc::new(MemoryStorage::new()),
            &config.storage_key,
            config.session_timeout_secs,
        );
        (
            EventTracker::new(config, session, transport, clock.clone()),
            clock,
        )
    }

    #[test]
    fn rejects_tracking_without_navigation() {
        let transport = Arc::new(MemoryTransport::new());
        let (mut tracker, _) = tracker_with(transport.clone(), TelemetryConfig::default());

        let err = tracker.track("search", json!({})).unwrap_err();
        assert!(matches!(err, TelemetryError::EmptyTrail));
        assert!(transport.sent().is_empty());
        assert!(tracker
            .with_session(|session| session.current())
            .unwrap()
            .is_none());
    }

    #[test]
    fn meta_is_derived_from_latest_step() {
        let transport = Arc::new(MemoryTransport::new());
        let config = TelemetryConfig {
            client_version: Some("3.1.0".into()),
            ..TelemetryConfig::default()
        };
        let (mut tracker, clock) = tracker_with(transport.clone(), config);

        let started = clock.now();
        clock.advance(Duration::milliseconds(300));
        tracker.record_navigation("home", "search", json!({}), Some(started));
        clock.advance(Duration::milliseconds(1_200));

        tracker.track("search", json!({"q": 1})).unwrap().wait();

        let payload = &transport.payloads()[0];
        assert_eq!(payload.meta.prep_time, 300);
        assert_eq!(payload.meta.load_time, 1_200);
        assert_eq!(payload.meta.trail_step, 0);
        assert_eq!(payload.meta.client_version.as_deref(), Some("3.1.0"));
        assert_eq!(payload.hist, 1);
        assert_eq!(payload.action_no, 1);
        assert!(payload.last_action.is_none());
    }

    #[test]
    fn duplicate_is_suppressed() {
        let transport = Arc::new(MemoryTransport::new());
        let (mut tracker, _) = tracker_with(transport.clone(), TelemetryConfig::default());
        tracker.record_navigation("", "search", json!({}), None);

        let first = tracker.track("search", json!({"q": "fisk"})).unwrap();
        assert!(first.is_dispatched());
        first.wait();
        let second = tracker.track("search", json!({"q": "fisk"})).unwrap();
        assert!(!second.is_dispatched());

        let third = tracker.track("search", json!({"q": "laks"})).unwrap();
        third.wait();
        let payloads = transport.payloads();
        assert_eq!(payloads.len(), 2);
        assert_eq!(payloads[1].action_no, 2);
        assert_eq!(payloads[1].last_action.as_deref(), Some("search"));
    }

    #[test]
    fn language_falls_back_to_cache() {
        let transport = Arc::new(MemoryTransport::new());
        let config = TelemetryConfig {
            default_language: Some("no_NO".into()),
            ..TelemetryConfig::default()
        };
        let (mut tracker, _) = tracker_with(transport.clone(), config);
        tracker.record_navigation("", "home", json!({}), None);

        tracker.track("goto_home", json!({"n": 1})).unwrap().wait();

        tracker.set_identity_source(Arc::new(StaticIdentity {
            language: Some("en_US".into()),
            logged_in: true,
        }));
        tracker.track("goto_home", json!({"n": 2})).unwrap().wait();

        tracker.set_identity_source(Arc::new(NullIdentity));
        tracker.track("goto_home", json!({"n": 3})).unwrap().wait();

        let payloads = transport.payloads();
        assert_eq!(payloads[0].lang.as_deref(), Some("no_NO"));
        assert!(!payloads[0].logged_in);
        assert_eq!(payloads[1].lang.as_deref(), Some("en_US"));
        assert!(payloads[1].logged_in);
        assert_eq!(payloads[2].lang.as_deref(), Some("en_US"));
        assert!(!payloads[2].logged_in);
    }

    #[test]
    fn server_ack_reconciles_session() {
        let transport = Arc::new(MemoryTransport::with_ack(ServerAck {
            session_id: Some("srv-7".into()),
            action_no: Some(12),
        }));
        let (mut tracker, _) = tracker_with(transport.clone(), TelemetryConfig::default());
        tracker.record_navigation("", "home", json!({}), None);

        let status = tracker.track("goto_home", json!({})).unwrap().wait();
        assert_eq!(status, Some(DispatchStatus::Sent { reconciled: true }));

        tracker.track("browse", json!({})).unwrap().wait();
        let payloads = transport.payloads();
        assert_eq!(payloads[1].session_id, "srv-7");
        assert_eq!(payloads[1].action_no, 13);
    }

    #[test]
    fn transport_failure_does_not_affect_later_events() {
        let (mut tracker, _) =
            tracker_with(Arc::new(FailingTransport), TelemetryConfig::default());
        tracker.record_navigation("", "home", json!({}), None);

        let status = tracker.track("goto_home", json!({})).unwrap().wait();
        assert!(matches!(status, Some(DispatchStatus::Failed(_))));

        let next = tracker.track("browse", json!({})).unwrap();
        match next {
            TrackOutcome::Dispatched { action_no, .. } => assert_eq!(action_no, 2),
            TrackOutcome::Suppressed => panic!("expected dispatch"),
        }
    }

    #[test]
    fn rejected_event_leaves_session_untouched() {
        let transport = Arc::new(MemoryTransport::new());
        let (mut tracker, _) = tracker_with(transport.clone(), TelemetryConfig::default());
        tracker.record_navigation("", "home", json!({}), None);
        tracker.track("goto_home", json!({})).unwrap().wait();
        let before = tracker.with_session(|session| session.current()).unwrap();

        let overlong = "x".repeat(telemetry_protocol::MAX_ACTION_LEN + 1);
        let err = tracker.track(&overlong, json!({})).unwrap_err();
        assert!(matches!(err, TelemetryError::InvalidPayload(_)));
        let oversized = json!({ "blob": "x".repeat(MAX_PAYLOAD_BYTES) });
        assert!(tracker.track("browse", oversized).is_err());

        let after = tracker.with_session(|session| session.current()).unwrap();
        assert_eq!(before, after);

        tracker.track("browse", json!({})).unwrap().wait();
        let payloads = transport.payloads();
        assert_eq!(payloads.len(), 2);
        assert_eq!(payloads[1].action_no, 2);
        assert_eq!(payloads[1].last_action.as_deref(), Some("goto_home"));
    }

    #[test]
    fn rejected_first_event_creates_no_session() {
        let (mut tracker, _) =
            tracker_with(Arc::new(MemoryTransport::new()), TelemetryConfig::default());
        tracker.record_navigation("", "home", json!({}), None);

        assert!(tracker.track("", json!({})).is_err());
        assert!(tracker
            .with_session(|session| session.current())
            .unwrap()
            .is_none());
    }

    #[test]
    fn endpoint_is_carried_on_the_request() {
        let transport = Arc::new(MemoryTransport::new());
        let config = TelemetryConfig {
            endpoint: Some("https://collector.example/log".into()),
            ..TelemetryConfig::default()
        };
        let (mut tracker, _) = tracker_with(transport.clone(), config);
        tracker.record_navigation("", "home", json!({}), None);
        tracker.track("goto_home", json!({})).unwrap().wait();

        assert_eq!(
            transport.sent()[0].endpoint.as_deref(),
            Some("https://collector.example/log")
        );
    }
}
