//! Recorder - the entry points a host UI calls.
//!
//! One `Recorder` per tab/window. It owns the `EventTracker` (trail, session,
//! transport) plus the transient UI state the tracker does not care about:
//! search-bar input counters, the pending navigation start and the records
//! currently on screen.
//!
//! Every entry point returns `()`. Failures are logged and swallowed;
//! telemetry must never break the product.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use telemetry_core::{Recorder, TelemetryConfig};
//!
//! let mut recorder = Recorder::from_config(TelemetryConfig::default());
//! recorder.record_navigation("", "search", serde_json::json!({}));
//! recorder.on_home_navigated();
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::TelemetryConfig;
use crate::error::{Result, TelemetryError};
use crate::record::normalize_record;
use crate::search::{build_search_data, classify_search_action, Action, InputState};
use crate::session::SessionManager;
use crate::sources::{
    IdentitySource, NullSearchState, ResultObject, SearchObject, SearchStateSource,
};
use crate::storage::{MemoryStorage, SessionStorage};
use crate::tracker::{DispatchHandle, DispatchStatus, EventTracker, TrackOutcome};
use crate::transport::{HttpTransport, NullTransport, Transport};

pub struct Recorder {
    tracker: EventTracker,
    search_state: Arc<dyn SearchStateSource>,
    input: InputState,
    pending_navigation: Option<DateTime<Utc>>,
    viewed: HashMap<String, DateTime<Utc>>,
    in_flight: Vec<DispatchHandle>,
    settled: Vec<DispatchStatus>,
}

/// Statuses of finished sends kept for the next `flush`; oldest dropped first.
const MAX_SETTLED: usize = 1024;

impl Recorder {
    /// In-memory session storage and HTTP transport (or none without an endpoint).
    pub fn from_config(config: TelemetryConfig) -> Self {
        let transport: Arc<dyn Transport> = if config.endpoint.is_some() {
            Arc::new(HttpTransport::new())
        } else {
            Arc::new(NullTransport)
        };
        Self::new(config, Arc::new(MemoryStorage::new()), transport)
    }

    pub fn new(
        config: TelemetryConfig,
        storage: Arc<dyn SessionStorage>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self::with_clock(config, storage, transport, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: TelemetryConfig,
        storage: Arc<dyn SessionStorage>,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let session =
            SessionManager::new(storage, &config.storage_key, config.session_timeout_secs);
        Self {
            tracker: EventTracker::new(config, session, transport, clock),
            search_state: Arc::new(NullSearchState),
            input: InputState::default(),
            pending_navigation: None,
            viewed: HashMap::new(),
            in_flight: Vec::new(),
            settled: Vec::new(),
        }
    }

    pub fn tracker(&self) -> &EventTracker {
        &self.tracker
    }

    pub fn input_state(&self) -> InputState {
        self.input
    }

    fn enabled(&self) -> bool {
        self.tracker.config().enabled
    }

    /// Tracks one event. Exposed for tools; hosts use the `on_*` entry points.
    pub fn track(&mut self, action: &str, data: Value) -> Result<TrackOutcome> {
        if !self.enabled() {
            return Err(TelemetryError::Disabled);
        }
        self.tracker.track(action, data)
    }

    /// Waits for every send still in flight and returns how each send since
    /// the last flush went, in dispatch order for those still pending.
    pub fn flush(&mut self) -> Vec<DispatchStatus> {
        let mut statuses = std::mem::take(&mut self.settled);
        statuses.extend(self.in_flight.drain(..).filter_map(DispatchHandle::wait));
        statuses
    }

    /// Moves finished sends from `in_flight` into the settled statuses.
    fn reap_finished(&mut self) {
        let (finished, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.in_flight)
            .into_iter()
            .partition(|handle| handle.is_finished());
        self.in_flight = pending;
        self.settled
            .extend(finished.into_iter().filter_map(DispatchHandle::wait));
        if self.settled.len() > MAX_SETTLED {
            let excess = self.settled.len() - MAX_SETTLED;
            self.settled.drain(..excess);
        }
    }

    /// Tracks through the entry-point path: logs failures, keeps the send handle.
    fn submit(&mut self, action: Action, data: Value) -> bool {
        match self.track(action.as_str(), data) {
            Ok(TrackOutcome::Dispatched { handle, .. }) => {
                self.reap_finished();
                self.in_flight.push(handle);
                if action.resets_search_input() {
                    self.input.reset();
                }
                true
            }
            Ok(TrackOutcome::Suppressed) => false,
            Err(err) => {
                report_rejection(action, &err);
                false
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Wiring
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn set_client_version(&mut self, version: &str) {
        self.tracker.set_client_version(version);
    }

    pub fn provide_search_state(&mut self, source: Arc<dyn SearchStateSource>) {
        self.search_state = source;
    }

    pub fn provide_identity_source(&mut self, source: Arc<dyn IdentitySource>) {
        self.tracker.set_identity_source(source);
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Navigation and search bar
    // ─────────────────────────────────────────────────────────────────────────────

    /// Marks the start of a transition; the next `record_navigation` uses it as `from_time`.
    pub fn navigation_started(&mut self) {
        if self.enabled() {
            self.pending_navigation = Some(self.tracker.now());
        }
    }

    pub fn record_navigation(&mut self, from_state: &str, to_state: &str, params: Value) {
        if !self.enabled() {
            return;
        }
        let started_at = self.pending_navigation.take();
        self.tracker
            .record_navigation(from_state, to_state, params, started_at);
    }

    pub fn on_keypress(&mut self) {
        if !self.enabled() {
            return;
        }
        self.input.keypresses = self.input.keypresses.saturating_add(1);
    }

    pub fn on_paste(&mut self) {
        if !self.enabled() {
            return;
        }
        self.input.paste = true;
    }

    pub fn reset_search_bar_state(&mut self) {
        self.input.reset();
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Search events
    // ─────────────────────────────────────────────────────────────────────────────

    fn settled_search(&self) -> Result<(SearchObject, Option<ResultObject>)> {
        if !self.search_state.is_available() {
            return Err(TelemetryError::NoSearchState);
        }
        if self.search_state.is_search_in_progress() {
            return Err(TelemetryError::SearchInProgress);
        }
        let search = self
            .search_state
            .search_object()
            .ok_or(TelemetryError::MissingSearchObject("search"))?;
        Ok((search, self.search_state.result_object()))
    }

    pub fn on_search_results_ready(&mut self, page_no: Option<u32>) {
        let search_result = self.settled_search().and_then(|(search, result)| {
            let result = result.ok_or(TelemetryError::MissingSearchObject("result"))?;
            Ok((search, result))
        });
        let (search, result) = match search_result {
            Ok(pair) => pair,
            Err(err) => return report_rejection(Action::Search, &err),
        };

        let config = self.tracker.config();
        let action = classify_search_action(&search, page_no, &config.group_facet);
        let data = build_search_data(&search, &result, self.input, &config.facet_prefix);
        self.submit(action, data);
    }

    pub fn on_no_results(&mut self) {
        let (search, _) = match self.settled_search() {
            Ok(pair) => pair,
            Err(err) => return report_rejection(Action::NoResults, &err),
        };

        let data = build_search_data(
            &search,
            &ResultObject::default(),
            self.input,
            &self.tracker.config().facet_prefix,
        );
        self.submit(Action::NoResults, data);
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Record interactions
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn on_record_viewed(&mut self, record: &Value) {
        let normalized = normalize_record(record);
        let id = normalized.id.clone();
        let viewed_at = self.tracker.now();
        if self.submit(Action::ViewRecord, json!({ "record": normalized })) {
            if let Some(id) = id {
                self.viewed.insert(id, viewed_at);
            }
        }
    }

    pub fn on_record_left(&mut self, record: &Value) {
        let normalized = normalize_record(record);
        let dwell_time = normalized
            .id
            .as_ref()
            .and_then(|id| self.viewed.remove(id))
            .map(|viewed_at| {
                self.tracker
                    .now()
                    .signed_duration_since(viewed_at)
                    .num_milliseconds()
            });
        self.submit(
            Action::LeaveRecord,
            json!({ "record": normalized, "dwell_time": dwell_time }),
        );
    }

    pub fn on_send_to(&mut self, service: &str, record: &Value) {
        let normalized = normalize_record(record);
        self.submit(
            Action::SendTo,
            json!({ "service": service, "record": normalized }),
        );
    }

    pub fn on_record_pinned(&mut self, record: &Value) {
        let normalized = normalize_record(record);
        self.submit(Action::PinRecord, json!({ "record": normalized }));
    }

    pub fn on_record_unpinned(&mut self, record: &Value) {
        let normalized = normalize_record(record);
        self.submit(Action::UnpinRecord, json!({ "record": normalized }));
    }

    pub fn on_home_navigated(&mut self) {
        self.submit(Action::GotoHome, json!({}));
    }

    pub fn on_browse(&mut self, data: Value) {
        self.submit(Action::Browse, data);
    }
}

fn report_rejection(action: Action, err: &TelemetryError) {
    match err {
        TelemetryError::EmptyTrail => {
            warn!(action = %action, "Tracking called before any navigation was recorded")
        }
        err if err.is_precondition() => {
            debug!(action = %action, reason = %err, "Event not tracked")
        }
        err => warn!(action = %action, error = %err, "Failed to track event"),
    }
}
