//! JSON-lines scripts of host events.
//!
//! One object per line, tagged by `event`:
//!
//! ```text
//! {"event":"navigate","from":"home","to":"search","started":true}
//! {"event":"keypress","count":4}
//! {"event":"search_state","search":{"query":"any,contains,fisk"},"result":{"total":12,"first":1,"last":10}}
//! {"event":"results_ready"}
//! {"event":"view","record":{"pnx":{"control":{"recordid":["rec-1"]}}}}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped. Lines that fail to
//! parse are logged and skipped.

use std::io::BufRead;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use telemetry_core::{
    DispatchStatus, Recorder, ResultObject, SearchObject, SearchSnapshot, StaticIdentity,
};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScriptEvent {
    Navigate {
        #[serde(default)]
        from: String,
        to: String,
        #[serde(default)]
        params: Value,
        /// Stamp the transition start before recording it.
        #[serde(default)]
        started: bool,
    },
    Keypress {
        #[serde(default = "one")]
        count: u32,
    },
    Paste,
    SearchState {
        #[serde(default)]
        in_progress: bool,
        #[serde(default)]
        search: Option<SearchObject>,
        #[serde(default)]
        result: Option<ResultObject>,
    },
    Identity(StaticIdentity),
    ResultsReady {
        #[serde(default)]
        page: Option<u32>,
    },
    NoResults,
    View {
        record: Value,
    },
    Leave {
        record: Value,
    },
    SendTo {
        service: String,
        record: Value,
    },
    Pin {
        record: Value,
    },
    Unpin {
        record: Value,
    },
    Home,
    Browse {
        #[serde(default)]
        data: Value,
    },
}

fn one() -> u32 {
    1
}

/// `Ok(None)` for blank and comment lines.
pub fn parse_line(line: &str) -> Result<Option<ScriptEvent>, String> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    serde_json::from_str(trimmed)
        .map(Some)
        .map_err(|e| format!("Invalid script line: {}", e))
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReplaySummary {
    pub applied: usize,
    pub skipped: usize,
    /// Sends dispatched during the replay, by outcome.
    pub sent: usize,
    pub failed: usize,
}

/// A recorder wired to a search snapshot the script can update.
pub struct Replayer {
    recorder: Recorder,
    search: Arc<SearchSnapshot>,
}

impl Replayer {
    pub fn new(mut recorder: Recorder) -> Self {
        let search = Arc::new(SearchSnapshot::new());
        recorder.provide_search_state(search.clone());
        Self { recorder, search }
    }

    pub fn apply(&mut self, event: ScriptEvent) {
        let recorder = &mut self.recorder;
        match event {
            ScriptEvent::Navigate {
                from,
                to,
                params,
                started,
            } => {
                if started {
                    recorder.navigation_started();
                }
                let params = if params.is_null() {
                    Value::Object(Default::default())
                } else {
                    params
                };
                recorder.record_navigation(&from, &to, params);
            }
            ScriptEvent::Keypress { count } => {
                for _ in 0..count {
                    recorder.on_keypress();
                }
            }
            ScriptEvent::Paste => recorder.on_paste(),
            ScriptEvent::SearchState {
                in_progress,
                search,
                result,
            } => self.search.update(in_progress, search, result),
            ScriptEvent::Identity(identity) => recorder.provide_identity_source(Arc::new(identity)),
            ScriptEvent::ResultsReady { page } => recorder.on_search_results_ready(page),
            ScriptEvent::NoResults => recorder.on_no_results(),
            ScriptEvent::View { record } => recorder.on_record_viewed(&record),
            ScriptEvent::Leave { record } => recorder.on_record_left(&record),
            ScriptEvent::SendTo { service, record } => recorder.on_send_to(&service, &record),
            ScriptEvent::Pin { record } => recorder.on_record_pinned(&record),
            ScriptEvent::Unpin { record } => recorder.on_record_unpinned(&record),
            ScriptEvent::Home => recorder.on_home_navigated(),
            ScriptEvent::Browse { data } => recorder.on_browse(data),
        }
    }

    /// Applies every line of `reader`, then waits for outstanding sends.
    pub fn run(mut self, reader: impl BufRead) -> Result<ReplaySummary, String> {
        let mut summary = ReplaySummary::default();

        for (index, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| format!("Failed to read script: {}", e))?;
            match parse_line(&line) {
                Ok(Some(event)) => {
                    self.apply(event);
                    summary.applied += 1;
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(line = index + 1, error = %err, "Skipping script line");
                    summary.skipped += 1;
                }
            }
        }

        for status in self.recorder.flush() {
            match status {
                DispatchStatus::Sent { .. } => summary.sent += 1,
                DispatchStatus::Failed(reason) => {
                    tracing::warn!(reason = %reason, "Send failed");
                    summary.failed += 1;
                }
            }
        }
        Ok(summary)
    }
}
