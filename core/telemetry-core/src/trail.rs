//! Navigation trail: an append-only history of UI state transitions.
//!
//! Each step is stamped twice, when the transition started (`from_time`) and
//! when it completed (`to_time`). The tracker reads the latest step to derive
//! how long the view took to prepare and how long it has been on screen.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrailStep {
    pub from_state: String,
    pub from_time: DateTime<Utc>,
    pub to_state: String,
    pub to_time: DateTime<Utc>,
    #[serde(default)]
    pub params: Value,
}

impl TrailStep {
    /// Milliseconds spent between starting and completing the transition.
    pub fn prep_time_ms(&self) -> i64 {
        self.to_time
            .signed_duration_since(self.from_time)
            .num_milliseconds()
    }

    /// Milliseconds the destination state has been shown as of `now`.
    pub fn load_time_ms(&self, now: DateTime<Utc>) -> i64 {
        now.signed_duration_since(self.to_time).num_milliseconds()
    }
}

#[derive(Debug, Clone, Default)]
pub struct NavigationTrail {
    steps: Vec<TrailStep>,
}

impl NavigationTrail {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a step and returns its index.
    pub fn record_transition(
        &mut self,
        from_state: &str,
        to_state: &str,
        params: Value,
        from_time: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> usize {
        if let Some(previous) = self.steps.last() {
            let elapsed = now.signed_duration_since(previous.to_time);
            debug!(
                from = %from_state,
                to = %to_state,
                elapsed_ms = elapsed.num_milliseconds(),
                "Navigation after {:.1}s on {}",
                elapsed.num_milliseconds() as f64 / 1000.0,
                previous.to_state
            );
        } else {
            debug!(from = %from_state, to = %to_state, "First navigation");
        }

        self.steps.push(TrailStep {
            from_state: from_state.to_string(),
            from_time,
            to_state: to_state.to_string(),
            to_time: now,
            params,
        });
        self.steps.len() - 1
    }

    pub fn latest(&self) -> Option<&TrailStep> {
        self.steps.last()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    #[test]
    fn empty_trail_has_no_latest() {
        let trail = NavigationTrail::new();
        assert!(trail.latest().is_none());
        assert!(trail.is_empty());
    }

    #[test]
    fn appends_in_order_and_returns_index() {
        let mut trail = NavigationTrail::new();
        let t0 = Utc::now();

        let first = trail.record_transition("", "home", json!({}), t0, t0);
        let second = trail.record_transition(
            "home",
            "search",
            json!({ "query": "any,contains,fisk" }),
            t0 + Duration::seconds(5),
            t0 + Duration::milliseconds(5_300),
        );

        assert_eq!((first, second), (0, 1));
        assert_eq!(trail.len(), 2);
        let latest = trail.latest().unwrap();
        assert_eq!(latest.from_state, "home");
        assert_eq!(latest.to_state, "search");
        assert_eq!(latest.params["query"], "any,contains,fisk");
    }

    #[test]
    fn step_timings() {
        let t0 = Utc::now();
        let step = TrailStep {
            from_state: "search".into(),
            from_time: t0,
            to_state: "record".into(),
            to_time: t0 + Duration::milliseconds(250),
            params: Value::Null,
        };
        assert_eq!(step.prep_time_ms(), 250);
        assert_eq!(step.load_time_ms(t0 + Duration::seconds(2)), 1_750);
    }
}
