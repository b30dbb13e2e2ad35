//! Error types for telemetry-core operations.
//!
//! None of these ever reach the host UI: the `Recorder` entry points log them
//! and carry on. They exist so the pipeline can say precisely why a call was
//! dropped.

use std::path::PathBuf;

/// All errors that can occur while recording an event.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    // ─────────────────────────────────────────────────────────────────────
    // Precondition Failures (only the current call is suppressed)
    // ─────────────────────────────────────────────────────────────────────
    #[error("Navigation trail is empty")]
    EmptyTrail,

    #[error("No search state source has been provided")]
    NoSearchState,

    #[error("Search is still in progress")]
    SearchInProgress,

    #[error("Search state has no {0} object")]
    MissingSearchObject(&'static str),

    #[error("Telemetry is disabled")]
    Disabled,

    // ─────────────────────────────────────────────────────────────────────
    // Storage Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Session storage failed: {context}: {source}")]
    Storage {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Session storage lock poisoned")]
    LockPoisoned,

    // ─────────────────────────────────────────────────────────────────────
    // Serialization / Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("JSON error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Configuration write failed: {path}: {source}")]
    ConfigWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

impl TelemetryError {
    /// True for the "not now" class of failures that are expected during
    /// normal UI operation and only worth a debug line.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            TelemetryError::EmptyTrail
                | TelemetryError::NoSearchState
                | TelemetryError::SearchInProgress
                | TelemetryError::MissingSearchObject(_)
                | TelemetryError::Disabled
        )
    }
}

/// Convenience type alias for Results using TelemetryError.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Failure of a single network send. Only ever logged.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Payload rejected before send: {0}")]
    Payload(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precondition_classification() {
        assert!(TelemetryError::EmptyTrail.is_precondition());
        assert!(TelemetryError::MissingSearchObject("result").is_precondition());
        assert!(!TelemetryError::LockPoisoned.is_precondition());
    }

    #[test]
    fn messages_name_the_missing_object() {
        let err = TelemetryError::MissingSearchObject("search");
        assert_eq!(err.to_string(), "Search state has no search object");
    }
}
