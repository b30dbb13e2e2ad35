//! Configuration loading and saving utilities.
//!
//! Handles:
//! - Recorder configuration (endpoint, facet conventions, session timeout)
//! - On-disk locations for config, per-tab session storage and logs

use std::env;
use std::io::Write;
use std::path::{Path, PathBuf};

use fs_err as fs;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::{Result, TelemetryError};

const ENABLE_ENV: &str = "SEARCH_TELEMETRY_ENABLED";
const ENDPOINT_ENV: &str = "SEARCH_TELEMETRY_ENDPOINT";

pub const DEFAULT_FACET_PREFIX: &str = "facet_";
pub const DEFAULT_GROUP_FACET: &str = "frbrgroupid";
pub const DEFAULT_SESSION_TIMEOUT_SECS: i64 = 1800; // 30 minutes
pub const DEFAULT_STORAGE_KEY: &str = "search_telemetry.session";

/// Recorder settings. Every field has a default so partial files load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Master switch; when false every entry point is a no-op.
    pub enabled: bool,
    /// Collector URL. `None` means payloads are built but not sent.
    pub endpoint: Option<String>,
    /// Query fields starting with this prefix are facet clauses.
    pub facet_prefix: String,
    /// Facet whose presence (first position) marks a group expansion.
    pub group_facet: String,
    pub session_timeout_secs: i64,
    pub client_version: Option<String>,
    /// Used until an identity source reports a language.
    pub default_language: Option<String>,
    pub storage_key: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: None,
            facet_prefix: DEFAULT_FACET_PREFIX.to_string(),
            group_facet: DEFAULT_GROUP_FACET.to_string(),
            session_timeout_secs: DEFAULT_SESSION_TIMEOUT_SECS,
            client_version: None,
            default_language: None,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Applies `SEARCH_TELEMETRY_ENABLED` / `SEARCH_TELEMETRY_ENDPOINT` on top of this config.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(value) = env::var(ENABLE_ENV) {
            self.enabled = parse_flag(&value);
        }
        if let Ok(value) = env::var(ENDPOINT_ENV) {
            let trimmed = value.trim();
            self.endpoint = (!trimmed.is_empty()).then(|| trimmed.to_string());
        }
        self
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "yes" | "YES")
}

/// Central configuration for on-disk locations.
///
/// Production code uses `StoragePaths::default()` which points to `~/.search-telemetry/`.
/// Tests use `StoragePaths::with_root(temp_dir)` for isolation.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl Default for StoragePaths {
    fn default() -> Self {
        let root = dirs::home_dir()
            .map(|home| home.join(".search-telemetry"))
            .unwrap_or_else(|| env::temp_dir().join("search-telemetry"));
        Self { root }
    }
}

impl StoragePaths {
    pub fn with_root(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to config.json.
    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.json")
    }

    /// Storage area for one tab/window. Tabs never share a directory.
    pub fn tab_dir(&self, tab_id: &str) -> PathBuf {
        self.root.join("tabs").join(sanitize_tab_id(tab_id))
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }
}

fn sanitize_tab_id(tab_id: &str) -> String {
    let cleaned: String = tab_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "default".to_string()
    } else {
        cleaned
    }
}

/// Loads the recorder configuration, returning defaults if the file is missing or corrupt.
pub fn load_config(path: &Path) -> TelemetryConfig {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(_) => return TelemetryConfig::default(),
    };
    match serde_json::from_str(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "Ignoring malformed telemetry config");
            TelemetryConfig::default()
        }
    }
}

/// Saves the recorder configuration atomically (temp file + rename).
pub fn save_config(path: &Path, config: &TelemetryConfig) -> Result<()> {
    let content = serde_json::to_string_pretty(config).map_err(|source| TelemetryError::Json {
        context: "serialize config".to_string(),
        source,
    })?;
    let write_failed = |source| TelemetryError::ConfigWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(write_failed)?;
    let mut temp_file = NamedTempFile::new_in(parent).map_err(write_failed)?;
    temp_file
        .write_all(content.as_bytes())
        .map_err(write_failed)?;
    temp_file.flush().map_err(write_failed)?;
    temp_file
        .persist(path)
        .map_err(|e| write_failed(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_match_collector_conventions() {
        let config = TelemetryConfig::default();
        assert!(config.enabled);
        assert_eq!(config.facet_prefix, "facet_");
        assert_eq!(config.group_facet, "frbrgroupid");
        assert_eq!(config.session_timeout_secs, 1800);
        assert!(config.endpoint.is_none());
    }

    #[test]
    fn load_missing_file_returns_defaults() {
        let temp = tempdir().unwrap();
        let config = load_config(&temp.path().join("nope.json"));
        assert_eq!(config, TelemetryConfig::default());
    }

    #[test]
    fn load_corrupt_file_returns_defaults() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(load_config(&path), TelemetryConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("config.json");
        std::fs::write(&path, r#"{"endpoint":"https://collector.example/log"}"#).unwrap();

        let config = load_config(&path);
        assert_eq!(
            config.endpoint.as_deref(),
            Some("https://collector.example/log")
        );
        assert_eq!(config.session_timeout_secs, DEFAULT_SESSION_TIMEOUT_SECS);
    }

    #[test]
    fn save_then_load() {
        let temp = tempdir().unwrap();
        let paths = StoragePaths::with_root(temp.path().join("root"));
        let config = TelemetryConfig {
            client_version: Some("2.0.1".to_string()),
            ..TelemetryConfig::default()
        };

        save_config(&paths.config_file(), &config).unwrap();
        assert_eq!(load_config(&paths.config_file()), config);
    }

    #[test]
    fn tab_dirs_are_distinct_and_sanitized() {
        let paths = StoragePaths::with_root(PathBuf::from("/tmp/st"));
        assert_ne!(paths.tab_dir("tab-1"), paths.tab_dir("tab-2"));
        assert_eq!(
            paths.tab_dir("../escape"),
            PathBuf::from("/tmp/st/tabs/___escape")
        );
        assert_eq!(paths.tab_dir(""), PathBuf::from("/tmp/st/tabs/default"));
    }

    #[test]
    fn flag_parsing() {
        assert!(parse_flag("1"));
        assert!(parse_flag("yes"));
        assert!(!parse_flag("0"));
        assert!(!parse_flag("off"));
    }
}
