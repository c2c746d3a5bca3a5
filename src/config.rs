use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::remote::ServiceConfig;
use crate::pipeline::tabular::TabularOptions;
use crate::pipeline::text::TextParseOptions;
use crate::pipeline::validation::ValidationPolicy;
use crate::pipeline::vision::VisionOptions;
use crate::pipeline::voice::VoiceOptions;

/// Application-level constants
pub const APP_NAME: &str = "cutlist-ingest";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable pointing at an explicit config file.
pub const CONFIG_ENV_VAR: &str = "CUTLIST_INGEST_CONFIG";

const CONFIG_FILE_NAME: &str = "config.json";

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "cutlist_ingest=info"
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Every option record the pipeline reads, one per stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub text: TextParseOptions,
    pub voice: VoiceOptions,
    pub tabular: TabularOptions,
    pub vision: VisionOptions,
    pub validation: ValidationPolicy,
    pub service: ServiceConfig,
}

/// Per-user config file location: `<config dir>/cutlist-ingest/config.json`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_NAME).join(CONFIG_FILE_NAME))
}

/// Read a JSON config file. Missing keys take their defaults.
pub fn load_config(path: &Path) -> Result<IngestConfig, ConfigError> {
    let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&json).map_err(|source| ConfigError::Json {
        path: path.display().to_string(),
        source,
    })
}

/// Config from `CUTLIST_INGEST_CONFIG`, else the per-user file, else defaults.
/// An explicit path that fails to load is an error; a missing per-user file
/// is not.
pub fn load_or_default() -> Result<IngestConfig, ConfigError> {
    let explicit = std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from);
    resolve_config(explicit.as_deref(), default_config_path().as_deref())
}

fn resolve_config(explicit: Option<&Path>, per_user: Option<&Path>) -> Result<IngestConfig, ConfigError> {
    if let Some(path) = explicit {
        tracing::info!(path = %path.display(), "Loading config from {CONFIG_ENV_VAR}");
        return load_config(path);
    }
    match per_user {
        Some(path) if path.exists() => {
            tracing::info!(path = %path.display(), "Loading user config");
            load_config(path)
        }
        _ => {
            tracing::debug!("No config file, using defaults");
            Ok(IngestConfig::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("config.json");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"{"text": {"strict": true}, "validation": {"max_dimension_mm": 2500}}"#,
        );
        let config = load_config(&path).unwrap();
        assert!(config.text.strict);
        assert_eq!(config.text.min_confidence, 0.5);
        assert_eq!(config.validation.max_dimension_mm, 2500.0);
        assert_eq!(config.validation.min_dimension_mm, 10.0);
        assert_eq!(config.service.timeout_secs, 60);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }), "Expected Io, got {err:?}");
    }

    #[test]
    fn malformed_file_is_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "{ not json");
        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Json { .. }), "Expected Json, got {err:?}");
        assert!(err.to_string().contains("config.json"));
    }

    #[test]
    fn resolution_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, r#"{"voice": {"swap_to_landscape": false}}"#);

        let explicit = resolve_config(Some(&path), None).unwrap();
        assert!(!explicit.voice.swap_to_landscape);

        let per_user = resolve_config(None, Some(&path)).unwrap();
        assert!(!per_user.voice.swap_to_landscape);

        let missing = dir.path().join("absent.json");
        let defaults = resolve_config(None, Some(&missing)).unwrap();
        assert!(defaults.voice.swap_to_landscape);

        assert!(resolve_config(Some(&missing), None).is_err());
    }

    #[test]
    fn default_path_is_namespaced() {
        if let Some(path) = default_config_path() {
            assert!(path.ends_with("cutlist-ingest/config.json"));
        }
    }

    #[test]
    fn defaults_round_trip_through_json() {
        let json = serde_json::to_string(&IngestConfig::default()).unwrap();
        let back: IngestConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.vision.confidence, 0.75);
        assert_eq!(back.voice.flush_threshold_chars, 200);
    }

    #[test]
    fn log_filter_targets_crate() {
        assert_eq!(default_log_filter(), "cutlist_ingest=info");
        assert_eq!(APP_VERSION, "0.1.0");
    }
}
