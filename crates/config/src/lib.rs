//! Shared configuration types for the triage diagnosis pass.
//!
//! The diagnosis core consumes these values as opaque parameters; flag
//! parsing and precedence live in the `cli` crate. Config files may be
//! YAML or JSON, dispatched on the file extension.

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while loading a config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file content is not valid YAML for `TriageConfig`
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The file content is not valid JSON for `TriageConfig`
    #[error("failed to parse config file {path}: {source}")]
    ParseJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// All thresholds, grace periods, and filters consumed by a diagnosis pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TriageConfig {
    /// Cluster name used to scope alerts and the dedup store.
    /// Defaults to the kubeconfig context name when unset.
    pub cluster_name: Option<String>,

    /// Namespaces to diagnose. Empty means all namespaces.
    pub namespaces: Vec<String>,

    /// Namespaces to skip even when matched by `namespaces`.
    pub namespaces_deny_list: Vec<String>,

    /// Minimum pod age before any pod check applies.
    pub pod_creation_grace_period_seconds: u64,

    /// How long containers may sit in `ContainerCreating`/`PodInitializing`
    /// (and pods in `Pending`) before being reported.
    pub pod_starting_grace_period_seconds: u64,

    /// How long after a container termination (or a pod deletion) before
    /// the termination is reported. Pods may override the deletion half
    /// through their own termination grace period.
    pub pod_termination_grace_period_seconds: u64,

    /// Restart count a container must exceed before flapping analysis runs.
    pub pod_restart_grace_count: i32,

    /// Node usage ratio above which a resource is reported, in `(0, 1)`.
    /// The boundary itself does not trigger.
    pub node_resource_usage_threshold: f64,

    /// Dedup window in minutes. `0` dedups forever once a message is seen.
    pub messages_deduplication_minutes: i64,

    /// Path of the persisted dedup store.
    pub store_file: PathBuf,

    /// chrono format string for absolute timestamps inside messages.
    pub time_format: String,

    /// Tail length for container log captures.
    pub log_tail_lines: i64,

    /// Run the node resource checks even when conditions already flagged
    /// the node.
    pub force_check_node_resources: bool,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            cluster_name: None,
            namespaces: Vec::new(),
            namespaces_deny_list: Vec::new(),
            pod_creation_grace_period_seconds: 30,
            pod_starting_grace_period_seconds: 600,
            pod_termination_grace_period_seconds: 60,
            pod_restart_grace_count: 3,
            node_resource_usage_threshold: 0.85,
            messages_deduplication_minutes: 60,
            store_file: PathBuf::from("triage-store.json"),
            time_format: "%d %b %y %H:%M %Z".to_string(),
            log_tail_lines: 50,
            force_check_node_resources: false,
        }
    }
}

impl TriageConfig {
    /// Load a config file, or fall back to defaults when the file does not
    /// exist.
    ///
    /// # Errors
    /// Returns an error when the file exists but cannot be read or parsed.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&raw).map_err(|source| ConfigError::ParseJson {
                path: path.to_path_buf(),
                source,
            })
        } else {
            serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })
        }
    }

    /// Whether `namespace` passes the include/deny filters.
    #[must_use]
    pub fn namespace_relevant(&self, namespace: &str) -> bool {
        if self.namespaces_deny_list.iter().any(|ns| ns == namespace) {
            return false;
        }
        self.namespaces.is_empty() || self.namespaces.iter().any(|ns| ns == namespace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_when_file_missing() {
        let config = TriageConfig::load_or_default(Path::new("/nonexistent/triage.yaml")).unwrap();
        assert_eq!(config.pod_restart_grace_count, 3);
        assert!(config.namespaces.is_empty());
    }

    #[test]
    fn loads_yaml_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "podRestartGraceCount: 10\nnamespaces:\n  - prod\nnodeResourceUsageThreshold: 0.5"
        )
        .unwrap();

        let config = TriageConfig::load_or_default(file.path()).unwrap();
        assert_eq!(config.pod_restart_grace_count, 10);
        assert_eq!(config.namespaces, vec!["prod".to_string()]);
        assert!((config.node_resource_usage_threshold - 0.5).abs() < f64::EPSILON);
        // untouched fields keep their defaults
        assert_eq!(config.pod_creation_grace_period_seconds, 30);
    }

    #[test]
    fn loads_json_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("triage.json");
        std::fs::write(&path, r#"{"messagesDeduplicationMinutes": 0}"#).unwrap();
        let config = TriageConfig::load_or_default(&path).unwrap();
        assert_eq!(config.messages_deduplication_minutes, 0);
    }

    #[test]
    fn rejects_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "podRestartGraceCount: [not a number]").unwrap();
        assert!(matches!(
            TriageConfig::load_or_default(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn namespace_filtering() {
        let mut config = TriageConfig::default();
        assert!(config.namespace_relevant("anything"));

        config.namespaces = vec!["prod".into(), "staging".into()];
        assert!(config.namespace_relevant("prod"));
        assert!(!config.namespace_relevant("dev"));

        config.namespaces_deny_list = vec!["prod".into()];
        assert!(!config.namespace_relevant("prod"));
        assert!(config.namespace_relevant("staging"));
    }
}
