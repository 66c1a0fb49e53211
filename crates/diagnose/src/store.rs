//! Persisted message deduplication store.
//!
//! The store maps message fingerprints to the time they were last reported,
//! partitioned per cluster, and is the only state that survives between
//! invocations. A fingerprint inside the TTL window suppresses the message;
//! a TTL of zero suppresses forever once seen.
//!
//! Fingerprints hash the message exactly as derived, temporal markup
//! included; see the `fingerprint_uses_marked_message` test for why that
//! matters.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::state::EntityName;

/// Errors from store persistence. Load errors other than a missing file are
/// fatal to the pass; flush errors are fatal to persistence only.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read dedup store {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse dedup store {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write dedup store {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ClusterEntry {
    /// When this cluster last ran a pass.
    timestamp: Option<DateTime<Utc>>,
    /// Fingerprint -> last time the message was reported.
    #[serde(default)]
    messages: HashMap<String, DateTime<Utc>>,
}

/// File-backed, TTL-governed fingerprint store.
#[derive(Debug)]
pub struct DedupStore {
    path: PathBuf,
    ttl: Duration,
    clusters: HashMap<String, ClusterEntry>,
}

impl DedupStore {
    /// Load the store from `path`, eagerly pruning entries older than the
    /// TTL relative to `now`. A missing or empty file is a fresh store;
    /// any other read or parse failure is an error.
    ///
    /// # Errors
    /// Returns [`StoreError::Read`] or [`StoreError::Parse`] for a
    /// present-but-unreadable or corrupt file.
    pub fn load(path: &Path, ttl: Duration, now: DateTime<Utc>) -> Result<Self, StoreError> {
        let mut clusters: HashMap<String, ClusterEntry> = match std::fs::read_to_string(path) {
            Ok(raw) if raw.trim().is_empty() => HashMap::new(),
            Ok(raw) => serde_json::from_str(&raw).map_err(|source| StoreError::Parse {
                path: path.to_path_buf(),
                source,
            })?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(source) => {
                return Err(StoreError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        if ttl > Duration::zero() {
            for entry in clusters.values_mut() {
                entry.messages.retain(|_, last_seen| now - *last_seen <= ttl);
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            ttl,
            clusters,
        })
    }

    /// An empty in-memory store, for tests and dry runs.
    #[must_use]
    pub fn in_memory(ttl: Duration) -> Self {
        Self {
            path: PathBuf::new(),
            ttl,
            clusters: HashMap::new(),
        }
    }

    /// Record that a pass is running for `cluster` at `now`.
    pub fn record_pass(&mut self, cluster: &str, now: DateTime<Utc>) {
        self.clusters.entry(cluster.to_string()).or_default().timestamp = Some(now);
    }

    /// Decide whether `message` for `name` should be reported. Returns true
    /// (recording `now` as last-seen) when the fingerprint is unseen or its
    /// last report fell outside the TTL window; false when the message was
    /// already reported within the window. A zero TTL never re-admits.
    pub fn try_add(
        &mut self,
        cluster: &str,
        name: &EntityName,
        message: &str,
        now: DateTime<Utc>,
    ) -> bool {
        let fingerprint = fingerprint(name, message);
        let entry = self.clusters.entry(cluster.to_string()).or_default();

        if let Some(last_seen) = entry.messages.get(&fingerprint) {
            let expired = self.ttl > Duration::zero() && now - *last_seen > self.ttl;
            if !expired {
                debug!(%name, "message suppressed by dedup store");
                return false;
            }
        }
        entry.messages.insert(fingerprint, now);
        true
    }

    /// Persist the store as indented JSON. The file is left world-writable
    /// so passes running under different users can share one store; see
    /// DESIGN.md for the hardening note.
    ///
    /// # Errors
    /// Returns [`StoreError::Write`] when the file cannot be written.
    pub fn flush(&self) -> Result<(), StoreError> {
        let write_err = |source| StoreError::Write {
            path: self.path.clone(),
            source,
        };
        let body = serde_json::to_vec_pretty(&self.clusters).map_err(|source| {
            StoreError::Write {
                path: self.path.clone(),
                source: std::io::Error::other(source),
            }
        })?;
        std::fs::write(&self.path, body).map_err(write_err)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o666))
                .map_err(write_err)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn fingerprint(name: &EntityName, message: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(name.to_string().as_bytes());
    hasher.update([0]);
    hasher.update(message.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::wrap_temporal;
    use crate::state::EntityKind;
    use chrono::TimeZone;

    fn name() -> EntityName {
        EntityName::new("default", EntityKind::Pod, "web-0")
    }

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn second_add_within_window_suppressed() {
        let mut store = DedupStore::in_memory(Duration::minutes(60));
        assert!(store.try_add("prod", &name(), "pod is broken", ts(0)));
        assert!(!store.try_add("prod", &name(), "pod is broken", ts(60)));
    }

    #[test]
    fn readmitted_after_ttl() {
        let ttl = Duration::minutes(60);
        let mut store = DedupStore::in_memory(ttl);
        assert!(store.try_add("prod", &name(), "pod is broken", ts(0)));
        // one second past the window
        assert!(store.try_add("prod", &name(), "pod is broken", ts(3601)));
    }

    #[test]
    fn zero_ttl_dedups_forever() {
        let mut store = DedupStore::in_memory(Duration::zero());
        assert!(store.try_add("prod", &name(), "pod is broken", ts(0)));
        assert!(!store.try_add("prod", &name(), "pod is broken", ts(365 * 86_400)));
    }

    #[test]
    fn clusters_are_isolated() {
        let mut store = DedupStore::in_memory(Duration::minutes(60));
        assert!(store.try_add("prod", &name(), "pod is broken", ts(0)));
        assert!(store.try_add("staging", &name(), "pod is broken", ts(0)));
    }

    #[test]
    fn fingerprint_uses_marked_message() {
        // Documented quirk: the fingerprint covers the temporally-marked
        // message, not its normalized form. The same underlying problem with
        // a different elapsed-time phrase therefore re-reports.
        let mut store = DedupStore::in_memory(Duration::minutes(60));
        let first = format!("waiting since {} ago", wrap_temporal("5m"));
        let second = format!("waiting since {} ago", wrap_temporal("6m"));
        assert!(store.try_add("prod", &name(), &first, ts(0)));
        assert!(store.try_add("prod", &name(), &second, ts(60)));
        // identical volatile content does collide
        assert!(!store.try_add("prod", &name(), &first, ts(120)));
    }

    #[test]
    fn missing_file_is_fresh_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let store = DedupStore::load(&path, Duration::minutes(60), ts(0)).unwrap();
        assert!(store.clusters.is_empty());
    }

    #[test]
    fn corrupt_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            DedupStore::load(&path, Duration::minutes(60), ts(0)),
            Err(StoreError::Parse { .. })
        ));
    }

    #[test]
    fn flush_and_reload_preserves_suppression() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let ttl = Duration::minutes(60);

        let mut store = DedupStore::load(&path, ttl, ts(0)).unwrap();
        store.record_pass("prod", ts(0));
        assert!(store.try_add("prod", &name(), "pod is broken", ts(0)));
        store.flush().unwrap();

        let mut reloaded = DedupStore::load(&path, ttl, ts(60)).unwrap();
        assert!(!reloaded.try_add("prod", &name(), "pod is broken", ts(60)));
    }

    #[test]
    fn load_prunes_expired_entries_eagerly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let ttl = Duration::minutes(60);

        let mut store = DedupStore::load(&path, ttl, ts(0)).unwrap();
        assert!(store.try_add("prod", &name(), "pod is broken", ts(0)));
        store.flush().unwrap();

        // reload well past the window: the entry is gone from the map, not
        // merely ignored at lookup time
        let reloaded = DedupStore::load(&path, ttl, ts(7200)).unwrap();
        assert!(reloaded
            .clusters
            .get("prod")
            .map_or(true, |entry| entry.messages.is_empty()));
    }

    #[test]
    fn empty_file_is_fresh_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "").unwrap();
        let store = DedupStore::load(&path, Duration::minutes(60), ts(0)).unwrap();
        assert!(store.clusters.is_empty());
    }
}
