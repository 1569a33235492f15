//! Dedup tracker for delivered item keys.
//!
//! A TTL-bounded set of content-addressable keys (canonical links) with the
//! time each was first delivered. Eviction is lazy: expired entries are
//! dropped when the tracker loads, not swept in the background.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::store::{read_raw, write_json};

/// Anything identified by a stable dedup key.
pub trait Keyed {
    fn key(&self) -> &str;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SeenFile {
    /// key -> RFC 3339 timestamp of first delivery.
    seen: BTreeMap<String, String>,
}

/// Persisted set of already-delivered item keys.
pub struct SeenTracker {
    path: PathBuf,
    seen: Mutex<BTreeMap<String, DateTime<Utc>>>,
}

impl SeenTracker {
    /// Load the tracker, evicting entries older than `retention_days`.
    /// Entries with unparsable timestamps are treated as expired so corrupt
    /// values shrink state rather than growing it unboundedly.
    pub async fn load(path: impl Into<PathBuf>, retention_days: i64) -> Self {
        Self::load_at(path, retention_days, Utc::now()).await
    }

    async fn load_at(path: impl Into<PathBuf>, retention_days: i64, now: DateTime<Utc>) -> Self {
        let path = path.into();
        let cutoff = now - Duration::days(retention_days);

        let mut seen = BTreeMap::new();
        if let Some(raw) = read_raw(&path).await {
            match serde_json::from_str::<SeenFile>(&raw) {
                Ok(file) => {
                    let total = file.seen.len();
                    for (key, stamp) in file.seen {
                        match DateTime::parse_from_rfc3339(&stamp) {
                            Ok(at) if at.with_timezone(&Utc) >= cutoff => {
                                seen.insert(key, at.with_timezone(&Utc));
                            }
                            _ => {}
                        }
                    }
                    let evicted = total - seen.len();
                    if evicted > 0 {
                        tracing::debug!("Evicted {} expired seen entries", evicted);
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        "Corrupt seen file {}, starting empty: {}",
                        path.display(),
                        e
                    );
                }
            }
        }

        Self {
            path,
            seen: Mutex::new(seen),
        }
    }

    pub async fn is_seen(&self, key: &str) -> bool {
        self.seen.lock().await.contains_key(key)
    }

    /// Keep only items whose key has not been delivered before. Pure filter:
    /// calling it twice without an intervening `mark_seen` returns the same
    /// set.
    pub async fn filter_new<T: Keyed>(&self, items: Vec<T>) -> Vec<T> {
        let seen = self.seen.lock().await;
        items
            .into_iter()
            .filter(|item| !seen.contains_key(item.key()))
            .collect()
    }

    /// Record delivery of each key at the current time and persist
    /// immediately.
    pub async fn mark_seen<I, S>(&self, keys: I) -> Result<(), StoreError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let now = Utc::now();
        let mut seen = self.seen.lock().await;
        for key in keys {
            seen.insert(key.into(), now);
        }
        let file = SeenFile {
            seen: seen
                .iter()
                .map(|(k, at)| (k.clone(), at.to_rfc3339()))
                .collect(),
        };
        write_json(&self.path, &file).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    // Implement the trait through its public re-export, the path the news
    // pipeline uses.
    use crate::store::Keyed as StoreKeyed;

    struct Link(String);

    impl StoreKeyed for Link {
        fn key(&self) -> &str {
            &self.0
        }
    }

    fn links(keys: &[&str]) -> Vec<Link> {
        keys.iter().map(|k| Link(k.to_string())).collect()
    }

    #[tokio::test]
    async fn mark_then_is_seen() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = SeenTracker::load(dir.path().join("seen.json"), 7).await;
        assert!(!tracker.is_seen("https://example.com/a").await);
        tracker.mark_seen(["https://example.com/a"]).await.unwrap();
        assert!(tracker.is_seen("https://example.com/a").await);
    }

    #[tokio::test]
    async fn marks_survive_reload_within_retention() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seen.json");
        {
            let tracker = SeenTracker::load(&path, 7).await;
            tracker.mark_seen(["k1", "k2"]).await.unwrap();
        }
        let reloaded = SeenTracker::load(&path, 7).await;
        assert!(reloaded.is_seen("k1").await);
        assert!(reloaded.is_seen("k2").await);
    }

    #[tokio::test]
    async fn entries_expire_after_retention() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seen.json");
        {
            let tracker = SeenTracker::load(&path, 7).await;
            tracker.mark_seen(["old"]).await.unwrap();
        }
        // A load 8 days in the future sees the entry as expired.
        let later = Utc::now() + Duration::days(8);
        let reloaded = SeenTracker::load_at(&path, 7, later).await;
        assert!(!reloaded.is_seen("old").await);
    }

    #[tokio::test]
    async fn unparsable_timestamps_are_evicted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seen.json");
        let raw = r#"{"seen": {"bad": "not-a-timestamp"}}"#;
        tokio::fs::write(&path, raw).await.unwrap();
        let tracker = SeenTracker::load(&path, 7).await;
        assert!(!tracker.is_seen("bad").await);
    }

    #[tokio::test]
    async fn filter_new_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = SeenTracker::load(dir.path().join("seen.json"), 7).await;
        tracker.mark_seen(["seen-1"]).await.unwrap();

        let once = tracker
            .filter_new(links(&["seen-1", "new-1", "new-2"]))
            .await;
        let keys: Vec<_> = once.iter().map(|l| l.0.clone()).collect();
        assert_eq!(keys, vec!["new-1", "new-2"]);

        let twice = tracker.filter_new(once).await;
        let keys2: Vec<_> = twice.iter().map(|l| l.0.clone()).collect();
        assert_eq!(keys2, vec!["new-1", "new-2"]);
    }

    #[tokio::test]
    async fn corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seen.json");
        tokio::fs::write(&path, "][").await.unwrap();
        let tracker = SeenTracker::load(&path, 7).await;
        assert!(!tracker.is_seen("anything").await);
    }
}
