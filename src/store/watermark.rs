//! Per-scheduler persisted watermarks.
//!
//! A watermark records the last cycle or date an action was taken for, and
//! is the sole source of truth for "did this already run" across restarts.
//! It is only advanced after the corresponding side effect was attempted.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::store::{read_raw, write_json};

#[derive(Debug, Default, Serialize, Deserialize)]
struct ThoughtFile {
    last_action_at: Option<DateTime<Utc>>,
}

/// When the thought scheduler last delivered a proactive message.
pub struct ThoughtWatermark {
    path: PathBuf,
    last_action_at: Mutex<Option<DateTime<Utc>>>,
}

impl ThoughtWatermark {
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let last_action_at = load_field(&path, |f: ThoughtFile| f.last_action_at).await;
        Self {
            path,
            last_action_at: Mutex::new(last_action_at),
        }
    }

    pub async fn last_action_at(&self) -> Option<DateTime<Utc>> {
        *self.last_action_at.lock().await
    }

    /// Advance to `now` and persist. Called only after a send was attempted.
    pub async fn advance(&self, now: DateTime<Utc>) -> Result<(), StoreError> {
        let mut guard = self.last_action_at.lock().await;
        *guard = Some(now);
        write_json(
            &self.path,
            &ThoughtFile {
                last_action_at: *guard,
            },
        )
        .await
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct DigestFile {
    last_digest_date: Option<DateTime<Utc>>,
}

/// When a digest scheduler last fired (or deliberately skipped) its day.
pub struct DigestWatermark {
    path: PathBuf,
    last_digest: Mutex<Option<DateTime<Utc>>>,
}

impl DigestWatermark {
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let last_digest = load_field(&path, |f: DigestFile| f.last_digest_date).await;
        Self {
            path,
            last_digest: Mutex::new(last_digest),
        }
    }

    pub async fn last_digest(&self) -> Option<DateTime<Utc>> {
        *self.last_digest.lock().await
    }

    /// Record that today's digest was handled (fired, empty, or missed).
    pub async fn advance(&self, now: DateTime<Utc>) -> Result<(), StoreError> {
        let mut guard = self.last_digest.lock().await;
        *guard = Some(now);
        write_json(
            &self.path,
            &DigestFile {
                last_digest_date: *guard,
            },
        )
        .await
    }
}

async fn load_field<F, T>(path: &std::path::Path, extract: F) -> Option<DateTime<Utc>>
where
    F: FnOnce(T) -> Option<DateTime<Utc>>,
    T: serde::de::DeserializeOwned,
{
    let raw = read_raw(path).await?;
    match serde_json::from_str::<T>(&raw) {
        Ok(file) => extract(file),
        Err(e) => {
            tracing::warn!(
                "Corrupt watermark file {}, starting fresh: {}",
                path.display(),
                e
            );
            None
        }
    }
}
