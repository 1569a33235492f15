//! Persisted state stores.
//!
//! Each concern owns one JSON file that is independently readable and
//! writable; there is no cross-file transaction. Every store follows the
//! same policy: a missing or corrupt backing file degrades to the default
//! (empty) state with a warning, while write failures surface as
//! [`StoreError`](crate::error::StoreError) so callers can log them.

mod seen;
mod tasks;
mod watermark;

pub use seen::{Keyed, SeenTracker};
pub use tasks::{Task, TaskStore, TaskStatus};
pub use watermark::{DigestWatermark, ThoughtWatermark};

use std::path::Path;

use serde::Serialize;

use crate::error::StoreError;

/// Write `value` as pretty-printed JSON, creating parent directories.
pub(crate) async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| StoreError::CreateDir {
                path: parent.display().to_string(),
                source,
            })?;
    }
    let data = serde_json::to_string_pretty(value)?;
    tokio::fs::write(path, data)
        .await
        .map_err(|source| StoreError::Write {
            path: path.display().to_string(),
            source,
        })
}

/// Read the raw contents of a state file, treating a missing file as empty.
pub(crate) async fn read_raw(path: &Path) -> Option<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(raw) => Some(raw),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            tracing::warn!("Failed to read {}: {}", path.display(), e);
            None
        }
    }
}
