//! JSON-backed task store.
//!
//! All mutation is serialized through a single async mutex and performed as
//! load -> mutate -> persist, so concurrent edits to the backing file from
//! outside the process are tolerated (last writer wins) and no record is
//! ever mutated in place by external code.

use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::store::{read_raw, write_json};

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Completed,
}

/// A single tracked task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique, stable for the task's lifetime, assigned as `max + 1`.
    pub id: u64,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub due_at: Option<DateTime<Utc>>,
    pub status: TaskStatus,
    /// Whether the one-time pre-deadline reminder has been delivered.
    /// Reset whenever `due_at` changes.
    #[serde(default)]
    pub deadline_reminder_sent: bool,
    #[serde(default)]
    pub notes: String,
}

impl Task {
    pub fn is_pending(&self) -> bool {
        self.status == TaskStatus::Pending
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct TaskFile {
    tasks: Vec<Task>,
    last_updated: Option<DateTime<Utc>>,
}

/// Concurrency-safe collection of [`Task`] records.
pub struct TaskStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl TaskStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Load the current task set. Corrupt data degrades to an empty set:
    /// this is a low-stakes personal tool and availability wins.
    async fn load(&self) -> Vec<Task> {
        let Some(raw) = read_raw(&self.path).await else {
            return Vec::new();
        };
        match serde_json::from_str::<TaskFile>(&raw) {
            Ok(file) => file.tasks,
            Err(e) => {
                tracing::warn!(
                    "Corrupt task file {}, starting with empty set: {}",
                    self.path.display(),
                    e
                );
                Vec::new()
            }
        }
    }

    async fn save(&self, tasks: Vec<Task>) -> Result<(), StoreError> {
        let file = TaskFile {
            tasks,
            last_updated: Some(Utc::now()),
        };
        write_json(&self.path, &file).await
    }

    /// Add a new task and return the stored record.
    pub async fn add(
        &self,
        description: impl Into<String>,
        due_at: Option<DateTime<Utc>>,
        notes: impl Into<String>,
    ) -> Result<Task, StoreError> {
        let _guard = self.lock.lock().await;
        let mut tasks = self.load().await;
        let id = tasks.iter().map(|t| t.id).max().unwrap_or(0) + 1;
        let task = Task {
            id,
            description: description.into(),
            created_at: Utc::now(),
            due_at,
            status: TaskStatus::Pending,
            deadline_reminder_sent: false,
            notes: notes.into(),
        };
        tasks.push(task.clone());
        self.save(tasks).await?;
        tracing::info!("Added task #{}: {}", task.id, task.description);
        Ok(task)
    }

    pub async fn get(&self, id: u64) -> Option<Task> {
        let _guard = self.lock.lock().await;
        self.load().await.into_iter().find(|t| t.id == id)
    }

    /// List tasks, excluding completed ones unless asked for.
    pub async fn list(&self, include_completed: bool) -> Vec<Task> {
        let _guard = self.lock.lock().await;
        let tasks = self.load().await;
        if include_completed {
            tasks
        } else {
            tasks.into_iter().filter(Task::is_pending).collect()
        }
    }

    /// Pending tasks whose due date falls within the next `hours` hours.
    pub async fn due_within(&self, hours: i64) -> Vec<Task> {
        let threshold = Utc::now() + Duration::hours(hours);
        let _guard = self.lock.lock().await;
        self.load()
            .await
            .into_iter()
            .filter(|t| t.is_pending() && t.due_at.is_some_and(|due| due <= threshold))
            .collect()
    }

    /// Mark a task completed. Idempotent: completing an already-completed
    /// task returns it again without error.
    pub async fn complete(&self, id: u64) -> Result<Option<Task>, StoreError> {
        let _guard = self.lock.lock().await;
        let mut tasks = self.load().await;
        let Some(task) = tasks.iter_mut().find(|t| t.id == id) else {
            return Ok(None);
        };
        task.status = TaskStatus::Completed;
        let updated = task.clone();
        self.save(tasks).await?;
        tracing::info!("Completed task #{}", id);
        Ok(Some(updated))
    }

    /// Update fields of a task. A supplied `due_at` that differs from the
    /// stored one resets the deadline reminder flag.
    pub async fn update(
        &self,
        id: u64,
        description: Option<String>,
        due_at: Option<DateTime<Utc>>,
        notes: Option<String>,
    ) -> Result<Option<Task>, StoreError> {
        let _guard = self.lock.lock().await;
        let mut tasks = self.load().await;
        let Some(task) = tasks.iter_mut().find(|t| t.id == id) else {
            return Ok(None);
        };
        if let Some(description) = description {
            task.description = description;
        }
        if let Some(due) = due_at {
            if task.due_at != Some(due) {
                task.deadline_reminder_sent = false;
            }
            task.due_at = Some(due);
        }
        if let Some(notes) = notes {
            task.notes = notes;
        }
        let updated = task.clone();
        self.save(tasks).await?;
        tracing::info!("Updated task #{}", id);
        Ok(Some(updated))
    }

    /// Record that the pre-deadline reminder was delivered for a task.
    pub async fn mark_reminded(&self, id: u64) -> Result<bool, StoreError> {
        let _guard = self.lock.lock().await;
        let mut tasks = self.load().await;
        let Some(task) = tasks.iter_mut().find(|t| t.id == id) else {
            return Ok(false);
        };
        task.deadline_reminder_sent = true;
        self.save(tasks).await?;
        Ok(true)
    }

    pub async fn delete(&self, id: u64) -> Result<bool, StoreError> {
        let _guard = self.lock.lock().await;
        let mut tasks = self.load().await;
        let before = tasks.len();
        tasks.retain(|t| t.id != id);
        if tasks.len() == before {
            return Ok(false);
        }
        self.save(tasks).await?;
        tracing::info!("Deleted task #{}", id);
        Ok(true)
    }

    /// Remove all completed tasks, returning how many were removed.
    pub async fn clear_completed(&self) -> Result<usize, StoreError> {
        let _guard = self.lock.lock().await;
        let mut tasks = self.load().await;
        let before = tasks.len();
        tasks.retain(Task::is_pending);
        let removed = before - tasks.len();
        if removed > 0 {
            self.save(tasks).await?;
            tracing::info!("Cleared {} completed tasks", removed);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn store() -> (tempfile::TempDir, TaskStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = TaskStore::new(dir.path().join("tasks.json"));
        (dir, store)
    }

    #[tokio::test]
    async fn add_then_get_returns_equal_record() {
        let (_dir, store) = store();
        let task = store.add("Buy milk", None, "").await.unwrap();
        assert_eq!(task.id, 1);
        assert_eq!(store.get(task.id).await, Some(task));
    }

    #[tokio::test]
    async fn ids_are_monotonic_even_after_delete() {
        let (_dir, store) = store();
        let a = store.add("a", None, "").await.unwrap();
        let b = store.add("b", None, "").await.unwrap();
        assert_eq!((a.id, b.id), (1, 2));
        assert!(store.delete(2).await.unwrap());
        let c = store.add("c", None, "").await.unwrap();
        // max(existing) + 1 = 2 again once the high id is gone
        assert_eq!(c.id, 2);
    }

    #[tokio::test]
    async fn delete_then_get_returns_none() {
        let (_dir, store) = store();
        let task = store.add("ephemeral", None, "").await.unwrap();
        assert!(store.delete(task.id).await.unwrap());
        assert_eq!(store.get(task.id).await, None);
        assert!(!store.delete(task.id).await.unwrap());
    }

    #[tokio::test]
    async fn complete_is_idempotent() {
        let (_dir, store) = store();
        let task = store.add("done soon", None, "").await.unwrap();
        let first = store.complete(task.id).await.unwrap().unwrap();
        let second = store.complete(task.id).await.unwrap().unwrap();
        assert_eq!(first.status, TaskStatus::Completed);
        assert_eq!(first, second);
        assert_eq!(store.complete(999).await.unwrap(), None);
    }

    #[tokio::test]
    async fn list_excludes_completed_by_default() {
        let (_dir, store) = store();
        store.add("keep", None, "").await.unwrap();
        let done = store.add("drop", None, "").await.unwrap();
        store.complete(done.id).await.unwrap();

        let pending = store.list(false).await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].description, "keep");
        assert_eq!(store.list(true).await.len(), 2);
    }

    #[tokio::test]
    async fn due_within_filters_on_window_and_status() {
        let (_dir, store) = store();
        let soon = Utc::now() + Duration::hours(2);
        let far = Utc::now() + Duration::hours(48);
        store.add("soon", Some(soon), "").await.unwrap();
        store.add("far", Some(far), "").await.unwrap();
        store.add("undated", None, "").await.unwrap();
        let done = store.add("done", Some(soon), "").await.unwrap();
        store.complete(done.id).await.unwrap();

        let due = store.due_within(24).await;
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].description, "soon");
    }

    #[tokio::test]
    async fn changing_due_date_resets_reminder_flag() {
        let (_dir, store) = store();
        let due = Utc::now() + Duration::hours(1);
        let task = store.add("remindable", Some(due), "").await.unwrap();
        assert!(store.mark_reminded(task.id).await.unwrap());
        assert!(store.get(task.id).await.unwrap().deadline_reminder_sent);

        let new_due = due + Duration::hours(3);
        let updated = store
            .update(task.id, None, Some(new_due), None)
            .await
            .unwrap()
            .unwrap();
        assert!(!updated.deadline_reminder_sent);
        assert_eq!(updated.due_at, Some(new_due));

        // Re-supplying the same due date does not reset the flag.
        assert!(store.mark_reminded(task.id).await.unwrap());
        let same = store
            .update(task.id, Some("renamed".into()), Some(new_due), None)
            .await
            .unwrap()
            .unwrap();
        assert!(same.deadline_reminder_sent);
        assert_eq!(same.description, "renamed");
    }

    #[tokio::test]
    async fn clear_completed_removes_only_completed() {
        let (_dir, store) = store();
        store.add("pending", None, "").await.unwrap();
        let a = store.add("done-a", None, "").await.unwrap();
        let b = store.add("done-b", None, "").await.unwrap();
        store.complete(a.id).await.unwrap();
        store.complete(b.id).await.unwrap();

        assert_eq!(store.clear_completed().await.unwrap(), 2);
        assert_eq!(store.clear_completed().await.unwrap(), 0);
        assert_eq!(store.list(true).await.len(), 1);
    }

    #[tokio::test]
    async fn corrupt_file_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.json");
        tokio::fs::write(&path, "{not json").await.unwrap();
        let store = TaskStore::new(&path);
        assert!(store.list(true).await.is_empty());
        // The store keeps working after corruption.
        let task = store.add("fresh start", None, "").await.unwrap();
        assert_eq!(task.id, 1);
    }
}
