//! Deadline sweeper: one-time reminders ahead of task due times.

use std::sync::Arc;

use chrono::{DateTime, Duration, Local, Utc};

use crate::schedule::Notifier;
use crate::store::{Task, TaskStore};

/// Whether `task` is eligible for its pre-deadline reminder at `now`.
///
/// Eligible means: pending, not yet reminded, and due inside the forward
/// lead window `[now, now + lead]`. A deadline that already passed is
/// skipped forever; no reminder is sent for a missed window.
pub fn due_for_reminder(task: &Task, now: DateTime<Utc>, lead: Duration) -> bool {
    if !task.is_pending() || task.deadline_reminder_sent {
        return false;
    }
    match task.due_at {
        Some(due) => due >= now && due <= now + lead,
        None => false,
    }
}

pub struct DeadlineSweeper {
    store: Arc<TaskStore>,
    lead: Duration,
    notifier: Arc<dyn Notifier>,
}

impl DeadlineSweeper {
    pub fn new(store: Arc<TaskStore>, lead_hours: i64, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            lead: Duration::hours(lead_hours),
            notifier,
        }
    }

    /// Sweep all pending tasks once, firing at most one reminder per task
    /// ever. Returns how many reminders were delivered.
    pub async fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut fired = 0;
        for task in self.store.list(false).await {
            if !due_for_reminder(&task, now, self.lead) {
                continue;
            }
            match self.notifier.notify(&format_reminder(&task)).await {
                Ok(()) => {
                    // Mark only after a successful send so a transport
                    // outage retries on the next sweep.
                    match self.store.mark_reminded(task.id).await {
                        Ok(true) => fired += 1,
                        Ok(false) => {
                            tracing::warn!("Task #{} vanished while reminding", task.id)
                        }
                        Err(e) => {
                            tracing::error!(
                                "Failed to record reminder for task #{}: {}",
                                task.id,
                                e
                            );
                        }
                    }
                    tracing::info!("Sent deadline reminder for task #{}", task.id);
                }
                Err(e) => {
                    tracing::error!("Failed to send reminder for task #{}: {}", task.id, e);
                }
            }
        }
        fired
    }
}

fn format_reminder(task: &Task) -> String {
    let due = task
        .due_at
        .map(|d| d.with_timezone(&Local).format("%H:%M").to_string())
        .unwrap_or_default();
    let mut text = format!(
        "⏰ Reminder: \"{}\" (#{}) is due at {}.",
        task.description, task.id, due
    );
    if !task.notes.is_empty() {
        text.push_str(&format!("\nNotes: {}", task.notes));
    }
    text
}
