//! Tasks automation: CRUD commands, daily digest, deadline reminders.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use tokio::sync::watch;

use crate::automations::{Automation, AutomationContext, LoopHandle};
use crate::schedule::{
    DeadlineSweeper, DigestSchedule, DigestScheduler, DigestSource, Notifier,
};
use crate::store::{DigestWatermark, Task, TaskStore};
use crate::transport::{CommandHandler, CommandRegistry, TransportNotifier};

/// Digest body: the pending task list, or `None` when there is nothing
/// pending (no message, but the day still counts as handled).
struct TaskDigestSource {
    store: Arc<TaskStore>,
}

#[async_trait]
impl DigestSource for TaskDigestSource {
    async fn assemble(&self) -> anyhow::Result<Option<String>> {
        let pending = self.store.list(false).await;
        if pending.is_empty() {
            return Ok(None);
        }
        Ok(Some(format_task_digest(&pending)))
    }
}

fn format_task_digest(tasks: &[Task]) -> String {
    let mut body = format!("📋 Daily Task Digest - {} pending\n", tasks.len());
    for task in tasks {
        body.push('\n');
        body.push_str(&format_task_line(task));
    }
    body
}

fn format_task_line(task: &Task) -> String {
    match task.due_at {
        Some(due) => format!(
            "#{} {} (due {})",
            task.id,
            task.description,
            due.with_timezone(&Local).format("%Y-%m-%d %H:%M")
        ),
        None => format!("#{} {}", task.id, task.description),
    }
}

pub struct TasksAutomation {
    store: Arc<TaskStore>,
    digest: Arc<DigestScheduler>,
    sweeper: Arc<DeadlineSweeper>,
    check_interval: Duration,
    loop_handle: LoopHandle,
}

impl TasksAutomation {
    pub async fn new(ctx: &AutomationContext) -> Self {
        let config = &ctx.config.tasks;
        let store = Arc::new(TaskStore::new(ctx.data_dir().join("tasks.json")));
        let notifier: Arc<dyn Notifier> = Arc::new(TransportNotifier::new(
            ctx.transport.clone(),
            ctx.config.notify_user.clone(),
        ));
        let watermark =
            DigestWatermark::load(ctx.data_dir().join("task_digest_state.json")).await;

        let digest = Arc::new(DigestScheduler::new(
            DigestSchedule {
                name: "tasks",
                hour: config.digest_hour,
                minute: config.digest_minute,
                check_interval: Duration::from_secs(config.check_interval_secs),
                grace: chrono::Duration::minutes(config.grace_minutes),
                send_on_startup: false,
            },
            Arc::new(TaskDigestSource {
                store: store.clone(),
            }),
            notifier.clone(),
            watermark,
        ));
        let sweeper = Arc::new(DeadlineSweeper::new(
            store.clone(),
            config.lead_hours,
            notifier,
        ));

        Self {
            store,
            digest,
            sweeper,
            check_interval: Duration::from_secs(config.check_interval_secs),
            loop_handle: LoopHandle::new(ctx.shutdown_grace()),
        }
    }

    /// One loop drives both the digest gate and the deadline sweep; they
    /// share the tick interval and act on the same store.
    async fn run(
        digest: Arc<DigestScheduler>,
        sweeper: Arc<DeadlineSweeper>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        tracing::info!("Task scheduler started: checking every {:?}", interval);
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.changed() => break,
            }
            if *shutdown.borrow() {
                break;
            }
            digest.tick(Local::now()).await;
            sweeper.sweep(Utc::now()).await;
        }
        tracing::info!("Task scheduler stopped");
    }
}

#[async_trait]
impl Automation for TasksAutomation {
    fn name(&self) -> &'static str {
        "tasks"
    }

    fn description(&self) -> &'static str {
        "Task tracking with daily digest and deadline reminders"
    }

    fn register_commands(&self, registry: &mut CommandRegistry) {
        registry.register(
            "task",
            Arc::new(TaskCommand {
                store: self.store.clone(),
                digest: self.digest.clone(),
            }),
        );
    }

    async fn start(&self) {
        let digest = self.digest.clone();
        let sweeper = self.sweeper.clone();
        let interval = self.check_interval;
        self.loop_handle
            .spawn(move |rx| Self::run(digest, sweeper, interval, rx))
            .await;
    }

    async fn stop(&self) {
        self.loop_handle.stop("tasks").await;
    }

    async fn is_running(&self) -> bool {
        self.loop_handle.is_running().await
    }
}

/// `task` chat command. Subcommands:
/// `add <description> [due=<rfc3339>]`, `list [all]`, `done <id>`,
/// `edit <id> [description] [due=<rfc3339>]`, `rm <id>`, `clear`, `digest`.
struct TaskCommand {
    store: Arc<TaskStore>,
    digest: Arc<DigestScheduler>,
}

impl TaskCommand {
    async fn add(&self, args: &str) -> String {
        let (description, due_at) = match split_due(args) {
            Ok(parsed) => parsed,
            Err(reply) => return reply,
        };
        if description.is_empty() {
            return "Usage: task add <description> [due=<rfc3339>]".to_string();
        }
        match self.store.add(description, due_at, "").await {
            Ok(task) => format!("Added {}", format_task_line(&task)),
            Err(e) => {
                tracing::error!("task add failed: {}", e);
                "Could not save the task, see logs.".to_string()
            }
        }
    }

    async fn list(&self, include_completed: bool) -> String {
        let tasks = self.store.list(include_completed).await;
        if tasks.is_empty() {
            return "No tasks.".to_string();
        }
        tasks
            .iter()
            .map(format_task_line)
            .collect::<Vec<_>>()
            .join("\n")
    }

    async fn done(&self, args: &str) -> String {
        let Ok(id) = args.trim().parse::<u64>() else {
            return "Usage: task done <id>".to_string();
        };
        match self.store.complete(id).await {
            Ok(Some(task)) => format!("Completed #{} {}", task.id, task.description),
            Ok(None) => format!("No task #{}", id),
            Err(e) => {
                tracing::error!("task done failed: {}", e);
                "Could not update the task, see logs.".to_string()
            }
        }
    }

    async fn edit(&self, args: &str) -> String {
        let (id, rest) = match args.split_once(char::is_whitespace) {
            Some((id, rest)) => (id, rest.trim()),
            None => (args.trim(), ""),
        };
        let Ok(id) = id.parse::<u64>() else {
            return "Usage: task edit <id> [description] [due=<rfc3339>]".to_string();
        };
        let (description, due_at) = match split_due(rest) {
            Ok(parsed) => parsed,
            Err(reply) => return reply,
        };
        let description = (!description.is_empty()).then_some(description);
        if description.is_none() && due_at.is_none() {
            return "Nothing to change. Give a new description, a due=<rfc3339>, or both."
                .to_string();
        }
        match self.store.update(id, description, due_at, None).await {
            Ok(Some(task)) => format!("Updated {}", format_task_line(&task)),
            Ok(None) => format!("No task #{}", id),
            Err(e) => {
                tracing::error!("task edit failed: {}", e);
                "Could not update the task, see logs.".to_string()
            }
        }
    }

    async fn remove(&self, args: &str) -> String {
        let Ok(id) = args.trim().parse::<u64>() else {
            return "Usage: task rm <id>".to_string();
        };
        match self.store.delete(id).await {
            Ok(true) => format!("Deleted #{}", id),
            Ok(false) => format!("No task #{}", id),
            Err(e) => {
                tracing::error!("task rm failed: {}", e);
                "Could not delete the task, see logs.".to_string()
            }
        }
    }

    async fn clear(&self) -> String {
        match self.store.clear_completed().await {
            Ok(count) => format!("Cleared {} completed tasks", count),
            Err(e) => {
                tracing::error!("task clear failed: {}", e);
                "Could not clear tasks, see logs.".to_string()
            }
        }
    }
}

#[async_trait]
impl CommandHandler for TaskCommand {
    async fn handle(&self, args: &str) -> String {
        let (sub, rest) = match args.split_once(char::is_whitespace) {
            Some((sub, rest)) => (sub, rest.trim()),
            None => (args.trim(), ""),
        };
        match sub {
            "add" => self.add(rest).await,
            "list" => self.list(rest == "all").await,
            "" => self.list(false).await,
            "done" => self.done(rest).await,
            "edit" => self.edit(rest).await,
            "rm" | "del" => self.remove(rest).await,
            "clear" => self.clear().await,
            "digest" => {
                let digest = self.digest.clone();
                tokio::spawn(async move {
                    digest.fire(Local::now()).await;
                });
                "Sending today's task digest now.".to_string()
            }
            other => format!(
                "Unknown subcommand '{}'. Try: add, list, done, edit, rm, clear, digest",
                other
            ),
        }
    }
}

/// Split a trailing `due=<rfc3339>` option off the description.
fn split_due(args: &str) -> Result<(String, Option<DateTime<Utc>>), String> {
    match args.split_once("due=") {
        Some((description, raw)) => match DateTime::parse_from_rfc3339(raw.trim()) {
            Ok(due) => Ok((
                description.trim().to_string(),
                Some(due.with_timezone(&Utc)),
            )),
            Err(_) => Err(format!(
                "Could not parse due date '{}': expected RFC 3339, e.g. 2026-08-24T17:00:00Z",
                raw.trim()
            )),
        },
        None => Ok((args.trim().to_string(), None)),
    }
}
