//! End-to-end task lifecycle: add, deadline reminder, daily digest.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Local, TimeZone, Utc};
use tokio::sync::Mutex;

use concierge::error::ChannelError;
use concierge::schedule::{
    DeadlineSweeper, DigestOutcome, DigestSchedule, DigestScheduler, DigestSource, Notifier,
};
use concierge::store::{DigestWatermark, TaskStore};

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<String>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, text: &str) -> Result<(), ChannelError> {
        self.sent.lock().await.push(text.to_string());
        Ok(())
    }
}

struct PendingTaskSource {
    store: Arc<TaskStore>,
}

#[async_trait]
impl DigestSource for PendingTaskSource {
    async fn assemble(&self) -> anyhow::Result<Option<String>> {
        let pending = self.store.list(false).await;
        if pending.is_empty() {
            return Ok(None);
        }
        let lines: Vec<String> = pending
            .iter()
            .map(|t| format!("#{} {}", t.id, t.description))
            .collect();
        Ok(Some(lines.join("\n")))
    }
}

#[tokio::test]
async fn reminder_fires_inside_lead_window_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(TaskStore::new(dir.path().join("tasks.json")));
    let notifier = Arc::new(RecordingNotifier::default());
    let sweeper = DeadlineSweeper::new(store.clone(), 1, notifier.clone());

    let now = Utc::now();
    let task = store
        .add("Buy milk", Some(now + Duration::hours(2)), "")
        .await
        .unwrap();

    // Deadline is still beyond the one-hour lead window.
    assert_eq!(sweeper.sweep(now + Duration::minutes(30)).await, 0);
    assert!(!store.get(task.id).await.unwrap().deadline_reminder_sent);

    // Inside the window: fires and records.
    assert_eq!(sweeper.sweep(now + Duration::minutes(90)).await, 1);
    assert!(store.get(task.id).await.unwrap().deadline_reminder_sent);

    // Subsequent sweeps stay quiet.
    assert_eq!(sweeper.sweep(now + Duration::minutes(95)).await, 0);

    let sent = notifier.sent.lock().await;
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("Buy milk"));
}

#[tokio::test]
async fn daily_digest_lists_pending_tasks_once_per_day() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(TaskStore::new(dir.path().join("tasks.json")));
    store.add("Buy milk", None, "").await.unwrap();
    let done = store.add("Old chore", None, "").await.unwrap();
    store.complete(done.id).await.unwrap();

    let notifier = Arc::new(RecordingNotifier::default());
    let watermark = DigestWatermark::load(dir.path().join("digest_state.json")).await;
    let scheduler = DigestScheduler::new(
        DigestSchedule {
            name: "tasks",
            hour: 7,
            minute: 0,
            check_interval: StdDuration::from_secs(60),
            grace: Duration::minutes(10),
            send_on_startup: false,
        },
        Arc::new(PendingTaskSource {
            store: store.clone(),
        }),
        notifier.clone(),
        watermark,
    );

    let at = |h: u32, m: u32| -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 8, 24, h, m, 0).unwrap()
    };

    assert_eq!(scheduler.tick(at(6, 59)).await, DigestOutcome::TooEarly);
    assert_eq!(scheduler.tick(at(7, 3)).await, DigestOutcome::Sent);
    assert_eq!(scheduler.tick(at(7, 5)).await, DigestOutcome::AlreadyFired);

    let sent = notifier.sent.lock().await;
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("Buy milk"));
    assert!(!sent[0].contains("Old chore"));
}
