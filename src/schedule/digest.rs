//! Daily digest scheduler, shared by the news and task automations.
//!
//! Fires at most once per day at (or shortly after) a configured time. The
//! persisted watermark is the sole source of truth for "already fired
//! today" across restarts, and it advances even for empty or failed
//! digests so the same day is never re-evaluated in a storm.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDateTime, Utc};
use tokio::sync::watch;

use crate::schedule::{DigestSource, Notifier};
use crate::store::DigestWatermark;

/// Pure scheduling decision for a digest tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestDecision {
    /// The watermark already covers today.
    AlreadyFired,
    /// The target time has not arrived yet.
    TooEarly,
    /// The target time passed more than the grace window ago: skip today
    /// without firing, so a late-starting process never blasts a stale
    /// digest hours later.
    MissedWindow,
    /// Within the window: fire.
    Fire,
}

/// Decide what a tick at `now` should do, given the last handled digest
/// time (in the same wall-clock frame as `now`).
pub fn evaluate_digest(
    last_digest: Option<NaiveDateTime>,
    hour: u32,
    minute: u32,
    grace: chrono::Duration,
    now: NaiveDateTime,
) -> DigestDecision {
    if let Some(last) = last_digest {
        if last.date() == now.date() {
            return DigestDecision::AlreadyFired;
        }
    }

    let Some(target) = now.date().and_hms_opt(hour, minute, 0) else {
        // Invalid configured time; nothing will ever fire.
        return DigestDecision::TooEarly;
    };

    if now < target {
        DigestDecision::TooEarly
    } else if now - target > grace {
        DigestDecision::MissedWindow
    } else {
        DigestDecision::Fire
    }
}

/// What a digest tick actually did.
#[derive(Debug, PartialEq, Eq)]
pub enum DigestOutcome {
    AlreadyFired,
    TooEarly,
    /// Skipped today without firing; watermark advanced.
    MissedWindow,
    /// Digest assembled and delivered; watermark advanced.
    Sent,
    /// Nothing to report today; watermark advanced anyway.
    Empty,
    /// Assembly or delivery failed; watermark still advanced to avoid a
    /// retry storm within the same day.
    Failed(String),
}

/// Configuration for one digest instance.
#[derive(Debug, Clone)]
pub struct DigestSchedule {
    /// Name used in logs ("news", "tasks").
    pub name: &'static str,
    pub hour: u32,
    pub minute: u32,
    pub check_interval: Duration,
    pub grace: chrono::Duration,
    /// Fire once shortly after startup, bypassing the schedule gates.
    pub send_on_startup: bool,
}

pub struct DigestScheduler {
    schedule: DigestSchedule,
    source: Arc<dyn DigestSource>,
    notifier: Arc<dyn Notifier>,
    watermark: DigestWatermark,
}

impl DigestScheduler {
    pub fn new(
        schedule: DigestSchedule,
        source: Arc<dyn DigestSource>,
        notifier: Arc<dyn Notifier>,
        watermark: DigestWatermark,
    ) -> Self {
        Self {
            schedule,
            source,
            notifier,
            watermark,
        }
    }

    /// Run until the shutdown signal fires.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            "{} digest scheduler started: daily at {:02}:{:02}, grace {}m",
            self.schedule.name,
            self.schedule.hour,
            self.schedule.minute,
            self.schedule.grace.num_minutes()
        );

        if self.schedule.send_on_startup {
            // Operator-testing mode: one unconditional digest after a short
            // delay for the rest of the daemon to come up.
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(5)) => {
                    tracing::info!("{}: sending startup digest", self.schedule.name);
                    self.log_outcome(self.fire(Local::now()).await);
                }
                _ = shutdown.changed() => return,
            }
        }

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.schedule.check_interval) => {}
                _ = shutdown.changed() => break,
            }
            if *shutdown.borrow() {
                break;
            }
            self.log_outcome(self.tick(Local::now()).await);
        }

        tracing::info!("{} digest scheduler stopped", self.schedule.name);
    }

    fn log_outcome(&self, outcome: DigestOutcome) {
        let name = self.schedule.name;
        match outcome {
            DigestOutcome::AlreadyFired | DigestOutcome::TooEarly => {}
            DigestOutcome::MissedWindow => {
                tracing::warn!("{}: missed digest window, waiting for tomorrow", name)
            }
            DigestOutcome::Sent => tracing::info!("{}: digest delivered", name),
            DigestOutcome::Empty => tracing::info!("{}: nothing to report today", name),
            DigestOutcome::Failed(e) => tracing::error!("{}: digest failed: {}", name, e),
        }
    }

    /// Evaluate and execute one cycle at `now`.
    pub async fn tick(&self, now: DateTime<Local>) -> DigestOutcome {
        let last = self
            .watermark
            .last_digest()
            .await
            .map(|t| t.with_timezone(&Local).naive_local());

        match evaluate_digest(
            last,
            self.schedule.hour,
            self.schedule.minute,
            self.schedule.grace,
            now.naive_local(),
        ) {
            DigestDecision::AlreadyFired => DigestOutcome::AlreadyFired,
            DigestDecision::TooEarly => DigestOutcome::TooEarly,
            DigestDecision::MissedWindow => {
                self.advance(now).await;
                DigestOutcome::MissedWindow
            }
            DigestDecision::Fire => self.fire(now).await,
        }
    }

    /// Assemble and deliver one digest, outside the schedule gates. Used by
    /// the manual trigger and startup mode; advances the watermark like a
    /// scheduled fire so the day is not re-delivered.
    pub async fn fire(&self, now: DateTime<Local>) -> DigestOutcome {
        let outcome = match self.source.assemble().await {
            Ok(Some(body)) => match self.notifier.notify(&body).await {
                Ok(()) => DigestOutcome::Sent,
                Err(e) => DigestOutcome::Failed(e.to_string()),
            },
            Ok(None) => DigestOutcome::Empty,
            Err(e) => DigestOutcome::Failed(e.to_string()),
        };
        self.advance(now).await;
        outcome
    }

    async fn advance(&self, now: DateTime<Local>) {
        if let Err(e) = self.watermark.advance(now.with_timezone(&Utc)).await {
            tracing::warn!(
                "{}: failed to persist digest watermark: {}",
                self.schedule.name,
                e
            );
        }
    }
}
