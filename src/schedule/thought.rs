//! Proactive thought scheduler.
//!
//! Periodically asks a [`Thinker`] for something worth saying and delivers
//! it, gated by quiet hours and a minimum gap between delivered messages.
//! The gap is tracked through a persisted watermark so restarts cannot
//! bypass it.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use tokio::sync::watch;

use crate::config::BrainConfig;
use crate::schedule::clock::{can_act, is_quiet_hours};
use crate::schedule::{Notifier, Thinker};
use crate::store::ThoughtWatermark;

/// What a single tick did.
#[derive(Debug, PartialEq, Eq)]
pub enum ThoughtOutcome {
    /// Inside the quiet window; nothing evaluated.
    Quiet,
    /// Too soon since the last delivered message.
    RateLimited,
    /// The thinker had nothing to say; the rate-limit window is untouched.
    Nothing,
    /// A thought was delivered and the watermark advanced.
    Sent,
    /// The thinker or the transport failed; the watermark is untouched.
    Failed(String),
}

/// Convert an operator-supplied hour count to seconds, tolerating garbage.
/// NaN and infinities collapse to zero; negatives clamp to zero; the ceiling
/// keeps the value inside what both duration types accept.
fn clamp_hours_to_secs(hours: f64) -> f64 {
    const MAX_SECS: f64 = 366.0 * 24.0 * 3600.0;
    if hours.is_finite() {
        (hours * 3600.0).clamp(0.0, MAX_SECS)
    } else {
        0.0
    }
}

pub struct ThoughtScheduler {
    check_interval: Duration,
    quiet_start: f64,
    quiet_end: f64,
    min_gap: chrono::Duration,
    thinker: Arc<dyn Thinker>,
    notifier: Arc<dyn Notifier>,
    watermark: ThoughtWatermark,
}

impl ThoughtScheduler {
    pub fn new(
        config: &BrainConfig,
        thinker: Arc<dyn Thinker>,
        notifier: Arc<dyn Notifier>,
        watermark: ThoughtWatermark,
    ) -> Self {
        Self {
            check_interval: Duration::from_secs_f64(clamp_hours_to_secs(
                config.check_interval_hours,
            )),
            quiet_start: config.quiet_hours_start,
            quiet_end: config.quiet_hours_end,
            min_gap: chrono::Duration::seconds(clamp_hours_to_secs(config.min_gap_hours) as i64),
            thinker,
            notifier,
            watermark,
        }
    }

    /// Run until the shutdown signal fires. Ticks are strictly sequential;
    /// the signal is observed at the sleep between ticks.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            "Thought scheduler started: check every {:?}, quiet {:.1}-{:.1}, min gap {}s",
            self.check_interval,
            self.quiet_start,
            self.quiet_end,
            self.min_gap.num_seconds()
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.check_interval) => {}
                _ = shutdown.changed() => break,
            }
            if *shutdown.borrow() {
                break;
            }

            match self.tick(Local::now()).await {
                ThoughtOutcome::Quiet => tracing::debug!("Thought: skipping, quiet hours"),
                ThoughtOutcome::RateLimited => tracing::debug!("Thought: skipping, rate limited"),
                ThoughtOutcome::Nothing => tracing::info!("Thought: nothing to share this cycle"),
                ThoughtOutcome::Sent => tracing::info!("Thought: delivered proactive message"),
                ThoughtOutcome::Failed(e) => tracing::error!("Thought cycle failed: {}", e),
            }
        }

        tracing::info!("Thought scheduler stopped");
    }

    /// Evaluate and execute one cycle at `now`.
    pub async fn tick(&self, now: DateTime<Local>) -> ThoughtOutcome {
        if is_quiet_hours(&now, self.quiet_start, self.quiet_end) {
            return ThoughtOutcome::Quiet;
        }

        let instant: DateTime<Utc> = now.with_timezone(&Utc);
        let last = self.watermark.last_action_at().await;
        if !can_act(last, self.min_gap, instant) {
            return ThoughtOutcome::RateLimited;
        }

        let thought = match self.thinker.think().await {
            Ok(Some(text)) => text,
            Ok(None) => return ThoughtOutcome::Nothing,
            Err(e) => return ThoughtOutcome::Failed(e.to_string()),
        };

        if let Err(e) = self.notifier.notify(&thought).await {
            // Delivery failed: leave the watermark alone so the next
            // eligible cycle can try again.
            return ThoughtOutcome::Failed(e.to_string());
        }

        if let Err(e) = self.watermark.advance(instant).await {
            tracing::warn!("Failed to persist thought watermark: {}", e);
        }
        ThoughtOutcome::Sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    use crate::error::{ChannelError, OracleError};

    struct FixedThinker {
        thought: Option<String>,
        calls: AtomicUsize,
    }

    impl FixedThinker {
        fn some(text: &str) -> Self {
            Self {
                thought: Some(text.to_string()),
                calls: AtomicUsize::new(0),
            }
        }

        fn none() -> Self {
            Self {
                thought: None,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Thinker for FixedThinker {
        async fn think(&self) -> Result<Option<String>, OracleError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.thought.clone())
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, text: &str) -> Result<(), ChannelError> {
            if self.fail {
                return Err(ChannelError::SendFailed {
                    name: "test".to_string(),
                    reason: "down".to_string(),
                });
            }
            self.sent.lock().await.push(text.to_string());
            Ok(())
        }
    }

    fn config() -> BrainConfig {
        BrainConfig {
            quiet_hours_start: 23.5,
            quiet_hours_end: 7.0,
            min_gap_hours: 2.0,
            ..BrainConfig::default()
        }
    }

    async fn scheduler(
        thinker: Arc<FixedThinker>,
        notifier: Arc<RecordingNotifier>,
        dir: &tempfile::TempDir,
    ) -> ThoughtScheduler {
        let watermark = ThoughtWatermark::load(dir.path().join("brain_state.json")).await;
        ThoughtScheduler::new(&config(), thinker, notifier, watermark)
    }

    fn daytime() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 8, 24, 12, 0, 0).unwrap()
    }

    #[test]
    fn garbage_config_hours_clamp_instead_of_panicking() {
        assert_eq!(clamp_hours_to_secs(2.0), 7200.0);
        assert_eq!(clamp_hours_to_secs(-1.0), 0.0);
        assert_eq!(clamp_hours_to_secs(f64::NAN), 0.0);
        assert_eq!(clamp_hours_to_secs(f64::INFINITY), 0.0);
        assert_eq!(clamp_hours_to_secs(1e300), 366.0 * 24.0 * 3600.0);
    }

    #[tokio::test]
    async fn scheduler_builds_from_a_hostile_config() {
        let dir = tempfile::tempdir().unwrap();
        let watermark = ThoughtWatermark::load(dir.path().join("brain_state.json")).await;
        let hostile = BrainConfig {
            check_interval_hours: f64::NAN,
            min_gap_hours: -3.0,
            ..BrainConfig::default()
        };
        let sched = ThoughtScheduler::new(
            &hostile,
            Arc::new(FixedThinker::some("hi")),
            Arc::new(RecordingNotifier::default()),
            watermark,
        );
        assert_eq!(sched.check_interval, Duration::ZERO);
        assert_eq!(sched.min_gap, chrono::Duration::zero());
    }

    #[tokio::test]
    async fn quiet_hours_skip_without_calling_thinker() {
        let dir = tempfile::tempdir().unwrap();
        let thinker = Arc::new(FixedThinker::some("hi"));
        let notifier = Arc::new(RecordingNotifier::default());
        let sched = scheduler(thinker.clone(), notifier, &dir).await;

        let night = Local.with_ymd_and_hms(2026, 8, 24, 3, 0, 0).unwrap();
        assert_eq!(sched.tick(night).await, ThoughtOutcome::Quiet);
        assert_eq!(thinker.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn delivered_thought_advances_watermark_and_rate_limits() {
        let dir = tempfile::tempdir().unwrap();
        let thinker = Arc::new(FixedThinker::some("an idea"));
        let notifier = Arc::new(RecordingNotifier::default());
        let sched = scheduler(thinker.clone(), notifier.clone(), &dir).await;

        let noon = daytime();
        assert_eq!(sched.tick(noon).await, ThoughtOutcome::Sent);
        assert_eq!(notifier.sent.lock().await.len(), 1);

        // One minute later the gate is closed.
        let soon = noon + chrono::Duration::minutes(1);
        assert_eq!(sched.tick(soon).await, ThoughtOutcome::RateLimited);
        assert_eq!(thinker.calls.load(Ordering::SeqCst), 1);

        // Past the min gap it opens again.
        let later = noon + chrono::Duration::hours(2);
        assert_eq!(sched.tick(later).await, ThoughtOutcome::Sent);
    }

    #[tokio::test]
    async fn empty_thought_does_not_consume_the_window() {
        let dir = tempfile::tempdir().unwrap();
        let thinker = Arc::new(FixedThinker::none());
        let notifier = Arc::new(RecordingNotifier::default());
        let sched = scheduler(thinker.clone(), notifier.clone(), &dir).await;

        let noon = daytime();
        assert_eq!(sched.tick(noon).await, ThoughtOutcome::Nothing);
        // Immediately after, the gate is still open.
        assert_eq!(
            sched.tick(noon + chrono::Duration::minutes(1)).await,
            ThoughtOutcome::Nothing
        );
        assert!(notifier.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn failed_send_leaves_watermark_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let thinker = Arc::new(FixedThinker::some("will not arrive"));
        let notifier = Arc::new(RecordingNotifier {
            fail: true,
            ..Default::default()
        });
        let sched = scheduler(thinker, notifier, &dir).await;

        let noon = daytime();
        assert!(matches!(
            sched.tick(noon).await,
            ThoughtOutcome::Failed(_)
        ));

        // The watermark never advanced, so the next tick is not rate limited.
        let reloaded = ThoughtWatermark::load(dir.path().join("brain_state.json")).await;
        assert_eq!(reloaded.last_action_at().await, None);
    }
}
