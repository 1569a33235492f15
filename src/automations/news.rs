//! News automation: daily digest of newly-seen feed items.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;

use crate::automations::{Automation, AutomationContext, LoopHandle};
use crate::news::{digest_prompt, ItemSource, RssSource};
use crate::oracle::Oracle;
use crate::schedule::{DigestScheduler, DigestSource, Notifier};
use crate::schedule::DigestSchedule;
use crate::store::{DigestWatermark, Keyed, SeenTracker};
use crate::transport::{CommandHandler, CommandRegistry, TransportNotifier};

/// Assembles the news digest body: fetch, dedup, summarize.
struct NewsDigestSource {
    source: Arc<dyn ItemSource>,
    tracker: Arc<SeenTracker>,
    oracle: Arc<dyn Oracle>,
}

#[async_trait]
impl DigestSource for NewsDigestSource {
    async fn assemble(&self) -> anyhow::Result<Option<String>> {
        let items = self.source.fetch().await?;
        let fresh = self.tracker.filter_new(items).await;

        if fresh.is_empty() {
            return Ok(Some(
                "📰 Daily News Digest\n\nNo new articles today. You're all caught up."
                    .to_string(),
            ));
        }

        // Marked before the send goes out: a delivery failure drops these
        // articles permanently rather than risking a duplicate digest.
        self.tracker
            .mark_seen(fresh.iter().map(|item| item.key().to_string()))
            .await?;

        tracing::info!("News: summarizing {} new articles", fresh.len());
        let summary = self.oracle.generate(&digest_prompt(&fresh), false).await?;

        let sources: BTreeSet<&str> = fresh.iter().map(|i| i.source_tag.as_str()).collect();
        Ok(Some(format!(
            "📰 Daily News Digest\n{} new articles from {} sources\n\n{}",
            fresh.len(),
            sources.len(),
            summary
        )))
    }
}

pub struct NewsAutomation {
    scheduler: Arc<DigestScheduler>,
    loop_handle: LoopHandle,
}

impl NewsAutomation {
    pub async fn new(ctx: &AutomationContext) -> Self {
        let config = &ctx.config.news;
        let tracker = Arc::new(
            SeenTracker::load(
                ctx.data_dir().join("seen_articles.json"),
                config.retention_days,
            )
            .await,
        );
        let source: Arc<dyn ItemSource> = Arc::new(RssSource::new(
            config.feeds.clone(),
            config.max_per_source,
        ));
        let digest_source = Arc::new(NewsDigestSource {
            source,
            tracker,
            oracle: ctx.oracle.clone(),
        });
        let notifier: Arc<dyn Notifier> = Arc::new(TransportNotifier::new(
            ctx.transport.clone(),
            ctx.config.notify_user.clone(),
        ));
        let watermark = DigestWatermark::load(ctx.data_dir().join("news_state.json")).await;

        let scheduler = Arc::new(DigestScheduler::new(
            DigestSchedule {
                name: "news",
                hour: config.digest_hour,
                minute: config.digest_minute,
                check_interval: Duration::from_secs(config.check_interval_secs),
                grace: chrono::Duration::minutes(config.grace_minutes),
                send_on_startup: config.send_on_startup,
            },
            digest_source,
            notifier,
            watermark,
        ));

        Self {
            scheduler,
            loop_handle: LoopHandle::new(ctx.shutdown_grace()),
        }
    }
}

/// `news` chat command: trigger a digest immediately.
struct NewsNowCommand {
    scheduler: Arc<DigestScheduler>,
}

#[async_trait]
impl CommandHandler for NewsNowCommand {
    async fn handle(&self, _args: &str) -> String {
        let scheduler = self.scheduler.clone();
        tokio::spawn(async move {
            scheduler.fire(Local::now()).await;
        });
        "On it - assembling your news digest now.".to_string()
    }
}

#[async_trait]
impl Automation for NewsAutomation {
    fn name(&self) -> &'static str {
        "news"
    }

    fn description(&self) -> &'static str {
        "Daily digest of new articles from followed feeds"
    }

    fn register_commands(&self, registry: &mut CommandRegistry) {
        registry.register(
            "news",
            Arc::new(NewsNowCommand {
                scheduler: self.scheduler.clone(),
            }),
        );
    }

    async fn start(&self) {
        let scheduler = self.scheduler.clone();
        self.loop_handle.spawn(|rx| scheduler.run(rx)).await;
    }

    async fn stop(&self) {
        self.loop_handle.stop("news").await;
    }

    async fn is_running(&self) -> bool {
        self.loop_handle.is_running().await
    }
}
