//! Automations: self-contained background features with a shared lifecycle.
//!
//! Each automation owns its schedulers and registers its chat commands.
//! The registry is an explicit compile-time table; which entries actually
//! run is decided at startup by the config's enable list. No runtime
//! plugin loading.

mod brain;
mod news;
mod tasks;

pub use brain::{BrainAutomation, OracleThinker};
pub use news::NewsAutomation;
pub use tasks::TasksAutomation;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::oracle::Oracle;
use crate::transport::{CommandRegistry, Transport};

/// Everything an automation constructor may need.
#[derive(Clone)]
pub struct AutomationContext {
    pub config: Config,
    pub transport: Arc<dyn Transport>,
    pub oracle: Arc<dyn Oracle>,
}

impl AutomationContext {
    pub fn data_dir(&self) -> &PathBuf {
        &self.config.data_dir
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.config.shutdown_grace_secs)
    }
}

/// A background feature with start/stop lifecycle and chat commands.
#[async_trait]
pub trait Automation: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;

    /// Register this automation's chat commands.
    fn register_commands(&self, registry: &mut CommandRegistry);

    /// Spawn background loops. Idempotent: a second start is a no-op.
    async fn start(&self);

    /// Request cooperative shutdown and wait for quiescence, bounded by the
    /// configured grace period.
    async fn stop(&self);

    async fn is_running(&self) -> bool;

    async fn status(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name(),
            "description": self.description(),
            "running": self.is_running().await,
        })
    }
}

type Constructor = fn(AutomationContext) -> BoxFuture<'static, Arc<dyn Automation>>;

/// Compile-time table of every automation this build ships.
pub const REGISTRY: &[(&str, Constructor)] = &[
    ("brain", |ctx| {
        Box::pin(async move { Arc::new(BrainAutomation::new(&ctx).await) as Arc<dyn Automation> })
    }),
    ("news", |ctx| {
        Box::pin(async move { Arc::new(NewsAutomation::new(&ctx).await) as Arc<dyn Automation> })
    }),
    ("tasks", |ctx| {
        Box::pin(async move { Arc::new(TasksAutomation::new(&ctx).await) as Arc<dyn Automation> })
    }),
];

/// Owns the lifecycle of all enabled automations.
pub struct AutomationHost {
    automations: Vec<Arc<dyn Automation>>,
}

impl AutomationHost {
    /// Build every automation named in the config's enable list. Unknown
    /// names log and are skipped.
    pub async fn build(ctx: AutomationContext) -> Self {
        let mut automations = Vec::new();
        for name in &ctx.config.enabled_automations {
            match REGISTRY.iter().find(|(n, _)| n == name) {
                Some((_, construct)) => {
                    let automation = construct(ctx.clone()).await;
                    tracing::info!("Loaded automation: {}", automation.name());
                    automations.push(automation);
                }
                None => tracing::error!("Unknown automation in config: {}", name),
            }
        }
        Self { automations }
    }

    pub fn automations(&self) -> &[Arc<dyn Automation>] {
        &self.automations
    }

    pub fn register_commands(&self, registry: &mut CommandRegistry) {
        for automation in &self.automations {
            automation.register_commands(registry);
        }
    }

    pub async fn start_all(&self) {
        for automation in &self.automations {
            automation.start().await;
            tracing::info!("Started automation: {}", automation.name());
        }
    }

    /// Stop every automation and await quiescence.
    pub async fn stop_all(&self) {
        for automation in &self.automations {
            automation.stop().await;
            tracing::info!("Stopped automation: {}", automation.name());
        }
    }

    pub async fn status(&self) -> serde_json::Value {
        let mut entries = Vec::new();
        for automation in &self.automations {
            entries.push(automation.status().await);
        }
        serde_json::Value::Array(entries)
    }
}

/// One spawned scheduler loop with cooperative shutdown.
///
/// `stop` signals the loop, waits up to the grace period for it to finish
/// its in-flight tick, then abandons it so a hung external call can never
/// block shutdown indefinitely.
pub(crate) struct LoopHandle {
    shutdown: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
    grace: Duration,
}

impl LoopHandle {
    pub(crate) fn new(grace: Duration) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            shutdown,
            handle: Mutex::new(None),
            grace,
        }
    }

    /// Spawn `run(shutdown_rx)` if not already running. Returns false when
    /// a loop is already active.
    pub(crate) async fn spawn<F, Fut>(&self, run: F) -> bool
    where
        F: FnOnce(watch::Receiver<bool>) -> Fut,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let mut guard = self.handle.lock().await;
        if guard.as_ref().is_some_and(|h| !h.is_finished()) {
            return false;
        }
        let _ = self.shutdown.send(false);
        *guard = Some(tokio::spawn(run(self.shutdown.subscribe())));
        true
    }

    pub(crate) async fn stop(&self, name: &str) {
        let Some(mut handle) = self.handle.lock().await.take() else {
            return;
        };
        let _ = self.shutdown.send(true);
        match tokio::time::timeout(self.grace, &mut handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("{} loop panicked: {}", name, e),
            Err(_) => {
                tracing::warn!(
                    "{} loop did not stop within {:?}, aborting it",
                    name,
                    self.grace
                );
                handle.abort();
            }
        }
    }

    pub(crate) async fn is_running(&self) -> bool {
        self.handle
            .lock()
            .await
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}
