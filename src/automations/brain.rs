//! Brain automation: proactive thoughts over recent conversation.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::automations::{Automation, AutomationContext, LoopHandle};
use crate::error::OracleError;
use crate::oracle::Oracle;
use crate::schedule::{Notifier, Thinker, ThoughtScheduler};
use crate::store::ThoughtWatermark;
use crate::transport::{CommandRegistry, TransportNotifier};

/// Marker the oracle returns when it has nothing worth saying.
const NO_MESSAGE_MARKER: &str = "[NO_MESSAGE]";
/// Below this much conversation context, skip the oracle call entirely.
const MIN_CONTEXT_CHARS: usize = 100;
/// Generations shorter than this are treated as noise, not thoughts.
const MIN_THOUGHT_CHARS: usize = 20;

const THINKING_PROMPT: &str = "You are reviewing your conversation history with your \
human partner. Generate ONE new idea, connection, or question that builds on what was \
discussed. Do not summarize or repeat what they said. Be conversational and concise.\n\
\n\
If there is genuinely nothing interesting to contribute, respond with EXACTLY: \
[NO_MESSAGE]\n\
\n\
=== CONVERSATION HISTORY ===\n\
{context}\n\
=== END HISTORY ===\n\
\n\
Your proactive thought (or [NO_MESSAGE]):";

/// Thinker that prompts the oracle over a conversation transcript file.
pub struct OracleThinker {
    oracle: Arc<dyn Oracle>,
    context_file: PathBuf,
}

impl OracleThinker {
    pub fn new(oracle: Arc<dyn Oracle>, context_file: PathBuf) -> Self {
        Self {
            oracle,
            context_file,
        }
    }
}

#[async_trait]
impl Thinker for OracleThinker {
    async fn think(&self) -> Result<Option<String>, OracleError> {
        let context = match tokio::fs::read_to_string(&self.context_file).await {
            Ok(content) => content,
            Err(_) => {
                tracing::debug!(
                    "Brain: no conversation context at {}",
                    self.context_file.display()
                );
                return Ok(None);
            }
        };
        if context.trim().len() < MIN_CONTEXT_CHARS {
            tracing::debug!("Brain: not enough conversation history to think about");
            return Ok(None);
        }

        let prompt = THINKING_PROMPT.replace("{context}", &context);
        let response = self.oracle.generate(&prompt, false).await?;

        let thought = response.trim();
        if thought.to_uppercase().contains(NO_MESSAGE_MARKER) {
            return Ok(None);
        }
        if thought.len() < MIN_THOUGHT_CHARS {
            tracing::debug!("Brain: generated thought too short, skipping");
            return Ok(None);
        }
        Ok(Some(thought.to_string()))
    }
}

pub struct BrainAutomation {
    scheduler: Arc<ThoughtScheduler>,
    loop_handle: LoopHandle,
}

impl BrainAutomation {
    pub async fn new(ctx: &AutomationContext) -> Self {
        let config = &ctx.config.brain;
        let context_file = if config.context_file.is_absolute() {
            config.context_file.clone()
        } else {
            ctx.data_dir().join(&config.context_file)
        };
        let thinker: Arc<dyn Thinker> =
            Arc::new(OracleThinker::new(ctx.oracle.clone(), context_file));
        let notifier: Arc<dyn Notifier> = Arc::new(TransportNotifier::new(
            ctx.transport.clone(),
            ctx.config.notify_user.clone(),
        ));
        let watermark = ThoughtWatermark::load(ctx.data_dir().join("brain_state.json")).await;

        Self {
            scheduler: Arc::new(ThoughtScheduler::new(config, thinker, notifier, watermark)),
            loop_handle: LoopHandle::new(ctx.shutdown_grace()),
        }
    }
}

#[async_trait]
impl Automation for BrainAutomation {
    fn name(&self) -> &'static str {
        "brain"
    }

    fn description(&self) -> &'static str {
        "Proactive thoughts based on recent conversation"
    }

    fn register_commands(&self, _registry: &mut CommandRegistry) {}

    async fn start(&self) {
        let scheduler = self.scheduler.clone();
        self.loop_handle.spawn(|rx| scheduler.run(rx)).await;
    }

    async fn stop(&self) {
        self.loop_handle.stop("brain").await;
    }

    async fn is_running(&self) -> bool {
        self.loop_handle.is_running().await
    }
}
