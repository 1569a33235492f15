//! Background schedulers: the loops that decide *when* the daemon acts.
//!
//! Every scheduler follows the same pattern: poll on an interval, evaluate
//! a pure decision against persisted state, act idempotently, persist an
//! updated watermark. Loops are single-flight by construction (a tick always
//! completes before the next sleep) and stop cooperatively via a shared
//! `watch` shutdown signal.

pub mod clock;
mod digest;
mod sweeper;
mod thought;

pub use digest::{evaluate_digest, DigestDecision, DigestOutcome, DigestSchedule, DigestScheduler};
pub use sweeper::{due_for_reminder, DeadlineSweeper};
pub use thought::{ThoughtOutcome, ThoughtScheduler};

use async_trait::async_trait;

use crate::error::{ChannelError, OracleError};

/// Produces proactive content, or nothing when there is nothing worth
/// saying. A `None` cycle does not consume the rate-limit window.
#[async_trait]
pub trait Thinker: Send + Sync {
    async fn think(&self) -> Result<Option<String>, OracleError>;
}

/// Delivers a notification to the user. Schedulers depend on this seam
/// only, never on a concrete transport.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, text: &str) -> Result<(), ChannelError>;
}

/// Assembles the body of a daily digest, or `None` when there is nothing to
/// report today.
#[async_trait]
pub trait DigestSource: Send + Sync {
    async fn assemble(&self) -> anyhow::Result<Option<String>>;
}
