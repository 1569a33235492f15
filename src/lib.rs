//! Concierge: a personal assistant daemon.
//!
//! The daemon runs a set of automations over a shared transport and
//! text-generation oracle: proactive thoughts about recent conversation,
//! a daily news digest, and task tracking with deadline reminders. Each
//! automation owns its background loops and persists its own state under
//! the configured data directory.

pub mod automations;
pub mod config;
pub mod error;
pub mod news;
pub mod oracle;
pub mod schedule;
pub mod store;
pub mod transport;

pub use automations::{Automation, AutomationContext, AutomationHost};
pub use config::Config;
