//! Daemon configuration.
//!
//! Settings load from an optional JSON config file, with a handful of
//! environment overrides (`.env` is honored via `dotenvy` in `main`).
//! Every field has a default so an empty or missing file yields a runnable
//! configuration.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level daemon configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding all persisted state files.
    pub data_dir: PathBuf,
    /// User id proactive notifications are delivered to.
    pub notify_user: String,
    /// Automations to enable, by registry name.
    pub enabled_automations: Vec<String>,
    /// Grace period for cooperative shutdown before loops are aborted.
    pub shutdown_grace_secs: u64,
    pub oracle: OracleConfig,
    pub brain: BrainConfig,
    pub news: NewsConfig,
    pub tasks: TasksConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            notify_user: "operator".to_string(),
            enabled_automations: vec![
                "brain".to_string(),
                "news".to_string(),
                "tasks".to_string(),
            ],
            shutdown_grace_secs: 10,
            oracle: OracleConfig::default(),
            brain: BrainConfig::default(),
            news: NewsConfig::default(),
            tasks: TasksConfig::default(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("concierge")
}

impl Config {
    /// Load configuration from `path`, falling back to defaults when the file
    /// is absent. A present-but-unparsable file is an error: silently running
    /// with defaults against an operator-written config would be surprising.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(p) if p.exists() => {
                let raw = std::fs::read_to_string(p)?;
                serde_json::from_str(&raw)
                    .map_err(|e| anyhow::anyhow!("invalid config {}: {}", p.display(), e))?
            }
            _ => Self::default(),
        };

        if let Ok(cmd) = std::env::var("CONCIERGE_ORACLE_COMMAND") {
            if !cmd.trim().is_empty() {
                config.oracle.command = cmd;
            }
        }
        if let Ok(secs) = std::env::var("CONCIERGE_ORACLE_TIMEOUT_SECS") {
            if let Ok(parsed) = secs.trim().parse() {
                config.oracle.timeout_secs = parsed;
            }
        }
        if let Ok(dir) = std::env::var("CONCIERGE_DATA_DIR") {
            if !dir.trim().is_empty() {
                config.data_dir = PathBuf::from(dir);
            }
        }

        Ok(config)
    }
}

/// External text-generation oracle (CLI subprocess).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Command line invoked for each generation request. The prompt is
    /// written to the process's stdin.
    pub command: String,
    /// Extra arguments appended when tool use is requested.
    pub tool_args: Vec<String>,
    /// Hard deadline for a single oracle call.
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            command: "gemini".to_string(),
            tool_args: vec!["--tools".to_string()],
            timeout_secs: 300,
        }
    }
}

/// Proactive-thought scheduler settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrainConfig {
    /// Hours between thinking cycles.
    pub check_interval_hours: f64,
    /// Start of the quiet window, as `HH.fraction` (23.5 = 23:30).
    pub quiet_hours_start: f64,
    /// End of the quiet window.
    pub quiet_hours_end: f64,
    /// Minimum hours between delivered proactive messages.
    pub min_gap_hours: f64,
    /// Path (relative to `data_dir` unless absolute) of the conversation
    /// transcript the thinker reads for context.
    pub context_file: PathBuf,
}

impl Default for BrainConfig {
    fn default() -> Self {
        Self {
            check_interval_hours: 2.0,
            quiet_hours_start: 23.5,
            quiet_hours_end: 7.0,
            min_gap_hours: 2.0,
            context_file: PathBuf::from("conversation.log"),
        }
    }
}

/// A single feed the news automation polls.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// Short source tag shown in the digest.
    pub tag: String,
    pub url: String,
}

/// News digest settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NewsConfig {
    pub digest_hour: u32,
    pub digest_minute: u32,
    /// Seconds between scheduler checks.
    pub check_interval_secs: u64,
    /// Minutes after the target time within which a late tick may still fire.
    pub grace_minutes: i64,
    /// Days a delivered article key is remembered for dedup.
    pub retention_days: i64,
    /// Cap on items taken from a single feed per fetch.
    pub max_per_source: usize,
    /// Fire one digest shortly after startup, bypassing the schedule gates.
    pub send_on_startup: bool,
    pub feeds: Vec<FeedConfig>,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            digest_hour: 7,
            digest_minute: 0,
            check_interval_secs: 60,
            grace_minutes: 10,
            retention_days: 7,
            max_per_source: 50,
            send_on_startup: false,
            feeds: vec![
                FeedConfig {
                    tag: "gamesindustry".to_string(),
                    url: "https://www.gamesindustry.biz/feed".to_string(),
                },
                FeedConfig {
                    tag: "gamedeveloper".to_string(),
                    url: "https://www.gamedeveloper.com/rss.xml".to_string(),
                },
            ],
        }
    }
}

/// Task digest and deadline reminder settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TasksConfig {
    pub digest_hour: u32,
    pub digest_minute: u32,
    /// Seconds between scheduler checks (digest gate plus deadline sweep).
    pub check_interval_secs: u64,
    /// Minutes after the target time within which a late tick may still fire.
    pub grace_minutes: i64,
    /// Hours before a deadline at which the one-time reminder fires.
    pub lead_hours: i64,
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            digest_hour: 7,
            digest_minute: 0,
            check_interval_secs: 60,
            grace_minutes: 10,
            lead_hours: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_complete() {
        let config = Config::default();
        assert_eq!(config.brain.quiet_hours_start, 23.5);
        assert_eq!(config.brain.quiet_hours_end, 7.0);
        assert_eq!(config.news.digest_hour, 7);
        assert_eq!(config.news.grace_minutes, 10);
        assert_eq!(config.tasks.lead_hours, 1);
        assert_eq!(
            config.enabled_automations,
            vec!["brain", "news", "tasks"]
        );
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let raw = r#"{"news": {"digest_hour": 9}, "notify_user": "u1"}"#;
        let config: Config = serde_json::from_str(raw).unwrap();
        assert_eq!(config.news.digest_hour, 9);
        assert_eq!(config.news.digest_minute, 0);
        assert_eq!(config.notify_user, "u1");
        assert_eq!(config.brain.min_gap_hours, 2.0);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = Config::load(Some(Path::new("/nonexistent/concierge.json"))).unwrap();
        assert_eq!(config.tasks.digest_hour, 7);
    }
}
