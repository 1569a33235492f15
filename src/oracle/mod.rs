//! Text-generation oracle.
//!
//! The oracle is an opaque, possibly slow, possibly failing external
//! capability. The shipped implementation shells out to a configured CLI
//! (the prompt goes to stdin, the generation comes back on stdout) with a
//! hard caller-side deadline; schedulers treat any failure as transient
//! and move on to their next tick.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::config::OracleConfig;
use crate::error::OracleError;

#[async_trait]
pub trait Oracle: Send + Sync {
    /// Generate text for `prompt`. `use_tools` enables the oracle's tool
    /// integrations, which are slower but can consult external state.
    async fn generate(&self, prompt: &str, use_tools: bool) -> Result<String, OracleError>;
}

/// Oracle backed by a CLI subprocess.
pub struct CliOracle {
    config: OracleConfig,
}

impl CliOracle {
    pub fn new(config: OracleConfig) -> Self {
        Self { config }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }
}

#[async_trait]
impl Oracle for CliOracle {
    async fn generate(&self, prompt: &str, use_tools: bool) -> Result<String, OracleError> {
        let mut parts = self.config.command.split_whitespace();
        let program = parts.next().ok_or_else(|| OracleError::Spawn {
            reason: "empty oracle command".to_string(),
        })?;

        let mut command = Command::new(program);
        command.args(parts);
        if use_tools {
            command.args(&self.config.tool_args);
        }
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|e| OracleError::Spawn {
            reason: e.to_string(),
        })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .await
                .map_err(|e| OracleError::Spawn {
                    reason: format!("failed to write prompt: {}", e),
                })?;
            // Close stdin so the CLI knows the prompt is complete.
            drop(stdin);
        }

        let deadline = self.timeout();
        let output = match tokio::time::timeout(deadline, child.wait_with_output()).await {
            // kill_on_drop reaps the abandoned process.
            Err(_) => return Err(OracleError::Timeout(deadline)),
            Ok(Err(e)) => {
                return Err(OracleError::Spawn {
                    reason: e.to_string(),
                })
            }
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OracleError::NonZeroExit {
                code: output.status.code().unwrap_or(-1),
                stderr: stderr.chars().take(500).collect(),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if text.is_empty() {
            return Err(OracleError::Empty);
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oracle(command: &str, timeout_secs: u64) -> CliOracle {
        CliOracle::new(OracleConfig {
            command: command.to_string(),
            tool_args: vec![],
            timeout_secs,
        })
    }

    #[tokio::test]
    async fn generate_round_trips_through_stdin() {
        let out = oracle("cat", 10).generate("ping", false).await.unwrap();
        assert_eq!(out, "ping");
    }

    #[tokio::test]
    async fn nonzero_exit_is_typed() {
        let err = oracle("false", 10).generate("x", false).await.unwrap_err();
        assert!(matches!(err, OracleError::NonZeroExit { .. }));
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let err = oracle("definitely-not-a-real-binary-xyz", 10)
            .generate("x", false)
            .await
            .unwrap_err();
        assert!(matches!(err, OracleError::Spawn { .. }));
    }

    #[tokio::test]
    async fn slow_oracle_times_out() {
        let err = oracle("sleep 5", 1).generate("x", false).await.unwrap_err();
        assert!(matches!(err, OracleError::Timeout(_)));
    }

    #[tokio::test]
    async fn empty_output_is_typed() {
        let err = oracle("true", 10).generate("x", false).await.unwrap_err();
        assert!(matches!(err, OracleError::Empty));
    }
}
