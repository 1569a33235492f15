//! Error types shared across the daemon.

use std::time::Duration;

/// Errors from the persisted JSON stores.
///
/// Read-side corruption is intentionally *not* represented here: a store that
/// cannot parse its backing file degrades to an empty/default state and logs.
/// Only failures to durably write state surface as errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Failed to create the parent directory for a state file.
    #[error("failed to create state directory {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a state file.
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to serialize state before writing.
    #[error("failed to encode state: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Errors from the external text-generation oracle.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    /// The oracle did not respond within the configured deadline.
    #[error("oracle timed out after {0:?}")]
    Timeout(Duration),

    /// The oracle process could not be started.
    #[error("failed to spawn oracle process: {reason}")]
    Spawn { reason: String },

    /// The oracle process exited with a non-zero status.
    #[error("oracle exited with status {code}: {stderr}")]
    NonZeroExit { code: i32, stderr: String },

    /// The oracle produced no usable output.
    #[error("oracle returned empty output")]
    Empty,
}

/// Errors from the chat transport.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Delivery to the transport failed.
    #[error("send via {name} failed: {reason}")]
    SendFailed { name: String, reason: String },

    /// No handler is registered for a command.
    #[error("unknown command: {name}")]
    UnknownCommand { name: String },
}
