//! Chat transport seam.
//!
//! The daemon consumes the transport through two capabilities only:
//! `send(user_id, text)` and command registration. Everything else about
//! the chat side (polling, formatting, authorization) lives outside this
//! crate.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ChannelError;
use crate::schedule::Notifier;

/// Outbound message delivery.
#[async_trait]
pub trait Transport: Send + Sync {
    fn name(&self) -> &str;
    async fn send(&self, user_id: &str, text: &str) -> Result<(), ChannelError>;
}

/// Transport that writes to stdout. Used for local runs and smoke tests.
pub struct ConsoleTransport;

#[async_trait]
impl Transport for ConsoleTransport {
    fn name(&self) -> &str {
        "console"
    }

    async fn send(&self, user_id: &str, text: &str) -> Result<(), ChannelError> {
        println!("[{}] {}", user_id, text);
        Ok(())
    }
}

/// Adapter binding a transport and a target user into the [`Notifier`]
/// seam the schedulers depend on.
pub struct TransportNotifier {
    transport: Arc<dyn Transport>,
    user_id: String,
}

impl TransportNotifier {
    pub fn new(transport: Arc<dyn Transport>, user_id: impl Into<String>) -> Self {
        Self {
            transport,
            user_id: user_id.into(),
        }
    }
}

#[async_trait]
impl Notifier for TransportNotifier {
    async fn notify(&self, text: &str) -> Result<(), ChannelError> {
        self.transport.send(&self.user_id, text).await
    }
}

/// A registered chat command. Handlers fold their own failures into the
/// reply text; errors never escape to the dispatch loop.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, args: &str) -> String;
}

/// The `registerCommand(name, handler)` capability.
#[derive(Default)]
pub struct CommandRegistry {
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, handler: Arc<dyn CommandHandler>) {
        let name = name.into();
        tracing::debug!("Registered command: {}", name);
        self.handlers.insert(name, handler);
    }

    pub fn command_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Dispatch a raw input line of the form `name [args...]` (a leading
    /// `/` is accepted and ignored).
    pub async fn dispatch(&self, line: &str) -> Result<String, ChannelError> {
        let line = line.trim().trim_start_matches('/');
        let (name, args) = match line.split_once(char::is_whitespace) {
            Some((name, args)) => (name, args.trim()),
            None => (line, ""),
        };
        match self.handlers.get(name) {
            Some(handler) => Ok(handler.handle(args).await),
            None => Err(ChannelError::UnknownCommand {
                name: name.to_string(),
            }),
        }
    }
}
