use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use concierge::automations::{AutomationContext, AutomationHost};
use concierge::config::Config;
use concierge::error::ChannelError;
use concierge::oracle::CliOracle;
use concierge::transport::{CommandRegistry, ConsoleTransport, Transport};

#[derive(Parser)]
#[command(name = "concierge", about = "Personal assistant daemon")]
struct Args {
    /// Path to the JSON config file.
    #[arg(long, env = "CONCIERGE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;
    tokio::fs::create_dir_all(&config.data_dir).await?;
    tracing::info!("Data directory: {}", config.data_dir.display());

    let transport: Arc<dyn Transport> = Arc::new(ConsoleTransport);
    let oracle = Arc::new(CliOracle::new(config.oracle.clone()));

    let host = AutomationHost::build(AutomationContext {
        config,
        transport,
        oracle,
    })
    .await;

    let mut registry = CommandRegistry::new();
    host.register_commands(&mut registry);
    host.start_all().await;
    tracing::info!(
        "Ready. Commands: {} (plus 'status', 'help', 'quit')",
        registry.command_names().join(", ")
    );

    run_console(&host, &registry).await;

    host.stop_all().await;
    tracing::info!("Goodbye");
    Ok(())
}

/// Read command lines from stdin until EOF, `quit`, or Ctrl-C.
async fn run_console(host: &AutomationHost, registry: &CommandRegistry) {
    let (line_tx, mut line_rx) = tokio::sync::mpsc::channel::<String>(16);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if line_tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    loop {
        let line = tokio::select! {
            line = line_rx.recv() => match line {
                Some(line) => line,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupt received, shutting down");
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match line {
            "quit" | "exit" => break,
            "help" => {
                println!("commands: {}", registry.command_names().join(", "));
            }
            "status" => match serde_json::to_string_pretty(&host.status().await) {
                Ok(rendered) => println!("{}", rendered),
                Err(e) => tracing::error!("status render failed: {}", e),
            },
            _ => match registry.dispatch(line).await {
                Ok(reply) => println!("{}", reply),
                Err(ChannelError::UnknownCommand { name }) => {
                    println!("Unknown command '{}'. Try 'help'.", name);
                }
                Err(e) => tracing::error!("command failed: {}", e),
            },
        }
    }
}
