use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use secref_backends::{FileLedger, FileStore, KeychainStore};
use secref_engine::{SecretEngine, SecretStore};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::Command;
use config::{BackendKind, CliConfig, ResolvedConfig};

/// secref - keep secrets out of persisted configuration
#[derive(Parser, Debug)]
#[command(name = "secref")]
#[command(about = "Move configuration secrets into a secret store and leave references behind")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file
    #[arg(short, long, default_value = "secref.toml")]
    config: PathBuf,
}

async fn build_engine(config: ResolvedConfig) -> Result<SecretEngine> {
    let store: Arc<dyn SecretStore> = match config.backend {
        BackendKind::Keychain => {
            tracing::debug!("Using keychain service '{}'", config.keychain_service);
            Arc::new(KeychainStore::new(config.keychain_service))
        }
        BackendKind::File => {
            tracing::debug!("Using file store at {}", config.store_dir.display());
            Arc::new(
                FileStore::open(&config.store_dir)
                    .await
                    .with_context(|| {
                        format!("Failed to open store at {}", config.store_dir.display())
                    })?,
            )
        }
    };

    let ledger = FileLedger::open(&config.ledger_dir)
        .await
        .with_context(|| format!("Failed to open ledger at {}", config.ledger_dir.display()))?;

    SecretEngine::new(config.engine, store, Arc::new(ledger))
        .context("Invalid engine configuration")
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr, stdout carries the JSON result
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("secref=info".parse()?)
                .add_directive("secref_engine=info".parse()?)
                .add_directive("secref_backends=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let config = CliConfig::load(&cli.config)?
        .resolve()
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;
    let engine = build_engine(config).await?;

    let output = commands::run(&engine, cli.command).await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&output.json).context("Failed to render output")?
    );

    if !output.complete {
        tracing::warn!("Some fields failed; see the report for details");
        std::process::exit(1);
    }

    Ok(())
}
