//! # docchat-agent
//!
//! docchat gateway binary: loads settings, opens the document store, and
//! starts the HTTP/WebSocket server.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use docchat_core::logging::{LogFormat, init_subscriber};
use docchat_llm::{GeminiAnswerService, GeminiConfig};
use docchat_server::{DocchatServer, GatewayConfig};
use docchat_settings::DocchatSettings;
use docchat_store::{ConnectionConfig, DocumentStore};
use tracing::{info, warn};

/// How long in-flight work gets after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// docchat gateway.
#[derive(Parser, Debug)]
#[command(name = "docchat-agent", about = "Document chat gateway")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Path to the `SQLite` database (overrides settings).
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Settings file (default `~/.docchat/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Log level or filter directive (overrides settings).
    #[arg(long)]
    log_level: Option<String>,

    /// Log output format.
    #[arg(long)]
    log_format: Option<LogFormat>,
}

impl Cli {
    /// Apply command-line overrides on top of loaded settings.
    fn apply(&self, settings: &mut DocchatSettings) {
        if let Some(ref host) = self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(ref path) = self.db_path {
            settings.storage.db_path = path.to_string_lossy().into_owned();
        }
        if let Some(ref level) = self.log_level {
            settings.logging.level.clone_from(level);
        }
        if let Some(format) = self.log_format {
            settings.logging.format = format;
        }
    }
}

fn load_settings(cli: &Cli) -> Result<DocchatSettings> {
    let path = cli
        .settings
        .clone()
        .unwrap_or_else(docchat_settings::settings_path);
    let mut settings = docchat_settings::load_settings_from_path(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    cli.apply(&mut settings);
    settings.validate().context("Invalid settings")?;
    Ok(settings)
}

fn gemini_config(settings: &DocchatSettings) -> GeminiConfig {
    let answer = &settings.answer;
    GeminiConfig {
        base_url: answer.base_url.clone(),
        model: answer.model.clone(),
        api_key: answer.api_key.clone(),
        temperature: answer.temperature,
        max_output_tokens: answer.max_output_tokens,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is normal.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let settings = load_settings(&cli)?;
    init_subscriber(&settings.logging.level, settings.logging.format);
    let metrics = docchat_server::metrics::install_recorder();

    let db_path = settings.storage.resolved_db_path();
    let store = DocumentStore::open(
        &db_path,
        &ConnectionConfig {
            pool_size: settings.storage.pool_size,
            ..ConnectionConfig::default()
        },
    )
    .with_context(|| format!("Failed to open database at {}", db_path.display()))?;

    let gemini = gemini_config(&settings);
    if gemini.api_key.is_none() {
        warn!("no Gemini API key configured (GEMINI_API_KEY); queries will fail");
    }
    let answers = GeminiAnswerService::new(gemini).context("Failed to build answer service")?;

    let config = GatewayConfig::from(&settings);
    let server = DocchatServer::new(config, Arc::new(store), Arc::new(answers), metrics);
    let addr = server.listen().await.context("Failed to bind listener")?;
    info!(%addr, db = %db_path.display(), model = %settings.answer.model, "docchat gateway listening");

    let cause = server
        .shutdown()
        .wait_for_signal()
        .await
        .context("Failed to listen for shutdown signals")?;
    info!(?cause, "shutdown signal received");

    let report = server.shutdown().drain(SHUTDOWN_GRACE).await;
    if !report.is_clean() {
        warn!(?report, "gateway did not shut down cleanly");
    }
    Ok(())
}
