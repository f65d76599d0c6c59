mod server;

use anyhow::Context;
use rmcp::ServiceExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use archsketch_agent::{client_from_settings, Orchestrator};
use archsketch_core::Settings;
use archsketch_render::GraphvizBuilder;

use crate::server::ArchsketchServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("loading settings")?;

    // stdout carries the MCP protocol, so logs go to stderr.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .init();

    if !settings.mock_mode() && !settings.ai_configured() {
        anyhow::bail!(
            "no model provider configured: set provider, model and apiKey in {} \
             (or ARCHSKETCH_PROVIDER / ARCHSKETCH_MODEL / ARCHSKETCH_API_KEY), \
             or set ARCHSKETCH_USE_MOCK=1",
            archsketch_core::settings::settings_path().display()
        );
    }

    let model = client_from_settings(&settings).context("creating model client")?;
    let builder = GraphvizBuilder::from_settings(&settings).context("locating graphviz")?;
    let orchestrator = Orchestrator::new(model, Arc::new(builder), settings.supported_node_types.clone());

    tracing::info!(
        node_types = %settings.supported_node_types,
        max_attempts = settings.max_attempts,
        "archsketch-mcp starting"
    );

    let shutdown = CancellationToken::new();
    let service = ArchsketchServer::new(Arc::new(orchestrator), settings.max_attempts, shutdown.clone())
        .serve(rmcp::transport::io::stdio())
        .await
        .inspect_err(|e| tracing::error!("MCP server error: {e}"))?;

    tokio::select! {
        quit = service.waiting() => {
            quit?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted, cancelling in-flight generations");
            shutdown.cancel();
        }
    }
    Ok(())
}
