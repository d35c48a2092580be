mod bootstrap;
mod health;

use anyhow::{Context, Result};
use hourbot_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use hourbot_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Logging comes up before bootstrap so startup failures are recorded.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap(config, bootstrap::ChatAdapters::default()).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        health::HealthState::new(app.db_pool.clone(), app.runtime.clone()),
    )
    .await
    .context("health endpoint failed to bind")?;

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        command_prefix = %app.config.chat.command_prefix,
        "hourbot-server started"
    );
    app.gateway.start().await?;
    tracing::info!(
        event_name = "system.server.gateway_closed",
        correlation_id = "bootstrap",
        "chat gateway session ended"
    );

    wait_for_shutdown().await?;
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        pending_conversations = app.runtime.pending().len(),
        "hourbot-server stopping"
    );
    app.db_pool.close().await;

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
