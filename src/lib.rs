pub mod cli;
pub mod core;
pub mod ingest;
pub mod providers;
pub mod store;

use crate::cli::dashboard::{Dashboard, DashboardState};
use crate::core::config::{AppConfig, MAX_CHART_INTERVAL_SECS, MIN_CHART_INTERVAL_SECS};
use crate::providers::snowflake::SnowflakeWarehouse;
use crate::store::DiskObjectStore;
use anyhow::{Result, bail};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, warn};

pub enum AppCommand {
    /// Live charts, portfolio and headlines. `interval` overrides the
    /// configured chart refresh in seconds.
    Dashboard { interval: Option<u64>, once: bool },
    Portfolio,
    Ingest,
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("Crypto dashboard starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    match command {
        AppCommand::Dashboard { interval, once } => {
            let secs = interval.unwrap_or(config.refresh.chart_interval_secs);
            if !(MIN_CHART_INTERVAL_SECS..=MAX_CHART_INTERVAL_SECS).contains(&secs) {
                bail!(
                    "Refresh interval must be between {MIN_CHART_INTERVAL_SECS} and {MAX_CHART_INTERVAL_SECS} seconds, got {secs}"
                );
            }
            let warehouse = SnowflakeWarehouse::from_env(&config.warehouse);
            let dashboard = Dashboard::new(&config, &warehouse);

            if once {
                let (_, frame) = dashboard
                    .tick(DashboardState::default(), Instant::now())
                    .await;
                println!("{}", frame.render(cli::ui::term_width()));
                return Ok(());
            }

            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            tokio::spawn(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    // Keep the sender alive so the dashboard keeps running
                    warn!("Failed to listen for interrupt: {}", e);
                    std::future::pending::<()>().await;
                }
                info!("Interrupt received, stopping dashboard");
                let _ = shutdown_tx.send(true);
            });
            dashboard
                .run(Duration::from_secs(secs), shutdown_rx)
                .await
        }
        AppCommand::Portfolio => {
            let warehouse = SnowflakeWarehouse::from_env(&config.warehouse);
            cli::portfolio::run(&config, &warehouse).await
        }
        AppCommand::Ingest => {
            let store = DiskObjectStore::open(&config.data_path()?)?;
            cli::ingest::run(&config, Arc::new(store)).await?;
            Ok(())
        }
    }
}
