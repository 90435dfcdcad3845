use std::sync::Arc;

use anyhow::anyhow;
use db::DBService;
use server::{AppState, app};
use services::services::{
    anomaly::{AnomalyDetector, AnomalyScanService, AnomalyStore, PgAnomalyStore},
    config::Config,
    payroll::{PayrollService, PgPayrollConnectionStore},
};
use tracing::info;
use tracing_subscriber::{EnvFilter, prelude::*};
use utils::sentry::{self as sentry_utils, sentry_layer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .map_err(|_| anyhow!("failed to install rustls crypto provider"))?;

    let mut config = Config::from_env()?;
    sentry_utils::init_once(config.sentry_dsn.as_deref(), &config.environment);

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let filter_string = format!(
        "warn,server={level},services={level},db={level},utils={level},tower_http={level}",
        level = log_level
    );
    let env_filter = EnvFilter::try_new(filter_string)?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(env_filter))
        .with(sentry_layer())
        .init();

    let db = DBService::new(config.database_url(), config.database_max_connections).await?;

    let store: Arc<dyn AnomalyStore> = Arc::new(PgAnomalyStore::new(db.pool.clone()));
    let detector = AnomalyDetector::new(store);

    if let Some(interval) = config.anomaly_scan_interval {
        AnomalyScanService::spawn(detector.clone(), interval).await;
    }

    let payroll = match config.payroll.take() {
        Some(payroll_config) => Some(Arc::new(PayrollService::new(
            Arc::new(PgPayrollConnectionStore::new(db.pool.clone())),
            payroll_config,
        )?)),
        None => {
            info!("No payroll provider configured, payroll proxy disabled");
            None
        }
    };

    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    info!("Server running on http://{}", listener.local_addr()?);

    axum::serve(listener, app(AppState { detector, payroll }))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install Ctrl+C handler: {}", e);
    }
    info!("Shutdown signal received");
}
