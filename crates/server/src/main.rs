mod api;
mod bootstrap;
mod error;
mod health;
mod status;

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::Router;
use concierge_agent::messaging::InstanceApi;
use concierge_core::config::{AppConfig, LoadOptions};
use tokio::sync::Notify;

use crate::bootstrap::Application;

fn init_logging(config: &AppConfig) {
    use concierge_core::config::LogFormat::*;
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

fn app_router(app: &Application) -> Router {
    let messaging = app.runtime.messaging();
    let default_instance =
        messaging.as_ref().and_then(|client| client.default_instance().map(str::to_string));
    let messaging_enabled = messaging.is_some();
    let instances = messaging.map(|client| client as Arc<dyn InstanceApi>);

    health::router(health::HealthState::new(app.db_pool.clone(), messaging_enabled))
        .merge(api::router(api::ApiState::new(app.runtime.engine())))
        .merge(status::router(status::StatusState::new(instances, default_instance)))
}

pub async fn run() -> Result<()> {
    // Logging needs the loaded config, so bootstrap reuses it.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        messaging_enabled = app.runtime.messaging().is_some(),
        "concierge-server listening"
    );

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    let stopping = Arc::new(Notify::new());
    let signalled = Arc::clone(&stopping);
    let server = axum::serve(listener, app_router(&app))
        .with_graceful_shutdown(async move {
            if let Err(error) = wait_for_shutdown().await {
                tracing::error!(
                    event_name = "system.server.signal_error",
                    error = %error,
                    "failed to listen for shutdown signal"
                );
            }
            tracing::info!(
                event_name = "system.server.stopping",
                correlation_id = "shutdown",
                "concierge-server stopping"
            );
            signalled.notify_one();
        })
        .into_future();

    tokio::select! {
        result = server => result?,
        _ = async {
            stopping.notified().await;
            tokio::time::sleep(grace).await;
        } => {
            tracing::warn!(
                event_name = "system.server.shutdown_timeout",
                correlation_id = "shutdown",
                grace_secs = grace.as_secs(),
                "in-flight requests did not finish before the grace period"
            );
        }
    }

    app.db_pool.close().await;
    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
