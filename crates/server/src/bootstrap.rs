use concierge_agent::runtime::{AgentRuntime, RuntimeError};
use concierge_core::config::{AppConfig, ConfigError, LoadOptions};
use concierge_db::{connect_with_settings, migrations, DbPool};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub runtime: AgentRuntime,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("agent runtime setup failed: {0}")]
    Runtime(#[from] RuntimeError),
}

#[cfg(test)]
pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let runtime = AgentRuntime::from_config(&config, db_pool.clone())?;

    Ok(Application { config, db_pool, runtime })
}

#[cfg(test)]
mod tests {
    use concierge_core::config::{ConfigOverrides, LoadOptions};

    use crate::bootstrap::bootstrap;

    fn overrides(database_url: &str, llm_api_key: Option<&str>) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                llm_api_key: llm_api_key.map(str::to_string),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_without_llm_api_key() {
        let result = bootstrap(overrides("sqlite::memory:", None)).await;

        let message = result.err().expect("bootstrap should fail").to_string();
        assert!(message.contains("llm.api_key"), "unexpected error: {message}");
    }

    #[tokio::test]
    async fn bootstrap_applies_migrations_and_assembles_runtime() {
        let app = bootstrap(overrides("sqlite::memory:", Some("sk-test")))
            .await
            .expect("bootstrap should succeed with valid overrides");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('customer_profiles', 'conversation_turns')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("tables should be queryable after bootstrap");
        assert_eq!(table_count, 2);

        assert!(app.runtime.messaging().is_none());
        assert_eq!(app.runtime.engine().settings().history_limit, 20);

        app.db_pool.close().await;
    }
}
