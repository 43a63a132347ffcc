use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use concierge_db::{migrations, DbPool};
use serde::Serialize;
use tracing::warn;

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
    messaging_enabled: bool,
}

impl HealthState {
    pub fn new(db_pool: DbPool, messaging_enabled: bool) -> Self {
        Self { db_pool, messaging_enabled }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: HealthCheck,
    pub schema: HealthCheck,
    /// Informational; an unconfigured bridge never degrades readiness.
    pub messaging: HealthCheck,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

/// Ready when the pool answers and every embedded migration is applied.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.db_pool).await;
    let schema = if database.status == "ready" {
        schema_check(&state.db_pool).await
    } else {
        HealthCheck { status: "skipped", detail: "database unreachable".to_string() }
    };
    let messaging = if state.messaging_enabled {
        HealthCheck { status: "ready", detail: "messaging bridge configured".to_string() }
    } else {
        HealthCheck {
            status: "disabled",
            detail: "messaging bridge not configured; webhook replies are refused".to_string(),
        }
    };

    let ready = database.status == "ready" && schema.status == "ready";
    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        database,
        schema,
        messaging,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await {
        Ok(_) => HealthCheck { status: "ready", detail: "database query succeeded".to_string() },
        Err(error) => {
            warn!(
                event_name = "system.health.database_degraded",
                error = %error,
                "health check failed"
            );
            HealthCheck { status: "degraded", detail: format!("database query failed: {error}") }
        }
    }
}

async fn schema_check(pool: &DbPool) -> HealthCheck {
    match migrations::pending_versions(pool).await {
        Ok(pending) if pending.is_empty() => {
            HealthCheck { status: "ready", detail: "all migrations applied".to_string() }
        }
        Ok(pending) => {
            let versions = pending.iter().map(i64::to_string).collect::<Vec<_>>().join(", ");
            HealthCheck { status: "degraded", detail: format!("pending migrations: {versions}") }
        }
        Err(error) => HealthCheck {
            status: "degraded",
            detail: format!("could not read migration history: {error}"),
        },
    }
}
