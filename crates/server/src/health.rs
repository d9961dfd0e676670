use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use folio_agent::runtime::ChatRuntime;
use folio_db::DbPool;

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
    runtime: Arc<ChatRuntime>,
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
    pub generation: HealthCheck,
    pub cached_documents: Vec<&'static str>,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool, runtime: Arc<ChatRuntime>) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool, runtime })
}

/// Readiness follows the database only. A missing generation credential or an
/// uncached document is reported but does not fail the check.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.db_pool).await;
    let ready = database.status == "ready";

    let generation = if state.runtime.generation_configured() {
        HealthCheck { status: "ready", detail: "generation credential configured".to_string() }
    } else {
        HealthCheck {
            status: "unconfigured",
            detail: "generation API key missing; chat requests will fail".to_string(),
        }
    };

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        database,
        generation,
        cached_documents: state
            .runtime
            .documents()
            .cached_kinds()
            .into_iter()
            .map(|kind| kind.as_str())
            .collect(),
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match folio_db::ping(pool).await {
        Ok(()) => HealthCheck { status: "ready", detail: "database query succeeded".to_string() },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("database query failed: {error}") }
        }
    }
}
