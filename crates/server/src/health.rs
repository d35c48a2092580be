use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use hourbot_db::DbPool;
use hourbot_workflow::WorkflowRuntime;
use serde::Serialize;
use tracing::{error, info};

const ROSTER_TABLES: [&str; 2] = ["registered_user", "hours"];

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
    runtime: WorkflowRuntime,
}

impl HealthState {
    pub fn new(db_pool: DbPool, runtime: WorkflowRuntime) -> Self {
        Self { db_pool, runtime }
    }
}

/// Store readiness as seen by the hours workflow.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RosterCheck {
    pub status: &'static str,
    pub missing_tables: Vec<&'static str>,
    pub registered_users: Option<i64>,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub roster: RosterCheck,
    /// Private conversations prompted and not yet answered.
    pub awaiting_replies: usize,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn spawn(bind_address: &str, port: u16, state: HealthState) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(state)).await {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let roster = roster_check(&state.db_pool).await;
    let ready = roster.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        roster,
        awaiting_replies: state.runtime.pending().len(),
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn roster_check(pool: &DbPool) -> RosterCheck {
    let present = match sqlx::query_scalar::<_, String>(
        "SELECT name FROM sqlite_master \
         WHERE type = 'table' AND name IN ('registered_user', 'hours')",
    )
    .fetch_all(pool)
    .await
    {
        Ok(names) => names,
        Err(error) => return degraded(Vec::new(), format!("database query failed: {error}")),
    };

    let missing_tables: Vec<&'static str> = ROSTER_TABLES
        .into_iter()
        .filter(|table| !present.iter().any(|name| name == table))
        .collect();
    if !missing_tables.is_empty() {
        return degraded(missing_tables, "migrations have not been applied".to_string());
    }

    match sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM registered_user").fetch_one(pool).await
    {
        Ok(count) => RosterCheck {
            status: "ready",
            missing_tables,
            registered_users: Some(count),
            detail: "roster and hours tables reachable".to_string(),
        },
        Err(error) => degraded(missing_tables, format!("roster count failed: {error}")),
    }
}

fn degraded(missing_tables: Vec<&'static str>, detail: String) -> RosterCheck {
    RosterCheck { status: "degraded", missing_tables, registered_users: None, detail }
}
