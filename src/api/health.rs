/// Liveness and sync status endpoints
use crate::{
    context::AppContext,
    models::Collection,
    sync::SyncStatus,
};
use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use serde::Serialize;
use std::sync::OnceLock;
use std::time::Instant;

static STARTED: OnceLock<Instant> = OnceLock::new();

/// Record process start for uptime reporting
pub fn mark_started() {
    STARTED.get_or_init(Instant::now);
}

fn uptime_seconds() -> f64 {
    STARTED.get().map(|s| s.elapsed().as_secs_f64()).unwrap_or(0.0)
}

/// Liveness response
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub uptime_seconds: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CollectionStatus {
    pub collection: Collection,
    pub version: u64,
    pub records: usize,
    #[serde(flatten)]
    pub status: SyncStatus,
}

/// Sync status of every collection
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    /// "live" when every collection is live, otherwise "degraded"
    pub status: String,
    pub collections: Vec<CollectionStatus>,
}

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/health", get(health))
        .route("/api/status", get(status))
}

async fn health(State(ctx): State<AppContext>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok".to_string(),
        version: ctx.config.service.version.clone(),
        uptime_seconds: uptime_seconds(),
    })
}

/// 200 when all collections are live, 503 otherwise
async fn status(State(ctx): State<AppContext>) -> (StatusCode, Json<StatusReport>) {
    let collections: Vec<CollectionStatus> = Collection::ALL
        .iter()
        .map(|&collection| CollectionStatus {
            collection,
            version: ctx.sync.version(collection),
            records: match collection {
                Collection::Documents => ctx.sync.documents().len(),
                Collection::Exams => ctx.sync.exams().len(),
                Collection::Blogs => ctx.sync.blogs().len(),
            },
            status: ctx.sync.status(collection),
        })
        .collect();

    let all_live = collections.iter().all(|c| c.status == SyncStatus::Live);
    let (code, label) = if all_live {
        (StatusCode::OK, "live")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        code,
        Json(StatusReport {
            status: label.to_string(),
            collections,
        }),
    )
}
