/// HTTP server setup and routing
use crate::{
    context::AppContext,
    error::{PanelError, PanelResult},
};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method, StatusCode},
    response::Json,
    Router,
};
use serde_json::json;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::info;

/// Base64 inflates uploads by a third; leave room for the rest of the JSON body
fn body_limit(upload_limit: usize) -> usize {
    upload_limit.saturating_mul(4) / 3 + 64 * 1024
}

/// Build the main application router
pub fn build_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    // Image sets and exams carry several files in one body
    let limit = body_limit(ctx.config.service.upload_limit).saturating_mul(8);

    let mut router = Router::new().merge(crate::api::routes());

    if let Some(root) = &ctx.media_root {
        router = router.nest_service("/media", ServeDir::new(root));
    }

    router
        .with_state(ctx)
        .layer(DefaultBodyLimit::max(limit))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .fallback(not_found)
}

/// 404 handler
async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "NotFound",
            "message": "Endpoint not found"
        })),
    )
}

/// Start the HTTP server
pub async fn serve(ctx: AppContext) -> PanelResult<()> {
    let addr = format!("{}:{}", ctx.config.service.hostname, ctx.config.service.port);

    info!("Study panel listening on {}", addr);
    info!("   Service URL: {}", ctx.service_url());

    let app = build_router(ctx);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| PanelError::Internal(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| PanelError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}
