/// Admin session endpoints
use crate::{
    auth::{AdminAuthContext, IssuedToken},
    context::AppContext,
    error::PanelResult,
};
use axum::{extract::State, routing::{get, post}, Json, Router};
use serde::{Deserialize, Serialize};

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/admin/login", post(login))
        .route("/api/admin/session", get(session))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub password: String,
}

/// Exchange the admin password for a bearer token
async fn login(
    State(ctx): State<AppContext>,
    Json(req): Json<LoginRequest>,
) -> PanelResult<Json<IssuedToken>> {
    ctx.limiter.check_login()?;
    let issued = ctx.gate.login(&req.password)?;
    Ok(Json(issued))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub admin: bool,
    pub expires_at: i64,
}

/// Check that a stored admin token is still valid
async fn session(auth: AdminAuthContext) -> Json<SessionInfo> {
    Json(SessionInfo {
        admin: true,
        expires_at: auth.claims.exp,
    })
}
