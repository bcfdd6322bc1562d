use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::{
    db::models::Role,
    error::Result,
    middleware::auth::AuthUser,
    services::session::{SessionEvent, SessionState, View},
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(current_session))
        .route("/role", post(select_role))
        .route("/project", post(select_project))
        .route("/view", post(select_view))
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: Role,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRequest {
    pub project_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ViewRequest {
    pub view: View,
}

async fn current_session(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<SessionState>> {
    Ok(Json(state.sessions.get(&user.session_id).await?))
}

// Selections that don't apply (a role the user lacks, someone else's project)
// leave the session untouched; the response always shows the current state.

async fn select_role(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<RoleRequest>,
) -> Result<Json<SessionState>> {
    let session = state
        .sessions
        .dispatch(&user.session_id, SessionEvent::RoleSelected(body.role))
        .await?;
    Ok(Json(session))
}

async fn select_project(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<ProjectRequest>,
) -> Result<Json<SessionState>> {
    let session = state
        .sessions
        .dispatch(&user.session_id, SessionEvent::ProjectSelected(body.project_id))
        .await?;
    Ok(Json(session))
}

async fn select_view(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<ViewRequest>,
) -> Result<Json<SessionState>> {
    let session = state
        .sessions
        .dispatch(&user.session_id, SessionEvent::ViewSelected(body.view))
        .await?;
    Ok(Json(session))
}
