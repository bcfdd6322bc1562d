use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::{db::models::User, error::Result, middleware::auth::AuthUser, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users))
        .route("/me", get(current_user))
}

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub users: Vec<User>,
}

async fn list_users(State(state): State<AppState>) -> Result<Json<UserListResponse>> {
    let users = state.farms.list_users().await?;
    Ok(Json(UserListResponse { users }))
}

async fn current_user(State(state): State<AppState>, user: AuthUser) -> Result<Json<User>> {
    Ok(Json(state.farms.user(&user.id).await?))
}
