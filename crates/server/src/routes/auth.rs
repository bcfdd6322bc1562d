use axum::{extract::State, routing::post, Json, Router};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    db::models::User,
    error::{AppError, Result},
    middleware::auth::AuthUser,
    services::session::{self, SessionState},
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/login", post(login))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
    pub session: SessionState,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user id
    pub name: String,
    pub sid: String, // session id
    pub exp: usize,
}

const TOKEN_LIFETIME_DAYS: i64 = 7;

fn create_token(
    user_id: &str,
    name: &str,
    session_id: &str,
    expires_at: DateTime<Utc>,
    secret: &str,
) -> Result<String> {
    let claims = Claims {
        sub: user_id.to_string(),
        name: name.to_string(),
        sid: session_id.to_string(),
        exp: expires_at.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AppError::Internal("Failed to create token".to_string()))
}

async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    let users = state.farms.list_users().await?;
    let user = session::resolve_login(&users, &body.username, state.config.demo_login)?;

    let session_id = Uuid::new_v4().to_string();
    let expires_at = Utc::now() + Duration::days(TOKEN_LIFETIME_DAYS);
    let token = create_token(
        &user.id,
        &user.name,
        &session_id,
        expires_at,
        &state.config.jwt_secret,
    )?;
    let session = state
        .sessions
        .open(&session_id, user.clone(), expires_at)
        .await;

    let open_sessions = state.sessions.open_count().await;
    tracing::info!(
        user_id = %user.id,
        %session_id,
        open_sessions,
        "Session opened"
    );

    Ok(Json(AuthResponse {
        token,
        user,
        session,
    }))
}

pub async fn logout(State(state): State<AppState>, user: AuthUser) -> Result<Json<SessionState>> {
    let session = state
        .sessions
        .close(&user.session_id)
        .await
        .ok_or(AppError::Unauthorized)?;
    tracing::info!(user_id = %user.id, session_id = %user.session_id, "Session closed");
    Ok(Json(session))
}
