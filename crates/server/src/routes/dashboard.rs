use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, Result},
    middleware::auth::AuthUser,
    services::aggregation::{self, Dashboard},
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/recommendation", get(recommendation))
}

#[derive(Debug, Deserialize)]
pub struct RecommendationQuery {
    pub location: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RecommendationResponse {
    pub location: String,
    pub text: String,
}

async fn dashboard(State(state): State<AppState>, user: AuthUser) -> Result<Json<Dashboard>> {
    let session = state.sessions.get(&user.session_id).await?;
    let users = state.farms.list_users().await?;
    let listings = state.marketplace.list_listings().await?;

    Ok(Json(aggregation::build_dashboard(&session, &users, &listings)))
}

/// Falls back to the active project's location when none is given.
async fn recommendation(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<RecommendationQuery>,
) -> Result<Json<RecommendationResponse>> {
    let location = match query.location.filter(|l| !l.trim().is_empty()) {
        Some(location) => location,
        None => state
            .sessions
            .get(&user.session_id)
            .await?
            .active_project
            .map(|p| p.location)
            .ok_or_else(|| AppError::Validation("A location is required".to_string()))?,
    };

    let text = state.advisor.recommendation(&location).await?;
    Ok(Json(RecommendationResponse { location, text }))
}
