use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{
    db::models::{Crop, Investment, Project},
    error::Result,
    handlers::ws::MarketEvent,
    middleware::auth::AuthUser,
    services::farms::{NewCrop, NewInvestment, NewProject},
    AppState,
};

use super::refresh_after_mutation;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_projects).post(create_project))
        .route("/:id/crops", post(add_crop))
        .route("/:id/crops/:crop_id/advance", post(advance_crop))
        .route("/:id/investments", post(add_investment))
        .route("/:id/listable-crops", get(listable_crops))
}

#[derive(Debug, Serialize)]
pub struct ProjectListResponse {
    pub projects: Vec<Project>,
}

#[derive(Debug, Serialize)]
pub struct CropListResponse {
    pub crops: Vec<Crop>,
}

#[derive(Debug, Deserialize)]
pub struct CropPathParams {
    pub id: String,
    pub crop_id: String,
}

async fn list_projects(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ProjectListResponse>> {
    let projects = state.farms.user(&user.id).await?.projects;
    Ok(Json(ProjectListResponse { projects }))
}

async fn create_project(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<NewProject>,
) -> Result<Json<Project>> {
    let project = state.farms.create_project(&user.id, body).await?;

    refresh_after_mutation(
        &state,
        MarketEvent::ProjectCreated {
            project_id: project.id.clone(),
            user_id: user.id,
        },
    )
    .await;

    Ok(Json(project))
}

async fn add_crop(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<String>,
    Json(body): Json<NewCrop>,
) -> Result<Json<Crop>> {
    let crop = state.farms.add_crop(&user.id, &project_id, body).await?;

    refresh_after_mutation(
        &state,
        MarketEvent::CropUpdated {
            project_id,
            crop_id: crop.id.clone(),
        },
    )
    .await;

    Ok(Json(crop))
}

async fn advance_crop(
    State(state): State<AppState>,
    user: AuthUser,
    Path(params): Path<CropPathParams>,
) -> Result<Json<Crop>> {
    let crop = state
        .farms
        .advance_crop(&user.id, &params.id, &params.crop_id)
        .await?;

    refresh_after_mutation(
        &state,
        MarketEvent::CropUpdated {
            project_id: params.id,
            crop_id: params.crop_id,
        },
    )
    .await;

    Ok(Json(crop))
}

async fn add_investment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<String>,
    Json(body): Json<NewInvestment>,
) -> Result<Json<Investment>> {
    let investment = state
        .farms
        .add_investment(&user.id, &project_id, body)
        .await?;

    refresh_after_mutation(
        &state,
        MarketEvent::InvestmentAdded {
            project_id,
            investment_id: investment.id.clone(),
        },
    )
    .await;

    Ok(Json(investment))
}

async fn listable_crops(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<String>,
) -> Result<Json<CropListResponse>> {
    let crops = state
        .marketplace
        .listable_crops(&user.id, &project_id)
        .await?;
    Ok(Json(CropListResponse { crops }))
}
