use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{
    db::models::{Buyer, Harvest, Role},
    error::{AppError, Result},
    handlers::ws::MarketEvent,
    middleware::auth::AuthUser,
    services::marketplace::NewListing,
    AppState,
};

use super::refresh_after_mutation;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_listings).post(create_listing))
        .route("/:id/purchase", post(purchase_listing))
}

#[derive(Debug, Serialize)]
pub struct ListingListResponse {
    pub listings: Vec<Harvest>,
}

/// The farmer is always the caller.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateListingRequest {
    pub project_id: String,
    pub crop_id: String,
    pub quantity: f64,
    pub price_per_ton: f64,
}

async fn list_listings(State(state): State<AppState>) -> Result<Json<ListingListResponse>> {
    let listings = state.marketplace.list_listings().await?;
    Ok(Json(ListingListResponse { listings }))
}

async fn create_listing(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<CreateListingRequest>,
) -> Result<Json<Harvest>> {
    let harvest = state
        .marketplace
        .create_listing(NewListing {
            farmer_id: user.id.clone(),
            project_id: body.project_id,
            crop_id: body.crop_id,
            quantity: body.quantity,
            price_per_ton: body.price_per_ton,
        })
        .await?;

    refresh_after_mutation(
        &state,
        MarketEvent::ListingCreated {
            harvest_id: harvest.id.clone(),
            farmer_id: user.id,
        },
    )
    .await;

    Ok(Json(harvest))
}

async fn purchase_listing(
    State(state): State<AppState>,
    user: AuthUser,
    Path(harvest_id): Path<String>,
) -> Result<Json<Harvest>> {
    let buyer = state.farms.user(&user.id).await?;
    if !buyer.has_role(Role::Seller) {
        return Err(AppError::Forbidden(
            "Only sellers can buy harvests".to_string(),
        ));
    }

    let harvest = state
        .marketplace
        .purchase_listing(
            &harvest_id,
            Buyer {
                id: buyer.id,
                name: buyer.name,
            },
        )
        .await?;

    refresh_after_mutation(
        &state,
        MarketEvent::ListingSold {
            harvest_id,
            buyer_id: user.id,
        },
    )
    .await;

    Ok(Json(harvest))
}
