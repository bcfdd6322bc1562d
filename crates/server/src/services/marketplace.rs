// Listing creation and the Listed -> Sold transition.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    db::models::{
        Buyer, Crop, CropStatus, FarmerSnapshot, Harvest, HarvestStatus, Project,
        ProjectSnapshot, User,
    },
    error::{AppError, Result},
    store::{EntityStore, SaleOutcome},
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewListing {
    pub farmer_id: String,
    pub project_id: String,
    pub crop_id: String,
    pub quantity: f64,
    pub price_per_ton: f64,
}

fn positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// Checks a listing request against the farmer's own data and returns the
/// project and crop it refers to.
pub fn validate_listing<'a>(farmer: &'a User, req: &NewListing) -> Result<(&'a Project, &'a Crop)> {
    if !positive(req.quantity) || !positive(req.price_per_ton) {
        return Err(AppError::Validation(
            "Quantity and price must be positive numbers".to_string(),
        ));
    }

    let project = farmer.project(&req.project_id).ok_or_else(|| {
        AppError::Validation(format!(
            "Project {} does not belong to {}",
            req.project_id, farmer.name
        ))
    })?;

    if project.harvested_crops().next().is_none() {
        return Err(AppError::Validation(format!(
            "Project {} has no harvested crops to list",
            project.name
        )));
    }

    let crop = project.crop(&req.crop_id).ok_or_else(|| {
        AppError::Validation(format!(
            "Crop {} does not belong to project {}",
            req.crop_id, project.name
        ))
    })?;

    if crop.status != CropStatus::Harvested {
        return Err(AppError::Validation(format!(
            "Crop {} is {} and cannot be listed until harvested",
            crop.crop_type, crop.status
        )));
    }

    Ok((project, crop))
}

#[derive(Clone)]
pub struct Marketplace {
    store: Arc<dyn EntityStore>,
}

impl Marketplace {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    pub async fn list_listings(&self) -> Result<Vec<Harvest>> {
        self.store.list_listings().await
    }

    /// Harvested crops of one of the farmer's projects.
    pub async fn listable_crops(&self, farmer_id: &str, project_id: &str) -> Result<Vec<Crop>> {
        let farmer = self
            .store
            .find_user(farmer_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {farmer_id} not found")))?;
        let project = farmer
            .project(project_id)
            .ok_or_else(|| AppError::NotFound(format!("Project {project_id} not found")))?;
        Ok(project.harvested_crops().cloned().collect())
    }

    pub async fn create_listing(&self, req: NewListing) -> Result<Harvest> {
        let farmer = self
            .store
            .find_user(&req.farmer_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", req.farmer_id)))?;

        let (project, crop) = validate_listing(&farmer, &req)?;

        let harvest = Harvest {
            id: Uuid::new_v4().to_string(),
            farmer: FarmerSnapshot {
                id: farmer.id.clone(),
                name: farmer.name.clone(),
                contact: farmer.contact.clone(),
            },
            project: ProjectSnapshot {
                id: project.id.clone(),
                name: project.name.clone(),
                location: project.location.clone(),
            },
            crop_type: crop.crop_type.clone(),
            quantity: req.quantity,
            price_per_ton: req.price_per_ton,
            listing_date: Utc::now(),
            status: HarvestStatus::Listed,
            buyer: None,
        };

        let harvest = self.store.insert_listing(harvest).await?;
        tracing::info!(
            harvest_id = %harvest.id,
            farmer_id = %harvest.farmer.id,
            crop = %harvest.crop_type,
            quantity = harvest.quantity,
            "Harvest listed"
        );
        Ok(harvest)
    }

    /// Buys a listing. Never retried internally: a lost race surfaces as
    /// `NotAvailable` so the caller can refresh.
    pub async fn purchase_listing(&self, harvest_id: &str, buyer: Buyer) -> Result<Harvest> {
        let listing = self
            .store
            .find_listing(harvest_id)
            .await?
            .ok_or_else(|| AppError::NotAvailable(format!("Listing {harvest_id} does not exist")))?;

        if listing.farmer.id == buyer.id {
            return Err(AppError::Validation(
                "Farmers cannot buy their own listings".to_string(),
            ));
        }

        match self.store.mark_sold(harvest_id, &buyer).await? {
            SaleOutcome::Sold(harvest) => {
                tracing::info!(harvest_id, buyer_id = %buyer.id, "Harvest sold");
                Ok(harvest)
            }
            SaleOutcome::AlreadySold(_) => {
                tracing::debug!(harvest_id, buyer_id = %buyer.id, "Purchase lost race");
                Err(AppError::NotAvailable(format!(
                    "Listing {harvest_id} has already been sold"
                )))
            }
            SaleOutcome::Missing => Err(AppError::NotAvailable(format!(
                "Listing {harvest_id} does not exist"
            ))),
        }
    }
}
