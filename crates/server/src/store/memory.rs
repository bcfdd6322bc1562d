use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{EntityStore, SaleOutcome};
use crate::{
    db::{
        models::{Buyer, Crop, CropStatus, Harvest, HarvestStatus, Investment, Project, User},
        seed::Dataset,
    },
    error::{AppError, Result},
};

#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<Dataset>>,
}

impl InMemoryStore {
    pub fn new(data: Dataset) -> Self {
        Self {
            inner: Arc::new(RwLock::new(data)),
        }
    }
}

fn project_mut<'a>(data: &'a mut Dataset, project_id: &str) -> Result<&'a mut Project> {
    data.users
        .iter_mut()
        .flat_map(|u| u.projects.iter_mut())
        .find(|p| p.id == project_id)
        .ok_or_else(|| AppError::NotFound(format!("Project {project_id} not found")))
}

#[async_trait]
impl EntityStore for InMemoryStore {
    async fn list_users(&self) -> Result<Vec<User>> {
        Ok(self.inner.read().await.users.clone())
    }

    async fn find_user(&self, user_id: &str) -> Result<Option<User>> {
        let data = self.inner.read().await;
        Ok(data.users.iter().find(|u| u.id == user_id).cloned())
    }

    async fn list_listings(&self) -> Result<Vec<Harvest>> {
        Ok(self.inner.read().await.listings.clone())
    }

    async fn find_listing(&self, harvest_id: &str) -> Result<Option<Harvest>> {
        let data = self.inner.read().await;
        Ok(data.listings.iter().find(|h| h.id == harvest_id).cloned())
    }

    async fn insert_project(&self, user_id: &str, project: Project) -> Result<Project> {
        let mut data = self.inner.write().await;
        let user = data
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or_else(|| AppError::NotFound(format!("User {user_id} not found")))?;
        user.projects.push(project.clone());
        Ok(project)
    }

    async fn insert_crop(&self, project_id: &str, crop: Crop) -> Result<Crop> {
        let mut data = self.inner.write().await;
        project_mut(&mut data, project_id)?.crops.push(crop.clone());
        Ok(crop)
    }

    async fn insert_investment(
        &self,
        project_id: &str,
        investment: Investment,
    ) -> Result<Investment> {
        let mut data = self.inner.write().await;
        project_mut(&mut data, project_id)?
            .investments
            .push(investment.clone());
        Ok(investment)
    }

    async fn update_crop_status(
        &self,
        project_id: &str,
        crop_id: &str,
        expected: CropStatus,
        next: CropStatus,
    ) -> Result<Crop> {
        let mut data = self.inner.write().await;
        let crop = project_mut(&mut data, project_id)?
            .crops
            .iter_mut()
            .find(|c| c.id == crop_id)
            .ok_or_else(|| AppError::NotFound(format!("Crop {crop_id} not found")))?;

        if crop.status != expected {
            return Err(AppError::NotAvailable(format!(
                "Crop {crop_id} is already {}",
                crop.status
            )));
        }
        crop.status = next;
        Ok(crop.clone())
    }

    async fn insert_listing(&self, harvest: Harvest) -> Result<Harvest> {
        let mut data = self.inner.write().await;
        data.listings.push(harvest.clone());
        Ok(harvest)
    }

    async fn mark_sold(&self, harvest_id: &str, buyer: &Buyer) -> Result<SaleOutcome> {
        // Status check and write happen under one write guard.
        let mut data = self.inner.write().await;
        let Some(harvest) = data.listings.iter_mut().find(|h| h.id == harvest_id) else {
            return Ok(SaleOutcome::Missing);
        };

        if harvest.is_sold() {
            return Ok(SaleOutcome::AlreadySold(harvest.clone()));
        }

        harvest.status = HarvestStatus::Sold;
        harvest.buyer = Some(buyer.clone());
        Ok(SaleOutcome::Sold(harvest.clone()))
    }
}
