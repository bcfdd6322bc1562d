//! Repository over users, their projects and the marketplace listings.
//!
//! Two implementations: [`memory::InMemoryStore`] for demos and tests, and
//! [`sqlite::SqliteStore`] on top of the sqlx pool. Every read hands out owned
//! copies; mutating one never writes through to the store.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::{
    db::models::{Buyer, Crop, CropStatus, Harvest, Investment, Project, User},
    error::Result,
};

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

/// Result of the `Listed -> Sold` compare-and-swap.
#[derive(Debug, Clone, PartialEq)]
pub enum SaleOutcome {
    Sold(Harvest),
    /// Someone else bought it first; carries the current record.
    AlreadySold(Harvest),
    Missing,
}

#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn list_users(&self) -> Result<Vec<User>>;

    async fn find_user(&self, user_id: &str) -> Result<Option<User>>;

    async fn list_listings(&self) -> Result<Vec<Harvest>>;

    async fn find_listing(&self, harvest_id: &str) -> Result<Option<Harvest>>;

    /// Appends a project to the user's list. `NotFound` for an unknown user.
    async fn insert_project(&self, user_id: &str, project: Project) -> Result<Project>;

    async fn insert_crop(&self, project_id: &str, crop: Crop) -> Result<Crop>;

    async fn insert_investment(&self, project_id: &str, investment: Investment)
        -> Result<Investment>;

    /// Moves a crop from `expected` to `next`. Fails with `NotAvailable` when the
    /// stored status is no longer `expected`.
    async fn update_crop_status(
        &self,
        project_id: &str,
        crop_id: &str,
        expected: CropStatus,
        next: CropStatus,
    ) -> Result<Crop>;

    async fn insert_listing(&self, harvest: Harvest) -> Result<Harvest>;

    /// Atomically flips a `Listed` harvest to `Sold` and attaches the buyer.
    async fn mark_sold(&self, harvest_id: &str, buyer: &Buyer) -> Result<SaleOutcome>;
}
