// Projects, crops and investments owned by farmers.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    db::models::{Crop, CropStatus, Investment, InvestmentType, Project, SoilCondition, User},
    error::{AppError, Result},
    store::EntityStore,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProject {
    pub name: String,
    pub location: String,
    pub farm_size: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCrop {
    #[serde(rename = "type")]
    pub crop_type: String,
    pub planting_date: NaiveDate,
    pub soil_condition: SoilCondition,
    pub expected_yield: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewInvestment {
    #[serde(rename = "type")]
    pub investment_type: InvestmentType,
    pub description: String,
    pub amount: f64,
    /// Defaults to today.
    pub date: Option<NaiveDate>,
}

fn require_text(value: &str, field: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn require_positive(value: f64, field: &str) -> Result<f64> {
    if !value.is_finite() || value <= 0.0 {
        return Err(AppError::Validation(format!(
            "{field} must be a positive number"
        )));
    }
    Ok(value)
}

#[derive(Clone)]
pub struct Farms {
    store: Arc<dyn EntityStore>,
}

impl Farms {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        self.store.list_users().await
    }

    pub async fn user(&self, user_id: &str) -> Result<User> {
        self.store
            .find_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {user_id} not found")))
    }

    async fn owned_project(&self, user_id: &str, project_id: &str) -> Result<Project> {
        self.user(user_id)
            .await?
            .project(project_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Project {project_id} not found")))
    }

    pub async fn create_project(&self, user_id: &str, req: NewProject) -> Result<Project> {
        let project = Project {
            id: Uuid::new_v4().to_string(),
            name: require_text(&req.name, "Project name")?,
            location: require_text(&req.location, "Location")?,
            farm_size: require_positive(req.farm_size, "Farm size")?,
            crops: Vec::new(),
            investments: Vec::new(),
        };

        let project = self.store.insert_project(user_id, project).await?;
        tracing::info!(user_id, project_id = %project.id, name = %project.name, "Project created");
        Ok(project)
    }

    /// New crops always start at `Planting`.
    pub async fn add_crop(&self, user_id: &str, project_id: &str, req: NewCrop) -> Result<Crop> {
        let crop = Crop {
            id: Uuid::new_v4().to_string(),
            crop_type: require_text(&req.crop_type, "Crop type")?,
            planting_date: req.planting_date,
            soil_condition: req.soil_condition,
            expected_yield: require_positive(req.expected_yield, "Expected yield")?,
            status: CropStatus::Planting,
        };

        self.owned_project(user_id, project_id).await?;
        let crop = self.store.insert_crop(project_id, crop).await?;
        tracing::debug!(project_id, crop_id = %crop.id, "Crop added");
        Ok(crop)
    }

    /// Moves a crop one stage forward. Harvested crops stay harvested.
    pub async fn advance_crop(&self, user_id: &str, project_id: &str, crop_id: &str) -> Result<Crop> {
        let project = self.owned_project(user_id, project_id).await?;
        let current = project
            .crop(crop_id)
            .ok_or_else(|| AppError::NotFound(format!("Crop {crop_id} not found")))?
            .status;
        let next = current.next().ok_or_else(|| {
            AppError::Validation(format!("Crop {crop_id} is already harvested"))
        })?;

        let crop = self
            .store
            .update_crop_status(project_id, crop_id, current, next)
            .await?;
        tracing::info!(project_id, crop_id, from = %current, to = %next, "Crop advanced");
        Ok(crop)
    }

    pub async fn add_investment(
        &self,
        user_id: &str,
        project_id: &str,
        req: NewInvestment,
    ) -> Result<Investment> {
        let investment = Investment {
            id: Uuid::new_v4().to_string(),
            investment_type: req.investment_type,
            description: require_text(&req.description, "Description")?,
            amount: require_positive(req.amount, "Amount")?,
            date: req.date.unwrap_or_else(|| Utc::now().date_naive()),
        };

        self.owned_project(user_id, project_id).await?;
        let investment = self.store.insert_investment(project_id, investment).await?;
        tracing::debug!(project_id, investment_id = %investment.id, "Investment recorded");
        Ok(investment)
    }
}
