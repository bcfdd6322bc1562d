use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqliteConnection;

use super::{EntityStore, SaleOutcome};
use crate::{
    db::{
        models::{
            Buyer, Crop, CropStatus, FarmerSnapshot, Harvest, HarvestStatus, Investment, Project,
            ProjectSnapshot, Role, User,
        },
        seed::Dataset,
        Database,
    },
    error::{AppError, Result},
};

type ProjectRow = (String, String, String, String, f64);
type CropRow = (String, String, String, String, String, f64, String);
type InvestmentRow = (String, String, String, String, f64, String);
type HarvestRow = (
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    f64,
    f64,
    String,
    String,
    Option<String>,
    Option<String>,
);

const HARVEST_COLUMNS: &str = r#"
    SELECT id, farmer_id, farmer_name, farmer_contact, project_id, project_name,
           project_location, crop_type, quantity, price_per_ton, listing_date, status,
           buyer_id, buyer_name
    FROM harvests
"#;

#[derive(Clone)]
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Loads `data` when the database holds no users yet.
    pub async fn seed_if_empty(&self, data: &Dataset) -> Result<bool> {
        let users = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.db.pool)
            .await?;
        if users > 0 {
            return Ok(false);
        }

        let mut tx = self.db.pool.begin().await?;
        for user in &data.users {
            sqlx::query("INSERT INTO users (id, name, contact, roles) VALUES (?, ?, ?, ?)")
                .bind(&user.id)
                .bind(&user.name)
                .bind(&user.contact)
                .bind(encode_roles(&user.roles))
                .execute(&mut *tx)
                .await?;
            for project in &user.projects {
                write_project(&mut tx, &user.id, project).await?;
            }
        }
        for harvest in &data.listings {
            write_harvest(&mut tx, harvest).await?;
        }
        tx.commit().await?;

        tracing::info!(
            users = data.users.len(),
            listings = data.listings.len(),
            "Seeded database with demo data"
        );
        Ok(true)
    }

    async fn project_exists(&self, project_id: &str) -> Result<()> {
        let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM projects WHERE id = ?")
            .bind(project_id)
            .fetch_one(&self.db.pool)
            .await?;
        if exists == 0 {
            return Err(AppError::NotFound(format!("Project {project_id} not found")));
        }
        Ok(())
    }
}

fn encode_roles(roles: &[Role]) -> String {
    roles
        .iter()
        .map(|r| r.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

fn decode_roles(raw: &str) -> Result<Vec<Role>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect()
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    raw.parse()
        .map_err(|e| AppError::Internal(format!("Invalid stored date {raw}: {e}")))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| AppError::Internal(format!("Invalid stored timestamp {raw}: {e}")))
}

fn crop_from_row(row: CropRow) -> Result<(String, Crop)> {
    let (id, project_id, crop_type, planting_date, soil_condition, expected_yield, status) = row;
    Ok((
        project_id,
        Crop {
            id,
            crop_type,
            planting_date: parse_date(&planting_date)?,
            soil_condition: soil_condition.parse()?,
            expected_yield,
            status: status.parse()?,
        },
    ))
}

fn investment_from_row(row: InvestmentRow) -> Result<(String, Investment)> {
    let (id, project_id, investment_type, description, amount, date) = row;
    Ok((
        project_id,
        Investment {
            id,
            investment_type: investment_type.parse()?,
            description,
            amount,
            date: parse_date(&date)?,
        },
    ))
}

fn harvest_from_row(row: HarvestRow) -> Result<Harvest> {
    let (
        id,
        farmer_id,
        farmer_name,
        farmer_contact,
        project_id,
        project_name,
        project_location,
        crop_type,
        quantity,
        price_per_ton,
        listing_date,
        status,
        buyer_id,
        buyer_name,
    ) = row;

    let status: HarvestStatus = status.parse()?;
    let buyer = match (buyer_id, buyer_name) {
        (Some(id), Some(name)) => Some(Buyer { id, name }),
        (None, None) => None,
        _ => {
            return Err(AppError::Internal(format!(
                "Harvest {id} has a partial buyer record"
            )))
        }
    };
    if (status == HarvestStatus::Sold) != buyer.is_some() {
        return Err(AppError::Internal(format!(
            "Harvest {id} is {status} but buyer is {}",
            if buyer.is_some() { "set" } else { "missing" }
        )));
    }

    Ok(Harvest {
        id,
        farmer: FarmerSnapshot {
            id: farmer_id,
            name: farmer_name,
            contact: farmer_contact,
        },
        project: ProjectSnapshot {
            id: project_id,
            name: project_name,
            location: project_location,
        },
        crop_type,
        quantity,
        price_per_ton,
        listing_date: parse_timestamp(&listing_date)?,
        status,
        buyer,
    })
}

async fn write_crop(conn: &mut SqliteConnection, project_id: &str, crop: &Crop) -> Result<()> {
    sqlx::query(
        "INSERT INTO crops (id, project_id, crop_type, planting_date, soil_condition, expected_yield, status) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&crop.id)
    .bind(project_id)
    .bind(&crop.crop_type)
    .bind(crop.planting_date.to_string())
    .bind(crop.soil_condition.as_str())
    .bind(crop.expected_yield)
    .bind(crop.status.as_str())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn write_investment(
    conn: &mut SqliteConnection,
    project_id: &str,
    investment: &Investment,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO investments (id, project_id, investment_type, description, amount, date) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&investment.id)
    .bind(project_id)
    .bind(investment.investment_type.as_str())
    .bind(&investment.description)
    .bind(investment.amount)
    .bind(investment.date.to_string())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn write_project(conn: &mut SqliteConnection, user_id: &str, project: &Project) -> Result<()> {
    sqlx::query(
        "INSERT INTO projects (id, user_id, name, location, farm_size) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&project.id)
    .bind(user_id)
    .bind(&project.name)
    .bind(&project.location)
    .bind(project.farm_size)
    .execute(&mut *conn)
    .await?;

    for crop in &project.crops {
        write_crop(conn, &project.id, crop).await?;
    }
    for investment in &project.investments {
        write_investment(conn, &project.id, investment).await?;
    }
    Ok(())
}

async fn write_harvest(conn: &mut SqliteConnection, harvest: &Harvest) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO harvests (id, farmer_id, farmer_name, farmer_contact, project_id, project_name,
                              project_location, crop_type, quantity, price_per_ton, listing_date,
                              status, buyer_id, buyer_name)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&harvest.id)
    .bind(&harvest.farmer.id)
    .bind(&harvest.farmer.name)
    .bind(&harvest.farmer.contact)
    .bind(&harvest.project.id)
    .bind(&harvest.project.name)
    .bind(&harvest.project.location)
    .bind(&harvest.crop_type)
    .bind(harvest.quantity)
    .bind(harvest.price_per_ton)
    .bind(harvest.listing_date.to_rfc3339())
    .bind(harvest.status.as_str())
    .bind(harvest.buyer.as_ref().map(|b| b.id.clone()))
    .bind(harvest.buyer.as_ref().map(|b| b.name.clone()))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

impl SqliteStore {
    /// Loads every user, or only `only_user` when given, with their nested
    /// projects, crops and investments.
    async fn load_users(&self, only_user: Option<&str>) -> Result<Vec<User>> {
        let pool = &self.db.pool;

        let users = sqlx::query_as::<_, (String, String, String, String)>(
            "SELECT id, name, contact, roles FROM users WHERE ? IS NULL OR id = ? ORDER BY rowid",
        )
        .bind(only_user)
        .bind(only_user)
        .fetch_all(pool)
        .await?;
        if users.is_empty() {
            return Ok(Vec::new());
        }

        let projects = sqlx::query_as::<_, ProjectRow>(
            "SELECT id, user_id, name, location, farm_size FROM projects WHERE ? IS NULL OR user_id = ? ORDER BY rowid",
        )
        .bind(only_user)
        .bind(only_user)
        .fetch_all(pool)
        .await?;

        let crops = sqlx::query_as::<_, CropRow>(
            r#"
            SELECT id, project_id, crop_type, planting_date, soil_condition, expected_yield, status
            FROM crops
            WHERE ? IS NULL OR project_id IN (SELECT id FROM projects WHERE user_id = ?)
            ORDER BY rowid
            "#,
        )
        .bind(only_user)
        .bind(only_user)
        .fetch_all(pool)
        .await?;

        let investments = sqlx::query_as::<_, InvestmentRow>(
            r#"
            SELECT id, project_id, investment_type, description, amount, date
            FROM investments
            WHERE ? IS NULL OR project_id IN (SELECT id FROM projects WHERE user_id = ?)
            ORDER BY rowid
            "#,
        )
        .bind(only_user)
        .bind(only_user)
        .fetch_all(pool)
        .await?;

        let mut crops_by_project: HashMap<String, Vec<Crop>> = HashMap::new();
        for row in crops {
            let (project_id, crop) = crop_from_row(row)?;
            crops_by_project.entry(project_id).or_default().push(crop);
        }

        let mut investments_by_project: HashMap<String, Vec<Investment>> = HashMap::new();
        for row in investments {
            let (project_id, investment) = investment_from_row(row)?;
            investments_by_project
                .entry(project_id)
                .or_default()
                .push(investment);
        }

        let mut projects_by_user: HashMap<String, Vec<Project>> = HashMap::new();
        for (id, user_id, name, location, farm_size) in projects {
            let project = Project {
                crops: crops_by_project.remove(&id).unwrap_or_default(),
                investments: investments_by_project.remove(&id).unwrap_or_default(),
                id,
                name,
                location,
                farm_size,
            };
            projects_by_user.entry(user_id).or_default().push(project);
        }

        users
            .into_iter()
            .map(|(id, name, contact, roles)| {
                Ok(User {
                    roles: decode_roles(&roles)?,
                    projects: projects_by_user.remove(&id).unwrap_or_default(),
                    id,
                    name,
                    contact,
                })
            })
            .collect()
    }
}

#[async_trait]
impl EntityStore for SqliteStore {
    async fn list_users(&self) -> Result<Vec<User>> {
        self.load_users(None).await
    }

    async fn find_user(&self, user_id: &str) -> Result<Option<User>> {
        Ok(self.load_users(Some(user_id)).await?.into_iter().next())
    }

    async fn list_listings(&self) -> Result<Vec<Harvest>> {
        let rows = sqlx::query_as::<_, HarvestRow>(&format!("{HARVEST_COLUMNS} ORDER BY rowid"))
            .fetch_all(&self.db.pool)
            .await?;
        rows.into_iter().map(harvest_from_row).collect()
    }

    async fn find_listing(&self, harvest_id: &str) -> Result<Option<Harvest>> {
        let row = sqlx::query_as::<_, HarvestRow>(&format!("{HARVEST_COLUMNS} WHERE id = ?"))
            .bind(harvest_id)
            .fetch_optional(&self.db.pool)
            .await?;
        row.map(harvest_from_row).transpose()
    }

    async fn insert_project(&self, user_id: &str, project: Project) -> Result<Project> {
        let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_one(&self.db.pool)
            .await?;
        if exists == 0 {
            return Err(AppError::NotFound(format!("User {user_id} not found")));
        }

        let mut tx = self.db.pool.begin().await?;
        write_project(&mut tx, user_id, &project).await?;
        tx.commit().await?;
        Ok(project)
    }

    async fn insert_crop(&self, project_id: &str, crop: Crop) -> Result<Crop> {
        self.project_exists(project_id).await?;
        let mut conn = self.db.pool.acquire().await?;
        write_crop(&mut conn, project_id, &crop).await?;
        Ok(crop)
    }

    async fn insert_investment(
        &self,
        project_id: &str,
        investment: Investment,
    ) -> Result<Investment> {
        self.project_exists(project_id).await?;
        let mut conn = self.db.pool.acquire().await?;
        write_investment(&mut conn, project_id, &investment).await?;
        Ok(investment)
    }

    async fn update_crop_status(
        &self,
        project_id: &str,
        crop_id: &str,
        expected: CropStatus,
        next: CropStatus,
    ) -> Result<Crop> {
        let updated = sqlx::query(
            "UPDATE crops SET status = ? WHERE id = ? AND project_id = ? AND status = ?",
        )
        .bind(next.as_str())
        .bind(crop_id)
        .bind(project_id)
        .bind(expected.as_str())
        .execute(&self.db.pool)
        .await?
        .rows_affected();

        let row = sqlx::query_as::<_, CropRow>(
            "SELECT id, project_id, crop_type, planting_date, soil_condition, expected_yield, status FROM crops WHERE id = ? AND project_id = ?",
        )
        .bind(crop_id)
        .bind(project_id)
        .fetch_optional(&self.db.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Crop {crop_id} not found")))?;
        let (_, crop) = crop_from_row(row)?;

        if updated == 0 {
            return Err(AppError::NotAvailable(format!(
                "Crop {crop_id} is already {}",
                crop.status
            )));
        }
        Ok(crop)
    }

    async fn insert_listing(&self, harvest: Harvest) -> Result<Harvest> {
        let mut conn = self.db.pool.acquire().await?;
        write_harvest(&mut conn, &harvest).await?;
        Ok(harvest)
    }

    async fn mark_sold(&self, harvest_id: &str, buyer: &Buyer) -> Result<SaleOutcome> {
        // The status guard in the WHERE clause makes this a compare-and-swap.
        let updated = sqlx::query(
            "UPDATE harvests SET status = 'Sold', buyer_id = ?, buyer_name = ? WHERE id = ? AND status = 'Listed'",
        )
        .bind(&buyer.id)
        .bind(&buyer.name)
        .bind(harvest_id)
        .execute(&self.db.pool)
        .await?
        .rows_affected();

        let current = self.find_listing(harvest_id).await?;
        Ok(match (updated, current) {
            (_, None) => SaleOutcome::Missing,
            (1, Some(harvest)) => SaleOutcome::Sold(harvest),
            (_, Some(harvest)) => SaleOutcome::AlreadySold(harvest),
        })
    }
}
