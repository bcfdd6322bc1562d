use std::{fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Farmer,
    Seller,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub contact: String,
    pub roles: Vec<Role>,
    pub projects: Vec<Project>,
}

impl User {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn project(&self, project_id: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == project_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    pub location: String,
    /// Acres.
    pub farm_size: f64,
    pub crops: Vec<Crop>,
    pub investments: Vec<Investment>,
}

impl Project {
    pub fn crop(&self, crop_id: &str) -> Option<&Crop> {
        self.crops.iter().find(|c| c.id == crop_id)
    }

    pub fn harvested_crops(&self) -> impl Iterator<Item = &Crop> {
        self.crops
            .iter()
            .filter(|c| c.status == CropStatus::Harvested)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SoilCondition {
    Excellent,
    Good,
    Fair,
    Poor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CropStatus {
    Planting,
    Growing,
    Harvesting,
    Harvested,
}

impl CropStatus {
    /// The next stage of the growing cycle, `None` once harvested.
    pub fn next(self) -> Option<CropStatus> {
        match self {
            CropStatus::Planting => Some(CropStatus::Growing),
            CropStatus::Growing => Some(CropStatus::Harvesting),
            CropStatus::Harvesting => Some(CropStatus::Harvested),
            CropStatus::Harvested => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Crop {
    pub id: String,
    #[serde(rename = "type")]
    pub crop_type: String,
    pub planting_date: NaiveDate,
    pub soil_condition: SoilCondition,
    /// Tons.
    pub expected_yield: f64,
    pub status: CropStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvestmentType {
    Seeds,
    Fertilizer,
    Equipment,
    Labor,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Investment {
    pub id: String,
    #[serde(rename = "type")]
    pub investment_type: InvestmentType,
    pub description: String,
    pub amount: f64,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HarvestStatus {
    Listed,
    Sold,
}

/// Copy of the farmer taken when the harvest was listed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FarmerSnapshot {
    pub id: String,
    pub name: String,
    pub contact: String,
}

/// Copy of the source project taken when the harvest was listed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    pub id: String,
    pub name: String,
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Buyer {
    pub id: String,
    pub name: String,
}

/// A marketplace listing. `buyer` is set exactly when `status` is `Sold`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Harvest {
    pub id: String,
    pub farmer: FarmerSnapshot,
    pub project: ProjectSnapshot,
    pub crop_type: String,
    /// Tons.
    pub quantity: f64,
    pub price_per_ton: f64,
    pub listing_date: DateTime<Utc>,
    pub status: HarvestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buyer: Option<Buyer>,
}

impl Harvest {
    pub fn is_sold(&self) -> bool {
        self.status == HarvestStatus::Sold
    }

    pub fn total_value(&self) -> f64 {
        self.quantity * self.price_per_ton
    }
}

// Text encodings used by the SQLite store.

macro_rules! text_enum {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(self) -> &'static str {
                match self {
                    $($ty::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = AppError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($ty::$variant),)+
                    other => Err(AppError::Internal(format!(
                        concat!("Unknown ", stringify!($ty), " value: {}"),
                        other
                    ))),
                }
            }
        }
    };
}

text_enum!(Role { Farmer => "farmer", Seller => "seller" });
text_enum!(SoilCondition {
    Excellent => "Excellent",
    Good => "Good",
    Fair => "Fair",
    Poor => "Poor",
});
text_enum!(CropStatus {
    Planting => "Planting",
    Growing => "Growing",
    Harvesting => "Harvesting",
    Harvested => "Harvested",
});
text_enum!(InvestmentType {
    Seeds => "Seeds",
    Fertilizer => "Fertilizer",
    Equipment => "Equipment",
    Labor => "Labor",
    Other => "Other",
});
text_enum!(HarvestStatus { Listed => "Listed", Sold => "Sold" });
