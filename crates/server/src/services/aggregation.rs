//! Derived dashboard numbers. Everything here is a pure function of the
//! entities passed in; nothing is cached or stored.

use serde::Serialize;

use crate::db::models::{Harvest, HarvestStatus, Project, Role, User};

use super::session::SessionState;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Financials {
    pub total_revenue: f64,
    pub total_investment: f64,
    pub net_profit: f64,
}

impl Financials {
    fn new(total_revenue: f64, total_investment: f64) -> Self {
        Self {
            total_revenue,
            total_investment,
            net_profit: total_revenue - total_investment,
        }
    }
}

/// Summed expected yield for one crop type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CropShare {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSummary {
    pub listed_count: usize,
    pub sold_count: usize,
    pub open_value: f64,
    pub sold_value: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseSummary {
    pub count: usize,
    pub total_spent: f64,
}

fn sold_revenue<'a>(listings: impl IntoIterator<Item = &'a Harvest>) -> f64 {
    listings
        .into_iter()
        .filter(|h| h.status == HarvestStatus::Sold)
        .map(Harvest::total_value)
        .sum()
}

fn invested(project: &Project) -> f64 {
    project.investments.iter().map(|i| i.amount).sum()
}

pub fn compute_farmer_financials(project: &Project, listings: &[Harvest]) -> Financials {
    let revenue = sold_revenue(listings.iter().filter(|h| h.project.id == project.id));
    Financials::new(revenue, invested(project))
}

fn accumulate<'a>(shares: &mut Vec<CropShare>, projects: impl IntoIterator<Item = &'a Project>) {
    for crop in projects.into_iter().flat_map(|p| p.crops.iter()) {
        match shares.iter_mut().find(|s| s.name == crop.crop_type) {
            Some(share) => share.value += crop.expected_yield,
            None => shares.push(CropShare {
                name: crop.crop_type.clone(),
                value: crop.expected_yield,
            }),
        }
    }
}

/// Expected yield per crop type, in order of first appearance.
pub fn compute_crop_distribution(project: &Project) -> Vec<CropShare> {
    let mut shares = Vec::new();
    accumulate(&mut shares, [project]);
    shares
}

pub fn compute_global_financials(users: &[User], listings: &[Harvest]) -> Financials {
    let investment = users
        .iter()
        .flat_map(|u| u.projects.iter())
        .map(invested)
        .sum();
    Financials::new(sold_revenue(listings), investment)
}

pub fn compute_global_distribution(users: &[User]) -> Vec<CropShare> {
    let mut shares = Vec::new();
    accumulate(&mut shares, users.iter().flat_map(|u| u.projects.iter()));
    shares
}

pub fn compute_market_summary(listings: &[Harvest]) -> MarketSummary {
    listings
        .iter()
        .fold(MarketSummary::default(), |mut acc, h| {
            match h.status {
                HarvestStatus::Listed => {
                    acc.listed_count += 1;
                    acc.open_value += h.total_value();
                }
                HarvestStatus::Sold => {
                    acc.sold_count += 1;
                    acc.sold_value += h.total_value();
                }
            }
            acc
        })
}

pub fn compute_purchases(buyer_id: &str, listings: &[Harvest]) -> PurchaseSummary {
    listings
        .iter()
        .filter(|h| h.buyer.as_ref().is_some_and(|b| b.id == buyer_id))
        .fold(PurchaseSummary::default(), |mut acc, h| {
            acc.count += 1;
            acc.total_spent += h.total_value();
            acc
        })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Dashboard {
    #[serde(rename_all = "camelCase")]
    Farmer {
        project_id: Option<String>,
        financials: Financials,
        distribution: Vec<CropShare>,
    },
    #[serde(rename_all = "camelCase")]
    Seller {
        financials: Financials,
        market: MarketSummary,
        purchases: PurchaseSummary,
        distribution: Vec<CropShare>,
    },
}

/// Aggregates for whatever the session currently has selected. A farmer with
/// no active project gets zeros and an empty distribution.
pub fn build_dashboard(session: &SessionState, users: &[User], listings: &[Harvest]) -> Dashboard {
    match session.active_role {
        Role::Farmer => match session.active_project.as_ref() {
            Some(project) => Dashboard::Farmer {
                project_id: Some(project.id.clone()),
                financials: compute_farmer_financials(project, listings),
                distribution: compute_crop_distribution(project),
            },
            None => Dashboard::Farmer {
                project_id: None,
                financials: Financials::default(),
                distribution: Vec::new(),
            },
        },
        Role::Seller => Dashboard::Seller {
            financials: compute_global_financials(users, listings),
            market: compute_market_summary(listings),
            purchases: session
                .current_user
                .as_ref()
                .map(|u| compute_purchases(&u.id, listings))
                .unwrap_or_default(),
            distribution: compute_global_distribution(users),
        },
    }
}
