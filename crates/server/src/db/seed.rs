// Demo dataset loaded into empty stores.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use super::models::{
    Buyer, Crop, CropStatus, FarmerSnapshot, Harvest, HarvestStatus, Investment, InvestmentType,
    Project, ProjectSnapshot, Role, SoilCondition, User,
};

#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub users: Vec<User>,
    pub listings: Vec<Harvest>,
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid seed date")
}

fn midnight(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0)
        .single()
        .expect("valid seed timestamp")
}

fn crop(
    id: &str,
    crop_type: &str,
    planted: NaiveDate,
    soil: SoilCondition,
    expected_yield: f64,
    status: CropStatus,
) -> Crop {
    Crop {
        id: id.to_string(),
        crop_type: crop_type.to_string(),
        planting_date: planted,
        soil_condition: soil,
        expected_yield,
        status,
    }
}

fn investment(
    id: &str,
    investment_type: InvestmentType,
    description: &str,
    amount: f64,
    date: NaiveDate,
) -> Investment {
    Investment {
        id: id.to_string(),
        investment_type,
        description: description.to_string(),
        amount,
        date,
    }
}

fn listing(
    id: &str,
    farmer: &User,
    project: &Project,
    crop_type: &str,
    quantity: f64,
    price_per_ton: f64,
    listed: DateTime<Utc>,
    buyer: Option<&User>,
) -> Harvest {
    Harvest {
        id: id.to_string(),
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
        crop_type: crop_type.to_string(),
        quantity,
        price_per_ton,
        listing_date: listed,
        status: if buyer.is_some() {
            HarvestStatus::Sold
        } else {
            HarvestStatus::Listed
        },
        buyer: buyer.map(|b| Buyer {
            id: b.id.clone(),
            name: b.name.clone(),
        }),
    }
}

pub fn demo() -> Dataset {
    let kaolack = Project {
        id: "proj1".into(),
        name: "Kaolack Maize Farm".into(),
        location: "Kaolack, Senegal".into(),
        farm_size: 120.0,
        crops: vec![
            crop("crop1", "Maize", day(2023, 4, 15), SoilCondition::Excellent, 50.0, CropStatus::Harvested),
            crop("crop2", "Soybeans", day(2023, 5, 20), SoilCondition::Good, 40.0, CropStatus::Harvested),
            crop("crop3", "Wheat", day(2024, 3, 10), SoilCondition::Good, 60.0, CropStatus::Growing),
        ],
        investments: vec![
            investment("inv1", InvestmentType::Seeds, "Certified maize seed", 500.0, day(2023, 4, 1)),
            investment("inv2", InvestmentType::Fertilizer, "NPK fertilizer", 1200.0, day(2023, 5, 10)),
        ],
    };
    let orchard = Project {
        id: "proj2".into(),
        name: "Sine Saloum Orchard".into(),
        location: "Fatick, Senegal".into(),
        farm_size: 35.0,
        crops: vec![crop("crop8", "Mango", day(2022, 7, 1), SoilCondition::Good, 20.0, CropStatus::Growing)],
        investments: vec![investment(
            "inv3",
            InvestmentType::Equipment,
            "Drip irrigation kit",
            2500.0,
            day(2024, 1, 12),
        )],
    };
    let garden = Project {
        id: "proj3".into(),
        name: "Thies Market Garden".into(),
        location: "Thies, Senegal".into(),
        farm_size: 80.0,
        crops: vec![
            crop("crop4", "Tomatoes", day(2024, 4, 1), SoilCondition::Excellent, 25.0, CropStatus::Growing),
            crop("crop5", "Potatoes", day(2024, 3, 25), SoilCondition::Fair, 30.0, CropStatus::Harvested),
        ],
        investments: vec![investment(
            "inv4",
            InvestmentType::Labor,
            "Seasonal harvest crew",
            900.0,
            day(2024, 6, 20),
        )],
    };
    let rice = Project {
        id: "proj4".into(),
        name: "Saint-Louis Rice Fields".into(),
        location: "Saint-Louis, Senegal".into(),
        farm_size: 200.0,
        crops: vec![
            crop("crop6", "Rice", day(2023, 6, 1), SoilCondition::Good, 100.0, CropStatus::Harvested),
            crop("crop7", "Cotton", day(2024, 5, 15), SoilCondition::Good, 80.0, CropStatus::Planting),
        ],
        investments: vec![investment(
            "inv5",
            InvestmentType::Equipment,
            "Tractor rental",
            3000.0,
            day(2023, 6, 5),
        )],
    };

    let adama = User {
        id: "user1".into(),
        name: "Adama Gueye".into(),
        contact: "+221771234567".into(),
        roles: vec![Role::Farmer, Role::Seller],
        projects: vec![kaolack, orchard],
    };
    let fatou = User {
        id: "user2".into(),
        name: "Fatou Diop".into(),
        contact: "+221777654321".into(),
        roles: vec![Role::Farmer],
        projects: vec![garden],
    };
    let moussa = User {
        id: "user3".into(),
        name: "Moussa Sow".into(),
        contact: "+221772345678".into(),
        roles: vec![Role::Farmer, Role::Seller],
        projects: vec![rice],
    };
    let awa = User {
        id: "user4".into(),
        name: "Awa Ndiaye".into(),
        contact: "+221781112233".into(),
        roles: vec![Role::Seller],
        projects: vec![],
    };

    let listings = vec![
        listing("harvest1", &adama, &adama.projects[0], "Maize", 48.0, 150.0, midnight(2023, 9, 1), Some(&awa)),
        listing("harvest2", &adama, &adama.projects[0], "Soybeans", 38.0, 300.0, midnight(2023, 10, 15), None),
        listing("harvest3", &moussa, &moussa.projects[0], "Rice", 95.0, 220.0, midnight(2023, 11, 20), Some(&adama)),
        listing("harvest4", &fatou, &fatou.projects[0], "Potatoes", 28.0, 400.0, midnight(2024, 7, 5), None),
    ];

    Dataset {
        users: vec![adama, fatou, moussa, awa],
        listings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sold_listings_carry_a_buyer() {
        let data = demo();
        for harvest in &data.listings {
            assert_eq!(harvest.is_sold(), harvest.buyer.is_some(), "{}", harvest.id);
        }
    }

    #[test]
    fn listings_reference_harvested_crops_of_their_farmer() {
        let data = demo();
        for harvest in &data.listings {
            let farmer = data
                .users
                .iter()
                .find(|u| u.id == harvest.farmer.id)
                .expect("farmer exists");
            let project = farmer.project(&harvest.project.id).expect("owned project");
            assert!(project
                .harvested_crops()
                .any(|c| c.crop_type == harvest.crop_type));
        }
    }

    #[test]
    fn sellers_without_farmer_role_own_no_projects() {
        let data = demo();
        for user in data.users.iter().filter(|u| !u.has_role(Role::Farmer)) {
            assert!(user.projects.is_empty());
        }
    }
}
