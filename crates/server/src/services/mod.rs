pub mod advisor;
pub mod aggregation;
pub mod farms;
pub mod marketplace;
pub mod session;
