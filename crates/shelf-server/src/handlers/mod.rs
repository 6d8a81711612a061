//! JSON handlers, one module per resource.

pub mod audit;
pub mod claims;
pub mod jobs;
pub mod reports;
pub mod series;
