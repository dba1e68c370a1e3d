pub mod analysis;
pub mod analytics;
pub mod identity;
pub mod project;
