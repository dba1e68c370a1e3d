pub mod account;
pub mod analysis;
pub mod auth;
pub mod health;
