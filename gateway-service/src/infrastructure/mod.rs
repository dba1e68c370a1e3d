pub mod analytics;
pub mod auth;
pub mod propagation;
pub mod rest;
pub mod supabase;
