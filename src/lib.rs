pub mod analysis;
pub mod config;
pub mod error;
pub mod models;
pub mod simulation;
pub mod types;
