//! SQLite-backed implementation of the persistence gateway.

pub mod config;
pub mod constants;
pub mod errors;
mod models;
pub mod sqlite;
mod types;
