//! Storage layer for waypoint: SQLite pool, embedded migrations, row models
//! and plan queries.

pub mod config;
pub mod models;
pub mod pool;
pub mod queries;
