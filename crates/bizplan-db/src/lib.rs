//! PostgreSQL persistence gateway for the business plan service.
//!
//! Row models live in [`models`], one query module per table in
//! [`queries`], and connection/migration helpers in [`pool`].

pub mod config;
pub mod models;
pub mod pool;
pub mod queries;
