pub mod config;
pub mod errors;
pub mod metrics;
pub mod query;
pub mod rest;
