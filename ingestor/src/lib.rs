pub mod config;
pub mod consumer;
pub mod errors;
pub mod metrics;
pub mod validate;
