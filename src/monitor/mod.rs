//! Read-only monitoring

pub mod dashboard;

pub use dashboard::{create_router, start_dashboard, HealthResponse};
