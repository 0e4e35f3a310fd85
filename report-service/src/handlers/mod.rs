//! HTTP handlers for report-service.

pub mod health;
pub mod reports;

pub use health::{health_check, metrics_handler, readiness_check};
pub use reports::{generate_report, registrations_report, transaction_summary};
