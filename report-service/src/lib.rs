//! Report Service - reconciles paypad transactions against citizen
//! registrations and distributes grouped spreadsheet reports by email.

pub mod config;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;
