//! Configuration module for report-service.

use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    /// Citizen registration store.
    pub registry_database: DatabaseConfig,
    /// Paypad transaction store.
    pub dashboard_database: DatabaseConfig,
    pub smtp: SmtpConfig,
    pub report: ReportSettings,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub from_email: String,
    pub from_name: String,
    pub timeout: Duration,
    pub accept_invalid_certs: bool,
    pub max_concurrency: usize,
}

#[derive(Debug, Clone)]
pub struct ReportSettings {
    pub recipients: Vec<String>,
    pub output_dir: PathBuf,
    pub branding_image_path: PathBuf,
    pub excluded_paypad: String,
    pub timeout: Duration,
}

impl ReportConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        let is_prod = common.is_production();

        Ok(Self {
            service_name: env::var("SERVICE_NAME").unwrap_or_else(|_| "report-service".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
            registry_database: database_config("REGISTRY_DATABASE_URL")?,
            dashboard_database: database_config("DASHBOARD_DATABASE_URL")?,
            smtp: SmtpConfig {
                host: get_env("SMTP_HOST", Some("localhost"), is_prod)?,
                port: parse_env("SMTP_PORT", 465),
                user: get_env("SMTP_USER", Some(""), is_prod)?,
                password: get_env("SMTP_PASSWORD", Some(""), is_prod)?,
                from_email: get_env("SMTP_FROM_EMAIL", Some("noreply@localhost"), is_prod)?,
                from_name: get_env("SMTP_FROM_NAME", Some("API INDER Informes"), is_prod)?,
                timeout: Duration::from_secs(parse_env("SMTP_TIMEOUT_SECS", 15)),
                accept_invalid_certs: parse_env("SMTP_ACCEPT_INVALID_CERTS", false),
                max_concurrency: parse_env::<usize>("SMTP_MAX_CONCURRENCY", 4).max(1),
            },
            report: ReportSettings {
                recipients: parse_recipients(&env::var("REPORT_RECIPIENTS").unwrap_or_default()),
                output_dir: PathBuf::from(
                    env::var("REPORT_OUTPUT_DIR").unwrap_or_else(|_| "informes".to_string()),
                ),
                branding_image_path: PathBuf::from(
                    env::var("BRANDING_IMAGE_PATH")
                        .unwrap_or_else(|_| "assets/branding.png".to_string()),
                ),
                excluded_paypad: env::var("EXCLUDED_PAYPAD")
                    .unwrap_or_else(|_| "PAYPAD PRUEBAS".to_string()),
                timeout: Duration::from_secs(parse_env("REPORT_TIMEOUT_SECS", 120)),
            },
            common,
        })
    }
}

fn database_config(url_key: &str) -> Result<DatabaseConfig, AppError> {
    Ok(DatabaseConfig {
        url: env::var(url_key)
            .map_err(|_| AppError::ConfigError(anyhow::anyhow!("{} is required", url_key)))?,
        max_connections: parse_env("DATABASE_MAX_CONNECTIONS", 10),
        min_connections: parse_env("DATABASE_MIN_CONNECTIONS", 2),
    })
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

/// Split a comma separated recipient list, keeping order and dropping blanks.
pub fn parse_recipients(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
