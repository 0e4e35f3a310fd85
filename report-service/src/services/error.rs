//! Failures that abort a report run.

use crate::services::renderer::RenderError;
use service_core::error::AppError;
use std::backtrace::BacktraceStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("invalid report date: {0}")]
    InvalidDate(String),

    /// Either store failed; no partial report is produced.
    #[error("data access failed: {0}")]
    DataAccess(#[source] AppError),

    #[error("report rendering failed: {0}")]
    Render(#[source] anyhow::Error),

    #[error("report could not be published: {0}")]
    Storage(#[source] AppError),

    #[error("report generation exceeded {0} seconds")]
    Timeout(u64),
}

impl From<RenderError> for ReportError {
    fn from(err: RenderError) -> Self {
        ReportError::Render(anyhow::Error::new(err))
    }
}

impl ReportError {
    /// Label used in the `report_errors_total` metric.
    pub fn kind(&self) -> &'static str {
        match self {
            ReportError::InvalidDate(_) => "invalid_date",
            ReportError::DataAccess(_) => "data_access",
            ReportError::Render(_) => "render",
            ReportError::Storage(_) => "storage",
            ReportError::Timeout(_) => "timeout",
        }
    }

    /// Full error chain, with a backtrace when one was captured.
    pub fn debug_trace(&self) -> String {
        let mut trace = format!("{}", self);
        let mut source = std::error::Error::source(self);
        while let Some(err) = source {
            trace.push_str(&format!("\n  caused by: {}", err));
            source = err.source();
        }
        if let ReportError::Render(err) = self {
            let backtrace = err.backtrace();
            if backtrace.status() == BacktraceStatus::Captured {
                trace.push_str(&format!("\n\n{}", backtrace));
            }
        }
        trace
    }
}

impl From<ReportError> for AppError {
    fn from(err: ReportError) -> Self {
        match err {
            ReportError::InvalidDate(msg) => AppError::BadRequest(anyhow::anyhow!(
                "Invalid fecha '{}', expected YYYY-MM-DD",
                msg
            )),
            ReportError::DataAccess(inner) => match inner {
                AppError::DatabaseError(e) => AppError::DatabaseError(e),
                other => AppError::DatabaseError(anyhow::anyhow!(other.to_string())),
            },
            ReportError::Render(e) => AppError::InternalError(e.context("Failed to render report")),
            ReportError::Storage(inner) => {
                AppError::InternalError(anyhow::anyhow!("Failed to publish report: {}", inner))
            }
            ReportError::Timeout(secs) => {
                AppError::GatewayTimeout(format!("report generation exceeded {}s", secs))
            }
        }
    }
}
