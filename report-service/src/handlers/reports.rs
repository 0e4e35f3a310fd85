use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use service_core::error::AppError;

use crate::models::TransactionSummary;
use crate::services::pipeline::{registrations_email, transactions_email};
use crate::services::{ReportError, XLSX_MIME};
use crate::startup::AppState;

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub fecha: Option<String>,
}

/// Accepts `YYYY-MM-DD` or an ISO 8601 date-time, whose time is ignored.
pub fn parse_fecha(raw: Option<&str>) -> Result<NaiveDate, ReportError> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty()).ok_or_else(|| {
        ReportError::InvalidDate("fecha is required".to_string())
    })?;

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.date_naive());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(dt.date());
        }
    }

    Err(ReportError::InvalidDate(raw.to_string()))
}

/// A fatal report error on its way to the client.
pub struct ReportFailure {
    error: ReportError,
    include_trace: bool,
}

impl IntoResponse for ReportFailure {
    fn into_response(self) -> Response {
        let trace = self.include_trace.then(|| self.error.debug_trace());
        match &self.error {
            ReportError::InvalidDate(_) => {
                tracing::warn!(error = %self.error, "Rejected report request")
            }
            _ => tracing::error!(error = %self.error, kind = self.error.kind(), "Report request failed"),
        }
        AppError::from(self.error).into_response_with_trace(trace)
    }
}

impl AppState {
    fn failure(&self, error: ReportError) -> ReportFailure {
        ReportFailure {
            error,
            include_trace: self.include_stack_traces,
        }
    }
}

fn xlsx_response(file_name: &str, bytes: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, XLSX_MIME.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        bytes,
    )
        .into_response()
}

/// GET /api/informes/generar-informe?fecha=
#[tracing::instrument(skip(state))]
pub async fn generate_report(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<Response, ReportFailure> {
    let date = parse_fecha(query.fecha.as_deref()).map_err(|e| state.failure(e))?;

    let report = state
        .pipeline
        .generate(date)
        .await
        .map_err(|e| state.failure(e))?;

    let path = state
        .store
        .publish(&report.file_name, &report.bytes)
        .await
        .map_err(|e| state.failure(ReportError::Storage(e)))?;

    tracing::info!(
        path = %path.display(),
        transactions = report.document.grand_count(),
        grand_total = %report.document.grand_total(),
        "Transactions report published"
    );

    state.dispatch_in_background(transactions_email(&report));
    Ok(xlsx_response(&report.file_name, report.bytes))
}

/// GET /api/informes/generar-informe-simple?fecha=
#[tracing::instrument(skip(state))]
pub async fn transaction_summary(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<TransactionSummary>, ReportFailure> {
    let date = parse_fecha(query.fecha.as_deref()).map_err(|e| state.failure(e))?;
    let summary = state
        .pipeline
        .summarize(date)
        .await
        .map_err(|e| state.failure(e))?;
    Ok(Json(summary))
}

/// GET /api/informes/registros?fecha=
#[tracing::instrument(skip(state))]
pub async fn registrations_report(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<Response, ReportFailure> {
    let date = parse_fecha(query.fecha.as_deref()).map_err(|e| state.failure(e))?;

    let report = state
        .pipeline
        .generate_registrations(date)
        .await
        .map_err(|e| state.failure(e))?;

    let path = state
        .store
        .publish(&report.file_name, &report.bytes)
        .await
        .map_err(|e| state.failure(ReportError::Storage(e)))?;

    tracing::info!(
        path = %path.display(),
        registrations = report.count,
        "Registrations report published"
    );

    state.dispatch_in_background(registrations_email(&report));
    Ok(xlsx_response(&report.file_name, report.bytes))
}
