//! End to end report runs: fetch, select, match, aggregate, render.

use crate::config::ReportSettings;
use crate::models::{
    DailyRegistration, MatchResult, RawTransaction, ReportDocument, SummaryEntry,
    TransactionSummary,
};
use crate::services::aggregator::aggregate;
use crate::services::dispatch::{EmailAttachment, ReportEmail};
use crate::services::error::ReportError;
use crate::services::matcher::{classify, match_transactions};
use crate::services::metrics::{
    record_error, record_report, record_transactions, REPORT_GENERATION_DURATION,
};
use crate::services::registrations::render_registrations;
use crate::services::registry::RegistryIndex;
use crate::services::renderer::{render, XLSX_MIME};
use crate::services::selector::{select, TransactionFilter};
use crate::services::sources::{RegistrySource, TransactionSource};
use chrono::{Local, NaiveDate};
use rust_decimal::Decimal;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub const TRANSACTIONS_REPORT: &str = "transacciones";
pub const REGISTRATIONS_REPORT: &str = "registros";

#[derive(Debug, Clone)]
pub struct RenderedReport {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub document: ReportDocument,
}

#[derive(Debug, Clone)]
pub struct RenderedRegistrations {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub report_date: NaiveDate,
    pub count: usize,
}

pub fn transactions_file_name(date: NaiveDate) -> String {
    format!("Informe_Transacciones_{}.xlsx", date.format("%Y%m%d"))
}

pub fn registrations_file_name(date: NaiveDate) -> String {
    format!("Informe_INDER_{}.xlsx", date.format("%Y%m%d"))
}

/// Runs reports against a pair of sources. Cheap to clone; every run owns
/// its own registry index and document.
#[derive(Clone)]
pub struct ReportPipeline {
    transactions: Arc<dyn TransactionSource>,
    registry: Arc<dyn RegistrySource>,
    settings: ReportSettings,
}

impl ReportPipeline {
    pub fn new(
        transactions: Arc<dyn TransactionSource>,
        registry: Arc<dyn RegistrySource>,
        settings: ReportSettings,
    ) -> Self {
        Self {
            transactions,
            registry,
            settings,
        }
    }

    pub fn settings(&self) -> &ReportSettings {
        &self.settings
    }

    /// Select, match and aggregate the transactions of `date`.
    pub async fn build_document(&self, date: NaiveDate) -> Result<ReportDocument, ReportError> {
        self.with_deadline(self.reconcile(date)).await
    }

    /// Build and render the transactions report of `date`.
    #[instrument(skip(self))]
    pub async fn generate(&self, date: NaiveDate) -> Result<RenderedReport, ReportError> {
        let timer = REPORT_GENERATION_DURATION
            .with_label_values(&[TRANSACTIONS_REPORT])
            .start_timer();

        let result = self
            .with_deadline(async {
                let document = self.reconcile(date).await?;
                let branding = self.load_branding().await;

                let (document, bytes) = tokio::task::spawn_blocking(move || {
                    let bytes = render(&document, branding.as_deref());
                    (document, bytes)
                })
                .await
                .map_err(|e| ReportError::Render(anyhow::anyhow!("render task failed: {}", e)))?;

                Ok::<_, ReportError>(RenderedReport {
                    file_name: transactions_file_name(date),
                    bytes: bytes?,
                    document,
                })
            })
            .await;

        timer.observe_duration();
        observe_outcome(TRANSACTIONS_REPORT, &result);
        result
    }

    /// Matched transactions of `date` with their registrant, plus the selected count.
    #[instrument(skip(self))]
    pub async fn summarize(&self, date: NaiveDate) -> Result<TransactionSummary, ReportError> {
        self.with_deadline(async {
            let (selected, index) = self.fetch_selected(date).await?;

            let total_transacciones = selected.len();
            let transacciones: Vec<SummaryEntry> = selected
                .into_iter()
                .filter_map(|t| match classify(&t, &index) {
                    MatchResult::Matched(registrant) => Some(SummaryEntry {
                        id: t.id,
                        document: t.document,
                        reference: t.reference,
                        product: t.product,
                        amount: t.amount,
                        created_at: t.created_at,
                        paypad: t.paypad_description,
                        registrant,
                    }),
                    MatchResult::Unmatched(_) => None,
                })
                .collect();
            debug!(
                report_date = %date,
                selected = total_transacciones,
                matched = transacciones.len(),
                "Transaction summary built"
            );

            Ok::<_, ReportError>(TransactionSummary {
                fecha: date,
                total_transacciones,
                transacciones,
            })
        })
        .await
    }

    /// Render the registrations made on `date`.
    #[instrument(skip(self))]
    pub async fn generate_registrations(
        &self,
        date: NaiveDate,
    ) -> Result<RenderedRegistrations, ReportError> {
        let timer = REPORT_GENERATION_DURATION
            .with_label_values(&[REGISTRATIONS_REPORT])
            .start_timer();

        let result = self
            .with_deadline(async {
                let rows: Vec<DailyRegistration> = self
                    .registry
                    .fetch_daily_registrations(date)
                    .await
                    .map_err(ReportError::DataAccess)?;
                let count = rows.len();
                info!(report_date = %date, registrations = count, "Daily registrations fetched");

                let branding = self.load_branding().await;
                let generated_at = Local::now().naive_local();
                let bytes = tokio::task::spawn_blocking(move || {
                    render_registrations(date, &rows, generated_at, branding.as_deref())
                })
                .await
                .map_err(|e| ReportError::Render(anyhow::anyhow!("render task failed: {}", e)))??;

                Ok::<_, ReportError>(RenderedRegistrations {
                    file_name: registrations_file_name(date),
                    bytes,
                    report_date: date,
                    count,
                })
            })
            .await;

        timer.observe_duration();
        observe_outcome(REGISTRATIONS_REPORT, &result);
        result
    }

    async fn with_deadline<T>(
        &self,
        run: impl Future<Output = Result<T, ReportError>>,
    ) -> Result<T, ReportError> {
        tokio::time::timeout(self.settings.timeout, run)
            .await
            .map_err(|_| ReportError::Timeout(self.settings.timeout.as_secs()))?
    }

    /// Fetch both stores concurrently, then apply the selection rules and
    /// index the registrations.
    async fn fetch_selected(
        &self,
        date: NaiveDate,
    ) -> Result<(Vec<RawTransaction>, RegistryIndex), ReportError> {
        let (transactions, states, registrations) = tokio::try_join!(
            self.transactions.fetch_transactions(date),
            self.transactions.fetch_approval_states(),
            self.registry.fetch_registrations(),
        )
        .map_err(ReportError::DataAccess)?;

        let fetched = transactions.len();
        let filter = TransactionFilter::new(date, &states, &self.settings.excluded_paypad);
        let selected = select(transactions, &filter);
        let index = RegistryIndex::build(registrations);

        info!(
            report_date = %date,
            fetched,
            selected = selected.len(),
            approved_state_id = filter.approved_state_id,
            registrations = index.len(),
            collisions = index.collisions(),
            "Transactions selected"
        );
        Ok((selected, index))
    }

    async fn reconcile(&self, date: NaiveDate) -> Result<ReportDocument, ReportError> {
        let (selected, index) = self.fetch_selected(date).await?;

        let summary = match_transactions(selected, &index);
        record_transactions("matched", summary.records.len());
        record_transactions("unmatched", summary.unmatched);
        record_transactions("missing_document", summary.missing_document);
        if summary.dropped() > 0 {
            debug!(
                unmatched = summary.unmatched,
                missing_document = summary.missing_document,
                "Unmatched transactions left out of the report"
            );
        }

        let matched = summary.records.len();
        let document = aggregate(date, summary.records);
        info!(
            report_date = %date,
            matched,
            unmatched = summary.unmatched + summary.missing_document,
            groups = document.groups().len(),
            grand_total = %document.grand_total(),
            "Report document built"
        );
        Ok(document)
    }

    async fn load_branding(&self) -> Option<Vec<u8>> {
        let path = &self.settings.branding_image_path;
        match tokio::fs::read(path).await {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "Branding image not found, report will not include it");
                None
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Branding image could not be read");
                None
            }
        }
    }
}

fn observe_outcome<T>(report: &str, result: &Result<T, ReportError>) {
    match result {
        Ok(_) => record_report(report, "success"),
        Err(e) => {
            record_report(report, "failure");
            record_error(e.kind());
        }
    }
}

/// `1234567.5` as `1,234,567.50`.
pub fn format_amount(amount: Decimal) -> String {
    let fixed = format!("{:.2}", amount.round_dp(2));
    let (sign, unsigned) = match fixed.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", fixed.as_str()),
    };
    let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    format!("{}{}.{}", sign, grouped, frac_part)
}

pub fn transactions_email(report: &RenderedReport) -> ReportEmail {
    let date = report.document.report_date().format("%d/%m/%Y").to_string();
    let count = report.document.grand_count();
    let total = format_amount(report.document.grand_total());

    ReportEmail {
        subject: format!("Informe de Transacciones - {}", date),
        html_body: format!(
            "<h2>Informe de Transacciones</h2>\
             <p>Se adjunta el informe de transacciones aprobadas del día {date}.</p>\
             <p>Transacciones incluidas: {count}<br/>Total: ${total}</p>\
             <p>Este es un correo automático, por favor no responder.</p>"
        ),
        text_body: format!(
            "Informe de Transacciones\n\n\
             Se adjunta el informe de transacciones aprobadas del día {date}.\n\
             Transacciones incluidas: {count}\nTotal: ${total}\n\n\
             Este es un correo automático, por favor no responder."
        ),
        attachment: EmailAttachment {
            file_name: report.file_name.clone(),
            content_type: XLSX_MIME.to_string(),
            bytes: report.bytes.clone(),
        },
    }
}

pub fn registrations_email(report: &RenderedRegistrations) -> ReportEmail {
    let date = report.report_date.format("%d/%m/%Y").to_string();
    let count = report.count;

    ReportEmail {
        subject: format!("Informe INDER - {}", date),
        html_body: format!(
            "<h2>Informe Diario INDER</h2>\
             <p>Se adjunta el informe del día {date}</p>\
             <p>Total de registros: {count}</p>\
             <p>Este es un correo automático, por favor no responder.</p>"
        ),
        text_body: format!(
            "Informe Diario INDER\n\n\
             Se adjunta el informe del día {date}\n\
             Total de registros: {count}\n\n\
             Este es un correo automático, por favor no responder."
        ),
        attachment: EmailAttachment {
            file_name: report.file_name.clone(),
            content_type: XLSX_MIME.to_string(),
            bytes: report.bytes.clone(),
        },
    }
}
