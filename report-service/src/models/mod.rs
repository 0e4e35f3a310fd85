//! Domain models for report-service.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;

/// Placeholder shown for registrant fields that were never captured.
pub const MISSING_FIELD: &str = "Sin registro";

/// Name of the approval state whose transactions are reported.
pub const APPROVED_STATE_NAME: &str = "Aprobada";

// ============================================================================
// Registration Models
// ============================================================================

/// A citizen registration as stored by the registration form.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RegistrationRecord {
    pub id: i32,
    pub first_names: Option<String>,
    pub last_names: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub birth_date: Option<String>,
    pub document_type: Option<String>,
    pub document_number: Option<String>,
    pub gender: Option<String>,
    pub phone: Option<String>,
    pub registered_at: NaiveDateTime,
}

/// Registrant data attached to a matched transaction, with missing values
/// resolved to [`MISSING_FIELD`]. The birth date is passed through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Registrant {
    pub first_names: String,
    pub last_names: String,
    pub email: String,
    pub address: String,
    pub birth_date: Option<String>,
    pub document_type: String,
    pub document_number: String,
    pub gender: String,
    pub phone: String,
}

impl From<&RegistrationRecord> for Registrant {
    fn from(r: &RegistrationRecord) -> Self {
        fn or_missing(value: &Option<String>) -> String {
            value.clone().unwrap_or_else(|| MISSING_FIELD.to_string())
        }

        Self {
            first_names: or_missing(&r.first_names),
            last_names: or_missing(&r.last_names),
            email: or_missing(&r.email),
            address: or_missing(&r.address),
            birth_date: r.birth_date.clone(),
            document_type: or_missing(&r.document_type),
            document_number: or_missing(&r.document_number),
            gender: or_missing(&r.gender),
            phone: or_missing(&r.phone),
        }
    }
}

/// A registration joined with the place of its availability slot, used by
/// the daily registrations report.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DailyRegistration {
    pub first_names: Option<String>,
    pub last_names: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub birth_date: Option<String>,
    pub document_type: Option<String>,
    pub document_number: Option<String>,
    pub gender: Option<String>,
    pub phone: Option<String>,
    pub age: Option<i32>,
    pub place: Option<String>,
    pub registered_at: NaiveDateTime,
}

// ============================================================================
// Transaction Models
// ============================================================================

/// A paypad transaction joined with its terminal description.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RawTransaction {
    pub id: i32,
    pub document: Option<String>,
    pub reference: Option<String>,
    pub product: Option<String>,
    pub amount: Option<Decimal>,
    pub paypad_id: Option<i32>,
    pub paypad_description: Option<String>,
    pub state_id: Option<i32>,
    pub created_at: NaiveDateTime,
}

impl RawTransaction {
    /// Amount used for totals; a missing amount counts as zero.
    pub fn amount_or_zero(&self) -> Decimal {
        self.amount.unwrap_or(Decimal::ZERO)
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ApprovalState {
    pub id: i32,
    pub state: String,
}

// ============================================================================
// Matching Models
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnmatchedReason {
    MissingDocument,
    NotRegistered,
}

impl UnmatchedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingDocument => "missing_document",
            Self::NotRegistered => "unmatched",
        }
    }
}

/// Outcome of looking a transaction up in the registry index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchResult {
    Matched(Registrant),
    Unmatched(UnmatchedReason),
}

/// A transaction tied to the registrant who paid it.
#[derive(Debug, Clone, Serialize)]
pub struct MatchedRecord {
    pub transaction: RawTransaction,
    pub registrant: Registrant,
}

// ============================================================================
// Report Models
// ============================================================================

/// Matched records of one terminal with their subtotal.
#[derive(Debug, Clone)]
pub struct ReportGroup {
    pub label: String,
    pub records: Vec<MatchedRecord>,
    pub subtotal: Decimal,
    pub count: usize,
}

/// The grouped, totalled result of one reconciliation pass.
#[derive(Debug, Clone)]
pub struct ReportDocument {
    report_date: NaiveDate,
    groups: Vec<ReportGroup>,
    grand_total: Decimal,
    grand_count: usize,
}

impl ReportDocument {
    pub fn new(report_date: NaiveDate, groups: Vec<ReportGroup>) -> Self {
        let grand_total = groups.iter().map(|g| g.subtotal).sum();
        let grand_count = groups.iter().map(|g| g.count).sum();
        Self {
            report_date,
            groups,
            grand_total,
            grand_count,
        }
    }

    pub fn report_date(&self) -> NaiveDate {
        self.report_date
    }

    pub fn groups(&self) -> &[ReportGroup] {
        &self.groups
    }

    pub fn grand_total(&self) -> Decimal {
        self.grand_total
    }

    pub fn grand_count(&self) -> usize {
        self.grand_count
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

// ============================================================================
// Summary Models
// ============================================================================

/// One matched transaction in the JSON summary.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryEntry {
    pub id: i32,
    pub document: Option<String>,
    pub reference: Option<String>,
    pub product: Option<String>,
    pub amount: Option<Decimal>,
    pub created_at: NaiveDateTime,
    pub paypad: Option<String>,
    pub registrant: Registrant,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionSummary {
    pub fecha: NaiveDate,
    /// Selected transactions, including the unmatched ones left out of `transacciones`.
    pub total_transacciones: usize,
    pub transacciones: Vec<SummaryEntry>,
}
