//! Data source seams for the two stores the reports read from.

use crate::models::{ApprovalState, DailyRegistration, RawTransaction, RegistrationRecord};
use async_trait::async_trait;
use chrono::NaiveDate;
use service_core::error::AppError;

/// Paypad transaction store.
#[async_trait]
pub trait TransactionSource: Send + Sync {
    /// Transactions created on `date`, joined with their terminal description.
    async fn fetch_transactions(&self, date: NaiveDate) -> Result<Vec<RawTransaction>, AppError>;

    async fn fetch_approval_states(&self) -> Result<Vec<ApprovalState>, AppError>;

    async fn health_check(&self) -> Result<(), AppError>;
}

/// Citizen registration store.
#[async_trait]
pub trait RegistrySource: Send + Sync {
    async fn fetch_registrations(&self) -> Result<Vec<RegistrationRecord>, AppError>;

    /// Registrations made on `date` with the place of their availability slot,
    /// ordered by surname then given names.
    async fn fetch_daily_registrations(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<DailyRegistration>, AppError>;

    async fn health_check(&self) -> Result<(), AppError>;
}

/// Both stores backed by owned vectors. Used by tests and local demos.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    pub transactions: Vec<RawTransaction>,
    pub approval_states: Vec<ApprovalState>,
    pub registrations: Vec<RegistrationRecord>,
    pub daily_registrations: Vec<DailyRegistration>,
    /// When set, every call fails the way an unreachable database would.
    pub unavailable: bool,
}

impl InMemorySource {
    fn check_available(&self) -> Result<(), AppError> {
        if self.unavailable {
            return Err(AppError::DatabaseError(anyhow::anyhow!(
                "in-memory source marked unavailable"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl TransactionSource for InMemorySource {
    async fn fetch_transactions(&self, date: NaiveDate) -> Result<Vec<RawTransaction>, AppError> {
        self.check_available()?;
        Ok(self
            .transactions
            .iter()
            .filter(|t| t.created_at.date() == date)
            .cloned()
            .collect())
    }

    async fn fetch_approval_states(&self) -> Result<Vec<ApprovalState>, AppError> {
        self.check_available()?;
        Ok(self.approval_states.clone())
    }

    async fn health_check(&self) -> Result<(), AppError> {
        self.check_available()
    }
}

#[async_trait]
impl RegistrySource for InMemorySource {
    async fn fetch_registrations(&self) -> Result<Vec<RegistrationRecord>, AppError> {
        self.check_available()?;
        Ok(self.registrations.clone())
    }

    async fn fetch_daily_registrations(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<DailyRegistration>, AppError> {
        self.check_available()?;
        let mut rows: Vec<DailyRegistration> = self
            .daily_registrations
            .iter()
            .filter(|r| r.registered_at.date() == date)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            (&a.last_names, &a.first_names).cmp(&(&b.last_names, &b.first_names))
        });
        Ok(rows)
    }

    async fn health_check(&self) -> Result<(), AppError> {
        self.check_available()
    }
}
