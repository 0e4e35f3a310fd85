//! Selection of the transactions that belong in a daily report.

use crate::models::{ApprovalState, RawTransaction, APPROVED_STATE_NAME};
use chrono::NaiveDate;

/// Identifier of the state literally named "Aprobada", or 0 when no such
/// state exists (which selects nothing).
pub fn resolve_approved_state(states: &[ApprovalState]) -> i32 {
    states
        .iter()
        .find(|s| s.state == APPROVED_STATE_NAME)
        .map(|s| s.id)
        .unwrap_or(0)
}

/// The conjunctive selection predicate of one report run.
#[derive(Debug, Clone)]
pub struct TransactionFilter {
    pub report_date: NaiveDate,
    pub approved_state_id: i32,
    pub excluded_paypad: String,
}

impl TransactionFilter {
    pub fn new(report_date: NaiveDate, states: &[ApprovalState], excluded_paypad: &str) -> Self {
        Self {
            report_date,
            approved_state_id: resolve_approved_state(states),
            excluded_paypad: excluded_paypad.trim().to_string(),
        }
    }

    pub fn matches(&self, t: &RawTransaction) -> bool {
        t.created_at.date() == self.report_date
            && t.state_id == Some(self.approved_state_id)
            && !self.is_excluded_terminal(t)
    }

    fn is_excluded_terminal(&self, t: &RawTransaction) -> bool {
        !self.excluded_paypad.is_empty()
            && t
                .paypad_description
                .as_deref()
                .is_some_and(|d| d.trim() == self.excluded_paypad)
    }
}

/// Keep the transactions accepted by `filter`, ordered by creation time then
/// id so that later stages do not depend on retrieval order.
pub fn select(transactions: Vec<RawTransaction>, filter: &TransactionFilter) -> Vec<RawTransaction> {
    let mut selected: Vec<RawTransaction> = transactions
        .into_iter()
        .filter(|t| filter.matches(t))
        .collect();
    selected.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
    selected
}
