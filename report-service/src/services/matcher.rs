//! Joins selected transactions to registrants.

use crate::models::{MatchResult, MatchedRecord, RawTransaction, Registrant, UnmatchedReason};
use crate::services::normalizer::NormalizedIdentifier;
use crate::services::registry::RegistryIndex;
use tracing::debug;

/// Look `transaction` up in `index`. Transactions without a document number
/// never match.
pub fn classify(transaction: &RawTransaction, index: &RegistryIndex) -> MatchResult {
    let Some(id) = NormalizedIdentifier::from_optional(transaction.document.as_deref()) else {
        return MatchResult::Unmatched(UnmatchedReason::MissingDocument);
    };

    match index.find(&id) {
        Some(record) => MatchResult::Matched(Registrant::from(record)),
        None => MatchResult::Unmatched(UnmatchedReason::NotRegistered),
    }
}

/// Matched records in input order plus counts of what was dropped.
#[derive(Debug, Default)]
pub struct MatchSummary {
    pub records: Vec<MatchedRecord>,
    pub unmatched: usize,
    pub missing_document: usize,
}

impl MatchSummary {
    pub fn dropped(&self) -> usize {
        self.unmatched + self.missing_document
    }
}

/// Keep every transaction that resolves to a registrant. Unmatched ones are
/// counted and left out of the report.
pub fn match_transactions(transactions: Vec<RawTransaction>, index: &RegistryIndex) -> MatchSummary {
    let mut summary = MatchSummary::default();

    for transaction in transactions {
        match classify(&transaction, index) {
            MatchResult::Matched(registrant) => summary.records.push(MatchedRecord {
                transaction,
                registrant,
            }),
            MatchResult::Unmatched(reason) => {
                debug!(
                    transaction_id = transaction.id,
                    reason = reason.as_str(),
                    "Transaction dropped from report"
                );
                match reason {
                    UnmatchedReason::MissingDocument => summary.missing_document += 1,
                    UnmatchedReason::NotRegistered => summary.unmatched += 1,
                }
            }
        }
    }

    summary
}
