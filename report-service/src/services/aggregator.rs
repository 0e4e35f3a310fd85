//! Groups matched records by terminal and computes the report totals.

use crate::models::{MatchedRecord, ReportDocument, ReportGroup, MISSING_FIELD};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Partition `records` by exact terminal description.
///
/// Described terminals come out in ascending ordinal order, followed by the
/// transactions whose terminal has no description, labelled [`MISSING_FIELD`].
/// Records keep their input order inside a group. A missing amount counts as
/// zero.
pub fn aggregate(report_date: NaiveDate, records: Vec<MatchedRecord>) -> ReportDocument {
    let mut described: BTreeMap<String, Vec<MatchedRecord>> = BTreeMap::new();
    let mut undescribed: Vec<MatchedRecord> = Vec::new();
    for record in records {
        match record.transaction.paypad_description.clone() {
            Some(description) => described.entry(description).or_default().push(record),
            None => undescribed.push(record),
        }
    }

    let mut partitions: Vec<(String, Vec<MatchedRecord>)> = described.into_iter().collect();
    if !undescribed.is_empty() {
        partitions.push((MISSING_FIELD.to_string(), undescribed));
    }

    let groups = partitions
        .into_iter()
        .map(|(label, records)| {
            let subtotal: Decimal = records.iter().map(|r| r.transaction.amount_or_zero()).sum();
            ReportGroup {
                label,
                count: records.len(),
                subtotal,
                records,
            }
        })
        .collect();

    ReportDocument::new(report_date, groups)
}
