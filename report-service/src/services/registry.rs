//! Request-scoped lookup of registrations by normalized document number.

use crate::models::RegistrationRecord;
use crate::services::normalizer::NormalizedIdentifier;
use std::collections::HashMap;
use tracing::debug;

/// Registrations keyed by normalized document number.
///
/// Built once per report run and dropped with it; registration data can change
/// between runs so nothing is cached across requests.
#[derive(Debug, Default)]
pub struct RegistryIndex {
    entries: HashMap<NormalizedIdentifier, RegistrationRecord>,
    collisions: usize,
    skipped: usize,
}

impl RegistryIndex {
    /// Index `records` in iteration order. When two records normalize to the
    /// same identifier the later one replaces the earlier one. Records without
    /// a document number are not indexed.
    pub fn build<I>(records: I) -> Self
    where
        I: IntoIterator<Item = RegistrationRecord>,
    {
        let mut index = Self::default();

        for record in records {
            let Some(key) = NormalizedIdentifier::from_optional(record.document_number.as_deref())
            else {
                index.skipped += 1;
                continue;
            };

            if let Some(previous) = index.entries.insert(key.clone(), record) {
                index.collisions += 1;
                debug!(
                    document = %key,
                    replaced_registration_id = previous.id,
                    "Registration document collision, keeping the later record"
                );
            }
        }

        index
    }

    pub fn find(&self, id: &NormalizedIdentifier) -> Option<&RegistrationRecord> {
        self.entries.get(id)
    }

    /// Normalize `raw` and look it up.
    pub fn find_raw(&self, raw: &str) -> Option<&RegistrationRecord> {
        NormalizedIdentifier::from_optional(Some(raw)).and_then(|id| self.find(&id))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of records that replaced an earlier record with the same identifier.
    pub fn collisions(&self) -> usize {
        self.collisions
    }

    /// Number of records left out because they had no document number.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}
