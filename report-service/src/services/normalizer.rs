//! Canonical form of identity document numbers.

use std::fmt;

/// A document number with whitespace, periods and hyphens removed and case
/// folded. The empty identifier never matches anything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedIdentifier(String);

impl NormalizedIdentifier {
    pub fn new(raw: &str) -> Self {
        Self(normalize(raw))
    }

    /// `None` for absent or blank document numbers.
    pub fn from_optional(raw: Option<&str>) -> Option<Self> {
        raw.map(Self::new).filter(|id| !id.is_empty())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for NormalizedIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Strip whitespace, `.` and `-` and lowercase the rest.
pub fn normalize(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '.' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}
