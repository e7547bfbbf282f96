use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::status::Status;

/// One durable (test case, target) → status association.
///
/// Records are the flattened form a status ledger file holds. Identity
/// is the identifier pair; the status is payload, so replacing a
/// record with a newer verdict keeps set semantics intact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRecord {
    /// Identifier of the test case this record belongs to
    pub test_case_identifier: String,
    /// Identifier of the target the case was executed at
    pub target_identifier: String,
    /// Last recorded status for the pair
    pub status: Status,
}

impl StatusRecord {
    pub fn new(
        test_case_identifier: impl Into<String>,
        target_identifier: impl Into<String>,
        status: Status,
    ) -> Self {
        Self {
            test_case_identifier: test_case_identifier.into(),
            target_identifier: target_identifier.into(),
            status,
        }
    }

    /// Returns true if this record describes the given pair.
    pub fn is_for(&self, test_case_identifier: &str, target_identifier: &str) -> bool {
        self.test_case_identifier == test_case_identifier
            && self.target_identifier == target_identifier
    }
}

// Equality ignores the status so a fresh verdict replaces the
// stale record for the same pair instead of accumulating next to it.
impl PartialEq for StatusRecord {
    fn eq(&self, other: &Self) -> bool {
        self.test_case_identifier == other.test_case_identifier
            && self.target_identifier == other.target_identifier
    }
}

impl Eq for StatusRecord {}

impl Hash for StatusRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.test_case_identifier.hash(state);
        self.target_identifier.hash(state);
    }
}
