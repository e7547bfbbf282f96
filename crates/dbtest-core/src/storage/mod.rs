mod error;
mod file;

pub use error::StorageError;
pub use file::FileStorage;

use std::sync::Arc;

use crate::case::TestCase;
use crate::ledger::StatusRecord;
use crate::target::TargetConfig;

/// Trait for test-artifact storage backends.
///
/// Implementations persist three things: case bodies, the status
/// ledger, and the target registry.
pub trait Storage {
    /// Persists a case body and its status records.
    fn save_case(&self, case: &TestCase) -> Result<(), StorageError>;

    /// Loads a case by identifier, with persisted statuses applied.
    fn load_case(&self, identifier: &str) -> Result<Arc<TestCase>, StorageError>;

    /// Recursively loads every case below a package, ordered by
    /// identifier, with persisted statuses applied.
    fn load_package(&self, identifier: &str) -> Result<Vec<Arc<TestCase>>, StorageError>;

    /// Reads the whole status ledger. A missing ledger is empty, not
    /// an error.
    fn load_status(&self) -> Result<Vec<StatusRecord>, StorageError>;

    /// Reads the ledger records belonging to one case.
    fn load_status_for(&self, identifier: &str) -> Result<Vec<StatusRecord>, StorageError>;

    /// Writes a case's records into the ledger, replacing the case's
    /// stale records and preserving everyone else's.
    fn save_status(&self, case: &TestCase) -> Result<(), StorageError>;

    /// Reads the target registry.
    fn load_targets(&self) -> Result<TargetConfig, StorageError>;

    /// Writes the target registry.
    fn save_targets(&self, config: &TargetConfig) -> Result<(), StorageError>;

    /// Creates the artifact root and its config directory.
    fn initialize(&self) -> Result<(), StorageError>;
}
