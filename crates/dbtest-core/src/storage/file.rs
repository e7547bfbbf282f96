use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ignore::WalkBuilder;
use tracing::debug;

use crate::case::TestCase;
use crate::config::StorageConfig;
use crate::ledger::StatusRecord;
use crate::target::TargetConfig;

use super::error::StorageError;
use super::Storage;

/// File-based storage implementation.
///
/// Lays a project out as:
/// ```text
/// <root>/
///   dbtest.json                  # target registry
///   .dbtest/
///     status.json                # status ledger
///   de/tests/
///     SomeCase.dbtest            # one artifact per case, package
///                                # segments become directories
/// ```
pub struct FileStorage {
    root: PathBuf,
    config: StorageConfig,
}

impl FileStorage {
    /// Creates a storage rooted at `root` with default file names.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            config: StorageConfig::default(),
        }
    }

    /// Creates a storage with custom file names and extension.
    pub fn with_config(root: impl Into<PathBuf>, config: StorageConfig) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps `de.tests.Case1` to `<root>/de/tests/Case1.dbtest`.
    fn case_file(&self, identifier: &str) -> PathBuf {
        let relative = identifier.replace('.', "/");
        self.root
            .join(format!("{}{}", relative, self.config.case_extension))
    }

    /// Maps `de.tests` to `<root>/de/tests`.
    fn package_dir(&self, identifier: &str) -> PathBuf {
        self.root.join(identifier.replace('.', "/"))
    }

    fn config_dir(&self) -> PathBuf {
        self.root.join(&self.config.config_dir)
    }

    fn status_file(&self) -> PathBuf {
        self.config_dir().join(&self.config.status_file)
    }

    fn targets_file(&self) -> PathBuf {
        self.root.join(&self.config.targets_file)
    }

    fn ensure_config_dir(&self) -> Result<(), StorageError> {
        let dir = self.config_dir();
        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(|e| StorageError::io(&dir, e))?;
        }
        Ok(())
    }

    /// Reads and parses one artifact; a body without a full identity
    /// is a per-file error.
    fn read_case(&self, path: &Path) -> Result<(String, Arc<TestCase>), StorageError> {
        let body = fs::read_to_string(path).map_err(|e| StorageError::io(path, e))?;
        let case = TestCase::new(body);
        let identifier = case
            .identifier()
            .map_err(|e| StorageError::malformed(path, e))?;
        Ok((identifier, Arc::new(case)))
    }
}

/// Applies the ledger records belonging to `identifier` onto `case`.
fn apply_records(case: &TestCase, identifier: &str, records: &[StatusRecord]) {
    for record in records {
        if record.test_case_identifier == identifier {
            case.set_status(&record.target_identifier, record.status);
        }
    }
}

impl Storage for FileStorage {
    fn save_case(&self, case: &TestCase) -> Result<(), StorageError> {
        let identifier = case.identifier()?;
        let path = self.case_file(&identifier);

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
            }
        }

        self.save_status(case)?;
        fs::write(&path, case.body()).map_err(|e| StorageError::io(&path, e))?;

        debug!(identifier = %identifier, path = %path.display(), "Saved test case");
        Ok(())
    }

    fn load_case(&self, identifier: &str) -> Result<Arc<TestCase>, StorageError> {
        let path = self.case_file(identifier);
        if !path.exists() {
            return Err(StorageError::CaseNotFound(identifier.to_string()));
        }

        // The parsed identity is authoritative; statuses are applied
        // under it, not under the requested identifier.
        let (parsed_identifier, case) = self.read_case(&path)?;
        let records = self.load_status()?;
        apply_records(&case, &parsed_identifier, &records);

        Ok(case)
    }

    fn load_package(&self, identifier: &str) -> Result<Vec<Arc<TestCase>>, StorageError> {
        let dir = self.package_dir(identifier);
        if !dir.is_dir() {
            return Err(StorageError::PackageNotFound(identifier.to_string()));
        }

        let records = self.load_status()?;
        // Artifact trees may sit inside git repositories; gitignore
        // rules and hidden-file filtering must not drop cases.
        let walker = WalkBuilder::new(&dir).standard_filters(false).build();

        let mut loaded: Vec<(String, Arc<TestCase>)> = Vec::new();
        for entry in walker.flatten() {
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let is_artifact = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.ends_with(&self.config.case_extension));
            if !is_artifact {
                continue;
            }

            let (case_identifier, case) = self.read_case(entry.path())?;
            apply_records(&case, &case_identifier, &records);
            loaded.push((case_identifier, case));
        }

        loaded.sort_by(|a, b| a.0.cmp(&b.0));
        debug!(package = identifier, cases = loaded.len(), "Loaded package");

        Ok(loaded.into_iter().map(|(_, case)| case).collect())
    }

    fn load_status(&self) -> Result<Vec<StatusRecord>, StorageError> {
        let path = self.status_file();
        if !path.exists() {
            return Ok(Vec::new());
        }

        let json = fs::read_to_string(&path).map_err(|e| StorageError::io(&path, e))?;
        let records: Vec<StatusRecord> = serde_json::from_str(&json)?;

        Ok(records)
    }

    fn load_status_for(&self, identifier: &str) -> Result<Vec<StatusRecord>, StorageError> {
        let mut records = self.load_status()?;
        records.retain(|record| record.test_case_identifier == identifier);
        Ok(records)
    }

    fn save_status(&self, case: &TestCase) -> Result<(), StorageError> {
        let identifier = case.identifier()?;
        let records = case.status_records()?;

        let mut ledger = self.load_status()?;
        ledger.retain(|record| record.test_case_identifier != identifier);
        ledger.extend(records);

        self.ensure_config_dir()?;
        let path = self.status_file();
        let json = serde_json::to_string_pretty(&ledger)?;
        fs::write(&path, json).map_err(|e| StorageError::io(&path, e))?;

        Ok(())
    }

    fn load_targets(&self) -> Result<TargetConfig, StorageError> {
        let path = self.targets_file();
        if !path.exists() {
            return Err(StorageError::TargetsNotFound(path));
        }

        let json = fs::read_to_string(&path).map_err(|e| StorageError::io(&path, e))?;
        let config: TargetConfig = serde_json::from_str(&json)?;

        Ok(config)
    }

    fn save_targets(&self, config: &TargetConfig) -> Result<(), StorageError> {
        let path = self.targets_file();

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
            }
        }

        let json = serde_json::to_string_pretty(config)?;
        fs::write(&path, json).map_err(|e| StorageError::io(&path, e))?;

        Ok(())
    }

    fn initialize(&self) -> Result<(), StorageError> {
        self.ensure_config_dir()?;
        debug!(root = %self.root.display(), "Initialized project layout");
        Ok(())
    }
}
