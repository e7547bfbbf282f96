use std::fs;
use std::path::Path;

use dbtest_core::{
    Connector, Dialect, FileStorage, Status, Storage, StorageConfig, StorageError, Target,
    TargetConfig, TestCase,
};
use tempfile::TempDir;

const BODY_PASSED: &str =
    "/**\n* @package de.tests\n* @test TestCase\n*/\nselect 'passed' as result;";
const TARGET: &str = "tester@localhost:5432/testdb";

fn create_test_storage() -> (FileStorage, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let storage = FileStorage::new(temp_dir.path());
    (storage, temp_dir)
}

fn write_artifact(root: &Path, relative: &str, body: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

fn artifact_body(package: &str, name: &str) -> String {
    format!(
        "/**\n* @package {}\n* @test {}\n*/\nselect 'passed' as result;",
        package, name
    )
}

#[test]
fn test_initialize_creates_config_dir() {
    let (storage, temp_dir) = create_test_storage();

    storage.initialize().unwrap();

    assert!(temp_dir.path().join(".dbtest").is_dir());
}

#[test]
fn test_save_case_writes_artifact_in_package_path() {
    let (storage, temp_dir) = create_test_storage();
    let case = TestCase::new(BODY_PASSED);

    storage.save_case(&case).unwrap();

    let path = temp_dir.path().join("de/tests/TestCase.dbtest");
    assert!(path.is_file());
    assert_eq!(fs::read_to_string(path).unwrap(), BODY_PASSED);
}

#[test]
fn test_save_case_without_identity_is_rejected() {
    let (storage, _temp_dir) = create_test_storage();
    let case = TestCase::new("select 1;");

    assert!(matches!(
        storage.save_case(&case),
        Err(StorageError::Unidentified(_))
    ));
}

#[test]
fn test_load_case_round_trip() {
    let (storage, _temp_dir) = create_test_storage();
    let case = TestCase::new(BODY_PASSED);
    case.set_status(TARGET, Status::Passed);
    storage.save_case(&case).unwrap();

    let loaded = storage.load_case("de.tests.TestCase").unwrap();

    assert_eq!(loaded.identifier().unwrap(), "de.tests.TestCase");
    assert_eq!(loaded.query().as_deref(), Some("select 'passed' as result"));
    assert_eq!(loaded.status(TARGET), Some(Status::Passed));
}

#[test]
fn test_load_missing_case() {
    let (storage, _temp_dir) = create_test_storage();

    match storage.load_case("de.tests.Missing") {
        Err(StorageError::CaseNotFound(identifier)) => {
            assert_eq!(identifier, "de.tests.Missing");
        }
        other => panic!("expected CaseNotFound, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_load_package_collects_recursively() {
    let (storage, temp_dir) = create_test_storage();
    let root = temp_dir.path();
    write_artifact(
        root,
        "de/tests/Alpha.dbtest",
        &artifact_body("de.tests", "Alpha"),
    );
    write_artifact(
        root,
        "de/tests/nested/Beta.dbtest",
        &artifact_body("de.tests.nested", "Beta"),
    );
    write_artifact(root, "de/Gamma.dbtest", &artifact_body("de", "Gamma"));
    // Not an artifact, must be skipped.
    write_artifact(root, "de/tests/notes.txt", "scratch notes");

    let cases = storage.load_package("de").unwrap();

    let identifiers: Vec<String> = cases
        .iter()
        .map(|case| case.identifier().unwrap())
        .collect();
    assert_eq!(
        identifiers,
        vec!["de.Gamma", "de.tests.Alpha", "de.tests.nested.Beta"]
    );
}

#[test]
fn test_load_package_inside_git_repository() {
    let (storage, temp_dir) = create_test_storage();
    let root = temp_dir.path();
    fs::create_dir(root.join(".git")).unwrap();
    fs::write(root.join(".gitignore"), "*.dbtest\nwip/\n").unwrap();
    write_artifact(
        root,
        "de/tests/Alpha.dbtest",
        &artifact_body("de.tests", "Alpha"),
    );
    write_artifact(root, "de/wip/Beta.dbtest", &artifact_body("de.wip", "Beta"));

    let cases = storage.load_package("de").unwrap();

    // Ignore rules apply to source trees, not to the artifact store.
    let identifiers: Vec<String> = cases
        .iter()
        .map(|case| case.identifier().unwrap())
        .collect();
    assert_eq!(identifiers, vec!["de.tests.Alpha", "de.wip.Beta"]);
}

#[test]
fn test_load_missing_package() {
    let (storage, _temp_dir) = create_test_storage();

    assert!(matches!(
        storage.load_package("de.absent"),
        Err(StorageError::PackageNotFound(_))
    ));
}

#[test]
fn test_load_package_propagates_malformed_artifact() {
    let (storage, temp_dir) = create_test_storage();
    let root = temp_dir.path();
    write_artifact(
        root,
        "de/tests/Alpha.dbtest",
        &artifact_body("de.tests", "Alpha"),
    );
    write_artifact(root, "de/tests/Broken.dbtest", "select 1;");

    assert!(matches!(
        storage.load_package("de"),
        Err(StorageError::Malformed { .. })
    ));
}

#[test]
fn test_load_status_without_ledger_is_empty() {
    let (storage, _temp_dir) = create_test_storage();

    assert!(storage.load_status().unwrap().is_empty());
}

#[test]
fn test_save_status_replaces_own_records_and_keeps_others() {
    let (storage, _temp_dir) = create_test_storage();

    let case = TestCase::new(BODY_PASSED);
    case.set_status(TARGET, Status::Passed);
    storage.save_status(&case).unwrap();

    let other = TestCase::new(artifact_body("de.tests", "Other"));
    other.set_status(TARGET, Status::Failed);
    storage.save_status(&other).unwrap();

    // A later run overwrites only the records of the saved case.
    case.set_status(TARGET, Status::Failed);
    storage.save_status(&case).unwrap();

    let own = storage.load_status_for("de.tests.TestCase").unwrap();
    assert_eq!(own.len(), 1);
    assert_eq!(own[0].status, Status::Failed);

    let others = storage.load_status_for("de.tests.Other").unwrap();
    assert_eq!(others.len(), 1);
    assert_eq!(others[0].status, Status::Failed);
    assert_eq!(storage.load_status().unwrap().len(), 2);
}

#[test]
fn test_loaded_case_keeps_other_targets_on_save() {
    let (storage, _temp_dir) = create_test_storage();

    let case = TestCase::new(BODY_PASSED);
    case.set_status(TARGET, Status::Passed);
    storage.save_case(&case).unwrap();

    // A later session loads the case, runs it elsewhere and saves; the
    // earlier target's record must survive.
    let loaded = storage.load_case("de.tests.TestCase").unwrap();
    loaded.set_status("tester@replica:5432/testdb", Status::Failed);
    storage.save_status(&loaded).unwrap();

    let records = storage.load_status_for("de.tests.TestCase").unwrap();
    assert_eq!(records.len(), 2);
    assert!(records
        .iter()
        .any(|record| record.is_for("de.tests.TestCase", TARGET)));
    assert!(records
        .iter()
        .any(|record| record.is_for("de.tests.TestCase", "tester@replica:5432/testdb")));
}

#[test]
fn test_ledger_file_uses_camel_case_and_status_codes() {
    let (storage, temp_dir) = create_test_storage();
    let case = TestCase::new(BODY_PASSED);
    case.set_status(TARGET, Status::Passed);
    storage.save_status(&case).unwrap();

    let json = fs::read_to_string(temp_dir.path().join(".dbtest/status.json")).unwrap();
    assert!(json.contains("\"testCaseIdentifier\""));
    assert!(json.contains("\"targetIdentifier\""));
    assert!(json.contains("\"status\": 3"));
}

#[test]
fn test_targets_round_trip() {
    let (storage, temp_dir) = create_test_storage();

    let mut config = TargetConfig::default();
    let target = Target::new(Dialect::Sqlite, "localhost", 5432, "testdb", "tester", "");
    assert!(config.add_target(target));
    storage.save_targets(&config).unwrap();

    assert!(temp_dir.path().join("dbtest.json").is_file());

    let loaded = storage.load_targets().unwrap();
    let found = loaded.target(TARGET).unwrap();
    assert_eq!(found.identifier(), TARGET);
    assert_eq!(found.dialect, Dialect::Sqlite);
}

#[test]
fn test_load_missing_targets() {
    let (storage, temp_dir) = create_test_storage();

    match storage.load_targets() {
        Err(StorageError::TargetsNotFound(path)) => {
            assert_eq!(path, temp_dir.path().join("dbtest.json"));
        }
        other => panic!("expected TargetsNotFound, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_custom_config_changes_layout() {
    let temp_dir = TempDir::new().unwrap();
    let config = StorageConfig {
        case_extension: ".sqltest".to_string(),
        config_dir: ".harness".to_string(),
        status_file: "ledger.json".to_string(),
        targets_file: "targets.json".to_string(),
    };
    let storage = FileStorage::with_config(temp_dir.path(), config);

    let case = TestCase::new(BODY_PASSED);
    case.set_status(TARGET, Status::Passed);
    storage.save_case(&case).unwrap();

    assert!(temp_dir.path().join("de/tests/TestCase.sqltest").is_file());
    assert!(temp_dir.path().join(".harness/ledger.json").is_file());

    let loaded = storage.load_case("de.tests.TestCase").unwrap();
    assert_eq!(loaded.status(TARGET), Some(Status::Passed));
}
