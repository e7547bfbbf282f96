//! Default values for dbtest configuration.
//!
//! All hardcoded defaults are centralized here for easy maintenance.

// ============================================================================
// Execution Defaults
// ============================================================================

/// Default number of concurrent executions in a parallel batch.
pub const DEFAULT_PARALLELISM: usize = 4;

/// Default wall-clock window for a parallel batch, in seconds.
pub const DEFAULT_BATCH_TIMEOUT_SECS: u64 = 60;

// ============================================================================
// Storage Defaults
// ============================================================================

/// Default file extension of test case artifacts.
pub const DEFAULT_CASE_EXTENSION: &str = ".dbtest";

/// Default per-project config directory under the artifact root.
pub const DEFAULT_CONFIG_DIR: &str = ".dbtest";

/// Default status ledger file name, inside the config directory.
pub const DEFAULT_STATUS_FILE: &str = "status.json";

/// Default target registry file name, at the artifact root.
pub const DEFAULT_TARGETS_FILE: &str = "dbtest.json";

/// Project-local configuration file name.
pub const PROJECT_CONFIG_FILE: &str = "dbtest.toml";
