pub mod status;
pub mod ledger;
pub mod case;
pub mod listener;
pub mod executable;
pub mod set;
pub mod connector;
pub mod target;
pub mod storage;
pub mod config;

pub use status::Status;
pub use ledger::StatusRecord;
pub use case::{CaseError, TestCase};
pub use listener::{ListenerId, StatusListener};
pub use executable::Executable;
pub use set::{ExecutionHandle, ParallelReport, TestSet, UnitResult};
pub use connector::{Connector, ConnectorError, Row, Session};
pub use target::{Dialect, Target, TargetConfig};
pub use storage::{FileStorage, Storage, StorageError};
pub use config::{Config, ConfigError, ExecutionConfig, StorageConfig};
