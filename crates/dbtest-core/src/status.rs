use serde::{Deserialize, Serialize};

/// Execution status of a test case at one target.
///
/// Per execution a case moves Pending → Running → terminal, where
/// terminal is one of Stopped, Passed or Failed. A later execution
/// starts the cycle over by overwriting the stored value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Status {
    /// Known but never executed at the target
    #[default]
    Pending,
    /// Execution has started and no verdict has landed yet
    Running,
    /// Execution aborted before a verdict could be read
    Stopped,
    /// The query produced a passing verdict
    Passed,
    /// Connectivity failed or the query produced a non-passing verdict
    Failed,
}

impl Status {
    /// Returns true once no further transition happens within the
    /// current execution.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Stopped | Status::Passed | Status::Failed)
    }

    /// Returns the name used in reports and log lines.
    pub fn display_name(&self) -> &'static str {
        match self {
            Status::Pending => "PENDING",
            Status::Running => "RUNNING",
            Status::Stopped => "STOPPED",
            Status::Passed => "PASSED",
            Status::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Stored ledgers encode statuses as integers; this is the wire order.
impl From<Status> for u8 {
    fn from(status: Status) -> u8 {
        match status {
            Status::Pending => 0,
            Status::Running => 1,
            Status::Stopped => 2,
            Status::Passed => 3,
            Status::Failed => 4,
        }
    }
}

impl TryFrom<u8> for Status {
    type Error = InvalidStatus;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Status::Pending),
            1 => Ok(Status::Running),
            2 => Ok(Status::Stopped),
            3 => Ok(Status::Passed),
            4 => Ok(Status::Failed),
            other => Err(InvalidStatus(other)),
        }
    }
}

/// A status code outside the ledger's 0..=4 range.
#[derive(Debug, thiserror::Error)]
#[error("Invalid status code: {0}")]
pub struct InvalidStatus(pub u8);
