use async_trait::async_trait;

use crate::connector::Connector;

/// Anything that can run against a target and report overall success.
///
/// Implemented by single test cases and whole test sets, so callers
/// can drive either through one seam.
#[async_trait]
pub trait Executable {
    /// Runs against the target. Returns true when everything passed.
    async fn execute(&self, target: &dyn Connector) -> bool;
}
