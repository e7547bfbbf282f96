use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use regex::Regex;
use tracing::warn;

use crate::connector::Connector;
use crate::executable::Executable;
use crate::ledger::StatusRecord;
use crate::listener::{ListenerId, StatusListener};
use crate::status::Status;

/// A declarative test case.
///
/// The raw body text is the single source of truth; everything else
/// is derived from it on demand. A body looks like
///
/// ```text
/// /**
/// * @package de.tests
/// * @test TestCase
/// */
/// select 'passed' as result;
/// ```
///
/// where the leading comment block names the case and the rest is the
/// query executed at a target. The identifier `<package>.<name>` is
/// the case's identity everywhere: two cases with equal identifiers
/// are the same artifact.
///
/// A case tracks one status per target it has been executed at, keyed
/// by the target's identifier, and publishes every status transition
/// to its registered listeners. All state sits behind locks so a case
/// can be shared as `Arc<TestCase>` across sets and worker tasks.
pub struct TestCase {
    body: RwLock<String>,
    status_by_target: Mutex<HashMap<String, Status>>,
    listeners: Mutex<Vec<(ListenerId, Arc<dyn StatusListener>)>>,
}

impl TestCase {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: RwLock::new(body.into()),
            status_by_target: Mutex::new(HashMap::new()),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Returns the full body text.
    pub fn body(&self) -> String {
        self.body
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the leading documentation block, `/**` through `*/`.
    /// The opening marker must be followed by a newline.
    pub fn head(&self) -> Option<String> {
        let pattern = Regex::new(r"(?s)/\*\*\r?\n.*\*/").ok()?;
        let body = self.body.read().unwrap_or_else(PoisonError::into_inner);
        pattern.find(&body).map(|head| head.as_str().to_string())
    }

    /// Returns the value of the `@package` annotation, trimmed.
    pub fn package(&self) -> Option<String> {
        Self::annotation(&self.head()?, r"@package (.*)")
    }

    /// Returns the value of the `@test` annotation, trimmed.
    pub fn name(&self) -> Option<String> {
        Self::annotation(&self.head()?, r"@test (.*)")
    }

    fn annotation(head: &str, pattern: &str) -> Option<String> {
        let pattern = Regex::new(pattern).ok()?;
        let captures = pattern.captures(head)?;
        Some(captures.get(1)?.as_str().trim().to_string())
    }

    /// Returns the query text between the documentation block and the
    /// trailing `;`, trimmed.
    pub fn query(&self) -> Option<String> {
        let pattern = Regex::new(r"(?s)\*/(.*);").ok()?;
        let body = self.body.read().unwrap_or_else(PoisonError::into_inner);
        let captures = pattern.captures(&body)?;
        Some(captures.get(1)?.as_str().trim().to_string())
    }

    /// Returns the case identity, `<package>.<name>`.
    pub fn identifier(&self) -> Result<String, CaseError> {
        let head = match self.head() {
            Some(head) => head,
            None => return Err(CaseError::MissingHeader),
        };
        let package = Self::annotation(&head, r"@package (.*)").ok_or(CaseError::MissingPackage)?;
        let name = Self::annotation(&head, r"@test (.*)").ok_or(CaseError::MissingName)?;
        Ok(format!("{}.{}", package, name))
    }

    /// Replaces the query while keeping the documentation block, and
    /// with it the identifier, untouched. The caller supplies any
    /// trailing `;`.
    pub fn set_query(&self, query: &str) -> Result<(), CaseError> {
        let head = self.head().ok_or(CaseError::MissingHeader)?;
        let mut body = self.body.write().unwrap_or_else(PoisonError::into_inner);
        *body = format!("{}\n{}", head, query);
        Ok(())
    }

    /// Returns the recorded status for a target, or `None` when the
    /// case has never been executed there. Absence is not `Pending`.
    pub fn status(&self, target_identifier: &str) -> Option<Status> {
        self.status_by_target
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(target_identifier)
            .copied()
    }

    /// Records a status for a target and publishes the transition.
    pub fn set_status(&self, target_identifier: impl Into<String>, status: Status) {
        {
            let mut statuses = self
                .status_by_target
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            statuses.insert(target_identifier.into(), status);
        }
        self.publish();
    }

    /// Flattens the status map into ledger records, sorted by target
    /// identifier.
    pub fn status_records(&self) -> Result<Vec<StatusRecord>, CaseError> {
        let identifier = self.identifier()?;
        let statuses = self
            .status_by_target
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let mut records: Vec<StatusRecord> = statuses
            .iter()
            .map(|(target, status)| StatusRecord::new(&identifier, target, *status))
            .collect();
        records.sort_by(|a, b| a.target_identifier.cmp(&b.target_identifier));

        Ok(records)
    }

    /// Registers a listener and returns its removal token.
    pub fn add_listener(&self, listener: Arc<dyn StatusListener>) -> ListenerId {
        let id = ListenerId::next();
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, listener));
        id
    }

    /// Unregisters a listener. Returns false when the token was not
    /// registered here.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(registered, _)| *registered != id);
        listeners.len() != before
    }

    /// Notifies every listener, in registration order, outside the
    /// listener lock. A panicking listener is caught and logged.
    fn publish(&self) {
        let listeners: Vec<Arc<dyn StatusListener>> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in listeners {
            if panic::catch_unwind(AssertUnwindSafe(|| listener.status_changed(self))).is_err() {
                warn!("Status listener panicked during notification");
            }
        }
    }

    /// Runs the case against a target.
    ///
    /// The status for the target transitions to `Running`, then to the
    /// terminal outcome:
    ///
    /// - connection failure → `Failed`
    /// - missing query or query error or a row without a `result`
    ///   column → `Stopped`
    /// - a row whose `result` equals `"passed"` (any case) → `Passed`
    /// - any other value, or no row at all → `Failed`
    ///
    /// Returns true iff the terminal status is `Passed`.
    pub async fn execute(&self, target: &dyn Connector) -> bool {
        let target_identifier = target.identifier();
        self.set_status(&target_identifier, Status::Running);

        let mut session = match target.connect().await {
            Ok(session) => session,
            Err(e) => {
                warn!(target = %target_identifier, error = %e, "Connection failed");
                self.set_status(&target_identifier, Status::Failed);
                return false;
            }
        };

        let status = match self.query() {
            Some(query) => match session.run_query(&query).await {
                Ok(Some(row)) => match row.get("result") {
                    Some(verdict) if verdict.eq_ignore_ascii_case("passed") => Status::Passed,
                    Some(_) => Status::Failed,
                    None => {
                        warn!(target = %target_identifier, "Result row has no result column");
                        Status::Stopped
                    }
                },
                Ok(None) => Status::Failed,
                Err(e) => {
                    warn!(target = %target_identifier, error = %e, "Query failed");
                    Status::Stopped
                }
            },
            None => {
                warn!(target = %target_identifier, "Test case body contains no query");
                Status::Stopped
            }
        };

        if let Err(e) = session.close().await {
            warn!(target = %target_identifier, error = %e, "Failed to close session");
        }

        self.set_status(&target_identifier, status);
        status == Status::Passed
    }
}

#[async_trait::async_trait]
impl Executable for TestCase {
    async fn execute(&self, target: &dyn Connector) -> bool {
        TestCase::execute(self, target).await
    }
}

impl std::fmt::Debug for TestCase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestCase")
            .field("identifier", &self.identifier().ok())
            .finish_non_exhaustive()
    }
}

/// Errors raised when a body does not parse into a full identity.
#[derive(Debug, thiserror::Error)]
pub enum CaseError {
    #[error("Test case has no documentation header")]
    MissingHeader,

    #[error("Test case header has no @package annotation")]
    MissingPackage,

    #[error("Test case header has no @test annotation")]
    MissingName,
}
