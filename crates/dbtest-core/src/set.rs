use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::case::{CaseError, TestCase};
use crate::connector::Connector;
use crate::executable::Executable;
use crate::listener::{ListenerId, StatusListener};
use crate::status::Status;

/// An unordered collection of test cases, keyed by identifier.
///
/// Cases are held as `Arc<TestCase>`, so the same case may belong to
/// several sets and a status change is visible through all of them.
/// Adding a case subscribes the set's relay listener to it; set-level
/// listeners then receive every member's status events.
pub struct TestSet {
    cases: HashMap<String, Arc<TestCase>>,
    subscriptions: HashMap<String, ListenerId>,
    relay: Arc<SetRelay>,
}

impl TestSet {
    pub fn new() -> Self {
        Self {
            cases: HashMap::new(),
            subscriptions: HashMap::new(),
            relay: Arc::new(SetRelay::default()),
        }
    }

    /// Adds a case. Returns `Ok(false)` when a case with the same
    /// identifier is already a member; a case without a full identity
    /// cannot be added.
    pub fn add(&mut self, case: Arc<TestCase>) -> Result<bool, CaseError> {
        let identifier = case.identifier()?;
        if self.cases.contains_key(&identifier) {
            return Ok(false);
        }

        let subscription = case.add_listener(self.relay.clone() as Arc<dyn StatusListener>);
        self.subscriptions.insert(identifier.clone(), subscription);
        self.cases.insert(identifier, case);
        Ok(true)
    }

    /// Adds every case in the iterator. Returns how many were newly
    /// added; cases added before a malformed one stay members.
    pub fn add_all(
        &mut self,
        cases: impl IntoIterator<Item = Arc<TestCase>>,
    ) -> Result<usize, CaseError> {
        let mut added = 0;
        for case in cases {
            if self.add(case)? {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Removes a member and unsubscribes the relay from it.
    pub fn remove(&mut self, identifier: &str) -> bool {
        match self.cases.remove(identifier) {
            Some(case) => {
                if let Some(subscription) = self.subscriptions.remove(identifier) {
                    case.remove_listener(subscription);
                }
                true
            }
            None => false,
        }
    }

    pub fn get(&self, identifier: &str) -> Option<Arc<TestCase>> {
        self.cases.get(identifier).cloned()
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// All members, ordered by identifier.
    pub fn cases(&self) -> Vec<Arc<TestCase>> {
        self.sorted_entries()
            .into_iter()
            .map(|(_, case)| case)
            .collect()
    }

    /// Members whose recorded status at the target equals `status`.
    /// A member that has never been executed there matches nothing.
    pub fn cases_with_status(&self, status: Status, target_identifier: &str) -> Vec<Arc<TestCase>> {
        self.sorted_entries()
            .into_iter()
            .filter(|(_, case)| case.status(target_identifier) == Some(status))
            .map(|(_, case)| case)
            .collect()
    }

    /// Registers a set-level listener on the relay.
    pub fn add_listener(&self, listener: Arc<dyn StatusListener>) -> ListenerId {
        self.relay.add(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.relay.remove(id)
    }

    fn sorted_entries(&self) -> Vec<(String, Arc<TestCase>)> {
        let mut entries: Vec<(String, Arc<TestCase>)> = self
            .cases
            .iter()
            .map(|(identifier, case)| (identifier.clone(), Arc::clone(case)))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Runs every member sequentially, in identifier order, and
    /// returns the AND of the individual results. Never short-circuits;
    /// each member runs and records its own status.
    pub async fn execute(&self, target: &dyn Connector) -> bool {
        let mut all_passed = true;
        for case in self.cases() {
            all_passed &= case.execute(target).await;
        }
        all_passed
    }

    /// Submits every member onto a bounded worker pool and returns one
    /// handle per member, in identifier order.
    ///
    /// All units are submitted before this returns; the concurrency
    /// bound is enforced by permits acquired inside each task, so a
    /// saturated pool delays execution, not submission. Each unit
    /// opens its own session on the shared target.
    pub fn dispatch(
        &self,
        target: Arc<dyn Connector>,
        max_concurrency: usize,
    ) -> Vec<ExecutionHandle> {
        let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
        let entries = self.sorted_entries();
        debug!(units = entries.len(), "Dispatching test set");

        entries
            .into_iter()
            .map(|(identifier, case)| {
                let semaphore = Arc::clone(&semaphore);
                let target = Arc::clone(&target);
                let handle = tokio::spawn(async move {
                    // The semaphore is never closed; acquisition only
                    // fails while the runtime is tearing down.
                    let _permit = match semaphore.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => return false,
                    };
                    case.execute(target.as_ref()).await
                });
                ExecutionHandle { identifier, handle }
            })
            .collect()
    }

    /// Dispatches the set and waits until every unit finishes or the
    /// window elapses, whichever comes first.
    ///
    /// Units still running when the window closes are reported as
    /// abandoned. They are detached, not cancelled: they run to
    /// completion in the background and their status updates still
    /// land. Callers wanting final verdicts poll statuses afterward.
    pub async fn execute_parallel(
        &self,
        target: Arc<dyn Connector>,
        max_concurrency: usize,
        window: Duration,
    ) -> ParallelReport {
        let deadline = Instant::now() + window;
        let handles = self.dispatch(target, max_concurrency);

        let mut report = ParallelReport::default();
        for unit in handles {
            let ExecutionHandle {
                identifier,
                mut handle,
            } = unit;
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(passed)) => report.completed.push(UnitResult { identifier, passed }),
                Ok(Err(e)) => {
                    warn!(unit = %identifier, error = %e, "Execution task failed");
                    report.completed.push(UnitResult {
                        identifier,
                        passed: false,
                    });
                }
                Err(_) => {
                    // Dropping the handle detaches the task instead of
                    // aborting it.
                    warn!(unit = %identifier, "Abandoned after execution window elapsed");
                    report.abandoned.push(identifier);
                }
            }
        }
        report
    }
}

impl Default for TestSet {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Executable for TestSet {
    async fn execute(&self, target: &dyn Connector) -> bool {
        TestSet::execute(self, target).await
    }
}

impl std::fmt::Debug for TestSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut identifiers: Vec<&String> = self.cases.keys().collect();
        identifiers.sort();
        f.debug_struct("TestSet")
            .field("cases", &identifiers)
            .finish_non_exhaustive()
    }
}

/// Tracks one dispatched member execution.
pub struct ExecutionHandle {
    identifier: String,
    handle: JoinHandle<bool>,
}

impl ExecutionHandle {
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Waits for the unit to finish. A unit whose task could not be
    /// joined counts as not passed.
    pub async fn join(self) -> bool {
        match self.handle.await {
            Ok(passed) => passed,
            Err(e) => {
                warn!(unit = %self.identifier, error = %e, "Execution task failed");
                false
            }
        }
    }
}

/// Outcome of one unit that finished inside the execution window.
#[derive(Debug, Clone)]
pub struct UnitResult {
    pub identifier: String,
    pub passed: bool,
}

/// What a bounded parallel run produced within its window.
#[derive(Debug, Clone, Default)]
pub struct ParallelReport {
    /// Units that finished, with their verdict.
    pub completed: Vec<UnitResult>,
    /// Units abandoned when the window closed. Still running detached;
    /// their statuses keep updating.
    pub abandoned: Vec<String>,
}

/// Fans member status events out to set-level listeners, isolating
/// panics per listener like the case-level publish does.
#[derive(Default)]
struct SetRelay {
    listeners: Mutex<Vec<(ListenerId, Arc<dyn StatusListener>)>>,
}

impl SetRelay {
    fn add(&self, listener: Arc<dyn StatusListener>) -> ListenerId {
        let id = ListenerId::next();
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, listener));
        id
    }

    fn remove(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(registered, _)| *registered != id);
        listeners.len() != before
    }
}

impl StatusListener for SetRelay {
    fn status_changed(&self, case: &TestCase) {
        let listeners: Vec<Arc<dyn StatusListener>> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in listeners {
            if panic::catch_unwind(AssertUnwindSafe(|| listener.status_changed(case))).is_err() {
                warn!("Set listener panicked during notification");
            }
        }
    }
}
