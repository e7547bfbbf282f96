use std::sync::atomic::{AtomicU64, Ordering};

use crate::case::TestCase;

/// Observer of test-case status changes.
///
/// Listeners are invoked synchronously after every status transition,
/// in registration order, with no lock held; the case's accessors
/// already reflect the new state. A panicking listener is isolated
/// and does not abort the transition or the remaining listeners.
pub trait StatusListener: Send + Sync {
    fn status_changed(&self, case: &TestCase);
}

/// Registration token handed out by `add_listener` and consumed by
/// `remove_listener`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Process-unique; tokens are never reused.
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        ListenerId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}
