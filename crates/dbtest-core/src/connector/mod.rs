mod error;
mod sqlite;

pub use error::ConnectorError;
pub use sqlite::SqliteSession;

use async_trait::async_trait;

/// A single result row, with column values flattened to strings.
#[derive(Debug, Clone, Default)]
pub struct Row {
    columns: Vec<(String, String)>,
}

impl Row {
    pub fn new(columns: Vec<(String, String)>) -> Self {
        Self { columns }
    }

    /// Looks up a column value by name, ignoring case.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|(column, _)| column.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// An open session at a target, able to run one query at a time.
///
/// Sessions are single-owner; a concurrent caller obtains its own
/// session through [`Connector::connect`].
#[async_trait]
pub trait Session: Send {
    /// Runs a query and returns the first result row, or `None` when
    /// the statement produced no rows.
    async fn run_query(&mut self, query: &str) -> Result<Option<Row>, ConnectorError>;

    /// Releases the session. Calling it twice is a no-op.
    async fn close(&mut self) -> Result<(), ConnectorError>;
}

/// Trait for connectable targets.
///
/// This abstraction is the seam between the execution engine and
/// concrete database engines: the engine only ever asks a target for
/// its identifier and for a fresh session. External engines integrate
/// by implementing this trait.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Returns the identity string status maps are keyed by.
    fn identifier(&self) -> String;

    /// Opens a new session. Every call yields an independent session,
    /// so concurrent executions never share connection state.
    async fn connect(&self) -> Result<Box<dyn Session>, ConnectorError>;
}
