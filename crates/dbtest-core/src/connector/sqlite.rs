use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use tokio::task;

use super::error::ConnectorError;
use super::{Row, Session};

/// SQLite-backed session.
///
/// rusqlite is a blocking driver, so every call moves the connection
/// onto the blocking pool and back. The connection lives in an Option
/// because `run_query` has to take it out to move it into the closure.
pub struct SqliteSession {
    conn: Option<Connection>,
}

impl SqliteSession {
    /// Opens the database at `path`. SQLite resolves `:memory:` itself,
    /// so in-memory targets need no special casing here.
    pub async fn open(path: &str, identifier: &str) -> Result<Self, ConnectorError> {
        let path = path.to_string();
        let conn = task::spawn_blocking(move || Connection::open(path))
            .await
            .map_err(|e| ConnectorError::connect(identifier, e))?
            .map_err(|e| ConnectorError::connect(identifier, e))?;

        Ok(Self { conn: Some(conn) })
    }
}

#[async_trait]
impl Session for SqliteSession {
    async fn run_query(&mut self, query: &str) -> Result<Option<Row>, ConnectorError> {
        let conn = self.conn.take().ok_or(ConnectorError::SessionClosed)?;
        let query = query.to_string();

        let (conn, outcome) = task::spawn_blocking(move || {
            let outcome = first_row(&conn, &query);
            (conn, outcome)
        })
        .await
        .map_err(|e| ConnectorError::Query(e.to_string()))?;

        self.conn = Some(conn);
        outcome
    }

    async fn close(&mut self) -> Result<(), ConnectorError> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };

        task::spawn_blocking(move || {
            conn.close()
                .map_err(|(_, e)| ConnectorError::Close(e.to_string()))
        })
        .await
        .map_err(|e| ConnectorError::Close(e.to_string()))?
    }
}

/// Runs `query` and flattens the first result row to (name, value)
/// string pairs. `Ok(None)` means the statement yielded no rows.
fn first_row(conn: &Connection, query: &str) -> Result<Option<Row>, ConnectorError> {
    let mut stmt = conn
        .prepare(query)
        .map_err(|e| ConnectorError::Query(e.to_string()))?;

    let names: Vec<String> = stmt.column_names().iter().map(|n| n.to_string()).collect();

    let mut rows = stmt
        .query([])
        .map_err(|e| ConnectorError::Query(e.to_string()))?;

    let Some(row) = rows.next().map_err(|e| ConnectorError::Query(e.to_string()))? else {
        return Ok(None);
    };

    let mut columns = Vec::with_capacity(names.len());
    for (index, name) in names.into_iter().enumerate() {
        let value = row
            .get_ref(index)
            .map_err(|e| ConnectorError::Query(e.to_string()))?;
        columns.push((name, stringify(value)));
    }

    Ok(Some(Row::new(columns)))
}

fn stringify(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(v) => v.to_string(),
        ValueRef::Real(v) => v.to_string(),
        ValueRef::Text(v) | ValueRef::Blob(v) => String::from_utf8_lossy(v).into_owned(),
    }
}
