use thiserror::Error;

/// Errors that can occur while talking to a target.
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("No driver for dialect: {0}")]
    UnsupportedDialect(String),

    #[error("Failed to connect to {identifier}: {message}")]
    Connect { identifier: String, message: String },

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Failed to close session: {0}")]
    Close(String),

    #[error("Session is closed")]
    SessionClosed,
}

impl ConnectorError {
    pub fn connect(identifier: impl Into<String>, message: impl ToString) -> Self {
        ConnectorError::Connect {
            identifier: identifier.into(),
            message: message.to_string(),
        }
    }
}
