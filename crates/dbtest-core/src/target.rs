use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::connector::{Connector, ConnectorError, Session, SqliteSession};

/// Database engine a target speaks.
///
/// Only SQLite ships with a bundled driver; the other dialects are
/// declared so registries can describe them, and connecting to one
/// yields [`ConnectorError::UnsupportedDialect`]. External engines
/// plug in by implementing [`Connector`] directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Sqlite,
    MySql,
    Oracle,
}

impl Dialect {
    /// Resolves a dialect from its name, ignoring case.
    pub fn from_name(name: &str) -> Option<Dialect> {
        match name.to_lowercase().as_str() {
            "sqlite" => Some(Dialect::Sqlite),
            "mysql" => Some(Dialect::MySql),
            "oracle" => Some(Dialect::Oracle),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Sqlite => "sqlite",
            Dialect::MySql => "mysql",
            Dialect::Oracle => "oracle",
        }
    }
}

/// A named database endpoint test cases run against.
///
/// The identifier is derived from the connection coordinates and is
/// the key under which every status map and ledger file files results
/// for this target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    pub dialect: Dialect,
    pub host: String,
    pub port: u16,
    /// Database name; for SQLite this is the file path (`:memory:`
    /// works too).
    pub database: String,
    pub username: String,
    /// Stored as-is; secret management is out of scope.
    pub password: String,
}

impl Target {
    pub fn new(
        dialect: Dialect,
        host: impl Into<String>,
        port: u16,
        database: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            dialect,
            host: host.into(),
            port,
            database: database.into(),
            username: username.into(),
            password: password.into(),
        }
    }
}

#[async_trait]
impl Connector for Target {
    fn identifier(&self) -> String {
        format!(
            "{}@{}:{}/{}",
            self.username, self.host, self.port, self.database
        )
    }

    async fn connect(&self) -> Result<Box<dyn Session>, ConnectorError> {
        match self.dialect {
            Dialect::Sqlite => {
                let session = SqliteSession::open(&self.database, &self.identifier()).await?;
                Ok(Box::new(session))
            }
            Dialect::MySql | Dialect::Oracle => Err(ConnectorError::UnsupportedDialect(
                self.dialect.name().to_string(),
            )),
        }
    }
}

/// The durable registry of known targets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    pub targets: Vec<Target>,
}

impl TargetConfig {
    /// Registers a target. Returns false when one with the same
    /// identifier is already present.
    pub fn add_target(&mut self, target: Target) -> bool {
        if self.target(&target.identifier()).is_some() {
            return false;
        }
        self.targets.push(target);
        true
    }

    /// Looks up a target by its identifier.
    pub fn target(&self, identifier: &str) -> Option<&Target> {
        self.targets.iter().find(|t| t.identifier() == identifier)
    }

    /// Drops the target with the given identifier. Returns false when
    /// no such target was registered.
    pub fn remove_target(&mut self, identifier: &str) -> bool {
        let before = self.targets.len();
        self.targets.retain(|t| t.identifier() != identifier);
        self.targets.len() != before
    }
}
