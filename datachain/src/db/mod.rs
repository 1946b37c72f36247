//! Database collaborators, one per supported engine.
//!
//! The chain only ever talks to [`Database`]; engine specifics (introspection
//! queries, value decoding, error classification) stay inside the drivers.

pub mod mysql;
pub mod postgres;
pub mod sqlite;
pub mod value;

pub use mysql::MySqlDatabase;
pub use postgres::PostgresDatabase;
pub use sqlite::SqliteDatabase;
pub use value::{ResultSet, Value};

use crate::error::{DataChainError, Result};
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineKind {
    MySql,
    Postgres,
    Sqlite,
}

impl EngineKind {
    /// dialect name used in prompts
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::MySql => "mysql",
            EngineKind::Postgres => "postgresql",
            EngineKind::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineKind {
    type Err = DataChainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "mysql" => Ok(EngineKind::MySql),
            "postgres" | "postgresql" | "pgx" => Ok(EngineKind::Postgres),
            "sqlite" | "sqlite3" => Ok(EngineKind::Sqlite),
            other => Err(DataChainError::Config(format!(
                "unsupported engine: {}",
                other
            ))),
        }
    }
}

/// one column as reported by the engine, before type normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawColumn {
    pub table: String,
    pub name: String,
    pub declared_type: String,
    pub nullable: bool,
}

/// result of running one candidate statement
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Rows(ResultSet),
    /// the engine rejected the statement; message kept verbatim
    Error(String),
}

#[async_trait]
pub trait Database: Send + Sync {
    fn kind(&self) -> EngineKind;

    /// every user table column in the current database/schema, ordered by
    /// table then column position. fails with `Schema` when metadata cannot
    /// be read.
    async fn describe(&self) -> Result<Vec<RawColumn>>;

    /// run a statement keeping at most `max_rows` rows. statement-level
    /// failures come back as `ExecutionOutcome::Error`; `Err` is reserved for
    /// a broken connection (`Session`).
    async fn execute(&self, sql: &str, max_rows: usize) -> Result<ExecutionOutcome>;

    /// stop the statement currently running on this connection, if any.
    /// called after a timeout so the next statement does not queue behind it.
    async fn cancel(&self) -> Result<()>;

    /// release the connection; later calls fail with `Session`
    async fn close(&self) -> Result<()>;
}

/// open a driver for the given engine
#[tracing::instrument(skip(dsn), fields(engine = %kind))]
pub async fn connect(kind: EngineKind, dsn: &str) -> Result<Box<dyn Database>> {
    let db: Box<dyn Database> = match kind {
        EngineKind::Sqlite => Box::new(SqliteDatabase::open(dsn)?),
        EngineKind::Postgres => Box::new(PostgresDatabase::connect(dsn).await?),
        EngineKind::MySql => Box::new(MySqlDatabase::connect(dsn).await?),
    };
    tracing::info!("connected to {} database", kind);
    Ok(db)
}
