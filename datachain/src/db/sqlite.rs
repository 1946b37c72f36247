use super::{Database, EngineKind, ExecutionOutcome, RawColumn, ResultSet, Value};
use crate::error::{DataChainError, Result};
use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, InterruptHandle};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

const TABLES_QUERY: &str = "SELECT name FROM sqlite_master \
     WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name";

pub struct SqliteDatabase {
    conn: Arc<Mutex<Option<Connection>>>,
    interrupt: Arc<InterruptHandle>,
}

/// interrupts the statement when the awaiting future goes away before the
/// blocking task finished, so a timed out query releases the connection
struct InterruptOnDrop {
    handle: Arc<InterruptHandle>,
    cancelled: Arc<AtomicBool>,
    armed: bool,
}

impl Drop for InterruptOnDrop {
    fn drop(&mut self) {
        if self.armed {
            // the flag covers a statement that has not started yet
            self.cancelled.store(true, Ordering::SeqCst);
            self.handle.interrupt();
        }
    }
}

impl SqliteDatabase {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|e| {
            DataChainError::Session(format!("failed to open {}: {}", path.display(), e))
        })?;
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| DataChainError::Session(format!("failed to open in-memory db: {}", e)))?;
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        let interrupt = Arc::new(conn.get_interrupt_handle());
        Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            interrupt,
        }
    }

    /// run `f` against the connection on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> T + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| DataChainError::Session("sqlite connection lock poisoned".to_string()))?;
            let conn = guard
                .as_ref()
                .ok_or_else(|| DataChainError::Session("sqlite connection is closed".to_string()))?;
            Ok::<_, DataChainError>(f(conn))
        })
        .await
        .map_err(|e| DataChainError::Session(format!("task join error: {}", e)))?
    }
}

fn describe_tables(conn: &Connection) -> rusqlite::Result<Vec<RawColumn>> {
    let mut stmt = conn.prepare(TABLES_QUERY)?;
    let tables = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut columns = Vec::new();
    for table in tables {
        let pragma = format!("PRAGMA table_info(\"{}\")", table.replace('"', "\"\""));
        let mut stmt = conn.prepare(&pragma)?;
        let rows = stmt.query_map([], |row| {
            Ok(RawColumn {
                table: table.clone(),
                name: row.get(1)?,
                declared_type: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                nullable: row.get::<_, i64>(3)? == 0,
            })
        })?;
        for column in rows {
            columns.push(column?);
        }
    }

    Ok(columns)
}

fn fetch_rows(conn: &Connection, sql: &str, max_rows: usize) -> rusqlite::Result<ResultSet> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

    let mut rows = stmt.query([])?;
    let mut result = ResultSet::new(columns, Vec::new());

    while let Some(row) = rows.next()? {
        if result.rows.len() == max_rows {
            result.truncated = true;
            break;
        }
        let mut values = Vec::with_capacity(result.columns.len());
        for idx in 0..result.columns.len() {
            values.push(decode(row.get_ref(idx)?));
        }
        result.rows.push(values);
    }

    Ok(result)
}

fn decode(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Integer(v),
        ValueRef::Real(v) => Value::Real(v),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    fn kind(&self) -> EngineKind {
        EngineKind::Sqlite
    }

    async fn describe(&self) -> Result<Vec<RawColumn>> {
        self.with_conn(describe_tables)
            .await?
            .map_err(|e| DataChainError::Schema(format!("sqlite introspection failed: {}", e)))
    }

    async fn execute(&self, sql: &str, max_rows: usize) -> Result<ExecutionOutcome> {
        let sql = sql.to_string();
        let cancelled = Arc::new(AtomicBool::new(false));
        let mut guard = InterruptOnDrop {
            handle: Arc::clone(&self.interrupt),
            cancelled: Arc::clone(&cancelled),
            armed: true,
        };

        let outcome = self
            .with_conn(move |conn| {
                if cancelled.load(Ordering::SeqCst) {
                    return ExecutionOutcome::Error("interrupted".to_string());
                }
                match fetch_rows(conn, &sql, max_rows) {
                    Ok(rows) => ExecutionOutcome::Rows(rows),
                    Err(e) => ExecutionOutcome::Error(e.to_string()),
                }
            })
            .await;
        guard.armed = false;
        outcome
    }

    async fn cancel(&self) -> Result<()> {
        // no-op when nothing is running
        self.interrupt.interrupt();
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let conn = Arc::clone(&self.conn);
        let taken = {
            let mut guard = conn
                .lock()
                .map_err(|_| DataChainError::Session("sqlite connection lock poisoned".to_string()))?;
            guard.take()
        };
        if let Some(conn) = taken {
            conn.close()
                .map_err(|(_, e)| DataChainError::Session(format!("failed to close sqlite: {}", e)))?;
        }
        Ok(())
    }
}
