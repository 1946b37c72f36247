use super::{Database, EngineKind, ExecutionOutcome, RawColumn, ResultSet, Value};
use crate::error::{DataChainError, Result};
use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use tokio::sync::RwLock;
use tokio_postgres::{CancelToken, Client, NoTls, SimpleQueryMessage};

const COLUMNS_QUERY: &str = "SELECT table_name::text, column_name::text, \
     CASE WHEN data_type = 'USER-DEFINED' THEN udt_name::text ELSE data_type::text END, \
     is_nullable::text \
     FROM information_schema.columns \
     WHERE table_schema = current_schema() \
     ORDER BY table_name, ordinal_position";

pub struct PostgresDatabase {
    client: RwLock<Option<Client>>,
    cancel_token: CancelToken,
}

impl PostgresDatabase {
    pub async fn connect(dsn: &str) -> Result<Self> {
        let (client, connection) = tokio_postgres::connect(dsn, NoTls)
            .await
            .map_err(|e| DataChainError::Session(format!("postgres connect failed: {}", e)))?;

        // the connection object drives the socket until the client is dropped
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("postgres connection error: {}", e);
            }
        });

        Ok(Self {
            cancel_token: client.cancel_token(),
            client: RwLock::new(Some(client)),
        })
    }
}

/// split a driver error into a statement rejection or a dead connection
fn classify(err: tokio_postgres::Error) -> Result<ExecutionOutcome> {
    if err.is_closed() {
        return Err(DataChainError::Session(format!(
            "postgres connection closed: {}",
            err
        )));
    }
    match err.as_db_error() {
        Some(db_err) => Ok(ExecutionOutcome::Error(db_err.to_string())),
        None => Err(DataChainError::Session(format!("postgres error: {}", err))),
    }
}

/// accumulates one statement's rows up to the fetch cap
struct RowCollector {
    result: ResultSet,
    max_rows: usize,
}

impl RowCollector {
    fn new(max_rows: usize) -> Self {
        Self {
            result: ResultSet::default(),
            max_rows,
        }
    }

    /// column names arrive before any row, and also for an empty result.
    /// a multi-statement string reports the last statement.
    fn describe(&mut self, columns: Vec<String>) {
        self.result = ResultSet::new(columns, Vec::new());
    }

    /// false once the cap is passed and reading should stop
    fn push(&mut self, values: Vec<Value>) -> bool {
        if self.result.rows.len() == self.max_rows {
            self.result.truncated = true;
            return false;
        }
        self.result.rows.push(values);
        true
    }

    fn finish(self) -> ExecutionOutcome {
        ExecutionOutcome::Rows(self.result)
    }
}

/// read messages until the cap is passed. dropping the stream early lets the
/// connection discard the remaining rows without buffering them.
async fn collect_rows<S>(stream: S, max_rows: usize) -> Result<ExecutionOutcome>
where
    S: Stream<Item = std::result::Result<SimpleQueryMessage, tokio_postgres::Error>>,
{
    let mut stream = std::pin::pin!(stream);
    let mut collector = RowCollector::new(max_rows);

    while let Some(message) = stream.next().await {
        let message = match message {
            Ok(message) => message,
            Err(e) => return classify(e),
        };
        match message {
            SimpleQueryMessage::RowDescription(columns) => {
                collector.describe(columns.iter().map(|c| c.name().to_string()).collect());
            }
            SimpleQueryMessage::Row(row) => {
                let values = (0..row.len()).map(|idx| Value::from(row.get(idx))).collect();
                if !collector.push(values) {
                    break;
                }
            }
            _ => {}
        }
    }

    Ok(collector.finish())
}

#[async_trait]
impl Database for PostgresDatabase {
    fn kind(&self) -> EngineKind {
        EngineKind::Postgres
    }

    async fn describe(&self) -> Result<Vec<RawColumn>> {
        let guard = self.client.read().await;
        let client = guard
            .as_ref()
            .ok_or_else(|| DataChainError::Session("postgres connection is closed".to_string()))?;

        let rows = client
            .query(COLUMNS_QUERY, &[])
            .await
            .map_err(|e| DataChainError::Schema(format!("postgres introspection failed: {}", e)))?;

        rows.iter()
            .map(|row| {
                Ok(RawColumn {
                    table: row.try_get(0)?,
                    name: row.try_get(1)?,
                    declared_type: row.try_get(2)?,
                    nullable: row.try_get::<_, String>(3)? == "YES",
                })
            })
            .collect::<std::result::Result<Vec<_>, tokio_postgres::Error>>()
            .map_err(|e| DataChainError::Schema(format!("unexpected postgres metadata: {}", e)))
    }

    async fn execute(&self, sql: &str, max_rows: usize) -> Result<ExecutionOutcome> {
        let guard = self.client.read().await;
        let client = guard
            .as_ref()
            .ok_or_else(|| DataChainError::Session("postgres connection is closed".to_string()))?;

        // the simple protocol returns every column as text, which is all the
        // prompt and the fallback table need
        match client.simple_query_raw(sql).await {
            Ok(stream) => collect_rows(stream, max_rows).await,
            Err(e) => classify(e),
        }
    }

    async fn cancel(&self) -> Result<()> {
        self.cancel_token
            .cancel_query(NoTls)
            .await
            .map_err(|e| DataChainError::Session(format!("postgres cancel failed: {}", e)))
    }

    async fn close(&self) -> Result<()> {
        // dropping the client ends the spawned connection task
        self.client.write().await.take();
        Ok(())
    }
}
