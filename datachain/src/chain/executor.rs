use super::generator::CandidateQuery;
use crate::db::{Database, ExecutionOutcome};
use crate::error::Result;
use std::time::Duration;

pub struct QueryExecutor {
    max_rows: usize,
    timeout: Duration,
}

impl QueryExecutor {
    pub fn new(max_rows: usize, timeout: Duration) -> Self {
        Self { max_rows, timeout }
    }

    /// run a candidate. a rejected statement or an engine timeout is an
    /// `ExecutionOutcome::Error`; only a dead connection is an `Err`.
    #[tracing::instrument(skip(self, db, candidate), fields(sql_len = candidate.sql.len(), max_rows = self.max_rows))]
    pub async fn execute(
        &self,
        db: &dyn Database,
        candidate: &CandidateQuery,
    ) -> Result<ExecutionOutcome> {
        let outcome = match tokio::time::timeout(self.timeout, db.execute(&candidate.sql, self.max_rows)).await {
            Ok(outcome) => outcome?,
            Err(_) => {
                // the engine keeps running the statement unless told otherwise
                if let Err(e) = db.cancel().await {
                    tracing::warn!(error = %e, "failed to cancel timed out query");
                }
                ExecutionOutcome::Error(format!(
                    "query timed out after {} ms",
                    self.timeout.as_millis()
                ))
            }
        };

        match &outcome {
            ExecutionOutcome::Rows(rows) => tracing::info!(
                rows = rows.row_count(),
                truncated = rows.truncated,
                "query executed"
            ),
            ExecutionOutcome::Error(err) => tracing::warn!(error = %err, "query rejected"),
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::testing::StubDatabase;
    use crate::db::{ResultSet, SqliteDatabase, Value};
    use crate::error::DataChainError;

    fn candidate(sql: &str) -> CandidateQuery {
        CandidateQuery {
            sql: sql.to_string(),
            prompt: String::new(),
        }
    }

    #[tokio::test]
    async fn test_execute_passes_rows_through() {
        let rows = ResultSet::new(vec!["sum".to_string()], vec![vec![Value::Real(42.5)]]);
        let db = StubDatabase::with_outcome(ExecutionOutcome::Rows(rows.clone()));
        let executor = QueryExecutor::new(10, Duration::from_secs(1));

        let outcome = executor.execute(&db, &candidate("SELECT 1")).await.unwrap();
        assert_eq!(outcome, ExecutionOutcome::Rows(rows));
        assert_eq!(db.executed(), vec!["SELECT 1"]);
    }

    #[tokio::test]
    async fn test_timeout_becomes_execution_error() {
        let db = StubDatabase::with_outcome(ExecutionOutcome::Error("unused".to_string()))
            .with_delay(Duration::from_secs(2));
        let executor = QueryExecutor::new(10, Duration::from_millis(20));

        let outcome = executor.execute(&db, &candidate("SELECT pg_sleep(10)")).await.unwrap();
        assert_eq!(
            outcome,
            ExecutionOutcome::Error("query timed out after 20 ms".to_string())
        );
        assert_eq!(db.cancelled(), 1);
    }

    #[tokio::test]
    async fn test_timeout_leaves_sqlite_connection_usable() {
        let db = SqliteDatabase::open_in_memory().unwrap();
        let executor = QueryExecutor::new(10, Duration::from_millis(200));

        let slow = candidate(
            "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c WHERE x < 300000000) \
             SELECT COUNT(*) FROM c",
        );
        let outcome = executor.execute(&db, &slow).await.unwrap();
        assert_eq!(
            outcome,
            ExecutionOutcome::Error("query timed out after 200 ms".to_string())
        );

        let outcome = executor.execute(&db, &candidate("SELECT 1")).await.unwrap();
        assert_eq!(
            outcome,
            ExecutionOutcome::Rows(ResultSet::new(
                vec!["1".to_string()],
                vec![vec![Value::Integer(1)]]
            ))
        );
    }

    #[tokio::test]
    async fn test_session_error_propagates() {
        let db = StubDatabase::with_outcome(ExecutionOutcome::Error("unused".to_string()));
        db.close().await.unwrap();
        let executor = QueryExecutor::new(10, Duration::from_secs(1));

        let err = executor.execute(&db, &candidate("SELECT 1")).await.unwrap_err();
        assert!(matches!(err, DataChainError::Session(_)));
    }
}
