use super::{Database, EngineKind, ExecutionOutcome, RawColumn, ResultSet, Value};
use crate::error::{DataChainError, Result};
use async_trait::async_trait;
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, Opts, Pool};
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::sync::Mutex;

const COLUMNS_QUERY: &str = "SELECT TABLE_NAME, COLUMN_NAME, COLUMN_TYPE, IS_NULLABLE \
     FROM information_schema.COLUMNS \
     WHERE TABLE_SCHEMA = DATABASE() \
     ORDER BY TABLE_NAME, ORDINAL_POSITION";

/// go-driver style dsn: `user:pwd@tcp(host:port)/db?params`
static GO_DSN_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<auth>[^@]*)@(?:tcp)?\((?P<addr>[^)]*)\)/(?P<rest>.*)$").unwrap()
});

pub struct MySqlDatabase {
    pool: Mutex<Option<Pool>>,
    /// server thread id of the connection running a statement. a dropped
    /// execute future leaves it set so a later cancel can still find it.
    running: std::sync::Mutex<Option<u32>>,
}

/// accept both `mysql://` urls and the `user:pwd@tcp(host:port)/db` form
pub fn normalize_dsn(dsn: &str) -> String {
    let dsn = dsn.trim();
    if dsn.starts_with("mysql://") {
        return dsn.to_string();
    }
    match GO_DSN_REGEX.captures(dsn) {
        Some(caps) => {
            let auth = &caps["auth"];
            let addr = if caps["addr"].is_empty() {
                "localhost:3306"
            } else {
                &caps["addr"]
            };
            let rest = &caps["rest"];
            if auth.is_empty() {
                format!("mysql://{}/{}", addr, rest)
            } else {
                format!("mysql://{}@{}/{}", auth, addr, rest)
            }
        }
        None => format!("mysql://{}", dsn),
    }
}

impl MySqlDatabase {
    pub async fn connect(dsn: &str) -> Result<Self> {
        let url = normalize_dsn(dsn);
        let opts = Opts::from_url(&url)
            .map_err(|e| DataChainError::Config(format!("invalid mysql dsn: {}", e)))?;
        let pool = Pool::new(opts);

        // fail fast on bad credentials instead of on the first question
        let conn = pool
            .get_conn()
            .await
            .map_err(|e| DataChainError::Session(format!("mysql connect failed: {}", e)))?;
        drop(conn);

        Ok(Self {
            pool: Mutex::new(Some(pool)),
            running: std::sync::Mutex::new(None),
        })
    }

    fn set_running(&self, id: Option<u32>) {
        match self.running.lock() {
            Ok(mut guard) => *guard = id,
            Err(poisoned) => *poisoned.into_inner() = id,
        }
    }

    fn take_running(&self) -> Option<u32> {
        match self.running.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    async fn pool(&self) -> Result<Pool> {
        self.pool
            .lock()
            .await
            .clone()
            .ok_or_else(|| DataChainError::Session("mysql connection is closed".to_string()))
    }
}

fn classify(err: mysql_async::Error) -> Result<ExecutionOutcome> {
    match err {
        mysql_async::Error::Server(server) => Ok(ExecutionOutcome::Error(server.message)),
        other => Err(DataChainError::Session(format!("mysql error: {}", other))),
    }
}

fn decode(value: mysql_async::Value) -> Value {
    use mysql_async::Value as My;
    match value {
        My::NULL => Value::Null,
        My::Int(v) => Value::Integer(v),
        My::UInt(v) => i64::try_from(v).map_or_else(|_| Value::Text(v.to_string()), Value::Integer),
        My::Float(v) => Value::Real(f64::from(v)),
        My::Double(v) => Value::Real(v),
        My::Bytes(bytes) => match String::from_utf8(bytes) {
            Ok(text) => Value::Text(text),
            Err(e) => Value::Blob(e.into_bytes()),
        },
        other => Value::Text(other.as_sql(true).trim_matches('\'').to_string()),
    }
}

#[async_trait]
impl Database for MySqlDatabase {
    fn kind(&self) -> EngineKind {
        EngineKind::MySql
    }

    async fn describe(&self) -> Result<Vec<RawColumn>> {
        let mut conn = self
            .pool()
            .await?
            .get_conn()
            .await
            .map_err(|e| DataChainError::Session(format!("mysql connection failed: {}", e)))?;

        let rows: Vec<(String, String, String, String)> = conn
            .query(COLUMNS_QUERY)
            .await
            .map_err(|e| DataChainError::Schema(format!("mysql introspection failed: {}", e)))?;

        Ok(rows
            .into_iter()
            .map(|(table, name, declared_type, nullable)| RawColumn {
                table,
                name,
                declared_type,
                nullable: nullable.eq_ignore_ascii_case("YES"),
            })
            .collect())
    }

    async fn execute(&self, sql: &str, max_rows: usize) -> Result<ExecutionOutcome> {
        let mut conn = self
            .pool()
            .await?
            .get_conn()
            .await
            .map_err(|e| DataChainError::Session(format!("mysql connection failed: {}", e)))?;

        self.set_running(Some(conn.id()));
        let outcome = read_capped(&mut conn, sql, max_rows).await;
        self.set_running(None);
        outcome
    }

    async fn cancel(&self) -> Result<()> {
        let Some(id) = self.take_running() else {
            return Ok(());
        };

        // the busy connection cannot take commands, so kill from another one
        let mut conn = self
            .pool()
            .await?
            .get_conn()
            .await
            .map_err(|e| DataChainError::Session(format!("mysql connection failed: {}", e)))?;
        conn.query_drop(kill_query(id))
            .await
            .map_err(|e| DataChainError::Session(format!("mysql cancel failed: {}", e)))?;
        tracing::debug!(connection_id = id, "killed running mysql query");
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if let Some(pool) = self.pool.lock().await.take() {
            pool.disconnect()
                .await
                .map_err(|e| DataChainError::Session(format!("mysql disconnect failed: {}", e)))?;
        }
        Ok(())
    }
}

fn kill_query(id: u32) -> String {
    format!("KILL QUERY {}", id)
}

async fn read_capped(conn: &mut Conn, sql: &str, max_rows: usize) -> Result<ExecutionOutcome> {
    let mut stream = match conn.query_iter(sql).await {
        Ok(stream) => stream,
        Err(e) => return classify(e),
    };

    let columns = stream
        .columns_ref()
        .iter()
        .map(|c| c.name_str().into_owned())
        .collect();
    let mut result = ResultSet::new(columns, Vec::new());

    loop {
        let row = match stream.next().await {
            Ok(Some(row)) => row,
            Ok(None) => break,
            Err(e) => return classify(e),
        };
        if result.rows.len() == max_rows {
            result.truncated = true;
            break;
        }
        let values = (0..row.len())
            .map(|idx| row.as_ref(idx).cloned().map_or(Value::Null, decode))
            .collect();
        result.rows.push(values);
    }

    // drain whatever is left so the pooled connection stays usable
    if let Err(e) = stream.drop_result().await {
        return classify(e);
    }

    Ok(ExecutionOutcome::Rows(result))
}
