use super::answer::{Answer, AnswerStatus};
use super::executor::QueryExecutor;
use super::generator::{CandidateQuery, Correction, QueryGenerator};
use super::selector::{SelectionMode, TableSelector};
use super::synthesizer::{degraded_answer, AnswerSynthesizer};
use crate::config::SessionConfig;
use crate::db::{self, Database, ExecutionOutcome, ResultSet};
use crate::error::{DataChainError, Result};
use crate::llm::LanguageModel;
use crate::schema::{inspect, SchemaCatalog};
use std::sync::{Arc, RwLock};

const BLANK_QUESTION_ANSWER: &str = "Please ask a question about the data.";
const EMPTY_CATALOG_ANSWER: &str = "The database has no tables to query.";

/// one question-answering session over a single connection
pub struct DataChain {
    db: Box<dyn Database>,
    catalog: RwLock<Arc<SchemaCatalog>>,
    selector: TableSelector,
    generator: QueryGenerator,
    executor: QueryExecutor,
    synthesizer: AnswerSynthesizer,
    max_attempts: usize,
}

impl DataChain {
    /// connect to the configured engine and snapshot its schema
    pub async fn open(config: &SessionConfig, model: Arc<dyn LanguageModel>) -> Result<Self> {
        config.validate()?;
        let db = db::connect(config.engine, &config.dsn).await?;
        Self::new(db, model, config).await
    }

    /// build a chain over an already-open connection
    pub async fn new(
        db: Box<dyn Database>,
        model: Arc<dyn LanguageModel>,
        config: &SessionConfig,
    ) -> Result<Self> {
        config.validate()?;
        let catalog = inspect(db.as_ref()).await?;

        let mode = SelectionMode::from_all_tables(config.use_all_tables);
        tracing::info!(
            engine = %db.kind(),
            tables = catalog.len(),
            mode = ?mode,
            max_attempts = config.max_attempts,
            "data chain ready"
        );

        Ok(Self {
            selector: TableSelector::new(Arc::clone(&model), mode, config.llm_timeout),
            generator: QueryGenerator::new(
                Arc::clone(&model),
                db.kind(),
                config.max_rows,
                config.llm_timeout,
            ),
            executor: QueryExecutor::new(config.max_rows, config.query_timeout),
            synthesizer: AnswerSynthesizer::new(model, config.llm_timeout),
            catalog: RwLock::new(Arc::new(catalog)),
            max_attempts: config.max_attempts,
            db,
        })
    }

    /// current schema snapshot
    pub fn catalog(&self) -> Arc<SchemaCatalog> {
        match self.catalog.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// re-inspect the engine and swap in the new snapshot. questions already
    /// in flight keep the snapshot they started with.
    pub async fn refresh_schema(&self) -> Result<Arc<SchemaCatalog>> {
        let catalog = Arc::new(inspect(self.db.as_ref()).await?);
        match self.catalog.write() {
            Ok(mut guard) => *guard = Arc::clone(&catalog),
            Err(poisoned) => *poisoned.into_inner() = Arc::clone(&catalog),
        }
        Ok(catalog)
    }

    /// answer one question. only a `Session` error escapes; every other
    /// failure ends up in the returned answer.
    #[tracing::instrument(skip(self, question), fields(question_len = question.len()))]
    pub async fn ask(&self, question: &str) -> Result<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Ok(Answer::skipped(BLANK_QUESTION_ANSWER));
        }

        let catalog = self.catalog();
        if catalog.is_empty() {
            return Ok(Answer::skipped(EMPTY_CATALOG_ANSWER));
        }

        let tables = match self.selector.select(&catalog, question).await {
            Ok(tables) => tables,
            Err(DataChainError::Selection(reason)) => {
                tracing::warn!(reason = %reason, "table selection failed, using all tables");
                catalog.table_names()
            }
            Err(e) => return Err(e),
        };

        let mut attempts = 0;
        let mut correction: Option<Correction> = None;
        let mut last_error: Option<String> = None;

        while attempts < self.max_attempts {
            attempts += 1;
            tracing::info!("answer attempt {}/{}", attempts, self.max_attempts);

            let candidate = match self
                .generator
                .generate(&catalog, &tables, question, correction.as_ref())
                .await
            {
                Ok(candidate) => candidate,
                Err(DataChainError::Generation(reason)) => {
                    tracing::warn!("generation attempt {} failed: {}", attempts, reason);
                    last_error = Some(reason);
                    continue;
                }
                Err(e) => return Err(e),
            };

            match self.executor.execute(self.db.as_ref(), &candidate).await? {
                ExecutionOutcome::Rows(rows) => {
                    tracing::info!("question answered on attempt {}", attempts);
                    return Ok(self.finish(question, candidate, rows, attempts).await);
                }
                ExecutionOutcome::Error(err) => {
                    tracing::warn!("execution attempt {} failed: {}", attempts, err);
                    last_error = Some(err.clone());
                    correction = Some(Correction {
                        sql: candidate.sql,
                        error: err,
                    });
                }
            }
        }

        tracing::warn!(attempts, "correction attempts exhausted");
        Ok(Answer::exhausted(attempts, last_error.as_deref()))
    }

    async fn finish(
        &self,
        question: &str,
        candidate: CandidateQuery,
        rows: ResultSet,
        attempts: usize,
    ) -> Answer {
        let (text, status) = match self.synthesizer.synthesize(question, &candidate, &rows).await {
            Ok(text) if rows.is_empty() => (text, AnswerStatus::NoRows),
            Ok(text) => (text, AnswerStatus::Answered),
            Err(e) => {
                tracing::warn!("answer synthesis degraded: {}", e);
                (degraded_answer(&rows), AnswerStatus::Degraded)
            }
        };

        Answer {
            text,
            status,
            sql: Some(candidate.sql),
            rows: Some(rows),
            attempts,
        }
    }

    /// release the connection
    pub async fn close(self) -> Result<()> {
        self.db.close().await?;
        tracing::info!("data chain closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::prompt::{ANSWER_SYSTEM_PROMPT, SELECT_TABLES_SYSTEM_PROMPT};
    use crate::chain::synthesizer::NO_ROWS_ANSWER;
    use crate::chain::testing::{orders_columns, StubDatabase};
    use crate::db::{EngineKind, RawColumn, Value};
    use crate::llm::{Message, ScriptedModel};

    fn config() -> SessionConfig {
        SessionConfig::new(EngineKind::Sqlite, ":memory:")
    }

    /// route on the system prompt so one stub can play every component
    fn routed(
        select: &'static str,
        sql: &'static str,
        answer: &'static str,
    ) -> impl Fn(&[Message]) -> Result<String> + Send + Sync + 'static {
        move |messages: &[Message]| {
            let system = messages[0].content.as_str();
            if system == SELECT_TABLES_SYSTEM_PROMPT {
                Ok(select.to_string())
            } else if system == ANSWER_SYSTEM_PROMPT {
                Ok(answer.to_string())
            } else {
                Ok(sql.to_string())
            }
        }
    }

    fn sum_rows() -> ResultSet {
        ResultSet::new(vec!["sum".to_string()], vec![vec![Value::Real(42.5)]])
    }

    async fn chain(db: StubDatabase, model: Arc<ScriptedModel>, config: SessionConfig) -> DataChain {
        DataChain::new(Box::new(db), model, &config).await.unwrap()
    }

    #[tokio::test]
    async fn test_answers_from_rows() {
        let db = StubDatabase::with_outcome(ExecutionOutcome::Rows(sum_rows()));
        let model = Arc::new(ScriptedModel::from_fn(routed(
            "orders",
            "SELECT SUM(amount) FROM orders WHERE customer='Alice'",
            "Alice's orders total 42.5.",
        )));
        let chain = chain(db.clone(), Arc::clone(&model), config()).await;

        let answer = chain
            .ask("what is the total amount for customer Alice")
            .await
            .unwrap();

        assert_eq!(answer.status, AnswerStatus::Answered);
        assert!(answer.text.contains("42.5"));
        assert_eq!(answer.attempts, 1);
        assert_eq!(
            answer.sql.as_deref(),
            Some("SELECT SUM(amount) FROM orders WHERE customer='Alice'")
        );
        assert_eq!(db.executed().len(), 1);
    }

    #[tokio::test]
    async fn test_exhausts_after_exactly_max_attempts() {
        let db = StubDatabase::with_outcome(ExecutionOutcome::Error(
            "no such column: totl".to_string(),
        ));
        let model = Arc::new(ScriptedModel::from_fn(routed(
            "orders",
            "SELECT totl FROM orders",
            "unused",
        )));
        let chain = chain(db.clone(), Arc::clone(&model), config()).await;

        let answer = chain.ask("total?").await.unwrap();

        assert_eq!(answer.status, AnswerStatus::Exhausted);
        assert_eq!(answer.attempts, 3);
        assert!(answer.text.contains("no such column"));
        assert_eq!(db.executed().len(), 3);
        // one generation per attempt, no synthesis
        assert_eq!(model.call_count(), 3);
    }

    #[tokio::test]
    async fn test_correction_feeds_error_back() {
        let db = StubDatabase::from_fn(|sql| {
            if sql.contains("totl") {
                ExecutionOutcome::Error("no such column: totl".to_string())
            } else {
                ExecutionOutcome::Rows(sum_rows())
            }
        });
        let model = Arc::new(ScriptedModel::from_fn(|messages: &[Message]| {
            let system = messages[0].content.as_str();
            if system == ANSWER_SYSTEM_PROMPT {
                return Ok("42.5".to_string());
            }
            if messages[1].content.contains("no such column: totl") {
                Ok("SELECT SUM(amount) AS sum FROM orders".to_string())
            } else {
                Ok("SELECT totl FROM orders".to_string())
            }
        }));
        let chain = chain(db.clone(), model, config()).await;

        let answer = chain.ask("total?").await.unwrap();

        assert_eq!(answer.status, AnswerStatus::Answered);
        assert_eq!(answer.attempts, 2);
        assert_eq!(
            db.executed(),
            vec!["SELECT totl FROM orders", "SELECT SUM(amount) AS sum FROM orders"]
        );
    }

    #[tokio::test]
    async fn test_generation_failures_consume_attempts() {
        let db = StubDatabase::with_outcome(ExecutionOutcome::Rows(sum_rows()));
        let model = Arc::new(ScriptedModel::from_fn(|_| {
            Err(DataChainError::Model("model call timed out".to_string()))
        }));
        let chain = chain(db.clone(), model, config().with_max_attempts(2)).await;

        let answer = chain.ask("total?").await.unwrap();

        assert_eq!(answer.status, AnswerStatus::Exhausted);
        assert_eq!(answer.attempts, 2);
        assert!(answer.text.contains("timed out"));
        assert!(db.executed().is_empty());
    }

    #[tokio::test]
    async fn test_selection_failure_falls_back_to_all_tables() {
        let mut columns = orders_columns();
        columns.push(RawColumn {
            table: "customers".to_string(),
            name: "name".to_string(),
            declared_type: "TEXT".to_string(),
            nullable: true,
        });
        let db = StubDatabase::with_outcome(ExecutionOutcome::Rows(sum_rows())).with_columns(columns);
        let model = Arc::new(ScriptedModel::from_fn(routed(
            "invoices\nrefunds",
            "SELECT SUM(amount) FROM orders",
            "42.5",
        )));
        let chain = chain(db, Arc::clone(&model), config().with_all_tables(false)).await;

        let answer = chain.ask("total?").await.unwrap();
        assert_eq!(answer.status, AnswerStatus::Answered);

        // second call is generation; it must see both tables
        let generation_prompt = &model.calls()[1][1].content;
        assert!(generation_prompt.contains("orders("));
        assert!(generation_prompt.contains("customers("));
    }

    #[tokio::test]
    async fn test_empty_rows_use_fixed_answer() {
        let empty = ResultSet::new(vec!["sum".to_string()], Vec::new());
        let db = StubDatabase::with_outcome(ExecutionOutcome::Rows(empty));
        let model = Arc::new(ScriptedModel::from_fn(routed(
            "orders",
            "SELECT * FROM orders WHERE customer='Zed'",
            "Zed bought a boat",
        )));
        let chain = chain(db, Arc::clone(&model), config()).await;

        let answer = chain.ask("what did Zed buy?").await.unwrap();

        assert_eq!(answer.status, AnswerStatus::NoRows);
        assert_eq!(answer.text, NO_ROWS_ANSWER);
        assert!(model
            .calls()
            .iter()
            .all(|call| call[0].content != ANSWER_SYSTEM_PROMPT));
    }

    #[tokio::test]
    async fn test_synthesis_failure_degrades_to_rows() {
        let db = StubDatabase::with_outcome(ExecutionOutcome::Rows(sum_rows()));
        let model = Arc::new(ScriptedModel::from_fn(|messages: &[Message]| {
            if messages[0].content == ANSWER_SYSTEM_PROMPT {
                Err(DataChainError::Model("api error 429".to_string()))
            } else {
                Ok("SELECT SUM(amount) AS sum FROM orders".to_string())
            }
        }));
        let chain = chain(db, model, config()).await;

        let answer = chain.ask("total?").await.unwrap();

        assert_eq!(answer.status, AnswerStatus::Degraded);
        assert!(answer.text.contains("42.5"));
        assert!(!answer.text.contains("429"));
    }

    #[tokio::test]
    async fn test_same_question_same_answer() {
        let db = StubDatabase::with_outcome(ExecutionOutcome::Rows(sum_rows()));
        let model = Arc::new(ScriptedModel::from_fn(routed(
            "orders",
            "SELECT SUM(amount) FROM orders",
            "The total is 42.5.",
        )));
        let chain = chain(db, model, config()).await;

        let first = chain.ask("total?").await.unwrap();
        let second = chain.ask("total?").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_session_error_escapes() {
        let db = StubDatabase::with_outcome(ExecutionOutcome::Rows(sum_rows()));
        let model = Arc::new(ScriptedModel::constant("SELECT 1"));
        let chain = chain(db.clone(), model, config()).await;

        db.close().await.unwrap();
        let err = chain.ask("total?").await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_blank_question_and_empty_catalog_skip_model() {
        let model = Arc::new(ScriptedModel::constant("SELECT 1"));

        let db = StubDatabase::with_outcome(ExecutionOutcome::Rows(sum_rows()));
        let chain_with_tables = chain(db, Arc::clone(&model), config()).await;
        let answer = chain_with_tables.ask("   ").await.unwrap();
        assert_eq!(answer.status, AnswerStatus::Skipped);

        let empty_db = StubDatabase::with_outcome(ExecutionOutcome::Rows(sum_rows()))
            .with_columns(Vec::new());
        let empty_chain = chain(empty_db, Arc::clone(&model), config()).await;
        let answer = empty_chain.ask("total?").await.unwrap();
        assert_eq!(answer.status, AnswerStatus::Skipped);

        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_refresh_schema_swaps_snapshot() {
        let db = StubDatabase::with_outcome(ExecutionOutcome::Rows(sum_rows()));
        let model = Arc::new(ScriptedModel::constant("SELECT 1"));
        let chain = chain(db.clone(), model, config()).await;
        let before = chain.catalog();
        assert_eq!(before.table_names(), vec!["orders"]);

        let mut columns = orders_columns();
        columns.push(RawColumn {
            table: "refunds".to_string(),
            name: "amount".to_string(),
            declared_type: "REAL".to_string(),
            nullable: true,
        });
        db.set_columns(columns);

        chain.refresh_schema().await.unwrap();
        assert_eq!(chain.catalog().table_names(), vec!["orders", "refunds"]);
        // old snapshot is untouched
        assert_eq!(before.table_names(), vec!["orders"]);
    }
}
