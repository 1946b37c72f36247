use super::complete;
use super::parser::extract_sql;
use super::prompt::{build_query_prompt, sql_system_prompt};
use crate::db::EngineKind;
use crate::error::{DataChainError, Result};
use crate::llm::{LanguageModel, Message};
use crate::schema::SchemaCatalog;
use std::sync::Arc;
use std::time::Duration;

/// the failed statement and the engine's complaint, fed into the next attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correction {
    pub sql: String,
    pub error: String,
}

/// one model-proposed statement and the prompt that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateQuery {
    pub sql: String,
    pub prompt: String,
}

pub struct QueryGenerator {
    model: Arc<dyn LanguageModel>,
    dialect: EngineKind,
    max_rows: usize,
    timeout: Duration,
}

impl QueryGenerator {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        dialect: EngineKind,
        max_rows: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            model,
            dialect,
            max_rows,
            timeout,
        }
    }

    /// ask the model for a statement over `tables`. no validation happens
    /// here; the engine is the judge.
    #[tracing::instrument(
        skip(self, catalog, tables, question, correction),
        fields(tables = tables.len(), correcting = correction.is_some())
    )]
    pub async fn generate(
        &self,
        catalog: &SchemaCatalog,
        tables: &[String],
        question: &str,
        correction: Option<&Correction>,
    ) -> Result<CandidateQuery> {
        let schema_text = catalog.render_tables(tables);
        let prompt = build_query_prompt(
            self.dialect,
            &schema_text,
            question,
            self.max_rows,
            correction,
        );

        let messages = vec![
            Message::system(sql_system_prompt(self.dialect)),
            Message::user(prompt.clone()),
        ];

        let output = complete(self.model.as_ref(), messages, self.timeout)
            .await
            .map_err(|e| DataChainError::Generation(e.to_string()))?;

        let sql = extract_sql(&output)?;
        tracing::debug!(sql = %sql, "candidate query generated");

        Ok(CandidateQuery { sql, prompt })
    }
}
