use super::complete;
use super::parser::parse_table_names;
use super::prompt::{build_selection_prompt, SELECT_TABLES_SYSTEM_PROMPT};
use crate::error::{DataChainError, Result};
use crate::llm::{LanguageModel, Message};
use crate::schema::SchemaCatalog;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    /// ground every question on the whole catalog
    AllTables,
    /// ask the model which tables matter for each question
    Selective,
}

impl SelectionMode {
    pub fn from_all_tables(use_all_tables: bool) -> Self {
        if use_all_tables {
            SelectionMode::AllTables
        } else {
            SelectionMode::Selective
        }
    }
}

pub struct TableSelector {
    model: Arc<dyn LanguageModel>,
    mode: SelectionMode,
    timeout: Duration,
}

impl TableSelector {
    pub fn new(model: Arc<dyn LanguageModel>, mode: SelectionMode, timeout: Duration) -> Self {
        Self {
            model,
            mode,
            timeout,
        }
    }

    /// tables the generator should be grounded on. in selective mode a
    /// `Selection` error means the model named nothing usable.
    #[tracing::instrument(skip(self, catalog, question), fields(mode = ?self.mode, catalog_tables = catalog.len()))]
    pub async fn select(&self, catalog: &SchemaCatalog, question: &str) -> Result<Vec<String>> {
        match self.mode {
            SelectionMode::AllTables => Ok(catalog.table_names()),
            SelectionMode::Selective => self.select_with_model(catalog, question).await,
        }
    }

    async fn select_with_model(&self, catalog: &SchemaCatalog, question: &str) -> Result<Vec<String>> {
        let messages = vec![
            Message::system(SELECT_TABLES_SYSTEM_PROMPT),
            Message::user(build_selection_prompt(&catalog.render_names(), question)),
        ];

        let output = complete(self.model.as_ref(), messages, self.timeout)
            .await
            .map_err(|e| DataChainError::Selection(e.to_string()))?;

        let selected = resolve_tables(catalog, &parse_table_names(&output));
        if selected.is_empty() {
            return Err(DataChainError::Selection(format!(
                "model named no known tables: {}",
                output.trim()
            )));
        }

        tracing::info!(tables = ?selected, "tables selected");
        Ok(selected)
    }
}

/// map candidate names onto catalog keys, dropping unknown names and repeats
pub fn resolve_tables(catalog: &SchemaCatalog, candidates: &[String]) -> Vec<String> {
    let mut selected: Vec<String> = Vec::new();

    for candidate in candidates {
        // tolerate schema-qualified names like public.orders
        let resolved = catalog.resolve(candidate).or_else(|| {
            candidate
                .rsplit('.')
                .next()
                .and_then(|bare| catalog.resolve(bare))
        });

        match resolved {
            Some(name) if !selected.iter().any(|s| s == name) => selected.push(name.to_string()),
            Some(_) => {}
            None => tracing::debug!(candidate = %candidate, "discarding unknown table"),
        }
    }

    selected
}
