use super::complete;
use super::generator::CandidateQuery;
use super::prompt::{build_answer_prompt, ANSWER_SYSTEM_PROMPT};
use crate::db::ResultSet;
use crate::error::{DataChainError, Result};
use crate::llm::{LanguageModel, Message};
use std::sync::Arc;
use std::time::Duration;

/// fixed reply for an empty result set; never produced by the model
pub const NO_ROWS_ANSWER: &str = "no matching rows found";

pub struct AnswerSynthesizer {
    model: Arc<dyn LanguageModel>,
    timeout: Duration,
}

impl AnswerSynthesizer {
    pub fn new(model: Arc<dyn LanguageModel>, timeout: Duration) -> Self {
        Self { model, timeout }
    }

    /// phrase the rows as an answer to `question`
    #[tracing::instrument(skip(self, question, candidate, rows), fields(rows = rows.row_count()))]
    pub async fn synthesize(
        &self,
        question: &str,
        candidate: &CandidateQuery,
        rows: &ResultSet,
    ) -> Result<String> {
        if rows.is_empty() {
            return Ok(NO_ROWS_ANSWER.to_string());
        }

        let messages = vec![
            Message::system(ANSWER_SYSTEM_PROMPT),
            Message::user(build_answer_prompt(
                question,
                &candidate.sql,
                &rows.to_text_table(),
            )),
        ];

        let output = complete(self.model.as_ref(), messages, self.timeout)
            .await
            .map_err(|e| DataChainError::Synthesis(e.to_string()))?;

        let answer = output.trim();
        if answer.is_empty() {
            return Err(DataChainError::Synthesis(
                "model returned an empty answer".to_string(),
            ));
        }

        Ok(answer.to_string())
    }
}

/// answer text used when the model could not phrase one
pub fn degraded_answer(rows: &ResultSet) -> String {
    format!(
        "I could not summarize the result, here are the rows the query returned:\n{}",
        rows.to_text_table()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Value;
    use crate::llm::ScriptedModel;

    fn candidate() -> CandidateQuery {
        CandidateQuery {
            sql: "SELECT SUM(amount) AS sum FROM orders WHERE customer='Alice'".to_string(),
            prompt: String::new(),
        }
    }

    #[tokio::test]
    async fn test_empty_result_skips_model() {
        let model = Arc::new(ScriptedModel::constant("Alice bought 3 things"));
        let synthesizer = AnswerSynthesizer::new(Arc::clone(&model) as Arc<dyn LanguageModel>, Duration::from_secs(1));

        let empty = ResultSet::new(vec!["sum".to_string()], Vec::new());
        let answer = synthesizer.synthesize("q", &candidate(), &empty).await.unwrap();

        assert_eq!(answer, NO_ROWS_ANSWER);
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_prompt_carries_result_rows() {
        let model = Arc::new(ScriptedModel::constant("Alice spent 42.5 in total."));
        let synthesizer = AnswerSynthesizer::new(Arc::clone(&model) as Arc<dyn LanguageModel>, Duration::from_secs(1));

        let rows = ResultSet::new(vec!["sum".to_string()], vec![vec![Value::Real(42.5)]]);
        let answer = synthesizer
            .synthesize("what is the total amount for customer Alice", &candidate(), &rows)
            .await
            .unwrap();

        assert!(answer.contains("42.5"));
        let prompt = &model.calls()[0][1].content;
        assert!(prompt.contains("sql result:\nsum\n42.5"));
    }

    #[tokio::test]
    async fn test_blank_model_output_is_synthesis_error() {
        let model = Arc::new(ScriptedModel::constant("   "));
        let synthesizer = AnswerSynthesizer::new(model, Duration::from_secs(1));

        let rows = ResultSet::new(vec!["n".to_string()], vec![vec![Value::Integer(1)]]);
        let err = synthesizer.synthesize("q", &candidate(), &rows).await.unwrap_err();
        assert!(matches!(err, DataChainError::Synthesis(_)));
    }

    #[test]
    fn test_degraded_answer_embeds_rows() {
        let rows = ResultSet::new(vec!["sum".to_string()], vec![vec![Value::Real(42.5)]]);
        assert!(degraded_answer(&rows).ends_with("sum\n42.5"));
    }
}
