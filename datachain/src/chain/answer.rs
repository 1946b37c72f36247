use crate::db::ResultSet;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerStatus {
    /// the model phrased an answer from the rows
    Answered,
    /// the query ran and matched nothing
    NoRows,
    /// the query ran but the answer is the raw rows
    Degraded,
    /// every attempt failed
    Exhausted,
    /// nothing to do: blank question or empty catalog
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub text: String,
    pub status: AnswerStatus,
    /// statement that produced the rows, when one ran successfully
    pub sql: Option<String>,
    pub rows: Option<ResultSet>,
    pub attempts: usize,
}

impl Answer {
    pub fn skipped(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            status: AnswerStatus::Skipped,
            sql: None,
            rows: None,
            attempts: 0,
        }
    }

    pub fn exhausted(attempts: usize, last_error: Option<&str>) -> Self {
        let text = match last_error {
            Some(err) => format!(
                "Sorry, I could not answer that question after {} attempts. last error: {}",
                attempts, err
            ),
            None => format!(
                "Sorry, I could not answer that question after {} attempts.",
                attempts
            ),
        };
        Self {
            text,
            status: AnswerStatus::Exhausted,
            sql: None,
            rows: None,
            attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_answer_embeds_last_error() {
        let answer = Answer::exhausted(3, Some("no such column: amt"));
        assert_eq!(answer.status, AnswerStatus::Exhausted);
        assert!(answer.text.contains("3 attempts"));
        assert!(answer.text.contains("no such column: amt"));
        assert_eq!(answer.sql, None);
    }
}
