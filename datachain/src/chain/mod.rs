pub mod answer;
pub mod executor;
pub mod generator;
pub mod orchestrator;
pub mod parser;
pub mod prompt;
pub mod selector;
pub mod synthesizer;

pub use answer::{Answer, AnswerStatus};
pub use executor::QueryExecutor;
pub use generator::{CandidateQuery, Correction, QueryGenerator};
pub use orchestrator::DataChain;
pub use selector::{SelectionMode, TableSelector};
pub use synthesizer::AnswerSynthesizer;

use crate::error::{DataChainError, Result};
use crate::llm::{LanguageModel, Message};
use std::time::Duration;

/// one model round trip bounded by `timeout`. a timeout is a `Model` error
/// so every component maps it like any other model failure.
pub(crate) async fn complete(
    model: &dyn LanguageModel,
    messages: Vec<Message>,
    timeout: Duration,
) -> Result<String> {
    match tokio::time::timeout(timeout, model.generate(messages)).await {
        Ok(output) => output,
        Err(_) => Err(DataChainError::Model(format!(
            "{} call timed out after {} ms",
            model.name(),
            timeout.as_millis()
        ))),
    }
}
