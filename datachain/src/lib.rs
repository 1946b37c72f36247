pub mod chain;
pub mod config;
pub mod db;
pub mod error;
pub mod llm;
pub mod loader;
pub mod schema;
pub mod tracing;

pub use chain::{Answer, AnswerStatus, DataChain};
pub use config::{LlmConfig, SessionConfig};
pub use db::{Database, EngineKind, ExecutionOutcome, ResultSet, Value};
pub use error::{DataChainError, Result};
pub use llm::{LanguageModel, Message, OpenAiChat, ScriptedModel};
pub use loader::load_csv;
pub use schema::SchemaCatalog;
