use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataChainError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// introspection failed; fatal to session start
    #[error("schema error: {0}")]
    Schema(String),

    /// the selector could not name a single catalog table; callers fall back to all tables
    #[error("table selection failed: {0}")]
    Selection(String),

    /// the model produced no candidate statement for this attempt
    #[error("query generation failed: {0}")]
    Generation(String),

    /// the model could not phrase the answer; callers degrade to the raw rows
    #[error("answer synthesis failed: {0}")]
    Synthesis(String),

    /// the connection is unusable; the session should end
    #[error("session error: {0}")]
    Session(String),

    #[error("language model error: {0}")]
    Model(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("csv load failed: {0}")]
    Load(String),

    #[error("tracing initialization failed: {0}")]
    Tracing(String),
}

impl DataChainError {
    /// true when the error ends the whole session rather than one question
    pub fn is_fatal(&self) -> bool {
        matches!(self, DataChainError::Session(_) | DataChainError::Schema(_))
    }
}

pub type Result<T> = std::result::Result<T, DataChainError>;
