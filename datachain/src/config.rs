use crate::db::EngineKind;
use crate::error::{DataChainError, Result};
use std::env;
use std::time::Duration;

const DEFAULT_MAX_ATTEMPTS: usize = 3;
const DEFAULT_MAX_ROWS: usize = 200;
const DEFAULT_LLM_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(30);

const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// everything a chain needs to know about its session, built once at startup
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub engine: EngineKind,
    pub dsn: String,
    /// ground every question on the whole catalog instead of asking the model to pick tables
    pub use_all_tables: bool,
    pub max_attempts: usize,
    pub max_rows: usize,
    pub llm_timeout: Duration,
    pub query_timeout: Duration,
}

impl SessionConfig {
    pub fn new(engine: EngineKind, dsn: impl Into<String>) -> Self {
        Self {
            engine,
            dsn: dsn.into(),
            use_all_tables: true,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            max_rows: DEFAULT_MAX_ROWS,
            llm_timeout: DEFAULT_LLM_TIMEOUT,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    pub fn with_all_tables(mut self, use_all_tables: bool) -> Self {
        self.use_all_tables = use_all_tables;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows;
        self
    }

    pub fn with_llm_timeout(mut self, timeout: Duration) -> Self {
        self.llm_timeout = timeout;
        self
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.dsn.trim().is_empty() {
            return Err(DataChainError::Config(format!(
                "empty dsn for {} engine",
                self.engine
            )));
        }
        if self.max_attempts == 0 {
            return Err(DataChainError::Config(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.max_rows == 0 {
            return Err(DataChainError::Config(
                "max_rows must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// credentials and endpoint for the openai-compatible chat api
#[derive(Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl LlmConfig {
    /// resolve settings, explicit arguments first, then environment, then defaults
    pub fn from_env(model: Option<String>, base_url: Option<String>) -> Result<Self> {
        let api_key = non_empty_var("OPENAI_API_KEY").ok_or_else(|| {
            DataChainError::Config("OPENAI_API_KEY environment variable not set".to_string())
        })?;

        let model = model
            .filter(|s| !s.is_empty())
            .or_else(|| non_empty_var("OPENAI_MODEL"))
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let base_url = base_url
            .filter(|s| !s.is_empty())
            .or_else(|| non_empty_var("OPENAI_BASE_URL"))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Ok(Self {
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            temperature: 0.0,
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_config_defaults() {
        let config = SessionConfig::new(EngineKind::Sqlite, "test.db");
        assert!(config.use_all_tables);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.max_rows, 200);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_session_config_rejects_empty_dsn() {
        let config = SessionConfig::new(EngineKind::MySql, "  ");
        assert!(matches!(config.validate(), Err(DataChainError::Config(_))));
    }

    #[test]
    fn test_session_config_rejects_zero_attempts() {
        let config = SessionConfig::new(EngineKind::Sqlite, "test.db").with_max_attempts(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_llm_config_debug_redacts_key() {
        let config = LlmConfig {
            api_key: "sk-secret".to_string(),
            model: "gpt-4o".to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: 0.0,
        };
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("gpt-4o"));
    }
}
