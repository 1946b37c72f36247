use super::model::{LanguageModel, Message};
use crate::config::LlmConfig;
use crate::error::{DataChainError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// client for any openai-compatible `/chat/completions` endpoint
pub struct OpenAiChat {
    config: LlmConfig,
    client: Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiChat {
    pub fn new(config: LlmConfig) -> Self {
        tracing::info!(model = %config.model, base_url = %config.base_url, "language model configured");
        Self {
            config,
            client: Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url)
    }
}

fn parse_completion(body: &str) -> Result<String> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| DataChainError::Model(format!("failed to parse completion: {}", e)))?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| DataChainError::Model("completion contained no choices".to_string()))
}

#[async_trait]
impl LanguageModel for OpenAiChat {
    fn name(&self) -> &str {
        &self.config.model
    }

    #[tracing::instrument(skip(self, messages), fields(llm.model = %self.config.model, message_count = messages.len()))]
    async fn generate(&self, messages: Vec<Message>) -> Result<String> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: &messages,
            temperature: self.config.temperature,
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| DataChainError::Model(format!("request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DataChainError::Model(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(DataChainError::Model(format!("api error {}: {}", status, body)));
        }

        let output = parse_completion(&body)?;
        tracing::debug!("generated {} chars", output.len());
        Ok(output.trim().to_string())
    }
}
