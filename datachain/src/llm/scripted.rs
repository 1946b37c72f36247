use super::model::{LanguageModel, Message};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Mutex;

type Responder = dyn Fn(&[Message]) -> Result<String> + Send + Sync;

/// deterministic in-process model driven by a closure; records every call.
/// used for offline runs and for exercising the chain without a network.
pub struct ScriptedModel {
    responder: Box<Responder>,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedModel {
    pub fn from_fn<F>(responder: F) -> Self
    where
        F: Fn(&[Message]) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// always answer with the same text
    pub fn constant(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::from_fn(move |_| Ok(text.clone()))
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|calls| calls.len()).unwrap_or(0)
    }

    /// every conversation sent so far, oldest first
    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, messages: Vec<Message>) -> Result<String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(messages.clone());
        }
        (self.responder)(&messages)
    }
}
