use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::models::message::Message;
use crate::models::tool::ToolSchema;
use crate::providers::base::{Provider, Usage};

/// What the mock was asked for on one `complete` call
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub tool_names: Vec<String>,
    pub temperature: f32,
}

/// A mock provider that returns pre-configured responses for testing
#[derive(Clone, Default)]
pub struct MockProvider {
    responses: Arc<Mutex<Vec<Message>>>,
    fallback: Option<Message>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockProvider {
    /// Create a new mock provider with a sequence of responses
    pub fn new(responses: Vec<Message>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            ..Default::default()
        }
    }

    /// Reply with `message` once the scripted responses run out
    pub fn with_fallback(mut self, message: Message) -> Self {
        self.fallback = Some(message);
        self
    }

    /// Every request received so far, oldest first
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(
        &self,
        model: &str,
        messages: &[Message],
        tools: &[ToolSchema],
        temperature: f32,
    ) -> Result<(Message, Usage)> {
        self.requests
            .lock()
            .map_err(|_| anyhow!("mock provider state poisoned"))?
            .push(RecordedRequest {
                model: model.to_string(),
                messages: messages.to_vec(),
                tool_names: tools.iter().map(|tool| tool.name.clone()).collect(),
                temperature,
            });

        let mut responses = self
            .responses
            .lock()
            .map_err(|_| anyhow!("mock provider state poisoned"))?;
        let message = if responses.is_empty() {
            self.fallback
                .clone()
                .unwrap_or_else(|| Message::assistant().with_text(""))
        } else {
            responses.remove(0)
        };
        Ok((message, Usage::default()))
    }
}
