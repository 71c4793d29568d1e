use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::message::Message;
use crate::models::tool::ToolSchema;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
    pub total_tokens: Option<i32>,
}

impl Usage {
    pub fn new(
        input_tokens: Option<i32>,
        output_tokens: Option<i32>,
        total_tokens: Option<i32>,
    ) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens,
        }
    }
}

/// A chat completion service the agent converses with
#[async_trait]
pub trait Provider: Send + Sync {
    /// Generate the next assistant message for the conversation so far.
    ///
    /// An empty `tools` slice sends no tool schema at all. Errors are returned
    /// as-is; implementations do not retry.
    async fn complete(
        &self,
        model: &str,
        messages: &[Message],
        tools: &[ToolSchema],
        temperature: f32,
    ) -> Result<(Message, Usage)>;
}
