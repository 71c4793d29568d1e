use anyhow::Result;
use indoc::indoc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::errors::AgentResult;
use crate::models::message::{Message, Role, ToolCall};
use crate::providers::base::Provider;
use crate::tool::{Tool, ToolRegistry};

/// Returned by [`Agent::run`] when the iteration bound is hit before the model reports completion
pub const MAX_ITERATIONS_MESSAGE: &str =
    "Maximum iterations reached. The task may not be complete.";

/// Returned when the model answers the summary request without any text
pub const MISSING_SUMMARY_MESSAGE: &str = "The task was completed, but no summary was provided.";

pub const DEFAULT_SYSTEM_PROMPT: &str = indoc! {"
    You are an autonomous coding agent. Solve the task you are given by reading, editing and,
    when needed, creating code on the file system.
    Work through the task in these steps:
    1. Analyze the task and plan the operations it needs
    2. Read the files you need to understand the existing code
    3. Make a concrete implementation plan
    4. Write and edit the code, running tests where appropriate
    5. Verify the result and fix anything that is wrong

    Use the file system tools to do the work."};

pub const DEFAULT_COMPLETION_CHECK_PROMPT: &str =
    "Is the task done? If more work is needed, continue by calling tools.";

pub const DEFAULT_FINAL_SUMMARY_PROMPT: &str =
    "The task is complete. Summarize what you did and the result.";

/// Model parameters and the fixed prompts that drive a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub model: String,
    pub temperature: f32,
    pub max_iterations: usize,
    pub system_prompt: String,
    pub completion_check_prompt: String,
    pub final_summary_prompt: String,
    /// Marks completion when answering the completion check
    pub done_token: String,
    /// Also marks completion in the reply that follows a round of tool results
    pub success_token: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4.1-nano".to_string(),
            temperature: 0.2,
            max_iterations: 10,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            completion_check_prompt: DEFAULT_COMPLETION_CHECK_PROMPT.to_string(),
            final_summary_prompt: DEFAULT_FINAL_SUMMARY_PROMPT.to_string(),
            done_token: "done".to_string(),
            success_token: "success".to_string(),
        }
    }
}

/// Case-insensitive substring check against any non-empty token
fn contains_token(text: Option<&str>, tokens: &[&str]) -> bool {
    let Some(text) = text else {
        return false;
    };
    let text = text.to_lowercase();
    tokens
        .iter()
        .filter(|token| !token.is_empty())
        .any(|token| text.contains(&token.to_lowercase()))
}

/// Agent drives one conversation between a completion service and its tools
pub struct Agent {
    provider: Box<dyn Provider>,
    registry: ToolRegistry,
    config: AgentConfig,
    conversation: Vec<Message>,
}

impl Agent {
    /// Create a new Agent with the specified provider and default settings
    pub fn new(provider: Box<dyn Provider>) -> Self {
        Self {
            provider,
            registry: ToolRegistry::new(),
            config: AgentConfig::default(),
            conversation: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    /// Make a tool available to the model
    pub fn add_tool(&mut self, tool: Box<dyn Tool>) -> AgentResult<()> {
        self.registry.register(tool)
    }

    pub fn add_tools<I>(&mut self, tools: I) -> AgentResult<()>
    where
        I: IntoIterator<Item = Box<dyn Tool>>,
    {
        self.registry.register_all(tools)
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.registry
    }

    /// The conversation of the most recent run
    pub fn conversation(&self) -> &[Message] {
        &self.conversation
    }

    /// Work on `prompt` until the model reports completion or the iteration bound is hit.
    ///
    /// Returns the model's final summary, or [`MAX_ITERATIONS_MESSAGE`] when the
    /// bound is reached. Only completion service failures are errors; tool
    /// failures are reported to the model and the run carries on.
    pub async fn run(&mut self, prompt: &str) -> Result<String> {
        info!(
            model = %self.config.model,
            max_iterations = self.config.max_iterations,
            tool_count = self.registry.len(),
            "Starting agent run"
        );

        self.plan(prompt).await?;

        for iteration in 1..=self.config.max_iterations {
            debug!(iteration, "Starting iteration");
            if self.execute_iteration().await? {
                info!(iteration, "Task reported complete");
                return self.summarize().await;
            }
        }

        warn!(
            max_iterations = self.config.max_iterations,
            "Maximum iterations reached without completion"
        );
        Ok(MAX_ITERATIONS_MESSAGE.to_string())
    }

    async fn plan(&mut self, prompt: &str) -> Result<()> {
        self.conversation.clear();
        self.conversation
            .push(Message::system(self.config.system_prompt.as_str()));
        self.conversation.push(Message::user(prompt));

        let reply = self.complete_with_tools().await?;
        debug!(
            tool_calls = reply.tool_calls().len(),
            "Initial plan received"
        );
        Ok(())
    }

    /// One step of the loop; true once the model has reported completion
    async fn execute_iteration(&mut self) -> Result<bool> {
        let Some(last) = self
            .conversation
            .iter()
            .rev()
            .find(|message| message.role == Role::Assistant)
            .cloned()
        else {
            warn!("No assistant message to act on");
            return Ok(false);
        };

        if !last.has_tool_calls() {
            debug!("No tool calls, asking whether the task is done");
            self.conversation
                .push(Message::user(self.config.completion_check_prompt.as_str()));
            let reply = self.complete_with_tools().await?;

            if reply.has_tool_calls() {
                debug!("Completion check answered with new tool calls");
                return Ok(false);
            }
            return Ok(contains_token(
                reply.text(),
                &[self.config.done_token.as_str()],
            ));
        }

        debug!(tool_calls = last.tool_calls().len(), "Processing tool calls");
        for call in last.tool_calls() {
            let result = self.dispatch_tool_call(call).await;
            info!(
                tool = %call.name,
                result_length = result.len(),
                "Tool call finished"
            );
            self.conversation
                .push(Message::tool_result(&call.id, &call.name, result));
        }

        let reply = self.complete_with_tools().await?;
        Ok(!reply.has_tool_calls()
            && contains_token(
                reply.text(),
                &[
                    self.config.done_token.as_str(),
                    self.config.success_token.as_str(),
                ],
            ))
    }

    /// Run a single tool call, rendering every failure as text for the model
    async fn dispatch_tool_call(&self, call: &ToolCall) -> String {
        let arguments = call.parse_arguments().unwrap_or_else(|| {
            warn!(
                tool = %call.name,
                arguments = %call.arguments,
                "Could not parse tool arguments, using an empty object"
            );
            json!({})
        });

        let Some(tool) = self.registry.get(&call.name) else {
            warn!(tool = %call.name, "Model requested an unknown tool");
            return format!(
                "Error: tool '{}' was not found or cannot be executed",
                call.name
            );
        };

        match tool.execute(arguments).await {
            Ok(result) => result,
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool execution failed");
                format!("Error: tool '{}' failed: {}", call.name, e)
            }
        }
    }

    async fn summarize(&mut self) -> Result<String> {
        self.conversation
            .push(Message::user(self.config.final_summary_prompt.as_str()));

        let (reply, _usage) = self
            .provider
            .complete(
                &self.config.model,
                &self.conversation,
                &[],
                self.config.temperature,
            )
            .await?;

        let summary = reply
            .text()
            .map(String::from)
            .unwrap_or_else(|| MISSING_SUMMARY_MESSAGE.to_string());
        self.conversation.push(reply);

        info!(summary_length = summary.len(), "Agent run finished");
        Ok(summary)
    }

    /// Query the completion service with every tool attached and record the reply
    async fn complete_with_tools(&mut self) -> Result<Message> {
        let schemas = self.registry.schemas();
        let (reply, _usage) = self
            .provider
            .complete(
                &self.config.model,
                &self.conversation,
                &schemas,
                self.config.temperature,
            )
            .await?;

        self.conversation.push(reply.clone());
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{AgentError, AgentResult};
    use crate::models::tool::ToolSchema;
    use crate::providers::base::Usage;
    use crate::providers::mock::MockProvider;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::{Arc, Mutex};

    /// Records the arguments it was called with and echoes them back
    struct RecordingTool {
        schema: ToolSchema,
        calls: Arc<Mutex<Vec<Value>>>,
        fail: bool,
    }

    impl RecordingTool {
        fn new(name: &str, fail: bool) -> (Self, Arc<Mutex<Vec<Value>>>) {
            let calls = Arc::new(Mutex::new(Vec::new()));
            let tool = Self {
                schema: ToolSchema::new(name, "Records its input", json!({"type": "object"})),
                calls: Arc::clone(&calls),
                fail,
            };
            (tool, calls)
        }
    }

    #[async_trait]
    impl Tool for RecordingTool {
        fn schema(&self) -> &ToolSchema {
            &self.schema
        }

        async fn execute(&self, arguments: Value) -> AgentResult<String> {
            self.calls.lock().unwrap().push(arguments.clone());
            if self.fail {
                Err(AgentError::ExecutionError("boom".into()))
            } else {
                Ok(format!("called with {}", arguments))
            }
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl Provider for FailingProvider {
        async fn complete(
            &self,
            _model: &str,
            _messages: &[Message],
            _tools: &[ToolSchema],
            _temperature: f32,
        ) -> Result<(Message, Usage)> {
            Err(anyhow!("service unavailable"))
        }
    }

    fn tool_call_message(calls: &[(&str, &str, &str)]) -> Message {
        calls
            .iter()
            .fold(Message::assistant(), |message, (id, name, arguments)| {
                message.with_tool_call(ToolCall::new(*id, *name, *arguments))
            })
    }

    #[tokio::test]
    async fn test_completes_on_check_round() -> Result<()> {
        let provider = MockProvider::new(vec![
            Message::assistant().with_text("Nothing to change."),
            Message::assistant().with_text("Yes, DONE."),
            Message::assistant().with_text("Summary: nothing needed."),
        ]);
        let mut agent = Agent::new(Box::new(provider.clone()));

        let result = agent.run("check the repo").await?;
        assert_eq!(result, "Summary: nothing needed.");

        let conversation = agent.conversation();
        assert_eq!(conversation[0].role, Role::System);
        assert_eq!(conversation[1], Message::user("check the repo"));
        assert_eq!(
            conversation[3],
            Message::user(DEFAULT_COMPLETION_CHECK_PROMPT)
        );
        assert_eq!(conversation[5], Message::user(DEFAULT_FINAL_SUMMARY_PROMPT));
        assert_eq!(provider.requests().len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_tool_round_then_success() -> Result<()> {
        let provider = MockProvider::new(vec![
            tool_call_message(&[("call_1", "record", r#"{"value": 1}"#)]),
            Message::assistant().with_text("Success, the value was recorded."),
            Message::assistant().with_text("Recorded the value."),
        ]);
        let (tool, calls) = RecordingTool::new("record", false);
        let mut agent = Agent::new(Box::new(provider.clone()));
        agent.add_tool(Box::new(tool))?;

        let result = agent.run("record a value").await?;
        assert_eq!(result, "Recorded the value.");
        assert_eq!(*calls.lock().unwrap(), vec![json!({"value": 1})]);

        let tool_message = &agent.conversation()[3];
        assert_eq!(tool_message.role, Role::Tool);
        assert_eq!(tool_message.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(tool_message.name.as_deref(), Some("record"));
        assert_eq!(tool_message.text(), Some(r#"called with {"value":1}"#));

        let requests = provider.requests();
        assert_eq!(requests[0].tool_names, vec!["record"]);
        assert_eq!(requests[1].tool_names, vec!["record"]);
        // The summary request is sent without tools
        assert!(requests[2].tool_names.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_success_token_ignored_on_check_round() -> Result<()> {
        let provider = MockProvider::new(vec![
            Message::assistant().with_text("Thinking."),
            Message::assistant().with_text("Success!"),
        ])
        .with_fallback(Message::assistant().with_text("still thinking"));
        let mut agent = Agent::new(Box::new(provider)).with_config(AgentConfig {
            max_iterations: 2,
            ..Default::default()
        });

        let result = agent.run("task").await?;
        assert_eq!(result, MAX_ITERATIONS_MESSAGE);
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_tool_and_failures_become_text() -> Result<()> {
        let provider = MockProvider::new(vec![
            tool_call_message(&[
                ("a", "missing", "{}"),
                ("b", "broken", "{}"),
                ("c", "record", "not json"),
            ]),
            Message::assistant().with_text("done"),
            Message::assistant().with_text("summary"),
        ]);
        let (broken, _) = RecordingTool::new("broken", true);
        let (record, calls) = RecordingTool::new("record", false);
        let mut agent = Agent::new(Box::new(provider));
        agent.add_tools(vec![Box::new(broken) as Box<dyn Tool>, Box::new(record)])?;

        let result = agent.run("task").await?;
        assert_eq!(result, "summary");

        let tool_texts: Vec<&str> = agent
            .conversation()
            .iter()
            .filter(|message| message.role == Role::Tool)
            .filter_map(Message::text)
            .collect();
        assert_eq!(tool_texts.len(), 3);
        assert!(tool_texts[0].contains("'missing' was not found"));
        assert!(tool_texts[1].contains("'broken' failed"));
        assert!(tool_texts[1].contains("boom"));
        assert_eq!(*calls.lock().unwrap(), vec![json!({})]);
        Ok(())
    }

    #[tokio::test]
    async fn test_check_round_tool_calls_run_next_iteration() -> Result<()> {
        let provider = MockProvider::new(vec![
            Message::assistant().with_text("Let me look."),
            tool_call_message(&[("call_1", "record", "{}")]),
            Message::assistant().with_text("done"),
            Message::assistant().with_text("summary"),
        ]);
        let (tool, calls) = RecordingTool::new("record", false);
        let mut agent = Agent::new(Box::new(provider));
        agent.add_tool(Box::new(tool))?;

        let result = agent.run("task").await?;
        assert_eq!(result, "summary");
        assert_eq!(calls.lock().unwrap().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_summary_uses_fallback() -> Result<()> {
        let provider = MockProvider::new(vec![
            Message::assistant().with_text("ok"),
            Message::assistant().with_text("done"),
            Message::assistant(),
        ]);
        let mut agent = Agent::new(Box::new(provider));
        assert_eq!(agent.run("task").await?, MISSING_SUMMARY_MESSAGE);
        Ok(())
    }

    #[tokio::test]
    async fn test_provider_error_propagates() {
        let mut agent = Agent::new(Box::new(FailingProvider));
        let error = agent.run("task").await.unwrap_err();
        assert_eq!(error.to_string(), "service unavailable");
    }

    #[tokio::test]
    async fn test_run_resets_conversation() -> Result<()> {
        let provider = MockProvider::new(vec![]).with_fallback(Message::assistant().with_text("done"));
        let mut agent = Agent::new(Box::new(provider));

        agent.run("first").await?;
        agent.run("second").await?;
        assert_eq!(agent.conversation()[1], Message::user("second"));
        assert_eq!(
            agent
                .conversation()
                .iter()
                .filter(|message| message.role == Role::System)
                .count(),
            1
        );
        Ok(())
    }

    #[test]
    fn test_contains_token() {
        assert!(contains_token(Some("All DONE here"), &["done"]));
        assert!(contains_token(Some("it was a success"), &["done", "success"]));
        assert!(!contains_token(Some("working on it"), &["done"]));
        assert!(!contains_token(None, &["done"]));
        assert!(!contains_token(Some("anything"), &[""]));
    }

    #[test]
    fn test_config_deserializes_partial() {
        let config: AgentConfig =
            serde_json::from_value(json!({"model": "gpt-4o", "max_iterations": 3})).unwrap();
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.max_iterations, 3);
        assert_eq!(config.temperature, 0.2);
        assert_eq!(config.done_token, "done");
    }
}
