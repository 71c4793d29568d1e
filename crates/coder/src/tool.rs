use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;

use crate::errors::{AgentError, AgentResult};
use crate::models::tool::ToolSchema;

/// A capability the agent can invoke on the model's behalf
#[async_trait]
pub trait Tool: Send + Sync {
    /// The schema advertised to the completion service
    fn schema(&self) -> &ToolSchema;

    fn name(&self) -> &str {
        &self.schema().name
    }

    /// Run the tool against an already-decoded argument object
    async fn execute(&self, arguments: Value) -> AgentResult<String>;
}

/// Decode a tool argument object into its typed form
pub fn parse_arguments<T: DeserializeOwned>(arguments: Value) -> AgentResult<T> {
    serde_json::from_value(arguments).map_err(|e| AgentError::InvalidParameters(e.to_string()))
}

/// Tools in registration order, addressable by name
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool, rejecting a second tool under an existing name
    pub fn register(&mut self, tool: Box<dyn Tool>) -> AgentResult<()> {
        let name = tool.name().to_string();
        if self.index.contains_key(&name) {
            return Err(AgentError::InvalidParameters(format!(
                "Duplicate tool name: {}",
                name
            )));
        }
        self.index.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    pub fn register_all<I>(&mut self, tools: I) -> AgentResult<()>
    where
        I: IntoIterator<Item = Box<dyn Tool>>,
    {
        tools.into_iter().try_for_each(|tool| self.register(tool))
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.index.get(name).map(|&i| self.tools[i].as_ref())
    }

    /// Schemas in registration order
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools.iter().map(|tool| tool.schema().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
