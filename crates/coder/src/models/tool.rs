use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The declarative half of a tool: what the model is told about it.
///
/// The executable half lives behind the [`crate::tool::Tool`] trait and is
/// never sent to the completion service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolSchema {
    /// The name of the tool
    pub name: String,
    /// A description of what the tool does
    pub description: String,
    /// JSON schema for the argument object
    pub parameters: Value,
}

impl ToolSchema {
    /// Create a new tool schema with the given name and description
    pub fn new<N, D>(name: N, description: D, parameters: Value) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        ToolSchema {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}
