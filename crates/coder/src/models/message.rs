use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A model-issued request to invoke a named tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Opaque correlation token, echoed back on the tool result
    pub id: String,
    pub name: String,
    /// Raw JSON-encoded argument object, exactly as the model produced it
    pub arguments: String,
}

impl ToolCall {
    pub fn new<I, N, A>(id: I, name: N, arguments: A) -> Self
    where
        I: Into<String>,
        N: Into<String>,
        A: Into<String>,
    {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// Decode the arguments, returning None unless they form a JSON object
    pub fn parse_arguments(&self) -> Option<Value> {
        serde_json::from_str::<Value>(&self.arguments)
            .ok()
            .filter(Value::is_object)
    }
}

#[derive(Debug, Clone, PartialEq)]
/// A message to or from an LLM
pub struct Message {
    pub role: Role,
    pub content: Option<String>,
    pub tool_calls: Option<Vec<ToolCall>>,
    pub tool_call_id: Option<String>,
    pub name: Option<String>,
}

impl Message {
    fn new(role: Role) -> Self {
        Message {
            role,
            content: None,
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }

    pub fn system<S: Into<String>>(text: S) -> Self {
        Self::new(Role::System).with_text(text)
    }

    pub fn user<S: Into<String>>(text: S) -> Self {
        Self::new(Role::User).with_text(text)
    }

    /// Create an empty assistant message, filled in with the builder methods
    pub fn assistant() -> Self {
        Self::new(Role::Assistant)
    }

    /// Create the tool message answering the call with the given id
    pub fn tool_result<I, N, S>(tool_call_id: I, name: N, content: S) -> Self
    where
        I: Into<String>,
        N: Into<String>,
        S: Into<String>,
    {
        Message {
            tool_call_id: Some(tool_call_id.into()),
            name: Some(name.into()),
            ..Self::new(Role::Tool).with_text(content)
        }
    }

    pub fn with_text<S: Into<String>>(mut self, text: S) -> Self {
        self.content = Some(text.into());
        self
    }

    pub fn with_tool_call(mut self, tool_call: ToolCall) -> Self {
        self.tool_calls.get_or_insert_with(Vec::new).push(tool_call);
        self
    }

    pub fn text(&self) -> Option<&str> {
        self.content.as_deref()
    }

    pub fn tool_calls(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or_default()
    }

    /// An empty tool_calls list counts as no tool calls
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_arguments() {
        let call = ToolCall::new("1", "read_file", r#"{"path": "a.txt"}"#);
        assert_eq!(call.parse_arguments(), Some(json!({"path": "a.txt"})));

        let malformed = ToolCall::new("2", "read_file", "{not json");
        assert_eq!(malformed.parse_arguments(), None);

        let not_an_object = ToolCall::new("3", "read_file", "[1, 2]");
        assert_eq!(not_an_object.parse_arguments(), None);
    }

    #[test]
    fn test_tool_result_message() {
        let message = Message::tool_result("call_1", "read_file", "hello");
        assert_eq!(message.role, Role::Tool);
        assert_eq!(message.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(message.name.as_deref(), Some("read_file"));
        assert_eq!(message.text(), Some("hello"));
        assert!(!message.has_tool_calls());
    }

    #[test]
    fn test_empty_tool_calls_are_not_tool_calls() {
        let mut message = Message::assistant().with_text("hi");
        message.tool_calls = Some(vec![]);
        assert!(!message.has_tool_calls());

        let message = message.with_tool_call(ToolCall::new("1", "a", "{}"));
        assert!(message.has_tool_calls());
        assert_eq!(message.tool_calls().len(), 1);
    }
}
