use anyhow::{anyhow, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{json, Map, Value};
use std::collections::HashSet;

use crate::models::message::{Message, ToolCall};
use crate::models::tool::ToolSchema;

lazy_static! {
    static ref INVALID_FUNCTION_CHARS: Regex =
        Regex::new(r"[^a-zA-Z0-9_-]").expect("function name pattern is valid");
}

/// Convert internal Message format to OpenAI's API message specification.
///
/// Fields a message does not carry are left out of the object entirely
/// rather than sent as null.
pub fn messages_to_openai_spec(messages: &[Message]) -> Vec<Value> {
    messages.iter().map(message_to_openai_spec).collect()
}

fn message_to_openai_spec(message: &Message) -> Value {
    let mut converted = Map::new();
    converted.insert("role".to_string(), json!(message.role));

    if let Some(content) = &message.content {
        converted.insert("content".to_string(), json!(content));
    }

    if message.has_tool_calls() {
        let tool_calls: Vec<Value> = message
            .tool_calls()
            .iter()
            .map(|call| {
                json!({
                    "id": call.id,
                    "type": "function",
                    "function": {
                        "name": sanitize_function_name(&call.name),
                        "arguments": call.arguments,
                    }
                })
            })
            .collect();
        converted.insert("tool_calls".to_string(), json!(tool_calls));
    }

    if let Some(tool_call_id) = &message.tool_call_id {
        converted.insert("tool_call_id".to_string(), json!(tool_call_id));
    }
    if let Some(name) = &message.name {
        converted.insert("name".to_string(), json!(name));
    }

    Value::Object(converted)
}

/// Convert internal tool schemas to OpenAI's API tool specification
pub fn tools_to_openai_spec(tools: &[ToolSchema]) -> Result<Vec<Value>> {
    let mut tool_names = HashSet::new();
    let mut result = Vec::new();

    for tool in tools {
        // Advertised under the same name that tool calls are echoed back with
        let name = sanitize_function_name(&tool.name);
        if !tool_names.insert(name.clone()) {
            return Err(anyhow!("Duplicate tool name: {}", tool.name));
        }

        result.push(json!({
            "type": "function",
            "function": {
                "name": name,
                "description": tool.description,
                "parameters": tool.parameters,
            }
        }));
    }

    Ok(result)
}

/// Convert OpenAI's API response to internal Message format
pub fn openai_response_to_message(response: &Value) -> Result<Message> {
    let original = response
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .ok_or_else(|| anyhow!("No message in response: {}", response))?;

    let mut message = Message::assistant();

    if let Some(text) = original.get("content").and_then(Value::as_str) {
        message = message.with_text(text);
    }

    if let Some(tool_calls) = original.get("tool_calls").and_then(Value::as_array) {
        for tool_call in tool_calls {
            let id = tool_call["id"].as_str().unwrap_or_default();
            let name = tool_call["function"]["name"].as_str().unwrap_or_default();
            // Some compatible servers send the arguments as an object instead of a string
            let arguments = match &tool_call["function"]["arguments"] {
                Value::String(arguments) => arguments.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            message = message.with_tool_call(ToolCall::new(id, name, arguments));
        }
    }

    Ok(message)
}

pub fn sanitize_function_name(name: &str) -> String {
    INVALID_FUNCTION_CHARS.replace_all(name, "_").to_string()
}
