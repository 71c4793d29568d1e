//! These models represent the objects passed around by the agent
//!
//! The conversation is kept in a single internal shape that mirrors the chat
//! completion contract closely: a message has a role, optional text, optional
//! tool calls, and the correlation fields a tool result needs. Conversion to a
//! concrete wire format happens in the provider utils, never here.
pub mod message;
pub mod tool;
