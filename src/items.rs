//! Messages, tool calls, and tool results exchanged during a turn
//!
//! This module defines the conversation history data model. Messages are
//! immutable once appended to a session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Role in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool call requested by an agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// The recorded outcome of one tool call. Failures are data, not errors:
/// a failed call carries its message in `error` and a `Null` output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRecord {
    pub tool_call_id: String,
    pub name: String,
    pub output: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A message in the conversation history.
///
/// Assistant messages carry the `author` agent name and any tool calls the
/// agent requested; tool-role messages carry the corresponding results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_results: Vec<ToolRecord>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            author: None,
            content: content.into(),
            tool_calls: vec![],
            tool_results: vec![],
            created_at: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            author: None,
            content: content.into(),
            tool_calls: vec![],
            tool_results: vec![],
            created_at: Utc::now(),
        }
    }

    pub fn assistant(author: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            author: Some(author.into()),
            content: content.into(),
            tool_calls: vec![],
            tool_results: vec![],
            created_at: Utc::now(),
        }
    }

    pub fn assistant_with_tool_calls(
        author: impl Into<String>,
        content: impl Into<String>,
        tool_calls: Vec<ToolCall>,
    ) -> Self {
        Self {
            role: Role::Assistant,
            author: Some(author.into()),
            content: content.into(),
            tool_calls,
            tool_results: vec![],
            created_at: Utc::now(),
        }
    }

    /// Build a tool-role message carrying one result. The message content is
    /// what the completion capability sees; errors are rendered as a JSON
    /// object so the agent can react to them.
    pub fn tool_result(record: ToolRecord) -> Self {
        let content = match &record.error {
            Some(err) => serde_json::json!({ "error": err }).to_string(),
            None => record.output.to_string(),
        };
        Self {
            role: Role::Tool,
            author: None,
            content,
            tool_calls: vec![],
            tool_results: vec![record],
            created_at: Utc::now(),
        }
    }

    /// Whether this is a user-facing assistant message (content, no pending
    /// tool calls).
    pub fn is_user_facing(&self) -> bool {
        self.role == Role::Assistant && self.tool_calls.is_empty() && !self.content.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_message_constructors() {
        let sys = Message::system("You are a support assistant");
        assert_eq!(sys.role, Role::System);
        assert!(sys.author.is_none());

        let user = Message::user("Where is my order?");
        assert_eq!(user.role, Role::User);
        assert_eq!(user.content, "Where is my order?");

        let asst = Message::assistant("OrderStatusAgent", "Let me check.");
        assert_eq!(asst.role, Role::Assistant);
        assert_eq!(asst.author.as_deref(), Some("OrderStatusAgent"));
        assert!(asst.is_user_facing());
    }

    #[test]
    fn test_assistant_with_tool_calls_is_not_user_facing() {
        let call = ToolCall {
            id: "call_1".to_string(),
            name: "check_order_status".to_string(),
            arguments: serde_json::json!({"order_id": "ORD-123"}),
        };
        let msg = Message::assistant_with_tool_calls("OrderStatusAgent", "", vec![call]);
        assert!(!msg.is_user_facing());
        assert_eq!(msg.tool_calls.len(), 1);
    }

    #[test]
    fn test_tool_result_rendering() {
        let ok = Message::tool_result(ToolRecord {
            tool_call_id: "call_1".to_string(),
            name: "search_products".to_string(),
            output: serde_json::json!([{"sku": "P-100"}]),
            error: None,
        });
        assert_eq!(ok.role, Role::Tool);
        assert!(ok.content.contains("P-100"));

        let err = Message::tool_result(ToolRecord {
            tool_call_id: "call_2".to_string(),
            name: "search_products".to_string(),
            output: serde_json::Value::Null,
            error: Some("catalog unavailable".to_string()),
        });
        assert!(err.content.contains("catalog unavailable"));
        assert!(err.content.contains("error"));
    }

    #[test]
    fn test_message_serialization_roundtrip() {
        let msg = Message::assistant("TriageAgent", "Routing your request.");
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back.content, msg.content);
        assert_eq!(back.author, msg.author);
        assert!(back.tool_calls.is_empty());
    }
}
