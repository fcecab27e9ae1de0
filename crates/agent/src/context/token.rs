//! Token estimation utilities.
//!
//! Uses a character-based heuristic: ~4 bytes per token, rounded up.
//! The estimate only needs to be monotonic and on the conservative side;
//! byte length over-counts non-ASCII text, which is the safe direction.

use repolens_core::message::Message;
use repolens_core::provider::ToolDefinition;

/// Per-message overhead for role name, delimiters and wire framing.
pub const MESSAGE_OVERHEAD: usize = 4;

/// Estimate the token count for a string.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

/// Estimate tokens for a single message, including embedded tool calls.
pub fn estimate_message_tokens(message: &Message) -> usize {
    let calls: usize = message
        .tool_calls
        .iter()
        .map(|c| estimate_tokens(&c.name) + estimate_tokens(&c.arguments) + MESSAGE_OVERHEAD)
        .sum();
    MESSAGE_OVERHEAD + estimate_tokens(&message.content) + calls
}

/// Estimate tokens for a slice of messages.
pub fn estimate_messages_tokens(messages: &[Message]) -> usize {
    messages.iter().map(estimate_message_tokens).sum()
}

/// Estimate tokens for a tool definition (serialized as JSON).
pub fn estimate_tool_tokens(tool: &ToolDefinition) -> usize {
    let json = serde_json::to_string(tool).unwrap_or_default();
    estimate_tokens(&json)
}

/// Estimate tokens for a slice of tool definitions.
pub fn estimate_tools_tokens(tools: &[ToolDefinition]) -> usize {
    tools.iter().map(estimate_tool_tokens).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use repolens_core::message::MessageToolCall;

    #[test]
    fn empty_string_is_zero() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn rounds_up() {
        assert_eq!(estimate_tokens("test"), 1);
        assert_eq!(estimate_tokens("hello"), 2);
        assert_eq!(estimate_tokens(&"a".repeat(100)), 25);
    }

    #[test]
    fn message_includes_overhead() {
        let msg = Message::user("test");
        assert_eq!(estimate_message_tokens(&msg), 5);
    }

    #[test]
    fn tool_calls_are_counted() {
        let plain = Message::assistant("");
        let with_call = Message::assistant_tool_calls(
            "",
            vec![MessageToolCall {
                id: "call_1".into(),
                name: "file-fetch".into(),
                arguments: r#"{"path":"apps/web/lib/auth/index.ts"}"#.into(),
            }],
        );
        assert!(estimate_message_tokens(&with_call) > estimate_message_tokens(&plain) + 10);
    }

    #[test]
    fn estimate_is_monotonic() {
        let mut previous = 0;
        for len in 0..64 {
            let tokens = estimate_tokens(&"x".repeat(len));
            assert!(tokens >= previous);
            previous = tokens;
        }
    }

    #[test]
    fn tool_definitions() {
        let tool = ToolDefinition {
            name: "code-search".to_string(),
            description: "Search code".to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": { "query": {"type": "string"} }
            }),
        };
        assert!(estimate_tool_tokens(&tool) > 0);
        assert_eq!(estimate_tools_tokens(&[]), 0);
    }
}
