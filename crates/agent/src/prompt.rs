//! Prompt text.

use crate::context::token::estimate_messages_tokens;
use crate::state::ScratchpadEntry;
use repolens_core::RepoLocator;
use repolens_core::message::Message;

/// System instructions for one request.
pub fn system_prompt(repo: &RepoLocator) -> String {
    format!(
        "You are an expert software engineer helping users understand GitHub repositories. \
         Prioritize correctness and efficiency. Use the tools to inspect the repository \
         instead of relying on memory. Avoid guessing file paths: start from the root tree, \
         narrow down with subdir-tree, and confirm with file-fetch. If a file isn't found, \
         try a broader search or infer from nearby files. Cite the paths you relied on. \
         When you are finished, always respond with a summary or answer to the user's question.\n\n\
         This is the repository you are exploring: {repo}"
    )
}

/// Fed back when a reply had neither an answer nor a tool call.
pub fn correction_note(reason: &str) -> String {
    format!(
        "Your last reply could not be used ({reason}). Call one of the available tools \
         or reply with the final answer as plain text."
    )
}

const SYNTHESIS_SYSTEM: &str =
    "You answer technical questions about codebases precisely and concisely.";
const TRUNCATED: &str = "\n... (observations truncated)";

/// One extra, tool-less request asking for an answer from whatever the
/// loop gathered. The observations are cut so the whole request stays
/// within `limit` estimated tokens; `None` when even the question does not
/// fit.
pub fn synthesis_messages(
    question: &str,
    scratchpad: &[ScratchpadEntry],
    limit: usize,
) -> Option<Vec<Message>> {
    let framing = estimate_messages_tokens(&synthesis_request(question, ""));
    let spare_bytes = limit.checked_sub(framing)? * 4;

    let mut observed = observations(scratchpad);
    if observed.len() > spare_bytes {
        let mut end = spare_bytes.checked_sub(TRUNCATED.len())?;
        while !observed.is_char_boundary(end) {
            end -= 1;
        }
        observed.truncate(end);
        observed.push_str(TRUNCATED);
    }
    Some(synthesis_request(question, &observed))
}

fn synthesis_request(question: &str, observed: &str) -> Vec<Message> {
    let prompt = format!(
        "Based on the following observations from GitHub tools, provide a clear, concise \
         answer to the user's question. Say so if the observations are not enough.\n\n\
         User question: {question}\n\n\
         Tool observations:\n{observed}\n\n\
         Answer:"
    );
    vec![Message::system(SYNTHESIS_SYSTEM), Message::user(prompt)]
}

/// Plain-text digest of the scratchpad, one block per tool call.
pub fn observations(scratchpad: &[ScratchpadEntry]) -> String {
    let blocks: Vec<String> = scratchpad
        .iter()
        .filter_map(|entry| match entry {
            ScratchpadEntry::Tool { invocation, result } => Some(format!(
                "[{}({})]\n{}",
                invocation.name,
                invocation.to_message_call().arguments,
                result.to_observation()
            )),
            ScratchpadEntry::Correction { .. } => None,
        })
        .collect();
    if blocks.is_empty() {
        "(no tool calls were made)".to_string()
    } else {
        blocks.join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repolens_core::{ErrorKind, ToolInvocation, ToolResult};

    #[test]
    fn system_prompt_names_the_repository() {
        let prompt = system_prompt(&RepoLocator::new("calcom", "cal.com"));
        assert!(prompt.ends_with("calcom/cal.com"));
        assert!(prompt.contains("Avoid guessing file paths"));
    }

    #[test]
    fn observations_skip_corrections() {
        let scratchpad = vec![
            ScratchpadEntry::Correction {
                note: "x".into(),
            },
            ScratchpadEntry::Tool {
                invocation: ToolInvocation {
                    id: "c1".into(),
                    name: "file-fetch".into(),
                    arguments: serde_json::json!({"path": "README.md"}),
                },
                result: ToolResult::failure(ErrorKind::NotFound, "'README.md' was not found"),
            },
        ];
        let text = observations(&scratchpad);
        assert!(text.starts_with("[file-fetch({\"path\":\"README.md\"})]"));
        assert!(text.contains("Error [not_found]"));
        assert_eq!(observations(&[]), "(no tool calls were made)");
    }

    #[test]
    fn synthesis_carries_question() {
        let messages = synthesis_messages("Where is auth?", &[], 10_000).unwrap();
        assert_eq!(messages.len(), 2);
        assert!(messages[1].content.contains("User question: Where is auth?"));
        assert!(messages[1].content.ends_with("Answer:"));
    }

    fn big_fetch(payload: String) -> Vec<ScratchpadEntry> {
        vec![ScratchpadEntry::Tool {
            invocation: ToolInvocation {
                id: "c1".into(),
                name: "file-fetch".into(),
                arguments: serde_json::json!({"path": "big.txt"}),
            },
            result: ToolResult::ok(payload),
        }]
    }

    #[test]
    fn synthesis_observations_are_bounded() {
        let scratchpad = big_fetch("é".repeat(5_000));
        let messages = synthesis_messages("q", &scratchpad, 400).unwrap();
        assert!(messages[1].content.contains("(observations truncated)"));
        assert!(estimate_messages_tokens(&messages) <= 400);
    }

    #[test]
    fn long_question_shrinks_the_observations() {
        let scratchpad = big_fetch("x".repeat(12_000));
        let question = "why ".repeat(2_000);
        let messages = synthesis_messages(&question, &scratchpad, 3_500).unwrap();
        assert!(messages[1].content.contains(&question));
        assert!(estimate_messages_tokens(&messages) <= 3_500);
    }

    #[test]
    fn synthesis_is_skipped_when_the_question_alone_overflows() {
        let question = "why ".repeat(2_000);
        assert!(synthesis_messages(&question, &big_fetch("x".into()), 1_000).is_none());
    }
}
