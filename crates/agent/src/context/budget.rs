//! Context budget manager.
//!
//! Assembles the prompt for one model call and guarantees it fits
//! `ceiling - reserve`. The system prompt, the tool catalog and the current
//! question are never cut. When the rest does not fit, it is shed in this
//! order:
//!
//! 1. oldest chat-history turns, keeping the most recent `recent_turns_kept`
//! 2. oldest scratchpad payloads, replaced by [`OMITTED_MARKER`]; the call
//!    record itself stays so the model knows the tool already ran
//! 3. the remaining chat-history turns
//!
//! If the prompt still does not fit, assembly fails and the model is not
//! called.

use crate::context::token;
use crate::state::ScratchpadEntry;
use repolens_config::AgentConfig;
use repolens_core::message::{ConversationTurn, Message};
use repolens_core::provider::ToolDefinition;
use thiserror::Error;
use tracing::debug;

/// Stands in for a tool payload dropped to save space.
pub const OMITTED_MARKER: &str = "[output omitted for space]";

/// Token accounting for one assembled prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    pub used: usize,
    pub ceiling: usize,
    pub reserve: usize,
}

impl Budget {
    /// Largest prompt that still leaves room for the answer.
    pub fn limit(&self) -> usize {
        self.ceiling.saturating_sub(self.reserve)
    }

    pub fn fits(&self) -> bool {
        self.used <= self.limit()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BudgetError {
    /// The parts that may not be truncated are already too large.
    #[error("prompt needs at least {required} tokens but only {limit} are available")]
    Overflow { required: usize, limit: usize },
}

/// Everything that goes into one prompt.
pub struct PromptInput<'a> {
    pub system: &'a str,
    pub tools: &'a [ToolDefinition],
    pub history: &'a [ConversationTurn],
    pub question: &'a str,
    pub scratchpad: &'a [ScratchpadEntry],
}

/// A prompt that fits, with what had to go.
#[derive(Debug, Clone)]
pub struct AssembledPrompt {
    pub messages: Vec<Message>,
    pub budget: Budget,
    pub dropped_turns: usize,
    pub omitted_payloads: usize,
}

struct Slot {
    messages: Vec<Message>,
    tokens: usize,
}

impl Slot {
    fn new(messages: Vec<Message>) -> Self {
        let tokens = token::estimate_messages_tokens(&messages);
        Self { messages, tokens }
    }
}

/// Stateless; one per process is enough.
#[derive(Debug, Clone)]
pub struct BudgetManager {
    ceiling: usize,
    reserve: usize,
    recent_turns_kept: usize,
}

impl BudgetManager {
    pub fn new(ceiling: usize, reserve: usize, recent_turns_kept: usize) -> Self {
        Self {
            ceiling,
            reserve,
            recent_turns_kept,
        }
    }

    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(
            config.context_ceiling_tokens,
            config.answer_reserve_tokens,
            config.recent_turns_kept,
        )
    }

    /// Tokens any prompt may use: the ceiling minus the answer reserve.
    pub fn limit(&self) -> usize {
        self.ceiling.saturating_sub(self.reserve)
    }

    pub fn assemble(&self, input: &PromptInput<'_>) -> Result<AssembledPrompt, BudgetError> {
        let limit = self.limit();

        let system = Message::system(input.system);
        let question = Message::user(input.question);
        let fixed = token::estimate_message_tokens(&system)
            + token::estimate_message_tokens(&question)
            + token::estimate_tools_tokens(input.tools);
        if fixed > limit {
            return Err(BudgetError::Overflow {
                required: fixed,
                limit,
            });
        }

        let mut history: Vec<Slot> = input
            .history
            .iter()
            .map(|turn| Slot::new(vec![turn.to_message()]))
            .collect();
        let mut scratch: Vec<Slot> = input
            .scratchpad
            .iter()
            .map(|entry| Slot::new(entry.to_messages(None)))
            .collect();

        let total = |history: &[Slot], scratch: &[Slot]| {
            fixed
                + history.iter().map(|s| s.tokens).sum::<usize>()
                + scratch.iter().map(|s| s.tokens).sum::<usize>()
        };

        // 1. oldest history, keeping the recent window
        let mut dropped_turns = 0;
        while total(&history, &scratch) > limit && history.len() > self.recent_turns_kept {
            history.remove(0);
            dropped_turns += 1;
        }

        // 2. oldest tool payloads
        let mut omitted_payloads = 0;
        let mut used = total(&history, &scratch);
        for (slot, entry) in scratch.iter_mut().zip(input.scratchpad) {
            if used <= limit {
                break;
            }
            if !matches!(entry, ScratchpadEntry::Tool { .. }) {
                continue;
            }
            let elided = Slot::new(entry.to_messages(Some(OMITTED_MARKER)));
            if elided.tokens < slot.tokens {
                used -= slot.tokens - elided.tokens;
                *slot = elided;
                omitted_payloads += 1;
            }
        }

        // 3. the rest of the history
        while total(&history, &scratch) > limit && !history.is_empty() {
            history.remove(0);
            dropped_turns += 1;
        }

        let used = total(&history, &scratch);
        if used > limit {
            return Err(BudgetError::Overflow {
                required: used,
                limit,
            });
        }

        if dropped_turns > 0 || omitted_payloads > 0 {
            debug!(
                dropped_turns,
                omitted_payloads, used, limit, "Prompt truncated to fit context budget"
            );
        }

        let mut messages = Vec::with_capacity(2 + history.len() + scratch.len() * 2);
        messages.push(system);
        messages.extend(history.into_iter().flat_map(|s| s.messages));
        messages.push(question);
        messages.extend(scratch.into_iter().flat_map(|s| s.messages));

        Ok(AssembledPrompt {
            messages,
            budget: Budget {
                used,
                ceiling: self.ceiling,
                reserve: self.reserve,
            },
            dropped_turns,
            omitted_payloads,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repolens_core::message::Role;
    use repolens_core::{ErrorKind, ToolCatalog, ToolInvocation, ToolResult};

    fn history(turns: usize, chars: usize) -> Vec<ConversationTurn> {
        (0..turns)
            .map(|i| {
                let body = format!("turn {i} {}", "h".repeat(chars));
                if i % 2 == 0 {
                    ConversationTurn::user(body)
                } else {
                    ConversationTurn::assistant(body)
                }
            })
            .collect()
    }

    fn scratch(entries: usize, chars: usize) -> Vec<ScratchpadEntry> {
        (0..entries)
            .map(|i| ScratchpadEntry::Tool {
                invocation: ToolInvocation {
                    id: format!("call_{i}"),
                    name: "file-fetch".into(),
                    arguments: serde_json::json!({ "path": format!("src/f{i}.rs") }),
                },
                result: ToolResult::ok("p".repeat(chars)),
            })
            .collect()
    }

    fn input<'a>(
        tools: &'a [ToolDefinition],
        history: &'a [ConversationTurn],
        scratchpad: &'a [ScratchpadEntry],
    ) -> PromptInput<'a> {
        PromptInput {
            system: "You explore calcom/cal.com.",
            tools,
            history,
            question: "Where is the auth logic?",
            scratchpad,
        }
    }

    fn measured(prompt: &AssembledPrompt, tools: &[ToolDefinition]) -> usize {
        token::estimate_messages_tokens(&prompt.messages) + token::estimate_tools_tokens(tools)
    }

    #[test]
    fn small_prompt_is_untouched() {
        let tools = ToolCatalog::standard().definitions();
        let history = history(2, 10);
        let scratchpad = scratch(2, 10);
        let manager = BudgetManager::new(16_000, 2_000, 4);

        let prompt = manager.assemble(&input(&tools, &history, &scratchpad)).unwrap();
        assert_eq!(prompt.dropped_turns, 0);
        assert_eq!(prompt.omitted_payloads, 0);
        // system + 2 history + question + 2 × (call, result)
        assert_eq!(prompt.messages.len(), 8);
        assert_eq!(prompt.messages[0].role, Role::System);
        assert_eq!(prompt.messages[3].content, "Where is the auth logic?");
        assert_eq!(prompt.budget.used, measured(&prompt, &tools));
        assert!(prompt.budget.fits());
    }

    #[test]
    fn oldest_history_goes_first_keeping_recent_turns() {
        let tools = ToolCatalog::standard().definitions();
        let history = history(10, 400);
        let scratchpad = scratch(1, 40);
        let manager = BudgetManager::new(1_600, 400, 4);

        let prompt = manager.assemble(&input(&tools, &history, &scratchpad)).unwrap();
        assert!(prompt.dropped_turns > 0);
        assert!(prompt.dropped_turns <= 6);
        assert_eq!(prompt.omitted_payloads, 0);
        let kept: Vec<_> = prompt
            .messages
            .iter()
            .filter(|m| m.content.starts_with("turn "))
            .collect();
        assert!(kept.last().unwrap().content.starts_with("turn 9 "));
        assert!(prompt.budget.used <= 1_200);
    }

    #[test]
    fn payloads_are_elided_but_calls_stay() {
        let tools = ToolCatalog::standard().definitions();
        let history = history(2, 10);
        let scratchpad = scratch(6, 2_000);
        let manager = BudgetManager::new(3_500, 500, 4);

        let prompt = manager.assemble(&input(&tools, &history, &scratchpad)).unwrap();
        assert!(prompt.omitted_payloads > 0);
        assert_eq!(prompt.dropped_turns, 0);

        let calls = prompt.messages.iter().filter(|m| !m.tool_calls.is_empty()).count();
        assert_eq!(calls, 6);
        let results: Vec<_> = prompt
            .messages
            .iter()
            .filter(|m| m.role == Role::Tool)
            .collect();
        assert_eq!(results[0].content, OMITTED_MARKER);
        assert_ne!(results[5].content, OMITTED_MARKER);
        assert!(prompt.budget.used <= 3_000);
    }

    #[test]
    fn question_and_catalog_are_never_truncated() {
        let tools = ToolCatalog::standard().definitions();
        let history = history(12, 800);
        let scratchpad = scratch(10, 3_000);
        let manager = BudgetManager::new(4_000, 1_000, 2);

        let prompt = manager.assemble(&input(&tools, &history, &scratchpad)).unwrap();
        assert!(
            prompt
                .messages
                .iter()
                .any(|m| m.content == "Where is the auth logic?")
        );
        assert_eq!(prompt.messages[0].content, "You explore calcom/cal.com.");
        assert!(prompt.budget.used <= prompt.budget.limit());
    }

    #[test]
    fn overflowing_histories_always_fit_or_fail() {
        let tools = ToolCatalog::standard().definitions();
        let manager = BudgetManager::new(3_000, 600, 4);
        for turns in [0, 3, 9, 30] {
            for entries in [0, 2, 8] {
                let history = history(turns, 500);
                let scratchpad = scratch(entries, 1_500);
                match manager.assemble(&input(&tools, &history, &scratchpad)) {
                    Ok(prompt) => {
                        assert!(prompt.budget.used <= 2_400);
                        assert_eq!(prompt.budget.used, measured(&prompt, &tools));
                    }
                    Err(BudgetError::Overflow { required, limit }) => {
                        assert!(required > limit);
                    }
                }
            }
        }
    }

    #[test]
    fn oversized_question_overflows() {
        let tools = ToolCatalog::standard().definitions();
        let question = "q".repeat(40_000);
        let manager = BudgetManager::new(4_000, 500, 4);
        let err = manager
            .assemble(&PromptInput {
                system: "sys",
                tools: &tools,
                history: &[],
                question: &question,
                scratchpad: &[],
            })
            .unwrap_err();
        assert!(matches!(err, BudgetError::Overflow { limit: 3_500, .. }));
    }

    #[test]
    fn corrections_are_kept_verbatim() {
        let tools = ToolCatalog::standard().definitions();
        let mut scratchpad = scratch(3, 4_000);
        scratchpad.push(ScratchpadEntry::Tool {
            invocation: ToolInvocation {
                id: "call_bad".into(),
                name: "delete_repo".into(),
                arguments: serde_json::json!({}),
            },
            result: ToolResult::failure(ErrorKind::InvalidToolCall, "unknown tool"),
        });
        scratchpad.push(ScratchpadEntry::Correction {
            note: "Reply with a tool call or an answer.".into(),
        });
        let manager = BudgetManager::new(3_000, 500, 4);

        let prompt = manager.assemble(&input(&tools, &[], &scratchpad)).unwrap();
        let last = prompt.messages.last().unwrap();
        assert_eq!(last.content, "Reply with a tool call or an answer.");
        assert!(prompt.omitted_payloads >= 1);
    }
}
