//! The reasoning loop: think → act → observe until an answer or a
//! terminal failure.
//!
//! Each iteration:
//!
//! 1. The budget manager assembles the prompt (system instructions, tool
//!    catalog, truncated history, question, scratchpad) under
//!    `ceiling - reserve`.
//! 2. The LLM gateway returns a decision.
//! 3. A final answer ends the loop as `Finished`.
//! 4. Tool calls are validated against the catalog and run one at a time,
//!    in the order received. An invalid call becomes an `InvalidToolCall`
//!    observation without touching the network.
//! 5. Every result is appended to the scratchpad and counts as one
//!    iteration; the cap is checked before each record.
//!
//! The whole run is bounded by a wall-clock timeout. Nothing is spawned:
//! dropping the future cancels any in-flight call and frees the state.

use crate::context::{BudgetManager, PromptInput};
use crate::llm::{Decision, LlmGateway};
use crate::outcome::LoopOutcome;
use crate::prompt;
use crate::state::{AgentState, Phase, ScratchpadEntry};
use repolens_config::AgentConfig;
use repolens_core::message::ConversationTurn;
use repolens_core::{ErrorKind, RepoLocator, ToolCatalog, ToolInvocation, ToolResult};
use repolens_tools::ToolSet;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Bytes of scratchpad quoted in a mechanical best-effort summary.
const SUMMARY_MAX_BYTES: usize = 6_000;

/// Why `drive` stopped.
enum Ended {
    Answer(String),
    Failed { kind: ErrorKind, message: String },
    Exhausted,
}

/// One request's loop. Build a fresh one per question and consume it
/// with [`ReasoningLoop::run`].
pub struct ReasoningLoop<'a> {
    repo: RepoLocator,
    catalog: &'a ToolCatalog,
    tools: &'a ToolSet,
    llm: &'a LlmGateway,
    budget: &'a BudgetManager,
    config: &'a AgentConfig,
    state: AgentState,
}

impl<'a> ReasoningLoop<'a> {
    pub fn new(
        repo: RepoLocator,
        catalog: &'a ToolCatalog,
        tools: &'a ToolSet,
        llm: &'a LlmGateway,
        budget: &'a BudgetManager,
        config: &'a AgentConfig,
    ) -> Self {
        Self {
            repo,
            catalog,
            tools,
            llm,
            budget,
            config,
            state: AgentState::new(config.max_iterations, config.max_corrections),
        }
    }

    pub async fn run(mut self, question: &str, history: &[ConversationTurn]) -> LoopOutcome {
        let started = Instant::now();
        info!(
            repo = %self.repo,
            history = history.len(),
            max_iterations = self.config.max_iterations,
            "Reasoning loop starting"
        );

        let limit = Duration::from_secs(self.config.loop_timeout_secs);
        let ended = match tokio::time::timeout(limit, self.drive(question, history)).await {
            Ok(ended) => ended,
            Err(_) => {
                warn!(repo = %self.repo, timeout_secs = limit.as_secs(), "Reasoning loop timed out");
                Ended::Failed {
                    kind: ErrorKind::LoopTimeout,
                    message: String::new(),
                }
            }
        };

        let repo = self.repo.clone();
        let remaining = limit.saturating_sub(started.elapsed());
        let outcome = self.finish(question, ended, remaining).await;
        info!(
            repo = %repo,
            status = ?outcome.status,
            iterations = outcome.iterations,
            tool_calls = outcome.tool_calls_made(),
            incomplete = outcome.incomplete,
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Reasoning loop finished"
        );
        outcome
    }

    async fn drive(&mut self, question: &str, history: &[ConversationTurn]) -> Ended {
        let system = prompt::system_prompt(&self.repo);
        let definitions = self.catalog.definitions();

        loop {
            if !self.state.has_iterations_left() {
                return Ended::Exhausted;
            }
            self.state.enter(Phase::Thinking);

            let assembled = match self.budget.assemble(&PromptInput {
                system: &system,
                tools: &definitions,
                history,
                question,
                scratchpad: self.state.scratchpad(),
            }) {
                Ok(assembled) => assembled,
                Err(e) => {
                    return Ended::Failed {
                        kind: ErrorKind::ContextOverflow,
                        message: e.to_string(),
                    };
                }
            };
            debug!(
                iteration = self.state.iterations(),
                used = assembled.budget.used,
                limit = assembled.budget.limit(),
                dropped_turns = assembled.dropped_turns,
                omitted_payloads = assembled.omitted_payloads,
                "Prompt assembled"
            );

            let decision = match self.llm.decide(assembled.messages, definitions.clone()).await {
                Ok(decision) => decision,
                Err(e) => {
                    return Ended::Failed {
                        kind: ErrorKind::LlmUnavailable,
                        message: e.to_string(),
                    };
                }
            };

            match decision {
                Decision::FinalAnswer(text) => return Ended::Answer(text),
                Decision::Malformed(reason) => {
                    warn!(iteration = self.state.iterations(), %reason, "Unusable model reply");
                    self.state.record(ScratchpadEntry::Correction {
                        note: prompt::correction_note(&reason),
                    });
                    if self.state.corrections_exhausted() {
                        return self.too_many_corrections();
                    }
                }
                Decision::ToolCalls { thought, calls } => {
                    if !thought.trim().is_empty() {
                        debug!(iteration = self.state.iterations(), thought = %thought, "Thought");
                    }
                    for invocation in calls {
                        if !self.state.has_iterations_left() {
                            break;
                        }
                        if let Some(ended) = self.act(invocation).await {
                            return ended;
                        }
                    }
                }
            }
        }
    }

    /// Validate and run one call, then record it. Returns `Some` when the
    /// observation ends the request.
    async fn act(&mut self, invocation: ToolInvocation) -> Option<Ended> {
        let result = match self.catalog.validate(&invocation) {
            Ok(call) => {
                self.state.enter(Phase::Acting);
                self.tools.execute(&self.repo, &call).await
            }
            Err(e) => {
                warn!(tool = %invocation.name, error = %e, "Rejected tool call");
                ToolResult::failure(
                    ErrorKind::InvalidToolCall,
                    format!("{e}. Available tools: {}.", self.tool_names()),
                )
            }
        };

        self.state.enter(Phase::Observing);
        let terminal = result.error.filter(ErrorKind::is_terminal_observation);
        let message = result.payload.clone();
        let entry = ScratchpadEntry::Tool { invocation, result };
        let corrective = entry.is_corrective();
        self.state.record(entry);

        if let Some(kind) = terminal {
            return Some(Ended::Failed { kind, message });
        }
        if corrective && self.state.corrections_exhausted() {
            return Some(self.too_many_corrections());
        }
        None
    }

    fn too_many_corrections(&self) -> Ended {
        Ended::Failed {
            kind: ErrorKind::InvalidToolCall,
            message: format!(
                "The model produced {} unusable tool calls or replies and was stopped.",
                self.state.corrections()
            ),
        }
    }

    fn tool_names(&self) -> String {
        self.catalog
            .descriptors()
            .iter()
            .map(|d| d.name())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `remaining` is what is left of the wall-clock budget; a synthesis
    /// call that outlives it is dropped and the run ends as a timeout.
    async fn finish(mut self, question: &str, ended: Ended, remaining: Duration) -> LoopOutcome {
        let (phase, answer, incomplete) = match ended {
            Ended::Answer(text) => (Phase::Finished, text, false),
            Ended::Exhausted => {
                match tokio::time::timeout(remaining, self.best_effort(question)).await {
                    Ok(answer) => {
                        let kind = ErrorKind::LoopExhausted;
                        let answer = answer.unwrap_or_else(|| self.mechanical_summary(kind));
                        (Phase::Failed(kind), answer, true)
                    }
                    Err(_) => {
                        warn!(repo = %self.repo, "Final synthesis ran out of time");
                        let kind = ErrorKind::LoopTimeout;
                        (Phase::Failed(kind), self.mechanical_summary(kind), true)
                    }
                }
            }
            Ended::Failed { kind, message } => match kind {
                ErrorKind::RepoNotFound | ErrorKind::Unauthorized | ErrorKind::LlmUnavailable => {
                    (Phase::Failed(kind), message, false)
                }
                ErrorKind::LoopTimeout => {
                    (Phase::Failed(kind), self.mechanical_summary(kind), true)
                }
                _ => {
                    let answer = format!("{message}\n\n{}", self.mechanical_summary(kind));
                    (Phase::Failed(kind), answer, true)
                }
            },
        };

        self.state.enter(phase);
        LoopOutcome {
            status: self.state.status(),
            answer,
            incomplete,
            iterations: self.state.iterations(),
            scratchpad: self.state.into_scratchpad(),
        }
    }

    /// A last tool-less call asking for an answer from the observations.
    /// `None` when synthesis is off, does not fit the budget, or fails.
    async fn best_effort(&self, question: &str) -> Option<String> {
        if !self.config.synthesize_on_exhaustion {
            return None;
        }
        let Some(messages) =
            prompt::synthesis_messages(question, self.state.scratchpad(), self.budget.limit())
        else {
            warn!(limit = self.budget.limit(), "Question leaves no room for a final synthesis");
            return None;
        };
        match self.llm.complete_text(messages).await {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(error = %e, "Final synthesis failed");
                None
            }
        }
    }

    fn mechanical_summary(&self, kind: ErrorKind) -> String {
        let reason = match kind {
            ErrorKind::LoopTimeout => "I ran out of time before reaching a final answer.",
            ErrorKind::LoopExhausted => "I reached the step limit before reaching a final answer.",
            _ => "I could not reach a final answer.",
        };
        let mut observed = prompt::observations(self.state.scratchpad());
        if observed.len() > SUMMARY_MAX_BYTES {
            let mut end = SUMMARY_MAX_BYTES;
            while !observed.is_char_boundary(end) {
                end -= 1;
            }
            observed.truncate(end);
            observed.push_str("\n...");
        }
        format!("{reason} Here is what I found so far:\n\n{observed}")
    }
}
