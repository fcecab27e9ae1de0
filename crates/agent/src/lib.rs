//! The repolens agent: answers a question about one GitHub repository by
//! exploring it with read-only tools.
//!
//! The loop follows a **think → act → observe** cycle:
//!
//! 1. **Assemble** the prompt under the context budget
//! 2. **Ask** the model for a decision via the LLM gateway
//! 3. **If tool calls**: validate, run them in order, record the results
//! 4. **If text**: that is the answer
//!
//! The loop stops at the answer, at a terminal failure, at the iteration
//! cap, or at the wall-clock timeout. Each request gets its own loop and
//! state; see [`RequestHandler`].

pub mod context;
pub mod handler;
pub mod llm;
pub mod outcome;
pub mod prompt;
pub mod reasoning;
pub mod state;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use context::{AssembledPrompt, Budget, BudgetError, BudgetManager, PromptInput};
pub use handler::{HandlerError, RequestHandler};
pub use llm::{Decision, LlmError, LlmGateway};
pub use outcome::LoopOutcome;
pub use reasoning::ReasoningLoop;
pub use state::{AgentState, Phase, ScratchpadEntry, Status};
