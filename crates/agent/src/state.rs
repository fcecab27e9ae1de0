//! Per-request agent state.
//!
//! One [`AgentState`] is created for each question, owned by exactly one
//! reasoning loop, and dropped when the request ends. Nothing in here is
//! shared, so two concurrent requests can never see each other's
//! scratchpad.

use repolens_core::message::Message;
use repolens_core::{ErrorKind, ToolInvocation, ToolResult};
use serde::Serialize;

/// Where the loop is in its think → act → observe cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "phase", content = "error")]
pub enum Phase {
    /// Waiting for the model to decide.
    Thinking,
    /// A tool call is in flight.
    Acting,
    /// A result is being merged into the scratchpad.
    Observing,
    Finished,
    Failed(ErrorKind),
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Failed(_))
    }
}

/// Coarse request status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "error")]
pub enum Status {
    Running,
    Finished,
    Failed(ErrorKind),
}

impl From<Phase> for Status {
    fn from(phase: Phase) -> Self {
        match phase {
            Phase::Finished => Self::Finished,
            Phase::Failed(kind) => Self::Failed(kind),
            _ => Self::Running,
        }
    }
}

/// One record in the scratchpad.
#[derive(Debug, Clone, PartialEq)]
pub enum ScratchpadEntry {
    /// A tool call the model asked for, valid or not, and what came back.
    Tool {
        invocation: ToolInvocation,
        result: ToolResult,
    },
    /// Feedback for a reply that had neither an answer nor a tool call.
    Correction { note: String },
}

impl ScratchpadEntry {
    /// Whether this record spends one of the request's corrections.
    pub fn is_corrective(&self) -> bool {
        match self {
            Self::Tool { result, .. } => result.error == Some(ErrorKind::InvalidToolCall),
            Self::Correction { .. } => true,
        }
    }

    /// Render as provider messages. `observation` replaces the tool
    /// result text when the budget manager has elided it.
    pub fn to_messages(&self, observation: Option<&str>) -> Vec<Message> {
        match self {
            Self::Tool { invocation, result } => {
                let text = match observation {
                    Some(text) => text.to_string(),
                    None => result.to_observation(),
                };
                vec![
                    Message::assistant_tool_calls("", vec![invocation.to_message_call()]),
                    Message::tool_result(&invocation.id, text),
                ]
            }
            Self::Correction { note } => vec![Message::user(note)],
        }
    }
}

/// The loop's private working state for one request.
#[derive(Debug)]
pub struct AgentState {
    phase: Phase,
    iterations: usize,
    corrections: usize,
    max_iterations: usize,
    max_corrections: usize,
    scratchpad: Vec<ScratchpadEntry>,
}

impl AgentState {
    pub fn new(max_iterations: usize, max_corrections: usize) -> Self {
        Self {
            phase: Phase::Thinking,
            iterations: 0,
            corrections: 0,
            max_iterations,
            max_corrections,
            scratchpad: Vec::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn status(&self) -> Status {
        self.phase.into()
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn corrections(&self) -> usize {
        self.corrections
    }

    pub fn scratchpad(&self) -> &[ScratchpadEntry] {
        &self.scratchpad
    }

    pub fn into_scratchpad(self) -> Vec<ScratchpadEntry> {
        self.scratchpad
    }

    pub fn is_running(&self) -> bool {
        !self.phase.is_terminal()
    }

    /// Room for at least one more record.
    pub fn has_iterations_left(&self) -> bool {
        self.iterations < self.max_iterations
    }

    pub fn corrections_exhausted(&self) -> bool {
        self.corrections >= self.max_corrections
    }

    /// Move to `phase`. Terminal phases are sticky: once finished or
    /// failed the state ignores further transitions.
    pub fn enter(&mut self, phase: Phase) -> bool {
        if self.phase.is_terminal() {
            return false;
        }
        self.phase = phase;
        true
    }

    /// Append a record and count it as one iteration. Refused when the
    /// loop is over or the iteration cap is reached.
    pub fn record(&mut self, entry: ScratchpadEntry) -> bool {
        if !self.is_running() || !self.has_iterations_left() {
            return false;
        }
        if entry.is_corrective() {
            self.corrections += 1;
        }
        self.iterations += 1;
        self.scratchpad.push(entry);
        true
    }
}
