use crate::state::{ScratchpadEntry, Status};
use repolens_core::ErrorKind;

/// How one request ended. Always carries user-facing text, even on
/// failure.
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    /// `Finished` or `Failed`, never `Running`.
    pub status: Status,
    pub answer: String,
    /// The answer is best-effort: the loop stopped before the model
    /// produced one.
    pub incomplete: bool,
    pub iterations: usize,
    pub scratchpad: Vec<ScratchpadEntry>,
}

impl LoopOutcome {
    pub fn is_finished(&self) -> bool {
        self.status == Status::Finished
    }

    pub fn error(&self) -> Option<ErrorKind> {
        match self.status {
            Status::Failed(kind) => Some(kind),
            _ => None,
        }
    }

    /// Number of tool calls that actually reached a tool (invalid calls
    /// excluded).
    pub fn tool_calls_made(&self) -> usize {
        self.scratchpad
            .iter()
            .filter(|entry| {
                matches!(entry, ScratchpadEntry::Tool { result, .. }
                    if result.error != Some(ErrorKind::InvalidToolCall))
            })
            .count()
    }

    /// Names of the tools called, in order.
    pub fn tools_called(&self) -> Vec<&str> {
        self.scratchpad
            .iter()
            .filter_map(|entry| match entry {
                ScratchpadEntry::Tool { invocation, .. } => Some(invocation.name.as_str()),
                ScratchpadEntry::Correction { .. } => None,
            })
            .collect()
    }
}
