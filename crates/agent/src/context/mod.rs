//! Prompt assembly under a token budget.
//!
//! [`token`] holds the estimator; [`budget`] decides what fits.

pub mod budget;
pub mod token;

pub use budget::{AssembledPrompt, Budget, BudgetError, BudgetManager, OMITTED_MARKER, PromptInput};
