//! # repolens core
//!
//! Domain types, traits, and error definitions for the repolens agent,
//! which answers questions about a GitHub repository by exploring it with
//! a small set of read-only tools.
//! This crate has **no framework dependencies**: it defines the domain
//! model every other crate implements against.

pub mod error;
pub mod message;
pub mod provider;
pub mod repo;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{ErrorKind, GithubError, ProviderError, ToolError};
pub use message::{ConversationTurn, Message, MessageToolCall, Role, TurnRole};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use repo::{RepoLocator, RepoLocatorError};
pub use tool::{
    PathArgs, RefArgs, SearchArgs, Tool, ToolCall, ToolCatalog, ToolDescriptor, ToolInvocation,
    ToolKind, ToolResult,
};
