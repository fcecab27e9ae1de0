//! Tool catalog: the closed set of read-only retrieval capabilities.
//!
//! The LLM proposes a [`ToolInvocation`] (name + raw JSON arguments). The
//! [`ToolCatalog`] validates it against the matching [`ToolDescriptor`] and
//! produces a typed [`ToolCall`]; anything that does not fit is a
//! [`ToolError`], never a panic. Each concrete tool implements [`Tool`].

use crate::error::{ErrorKind, ToolError};
use crate::message::MessageToolCall;
use crate::provider::ToolDefinition;
use crate::repo::RepoLocator;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The five tools the agent may use. Nothing else is dispatchable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToolKind {
    RepoInfo,
    RootTree,
    SubdirTree,
    CodeSearch,
    FileFetch,
}

impl ToolKind {
    pub const ALL: [ToolKind; 5] = [
        ToolKind::RepoInfo,
        ToolKind::RootTree,
        ToolKind::SubdirTree,
        ToolKind::CodeSearch,
        ToolKind::FileFetch,
    ];

    /// Wire name exposed to the LLM.
    pub fn name(&self) -> &'static str {
        match self {
            Self::RepoInfo => "repo-info",
            Self::RootTree => "root-tree",
            Self::SubdirTree => "subdir-tree",
            Self::CodeSearch => "code-search",
            Self::FileFetch => "file-fetch",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    fn purpose(&self) -> &'static str {
        match self {
            Self::RepoInfo => {
                "Get repository metadata: description, star count, primary language, default branch."
            }
            Self::RootTree => {
                "List the top-level folders and key root files (README, manifests). Start here."
            }
            Self::SubdirTree => {
                "Show the file tree under one directory, e.g. 'apps/web'. Large directories are cut off; narrow the path if so."
            }
            Self::CodeSearch => {
                "Search code or file names in the repository, e.g. 'useSession' or 'filename:auth.ts'."
            }
            Self::FileFetch => {
                "Fetch the content of one file by path. Long files are truncated; binary files are not shown."
            }
        }
    }

    fn parameters(&self) -> serde_json::Value {
        let git_ref = serde_json::json!({
            "type": "string",
            "description": "Branch, tag or commit SHA (defaults to the default branch)"
        });
        match self {
            Self::RepoInfo => serde_json::json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
            Self::RootTree => serde_json::json!({
                "type": "object",
                "properties": { "ref": git_ref },
                "required": []
            }),
            Self::SubdirTree => serde_json::json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Directory path relative to the repository root, e.g. 'apps/web/lib'"
                    },
                    "ref": git_ref
                },
                "required": ["path"]
            }),
            Self::CodeSearch => serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Search terms, a file name like 'DateRangeHeader.tsx', or qualifiers such as 'filename:' / 'path:' / 'extension:'"
                    }
                },
                "required": ["query"]
            }),
            Self::FileFetch => serde_json::json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "File path relative to the repository root"
                    },
                    "ref": git_ref
                },
                "required": ["path"]
            }),
        }
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Static description of one tool: name, purpose, parameter schema.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescriptor {
    pub kind: ToolKind,
    pub purpose: &'static str,
    pub parameters: serde_json::Value,
}

impl ToolDescriptor {
    pub fn for_kind(kind: ToolKind) -> Self {
        Self {
            kind,
            purpose: kind.purpose(),
            parameters: kind.parameters(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Convert into the schema sent to the LLM.
    pub fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.purpose.to_string(),
            parameters: self.parameters.clone(),
        }
    }

    /// Check `arguments` against the parameter schema: must be an object,
    /// required properties present, declared properties of the right type.
    /// Undeclared properties are ignored.
    fn check(&self, arguments: &serde_json::Value) -> Result<(), ToolError> {
        let invalid = |reason: String| ToolError::InvalidArguments {
            tool: self.name().to_string(),
            reason,
        };

        let Some(args) = arguments.as_object() else {
            return Err(invalid("arguments must be a JSON object".into()));
        };

        let properties = self.parameters["properties"].as_object();
        let required = self.parameters["required"].as_array();

        for name in required.into_iter().flatten().filter_map(|v| v.as_str()) {
            if !args.contains_key(name) {
                return Err(invalid(format!("missing required argument '{name}'")));
            }
        }

        for (name, schema) in properties.into_iter().flatten() {
            let Some(value) = args.get(name) else {
                continue;
            };
            let type_ok = match schema["type"].as_str() {
                Some("string") => value.is_string(),
                Some("integer") => value.is_i64() || value.is_u64(),
                Some("boolean") => value.is_boolean(),
                _ => true,
            };
            if !type_ok {
                return Err(invalid(format!(
                    "argument '{name}' must be of type {}",
                    schema["type"].as_str().unwrap_or("unknown")
                )));
            }
        }

        Ok(())
    }
}

/// A tool invocation proposed by the LLM, not yet validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Call ID (matches the LLM's tool_call.id)
    pub id: String,

    /// Tool name as the model spelled it
    pub name: String,

    /// Arguments as a JSON value
    pub arguments: serde_json::Value,
}

impl ToolInvocation {
    /// Build from the provider's wire form. Empty argument strings mean
    /// "no arguments"; unparseable JSON is kept verbatim as a string so
    /// validation can reject it with the original text.
    pub fn from_message_call(call: &MessageToolCall) -> Self {
        let raw = call.arguments.trim();
        let arguments = if raw.is_empty() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            serde_json::from_str(raw)
                .unwrap_or_else(|_| serde_json::Value::String(call.arguments.clone()))
        };
        Self {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments,
        }
    }

    /// Convert back to the provider's wire form.
    pub fn to_message_call(&self) -> MessageToolCall {
        let arguments = match &self.arguments {
            serde_json::Value::String(raw) => raw.clone(),
            other => other.to_string(),
        };
        MessageToolCall {
            id: self.id.clone(),
            name: self.name.clone(),
            arguments,
        }
    }
}

/// Arguments for tools that take a directory or file path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathArgs {
    pub path: String,
    pub git_ref: Option<String>,
}

/// Arguments for code search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchArgs {
    pub query: String,
}

/// Arguments for tools that only take an optional ref.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefArgs {
    pub git_ref: Option<String>,
}

/// A validated, typed tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    RepoInfo,
    RootTree(RefArgs),
    SubdirTree(PathArgs),
    CodeSearch(SearchArgs),
    FileFetch(PathArgs),
}

impl ToolCall {
    pub fn kind(&self) -> ToolKind {
        match self {
            Self::RepoInfo => ToolKind::RepoInfo,
            Self::RootTree(_) => ToolKind::RootTree,
            Self::SubdirTree(_) => ToolKind::SubdirTree,
            Self::CodeSearch(_) => ToolKind::CodeSearch,
            Self::FileFetch(_) => ToolKind::FileFetch,
        }
    }
}

/// The immutable catalog of tool descriptors, built once at startup and
/// shared read-only by every request.
#[derive(Debug, Clone)]
pub struct ToolCatalog {
    descriptors: Vec<ToolDescriptor>,
}

impl ToolCatalog {
    /// The standard five-tool catalog.
    pub fn standard() -> Self {
        Self {
            descriptors: ToolKind::ALL.into_iter().map(ToolDescriptor::for_kind).collect(),
        }
    }

    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.descriptors
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.descriptors.iter().find(|d| d.name() == name)
    }

    /// Tool schemas for the LLM, in catalog order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.descriptors.iter().map(|d| d.to_definition()).collect()
    }

    /// Validate an invocation and turn it into a typed call.
    pub fn validate(&self, invocation: &ToolInvocation) -> Result<ToolCall, ToolError> {
        let descriptor = self
            .get(&invocation.name)
            .ok_or_else(|| ToolError::UnknownTool(invocation.name.clone()))?;
        descriptor.check(&invocation.arguments)?;

        let args = &invocation.arguments;
        let git_ref = args["ref"]
            .as_str()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(String::from);

        let call = match descriptor.kind {
            ToolKind::RepoInfo => ToolCall::RepoInfo,
            ToolKind::RootTree => ToolCall::RootTree(RefArgs { git_ref }),
            ToolKind::SubdirTree => ToolCall::SubdirTree(PathArgs {
                path: required_path(descriptor, args)?,
                git_ref,
            }),
            ToolKind::CodeSearch => {
                let query = args["query"].as_str().unwrap_or_default().trim();
                if query.is_empty() {
                    return Err(ToolError::InvalidArguments {
                        tool: descriptor.name().into(),
                        reason: "'query' must not be empty".into(),
                    });
                }
                ToolCall::CodeSearch(SearchArgs {
                    query: query.to_string(),
                })
            }
            ToolKind::FileFetch => ToolCall::FileFetch(PathArgs {
                path: required_path(descriptor, args)?,
                git_ref,
            }),
        };
        Ok(call)
    }
}

impl Default for ToolCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

fn required_path(
    descriptor: &ToolDescriptor,
    args: &serde_json::Value,
) -> Result<String, ToolError> {
    let path = args["path"].as_str().unwrap_or_default().trim().trim_matches('/');
    if path.is_empty() {
        return Err(ToolError::InvalidArguments {
            tool: descriptor.name().into(),
            reason: "'path' must name a file or directory below the repository root".into(),
        });
    }
    Ok(path.to_string())
}

/// The bounded outcome of one tool execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the tool executed successfully
    pub success: bool,

    /// The (size-bounded) output text
    pub payload: String,

    /// Whether a truncation guard fired
    pub truncated: bool,

    /// Failure classification, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
}

impl ToolResult {
    pub fn ok(payload: impl Into<String>) -> Self {
        Self {
            success: true,
            payload: payload.into(),
            truncated: false,
            error: None,
        }
    }

    pub fn partial(payload: impl Into<String>) -> Self {
        Self {
            success: true,
            payload: payload.into(),
            truncated: true,
            error: None,
        }
    }

    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            payload: message.into(),
            truncated: false,
            error: Some(kind),
        }
    }

    /// Text fed back to the model as the observation.
    pub fn to_observation(&self) -> String {
        match self.error {
            Some(kind) => format!("Error [{kind}]: {}", self.payload),
            None => self.payload.clone(),
        }
    }
}

/// The capability every tool implements: `(RepoLocator, arguments) → ToolResult`.
///
/// Implementations are read-only against GitHub and never return a raw
/// transport error; failures are folded into the result.
#[async_trait]
pub trait Tool: Send + Sync {
    type Args: Send + Sync;

    fn kind(&self) -> ToolKind;

    async fn execute(&self, repo: &RepoLocator, args: &Self::Args) -> ToolResult;
}
