//! The five read-only GitHub retrieval tools.
//!
//! Each tool is a function of `(RepoLocator, arguments) → ToolResult`,
//! idempotent against an unchanged repository, with its own output-size
//! guard. [`ToolSet`] dispatches a validated [`ToolCall`] to the matching
//! tool; there is no dynamic registry.

pub mod code_search;
pub mod file_fetch;
mod failure;
pub mod repo_info;
pub mod root_tree;
pub mod subdir_tree;
pub mod tree;

pub use code_search::CodeSearchTool;
pub use file_fetch::FileFetchTool;
pub use repo_info::RepoInfoTool;
pub use root_tree::RootTreeTool;
pub use subdir_tree::SubdirTreeTool;

use repolens_config::ToolsConfig;
use repolens_core::{RepoLocator, Tool, ToolCall, ToolResult};
use repolens_github::GithubApi;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// All five tools, built once and shared read-only across requests.
pub struct ToolSet {
    repo_info: RepoInfoTool,
    root_tree: RootTreeTool,
    subdir_tree: SubdirTreeTool,
    code_search: CodeSearchTool,
    file_fetch: FileFetchTool,
}

impl ToolSet {
    pub fn new(github: Arc<dyn GithubApi>, config: &ToolsConfig) -> Self {
        Self {
            repo_info: RepoInfoTool::new(github.clone()),
            root_tree: RootTreeTool::new(
                github.clone(),
                config.root_files.clone(),
                config.root_max_entries,
            ),
            subdir_tree: SubdirTreeTool::new(
                github.clone(),
                config.subdir_max_nodes,
                config.subdir_max_depth,
            ),
            code_search: CodeSearchTool::new(
                github.clone(),
                config.search_max_results,
                config.search_max_pages,
            ),
            file_fetch: FileFetchTool::new(github, config.file_max_bytes, config.file_max_lines),
        }
    }

    /// Run one validated call. Never fails: errors come back inside the
    /// result.
    pub async fn execute(&self, repo: &RepoLocator, call: &ToolCall) -> ToolResult {
        let started = Instant::now();
        let tool = call.kind().name();
        debug!(tool, repo = %repo, args = ?call, "Executing tool");

        let result = match call {
            ToolCall::RepoInfo => self.repo_info.execute(repo, &()).await,
            ToolCall::RootTree(args) => self.root_tree.execute(repo, args).await,
            ToolCall::SubdirTree(args) => self.subdir_tree.execute(repo, args).await,
            ToolCall::CodeSearch(args) => self.code_search.execute(repo, args).await,
            ToolCall::FileFetch(args) => self.file_fetch.execute(repo, args).await,
        };

        info!(
            tool,
            repo = %repo,
            success = result.success,
            truncated = result.truncated,
            error = result.error.map(|k| k.as_str()),
            bytes = result.payload.len(),
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Tool finished"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repolens_core::{ErrorKind, PathArgs, RefArgs, SearchArgs};
    use repolens_github::test_support::{FixtureGithub, FixtureRepo};

    fn toolset() -> ToolSet {
        let host = FixtureGithub::new().with_repo(
            FixtureRepo::new("calcom", "cal.com")
                .description("Scheduling")
                .file("README.md", "# Cal.com")
                .file("apps/web/lib/auth/index.ts", "export const auth = 1;"),
        );
        ToolSet::new(Arc::new(host), &ToolsConfig::default())
    }

    #[tokio::test]
    async fn dispatches_every_variant() {
        let tools = toolset();
        let repo = RepoLocator::new("calcom", "cal.com");

        let calls = [
            ToolCall::RepoInfo,
            ToolCall::RootTree(RefArgs::default()),
            ToolCall::SubdirTree(PathArgs {
                path: "apps/web".into(),
                git_ref: None,
            }),
            ToolCall::CodeSearch(SearchArgs {
                query: "auth".into(),
            }),
            ToolCall::FileFetch(PathArgs {
                path: "apps/web/lib/auth/index.ts".into(),
                git_ref: None,
            }),
        ];
        for call in &calls {
            let result = tools.execute(&repo, call).await;
            assert!(result.success, "{call:?} failed: {}", result.payload);
        }
    }

    #[tokio::test]
    async fn repo_level_failures_are_terminal_observations() {
        let tools = toolset();
        let result = tools
            .execute(&RepoLocator::new("owner", "does-not-exist"), &ToolCall::RepoInfo)
            .await;
        assert_eq!(result.error, Some(ErrorKind::RepoNotFound));
        assert!(ErrorKind::RepoNotFound.is_terminal_observation());
    }
}
