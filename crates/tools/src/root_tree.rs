//! root-tree: top-level directories and key root files.

use crate::failure::{Scope, github_failure};
use crate::tree::render_root;
use async_trait::async_trait;
use repolens_core::{RefArgs, RepoLocator, Tool, ToolKind, ToolResult};
use repolens_github::GithubApi;
use std::sync::Arc;

pub struct RootTreeTool {
    github: Arc<dyn GithubApi>,
    root_files: Vec<String>,
    max_entries: usize,
}

impl RootTreeTool {
    pub fn new(github: Arc<dyn GithubApi>, root_files: Vec<String>, max_entries: usize) -> Self {
        Self {
            github,
            root_files,
            max_entries,
        }
    }
}

#[async_trait]
impl Tool for RootTreeTool {
    type Args = RefArgs;

    fn kind(&self) -> ToolKind {
        ToolKind::RootTree
    }

    async fn execute(&self, repo: &RepoLocator, args: &RefArgs) -> ToolResult {
        let git_ref = args.git_ref.as_deref().unwrap_or("HEAD");
        let tree = match self.github.tree(repo, git_ref, false).await {
            Ok(tree) => tree,
            Err(e) => {
                let scope = match &args.git_ref {
                    Some(r) => Scope::Path(r),
                    None => Scope::Repository,
                };
                return github_failure(self.kind().name(), repo, scope, &e);
            }
        };

        let rendered = render_root(&tree.tree, &self.root_files, self.max_entries);
        let text = format!("Top-level structure of {repo}:\n\n{}", rendered.text);
        if rendered.truncated {
            ToolResult::partial(text)
        } else {
            ToolResult::ok(text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repolens_github::test_support::{FixtureGithub, FixtureRepo};

    fn host() -> Arc<FixtureGithub> {
        Arc::new(
            FixtureGithub::new().with_repo(
                FixtureRepo::new("calcom", "cal.com")
                    .file("README.md", "# Cal.com")
                    .file("package.json", "{}")
                    .file(".env.example", "X=1")
                    .file("apps/web/lib/auth/index.ts", "export {}")
                    .file("packages/ui/index.ts", "export {}"),
            ),
        )
    }

    fn tool(host: Arc<FixtureGithub>, max_entries: usize) -> RootTreeTool {
        RootTreeTool::new(
            host,
            vec!["README.md".into(), "package.json".into()],
            max_entries,
        )
    }

    #[tokio::test]
    async fn lists_top_level_only() {
        let result = tool(host(), 80)
            .execute(&RepoLocator::new("calcom", "cal.com"), &RefArgs::default())
            .await;
        assert!(result.success);
        assert!(!result.truncated);
        assert!(result.payload.contains("📁 apps"));
        assert!(result.payload.contains("📄 README.md"));
        assert!(!result.payload.contains(".env.example"));
        assert!(!result.payload.contains("auth"));
    }

    #[tokio::test]
    async fn cap_sets_truncated() {
        let result = tool(host(), 2)
            .execute(&RepoLocator::new("calcom", "cal.com"), &RefArgs::default())
            .await;
        assert!(result.success);
        assert!(result.truncated);
        assert!(result.payload.contains("+2 more entries omitted"));
    }

    #[tokio::test]
    async fn repeated_calls_are_identical() {
        let tool = tool(host(), 80);
        let repo = RepoLocator::new("calcom", "cal.com");
        let first = tool.execute(&repo, &RefArgs::default()).await;
        let second = tool.execute(&repo, &RefArgs::default()).await;
        assert_eq!(first.payload, second.payload);
    }
}
