//! subdir-tree: a bounded visual tree for one directory.

use crate::failure::{Scope, github_failure};
use crate::tree::{Subtree, render_subtree};
use async_trait::async_trait;
use repolens_core::{ErrorKind, PathArgs, RepoLocator, Tool, ToolKind, ToolResult};
use repolens_github::GithubApi;
use std::sync::Arc;
use tracing::debug;

pub struct SubdirTreeTool {
    github: Arc<dyn GithubApi>,
    max_nodes: usize,
    max_depth: usize,
}

impl SubdirTreeTool {
    pub fn new(github: Arc<dyn GithubApi>, max_nodes: usize, max_depth: usize) -> Self {
        Self {
            github,
            max_nodes,
            max_depth,
        }
    }
}

#[async_trait]
impl Tool for SubdirTreeTool {
    type Args = PathArgs;

    fn kind(&self) -> ToolKind {
        ToolKind::SubdirTree
    }

    async fn execute(&self, repo: &RepoLocator, args: &PathArgs) -> ToolResult {
        let git_ref = args.git_ref.as_deref().unwrap_or("HEAD");
        let tree = match self.github.tree(repo, git_ref, true).await {
            Ok(tree) => tree,
            Err(e) => {
                let scope = match &args.git_ref {
                    Some(r) => Scope::Path(r),
                    None => Scope::Repository,
                };
                return github_failure(self.kind().name(), repo, scope, &e);
            }
        };

        let path = args.path.as_str();
        match render_subtree(&tree.tree, path, self.max_nodes, self.max_depth) {
            Subtree::Missing => ToolResult::failure(
                ErrorKind::NotFound,
                format!("Directory '{path}' not found in {repo}. Check root-tree for valid paths."),
            ),
            Subtree::NotADirectory => ToolResult::failure(
                ErrorKind::NotFound,
                format!("'{path}' is a file, not a directory. Use file-fetch to read it."),
            ),
            Subtree::Rendered(rendered) => {
                debug!(path, nodes = rendered.nodes, truncated = rendered.truncated, "Rendered subtree");
                let mut text = format!("Contents of {repo}/{path}:\n\n{}", rendered.text);
                // GitHub itself cut the recursive listing short
                if tree.truncated {
                    text.push_str("\n... (repository tree too large; listing may be incomplete)");
                }
                if rendered.truncated || tree.truncated {
                    ToolResult::partial(text)
                } else {
                    ToolResult::ok(text)
                }
            }
        }
    }
}
