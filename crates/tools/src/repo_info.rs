//! repo-info: repository metadata.

use crate::failure::{Scope, github_failure};
use async_trait::async_trait;
use repolens_core::{RepoLocator, Tool, ToolKind, ToolResult};
use repolens_github::{GithubApi, Repository};
use std::sync::Arc;

pub struct RepoInfoTool {
    github: Arc<dyn GithubApi>,
}

impl RepoInfoTool {
    pub fn new(github: Arc<dyn GithubApi>) -> Self {
        Self { github }
    }
}

#[async_trait]
impl Tool for RepoInfoTool {
    type Args = ();

    fn kind(&self) -> ToolKind {
        ToolKind::RepoInfo
    }

    async fn execute(&self, repo: &RepoLocator, _args: &()) -> ToolResult {
        match self.github.repository(repo).await {
            Ok(info) => ToolResult::ok(describe(&info)),
            Err(e) => github_failure(self.kind().name(), repo, Scope::Repository, &e),
        }
    }
}

fn describe(info: &Repository) -> String {
    let or_none = |v: &Option<String>| v.clone().unwrap_or_else(|| "(none)".into());
    format!(
        "Repository: {}\nDescription: {}\nStars: {}\nForks: {}\nOpen issues: {}\nLanguage: {}\nDefault branch: {}\nURL: {}",
        info.full_name,
        or_none(&info.description),
        info.stargazers_count,
        info.forks_count,
        info.open_issues_count,
        or_none(&info.language),
        info.default_branch,
        info.html_url,
    )
}
