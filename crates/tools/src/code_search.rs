//! code-search: repository-scoped code and file-name search.

use crate::failure::{Scope, github_failure};
use async_trait::async_trait;
use repolens_core::{ErrorKind, RepoLocator, SearchArgs, Tool, ToolKind, ToolResult};
use repolens_github::GithubApi;
use std::sync::Arc;
use tracing::debug;

/// Qualifiers that would widen the search beyond the repository.
const SCOPE_QUALIFIERS: [&str; 3] = ["repo:", "org:", "user:"];

pub struct CodeSearchTool {
    github: Arc<dyn GithubApi>,
    max_results: usize,
    max_pages: u32,
}

impl CodeSearchTool {
    pub fn new(github: Arc<dyn GithubApi>, max_results: usize, max_pages: u32) -> Self {
        Self {
            github,
            max_results,
            max_pages,
        }
    }
}

/// Translate a simple query into search-API syntax scoped to `repo`.
///
/// A single bare file name (`DateRangeHeader.tsx`) becomes a `filename:`
/// qualifier; `dir/file.ext` becomes `path:` + `filename:`. Scope
/// qualifiers are replaced by `repo:owner/name`. Returns `None` if no
/// search terms remain.
pub fn translate_query(query: &str, repo: &RepoLocator) -> Option<String> {
    let terms: Vec<&str> = query
        .split_whitespace()
        .filter(|t| !SCOPE_QUALIFIERS.iter().any(|q| t.starts_with(q)))
        .collect();

    let translated = match terms.as_slice() {
        [] => return None,
        [single] if looks_like_file(single) => match single.rsplit_once('/') {
            Some((dir, name)) if !dir.is_empty() => format!("path:{dir} filename:{name}"),
            _ => format!("filename:{}", single.trim_start_matches('/')),
        },
        _ => terms.join(" "),
    };

    Some(format!("{translated} repo:{}", repo.full_name()))
}

fn looks_like_file(term: &str) -> bool {
    if term.contains(':') || term.starts_with('"') {
        return false;
    }
    let name = term.rsplit('/').next().unwrap_or(term);
    match name.rsplit_once('.') {
        Some((stem, ext)) => {
            !stem.is_empty() && !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric())
        }
        None => false,
    }
}

#[async_trait]
impl Tool for CodeSearchTool {
    type Args = SearchArgs;

    fn kind(&self) -> ToolKind {
        ToolKind::CodeSearch
    }

    async fn execute(&self, repo: &RepoLocator, args: &SearchArgs) -> ToolResult {
        let Some(query) = translate_query(&args.query, repo) else {
            return ToolResult::failure(
                ErrorKind::InvalidToolCall,
                "The query has no search terms after removing scope qualifiers.",
            );
        };
        debug!(query = %query, "Code search");

        let results = match self
            .github
            .search_code(&query, self.max_results, self.max_pages)
            .await
        {
            Ok(results) => results,
            Err(e) => return github_failure(self.kind().name(), repo, Scope::Search, &e),
        };

        if results.items.is_empty() {
            return ToolResult::ok("No matches found.");
        }

        let mut text = format!(
            "Found {} match(es) for `{}` (showing {}):\n",
            results.total_count,
            args.query,
            results.items.len()
        );
        for hit in &results.items {
            text.push_str(&format!("- {}: {} ({})\n", hit.name, hit.path, hit.html_url));
        }
        let truncated = results.total_count > results.items.len() as u64;
        if truncated {
            text.push_str("... more results omitted; refine the query to narrow them down\n");
        }
        if results.incomplete_results {
            text.push_str("(GitHub reported incomplete results)\n");
        }

        if truncated {
            ToolResult::partial(text)
        } else {
            ToolResult::ok(text)
        }
    }
}
