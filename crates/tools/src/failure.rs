//! Folding GitHub errors into tool observations.
//!
//! No tool lets a raw [`GithubError`] reach the reasoning loop; each one
//! becomes a [`ToolResult`] carrying an [`ErrorKind`] and a message the
//! model can act on.

use repolens_core::{ErrorKind, GithubError, RepoLocator, ToolResult};
use tracing::warn;

/// What a 404/403/422 means depends on what the tool was looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Scope<'a> {
    /// The repository itself (repo-info, root-tree).
    Repository,
    /// A path or ref inside the repository.
    Path(&'a str),
    /// Code search scoped to the repository.
    Search,
}

pub(crate) fn github_failure(
    tool: &str,
    repo: &RepoLocator,
    scope: Scope<'_>,
    error: &GithubError,
) -> ToolResult {
    warn!(tool, repo = %repo, error = %error, "GitHub call failed");

    let not_found = || {
        ToolResult::failure(
            ErrorKind::RepoNotFound,
            format!("Repository '{repo}' does not exist or is not accessible with the configured token."),
        )
    };

    match error {
        GithubError::Unauthorized(message) => ToolResult::failure(
            ErrorKind::Unauthorized,
            format!("GitHub rejected the access token: {message}"),
        ),
        GithubError::RateLimited {
            retry_after_secs,
            secondary,
        } => {
            let kind = if *secondary && scope == Scope::Search {
                ErrorKind::SearchRateLimited
            } else {
                ErrorKind::RateLimited
            };
            let hint = match retry_after_secs {
                Some(secs) => format!(" Retry in about {secs}s, or use a different tool."),
                None => " Try a different tool or a narrower request.".to_string(),
            };
            ToolResult::failure(kind, format!("GitHub rate limit reached.{hint}"))
        }
        GithubError::NotFound(_) => match scope {
            Scope::Repository | Scope::Search => not_found(),
            Scope::Path(path) => ToolResult::failure(
                ErrorKind::NotFound,
                format!("'{path}' was not found in {repo}. Check the tree or search for the file name."),
            ),
        },
        GithubError::Forbidden(message) => match scope {
            Scope::Repository | Scope::Search => not_found(),
            Scope::Path(path) => ToolResult::failure(
                ErrorKind::NotFound,
                format!("GitHub refused to serve '{path}' from {repo}: {message}"),
            ),
        },
        GithubError::Unprocessable(message) => match scope {
            Scope::Search => not_found(),
            _ => ToolResult::failure(ErrorKind::NotFound, message.clone()),
        },
        GithubError::Api { status, message } => ToolResult::failure(
            ErrorKind::Transport,
            format!("GitHub returned {status}: {message}"),
        ),
        GithubError::Transport(message) | GithubError::Decode(message) => ToolResult::failure(
            ErrorKind::Transport,
            format!("Could not reach GitHub: {message}"),
        ),
    }
}
