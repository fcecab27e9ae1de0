//! file-fetch: one file's content, bounded by bytes and lines.

use crate::failure::{Scope, github_failure};
use async_trait::async_trait;
use repolens_core::{ErrorKind, PathArgs, RepoLocator, Tool, ToolKind, ToolResult};
use repolens_github::{Contents, GithubApi};
use std::sync::Arc;

/// How much of the file is inspected for NUL bytes.
const BINARY_SNIFF_BYTES: usize = 8000;

pub struct FileFetchTool {
    github: Arc<dyn GithubApi>,
    max_bytes: usize,
    max_lines: usize,
}

impl FileFetchTool {
    pub fn new(github: Arc<dyn GithubApi>, max_bytes: usize, max_lines: usize) -> Self {
        Self {
            github,
            max_bytes,
            max_lines,
        }
    }
}

/// Binary if it has a NUL early on or is not UTF-8.
pub fn is_binary(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(BINARY_SNIFF_BYTES)];
    head.contains(&0) || std::str::from_utf8(bytes).is_err()
}

/// Cut `text` to at most `max_lines` lines and `max_bytes` bytes, never
/// splitting a UTF-8 character. Returns the kept prefix and whether
/// anything was dropped.
pub fn truncate_text(text: &str, max_bytes: usize, max_lines: usize) -> (&str, bool) {
    let mut end = text.len();

    if let Some((idx, _)) = text.match_indices('\n').nth(max_lines.saturating_sub(1)) {
        if idx + 1 < text.len() {
            end = idx;
        }
    }

    if end > max_bytes {
        end = max_bytes;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
    }

    (&text[..end], end < text.len())
}

#[async_trait]
impl Tool for FileFetchTool {
    type Args = PathArgs;

    fn kind(&self) -> ToolKind {
        ToolKind::FileFetch
    }

    async fn execute(&self, repo: &RepoLocator, args: &PathArgs) -> ToolResult {
        let path = args.path.as_str();
        let contents = match self
            .github
            .contents(repo, path, args.git_ref.as_deref())
            .await
        {
            Ok(contents) => contents,
            Err(e) => return github_failure(self.kind().name(), repo, Scope::Path(path), &e),
        };

        let file = match contents {
            Contents::File(file) => file,
            Contents::Directory(_) => {
                return ToolResult::failure(
                    ErrorKind::NotFound,
                    format!("'{path}' is a directory, not a file. Use subdir-tree to list it."),
                );
            }
            Contents::Other { kind } => {
                return ToolResult::failure(
                    ErrorKind::NotFound,
                    format!("'{path}' is a {kind}, not a regular file."),
                );
            }
        };

        let Some(bytes) = file.bytes else {
            return ToolResult::partial(format!(
                "[File too large to display: {path} ({} bytes)]",
                file.size
            ));
        };

        if is_binary(&bytes) {
            return ToolResult::partial(format!(
                "[Binary file not shown: {path} ({} bytes)]",
                bytes.len()
            ));
        }

        // is_binary rejected invalid UTF-8 above
        let text = String::from_utf8_lossy(&bytes);
        let total_lines = text.lines().count();
        let (kept, truncated) = truncate_text(&text, self.max_bytes, self.max_lines);

        let mut payload = format!("File: {path} ({} bytes)\n\n{kept}", bytes.len());
        if truncated {
            payload.push_str(&format!(
                "\n... (truncated: showing {} of {total_lines} lines)",
                kept.lines().count()
            ));
            ToolResult::partial(payload)
        } else {
            ToolResult::ok(payload)
        }
    }
}
