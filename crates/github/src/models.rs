//! Typed views of the GitHub payloads the tools consume.

use base64::Engine;
use repolens_core::GithubError;
use serde::{Deserialize, Serialize};

/// `GET /repos/{owner}/{repo}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub full_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub forks_count: u64,
    #[serde(default)]
    pub open_issues_count: u64,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default = "default_branch")]
    pub default_branch: String,
    #[serde(default)]
    pub html_url: String,
}

fn default_branch() -> String {
    "main".into()
}

/// `GET /repos/{owner}/{repo}/git/trees/{ref}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitTree {
    #[serde(default)]
    pub sha: String,
    #[serde(default)]
    pub tree: Vec<TreeEntry>,
    /// GitHub cut the recursive listing short
    #[serde(default)]
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl TreeEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Tree
    }

    /// Last path segment.
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Blob,
    Tree,
    /// Submodule
    Commit,
}

/// One page of `GET /search/code`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SearchPage {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub incomplete_results: bool,
    #[serde(default)]
    pub items: Vec<CodeHit>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeHit {
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub html_url: String,
}

/// Code search hits collected over a bounded number of pages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResults {
    pub total_count: u64,
    pub incomplete_results: bool,
    pub items: Vec<CodeHit>,
}

/// `GET /repos/{owner}/{repo}/contents/{path}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Contents {
    File(RepoFile),
    /// The path is a directory; entry names.
    Directory(Vec<String>),
    /// Symlink or submodule.
    Other { kind: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoFile {
    pub path: String,
    pub size: u64,
    /// Decoded content. `None` when GitHub did not inline it (files over 1 MB).
    pub bytes: Option<Vec<u8>>,
}

#[derive(Debug, Deserialize)]
struct ContentObject {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    path: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    encoding: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DirectoryItem {
    name: String,
}

impl Contents {
    /// Parse a contents response: an array for directories, an object
    /// otherwise. File content is base64 with embedded newlines.
    pub(crate) fn from_body(body: &str) -> Result<Self, GithubError> {
        let value: serde_json::Value =
            serde_json::from_str(body).map_err(|e| GithubError::Decode(e.to_string()))?;

        if value.is_array() {
            let items: Vec<DirectoryItem> =
                serde_json::from_value(value).map_err(|e| GithubError::Decode(e.to_string()))?;
            return Ok(Self::Directory(items.into_iter().map(|i| i.name).collect()));
        }

        let object: ContentObject =
            serde_json::from_value(value).map_err(|e| GithubError::Decode(e.to_string()))?;
        if object.kind != "file" {
            return Ok(Self::Other { kind: object.kind });
        }

        let bytes = match (object.encoding.as_deref(), object.content.as_deref()) {
            (Some("base64"), Some(encoded)) if !encoded.is_empty() || object.size == 0 => {
                let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
                let decoded = base64::engine::general_purpose::STANDARD
                    .decode(compact)
                    .map_err(|e| GithubError::Decode(format!("invalid base64 content: {e}")))?;
                Some(decoded)
            }
            _ => None,
        };

        Ok(Self::File(RepoFile {
            path: object.path,
            size: object.size,
            bytes,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_base64_file_with_newlines() {
        let body = r#"{"type":"file","path":"README.md","size":11,"encoding":"base64","content":"aGVsbG8g\nd29ybGQ=\n"}"#;
        let Contents::File(file) = Contents::from_body(body).unwrap() else {
            panic!("expected a file");
        };
        assert_eq!(file.path, "README.md");
        assert_eq!(file.bytes.as_deref(), Some(b"hello world".as_slice()));
    }

    #[test]
    fn large_file_has_no_inline_content() {
        let body = r#"{"type":"file","path":"big.bin","size":5000000,"encoding":"none","content":""}"#;
        let Contents::File(file) = Contents::from_body(body).unwrap() else {
            panic!("expected a file");
        };
        assert!(file.bytes.is_none());
        assert_eq!(file.size, 5_000_000);
    }

    #[test]
    fn directory_listing_is_an_array() {
        let body = r#"[{"name":"a.rs","type":"file"},{"name":"sub","type":"dir"}]"#;
        assert_eq!(
            Contents::from_body(body).unwrap(),
            Contents::Directory(vec!["a.rs".into(), "sub".into()])
        );
    }

    #[test]
    fn symlink_is_other() {
        let body = r#"{"type":"symlink","path":"link","size":4}"#;
        assert_eq!(
            Contents::from_body(body).unwrap(),
            Contents::Other {
                kind: "symlink".into()
            }
        );
    }

    #[test]
    fn tree_entry_kinds_deserialize() {
        let tree: GitTree = serde_json::from_str(
            r#"{"sha":"abc","tree":[{"path":"src","type":"tree"},{"path":"src/lib.rs","type":"blob","size":42}],"truncated":false}"#,
        )
        .unwrap();
        assert!(tree.tree[0].is_dir());
        assert_eq!(tree.tree[1].name(), "lib.rs");
        assert_eq!(tree.tree[1].size, Some(42));
    }
}
