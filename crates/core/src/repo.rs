//! Repository locator: which GitHub repository a request is about.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// `owner/name` of a GitHub repository.
///
/// Parsed once from the caller's `repo_name` and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoLocator {
    pub owner: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepoLocatorError {
    #[error("repository name is empty")]
    Empty,

    #[error("expected 'owner/name', got '{0}'")]
    Malformed(String),

    #[error("invalid character in '{0}'")]
    InvalidCharacter(String),
}

impl RepoLocator {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Parse `owner/name`. Also accepts a `https://github.com/owner/name`
    /// URL and a trailing `.git`.
    pub fn parse(input: &str) -> Result<Self, RepoLocatorError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(RepoLocatorError::Empty);
        }

        let without_scheme = trimmed
            .strip_prefix("https://")
            .or_else(|| trimmed.strip_prefix("http://"))
            .unwrap_or(trimmed);
        let without_host = without_scheme
            .strip_prefix("github.com/")
            .or_else(|| without_scheme.strip_prefix("www.github.com/"))
            .unwrap_or(without_scheme);
        let path = without_host.trim_end_matches('/');
        let path = path.strip_suffix(".git").unwrap_or(path);

        let mut parts = path.split('/');
        let (Some(owner), Some(name), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(RepoLocatorError::Malformed(trimmed.to_string()));
        };
        if owner.is_empty() || name.is_empty() {
            return Err(RepoLocatorError::Malformed(trimmed.to_string()));
        }

        for segment in [owner, name] {
            let valid = segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
            if !valid || segment == "." || segment == ".." {
                return Err(RepoLocatorError::InvalidCharacter(segment.to_string()));
            }
        }

        Ok(Self::new(owner, name))
    }

    /// `owner/name`, as used in search qualifiers and logs.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl std::fmt::Display for RepoLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl std::str::FromStr for RepoLocator {
    type Err = RepoLocatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
