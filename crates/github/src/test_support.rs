//! In-memory GitHub host for tests.
//!
//! Repositories are declared as flat file maps; directories are implied
//! by paths. Every call is counted and failures can be queued per
//! endpoint.

use crate::api::GithubApi;
use crate::models::{
    CodeHit, Contents, EntryKind, GitTree, RepoFile, Repository, SearchResults, TreeEntry,
};
use async_trait::async_trait;
use repolens_core::{GithubError, RepoLocator};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Repository,
    Tree,
    Search,
    Contents,
}

/// One repository in the fixture host.
#[derive(Debug, Clone)]
pub struct FixtureRepo {
    pub info: Repository,
    pub files: BTreeMap<String, Vec<u8>>,
}

impl FixtureRepo {
    pub fn new(owner: &str, name: &str) -> Self {
        Self {
            info: Repository {
                full_name: format!("{owner}/{name}"),
                description: None,
                stargazers_count: 0,
                forks_count: 0,
                open_issues_count: 0,
                language: None,
                default_branch: "main".into(),
                html_url: format!("https://github.com/{owner}/{name}"),
            },
            files: BTreeMap::new(),
        }
    }

    pub fn description(mut self, description: &str) -> Self {
        self.info.description = Some(description.into());
        self
    }

    pub fn stars(mut self, stars: u64) -> Self {
        self.info.stargazers_count = stars;
        self
    }

    pub fn language(mut self, language: &str) -> Self {
        self.info.language = Some(language.into());
        self
    }

    pub fn file(mut self, path: &str, content: impl AsRef<[u8]>) -> Self {
        self.files.insert(path.into(), content.as_ref().to_vec());
        self
    }

    /// Every directory implied by the file paths.
    fn directories(&self) -> BTreeSet<String> {
        let mut dirs = BTreeSet::new();
        for path in self.files.keys() {
            let mut parts: Vec<&str> = path.split('/').collect();
            parts.pop();
            for depth in 1..=parts.len() {
                dirs.insert(parts[..depth].join("/"));
            }
        }
        dirs
    }

    fn entries(&self) -> Vec<TreeEntry> {
        let mut entries: Vec<TreeEntry> = self
            .directories()
            .into_iter()
            .map(|path| TreeEntry {
                path,
                kind: EntryKind::Tree,
                size: None,
            })
            .chain(self.files.iter().map(|(path, bytes)| TreeEntry {
                path: path.clone(),
                kind: EntryKind::Blob,
                size: Some(bytes.len() as u64),
            }))
            .collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        entries
    }
}

#[derive(Default)]
pub struct FixtureGithub {
    repos: HashMap<String, FixtureRepo>,
    failures: Mutex<HashMap<Endpoint, VecDeque<GithubError>>>,
    calls: Mutex<HashMap<Endpoint, usize>>,
    total: AtomicUsize,
    latency: Option<Duration>,
}

impl FixtureGithub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_repo(mut self, repo: FixtureRepo) -> Self {
        self.repos.insert(repo.info.full_name.clone(), repo);
        self
    }

    /// Delay every call (paired with paused time in tests).
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make the next call to `endpoint` fail with `error`.
    pub fn fail_next(&self, endpoint: Endpoint, error: GithubError) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.entry(endpoint).or_default().push_back(error);
        }
    }

    pub fn total_calls(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    pub fn calls(&self, endpoint: Endpoint) -> usize {
        self.calls
            .lock()
            .map(|calls| calls.get(&endpoint).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    async fn enter(&self, endpoint: Endpoint) -> Result<(), GithubError> {
        self.total.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut calls) = self.calls.lock() {
            *calls.entry(endpoint).or_default() += 1;
        }
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let queued = self
            .failures
            .lock()
            .ok()
            .and_then(|mut failures| failures.get_mut(&endpoint)?.pop_front());
        match queued {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn repo(&self, repo: &RepoLocator) -> Result<&FixtureRepo, GithubError> {
        self.repos
            .get(&repo.full_name())
            .ok_or_else(|| GithubError::NotFound("Not Found".into()))
    }

    fn check_ref(repo: &FixtureRepo, git_ref: &str) -> Result<(), GithubError> {
        if git_ref == "HEAD" || git_ref == repo.info.default_branch {
            Ok(())
        } else {
            Err(GithubError::NotFound(format!("No commit found for the ref {git_ref}")))
        }
    }
}

#[async_trait]
impl GithubApi for FixtureGithub {
    async fn repository(&self, repo: &RepoLocator) -> Result<Repository, GithubError> {
        self.enter(Endpoint::Repository).await?;
        Ok(self.repo(repo)?.info.clone())
    }

    async fn tree(
        &self,
        repo: &RepoLocator,
        git_ref: &str,
        recursive: bool,
    ) -> Result<GitTree, GithubError> {
        self.enter(Endpoint::Tree).await?;
        let fixture = self.repo(repo)?;
        Self::check_ref(fixture, git_ref)?;

        let tree = fixture
            .entries()
            .into_iter()
            .filter(|entry| recursive || !entry.path.contains('/'))
            .collect();
        Ok(GitTree {
            sha: "fixture".into(),
            tree,
            truncated: false,
        })
    }

    async fn search_code(
        &self,
        query: &str,
        max_results: usize,
        _max_pages: u32,
    ) -> Result<SearchResults, GithubError> {
        self.enter(Endpoint::Search).await?;

        let mut repo_name = None;
        let mut filename = None;
        let mut terms = Vec::new();
        for token in query.split_whitespace() {
            if let Some(name) = token.strip_prefix("repo:") {
                repo_name = Some(name);
            } else if let Some(name) = token.strip_prefix("filename:") {
                filename = Some(name);
            } else {
                terms.push(token);
            }
        }

        let fixture = repo_name
            .and_then(|name| self.repos.get(name))
            .ok_or_else(|| {
                GithubError::Unprocessable(
                    "The listed users and repositories cannot be searched".into(),
                )
            })?;

        let items: Vec<CodeHit> = fixture
            .files
            .iter()
            .filter(|(path, bytes)| {
                let name = path.rsplit('/').next().unwrap_or(path.as_str());
                let name_ok = filename.is_none_or(|f| name == f);
                let text = String::from_utf8_lossy(bytes);
                let terms_ok = terms
                    .iter()
                    .all(|t| text.contains(t) || path.contains(t));
                name_ok && terms_ok
            })
            .map(|(path, _)| CodeHit {
                name: path.rsplit('/').next().unwrap_or(path.as_str()).to_string(),
                path: path.clone(),
                html_url: format!("{}/blob/main/{path}", fixture.info.html_url),
            })
            .collect();

        Ok(SearchResults {
            total_count: items.len() as u64,
            incomplete_results: false,
            items: items.into_iter().take(max_results).collect(),
        })
    }

    async fn contents(
        &self,
        repo: &RepoLocator,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<Contents, GithubError> {
        self.enter(Endpoint::Contents).await?;
        let fixture = self.repo(repo)?;
        if let Some(git_ref) = git_ref {
            Self::check_ref(fixture, git_ref)?;
        }

        let path = path.trim_matches('/');
        if let Some(bytes) = fixture.files.get(path) {
            return Ok(Contents::File(RepoFile {
                path: path.to_string(),
                size: bytes.len() as u64,
                bytes: Some(bytes.clone()),
            }));
        }

        let prefix = format!("{path}/");
        let children: BTreeSet<String> = fixture
            .files
            .keys()
            .filter_map(|p| p.strip_prefix(&prefix))
            .filter_map(|rest| rest.split('/').next())
            .map(String::from)
            .collect();
        if children.is_empty() {
            return Err(GithubError::NotFound("Not Found".into()));
        }
        Ok(Contents::Directory(children.into_iter().collect()))
    }
}
