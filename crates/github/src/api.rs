//! The read-only GitHub surface the tools are written against.

use crate::client::GithubClient;
use crate::models::{Contents, GitTree, Repository, SearchResults};
use crate::transport::HttpTransport;
use async_trait::async_trait;
use repolens_core::{GithubError, RepoLocator};

/// Object-safe so the tool set can hold an `Arc<dyn GithubApi>` and tests
/// can substitute an in-memory host.
#[async_trait]
pub trait GithubApi: Send + Sync {
    async fn repository(&self, repo: &RepoLocator) -> Result<Repository, GithubError>;

    /// Tree at `git_ref`; `recursive` lists every descendant.
    async fn tree(
        &self,
        repo: &RepoLocator,
        git_ref: &str,
        recursive: bool,
    ) -> Result<GitTree, GithubError>;

    /// `query` is already in search-API syntax (including `repo:`).
    async fn search_code(
        &self,
        query: &str,
        max_results: usize,
        max_pages: u32,
    ) -> Result<SearchResults, GithubError>;

    async fn contents(
        &self,
        repo: &RepoLocator,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<Contents, GithubError>;
}

#[async_trait]
impl<T: HttpTransport> GithubApi for GithubClient<T> {
    async fn repository(&self, repo: &RepoLocator) -> Result<Repository, GithubError> {
        GithubClient::repository(self, repo).await
    }

    async fn tree(
        &self,
        repo: &RepoLocator,
        git_ref: &str,
        recursive: bool,
    ) -> Result<GitTree, GithubError> {
        GithubClient::tree(self, repo, git_ref, recursive).await
    }

    async fn search_code(
        &self,
        query: &str,
        max_results: usize,
        max_pages: u32,
    ) -> Result<SearchResults, GithubError> {
        GithubClient::search_code(self, query, max_results, max_pages).await
    }

    async fn contents(
        &self,
        repo: &RepoLocator,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<Contents, GithubError> {
        GithubClient::contents(self, repo, path, git_ref).await
    }
}
