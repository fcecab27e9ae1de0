//! # repolens github
//!
//! The single authenticated HTTP boundary to GitHub's REST and Search APIs.
//! Owns retry/backoff, rate-limit handling and bounded pagination; the
//! tool set only ever sees typed results or a [`GithubError`].
//!
//! [`GithubError`]: repolens_core::GithubError

pub mod api;
pub mod client;
pub mod models;
pub mod rate_limit;
pub mod transport;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use api::GithubApi;
pub use client::GithubClient;
pub use models::{
    CodeHit, Contents, EntryKind, GitTree, RepoFile, Repository, SearchResults, TreeEntry,
};
pub use rate_limit::{Quota, RateBucket, RateLimitTracker};
pub use transport::{HttpTransport, RawResponse, ReqwestTransport};
