//! Authenticated GitHub client.
//!
//! Policy, applied to every GET:
//! - `401` fails fast with [`GithubError::Unauthorized`].
//! - `403`/`429` carrying rate-limit signals wait for `Retry-After` (or the
//!   reset time) when that fits under the configured ceiling, then retry a
//!   bounded number of times; otherwise [`GithubError::RateLimited`].
//! - Network failures and `5xx` gateway errors are retried with
//!   exponential backoff plus jitter, up to `max_attempts`.
//! - Pagination is explicit and capped by the caller.

use crate::models::{Contents, GitTree, Repository, SearchPage, SearchResults};
use crate::rate_limit::{RateBucket, RateLimitTracker, unix_now};
use crate::transport::{HttpTransport, RawResponse, ReqwestTransport};
use chrono::{DateTime, NaiveDateTime, Utc};
use rand::Rng;
use repolens_config::GithubConfig;
use repolens_core::{GithubError, RepoLocator};
use reqwest::Url;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// GitHub caps `per_page` at 100.
const MAX_PER_PAGE: usize = 100;

/// Longest backoff between transient retries.
const MAX_BACKOFF: Duration = Duration::from_secs(10);

pub struct GithubClient<T = ReqwestTransport> {
    transport: T,
    base_url: Url,
    headers: HeaderMap,
    max_attempts: u32,
    retry_base_ms: u64,
    max_rate_limit_wait: Duration,
    rate_limit_retries: u32,
    rate: Arc<RateLimitTracker>,
}

impl GithubClient<ReqwestTransport> {
    /// Build a client over `reqwest` with the configured timeout.
    pub fn new(config: &GithubConfig) -> Result<Self, GithubError> {
        let transport = ReqwestTransport::new(Duration::from_secs(config.timeout_secs))?;
        Self::with_transport(transport, config)
    }
}

impl<T: HttpTransport> GithubClient<T> {
    pub fn with_transport(transport: T, config: &GithubConfig) -> Result<Self, GithubError> {
        let mut base = config.api_url.trim_end_matches('/').to_string();
        base.push('/');
        let base_url = Url::parse(&base)
            .map_err(|e| GithubError::Transport(format!("invalid api_url '{}': {e}", config.api_url)))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github.v3+json"),
        );
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .unwrap_or_else(|_| HeaderValue::from_static("repolens")),
        );
        if let Some(token) = &config.token {
            let mut value = HeaderValue::from_str(&format!("token {token}")).map_err(|_| {
                GithubError::Unauthorized("token contains characters not allowed in a header".into())
            })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        Ok(Self {
            transport,
            base_url,
            headers,
            max_attempts: config.max_attempts.max(1),
            retry_base_ms: config.retry_base_ms,
            max_rate_limit_wait: Duration::from_secs(config.max_rate_limit_wait_secs),
            rate_limit_retries: config.rate_limit_retries,
            rate: Arc::new(RateLimitTracker::new()),
        })
    }

    /// Share a quota tracker with other clients.
    pub fn with_rate_tracker(mut self, rate: Arc<RateLimitTracker>) -> Self {
        self.rate = rate;
        self
    }

    fn url(&self, segments: &[&str], query: &[(&str, String)]) -> Result<Url, GithubError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GithubError::Transport("api_url cannot be a base URL".into()))?
            .pop_if_empty()
            .extend(segments);
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    pub async fn get_json<D: DeserializeOwned>(
        &self,
        bucket: RateBucket,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<D, GithubError> {
        let response = self.get(bucket, segments, query).await?;
        serde_json::from_str(&response.body).map_err(|e| GithubError::Decode(e.to_string()))
    }

    /// GET with the full retry and rate-limit policy.
    pub async fn get(
        &self,
        bucket: RateBucket,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<RawResponse, GithubError> {
        let url = self.url(segments, query)?;

        // Another request already drained this bucket
        if let Some(wait) = self.rate.wait_hint(bucket) {
            if wait > self.max_rate_limit_wait {
                warn!(path = url.path(), wait_secs = wait.as_secs(), "Rate limit exhausted, not waiting");
                return Err(GithubError::RateLimited {
                    retry_after_secs: Some(wait.as_secs()),
                    secondary: false,
                });
            }
            info!(path = url.path(), wait_secs = wait.as_secs(), "Rate limit exhausted, waiting for reset");
            tokio::time::sleep(wait).await;
        }

        let mut attempt: u32 = 0;
        let mut rate_limit_waits: u32 = 0;

        loop {
            attempt += 1;
            debug!(url = %url, attempt, "GitHub GET");

            let response = match self.transport.get(&url, &self.headers).await {
                Ok(response) => response,
                Err(e) => {
                    if attempt >= self.max_attempts {
                        warn!(path = url.path(), attempt, error = %e, "GitHub request failed, giving up");
                        return Err(e);
                    }
                    let delay = self.backoff(attempt);
                    warn!(
                        path = url.path(),
                        attempt,
                        delay_ms = millis(delay),
                        error = %e,
                        "GitHub request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
            };

            self.rate.observe(bucket, &response.headers);

            match response.status {
                200..=299 => return Ok(response),
                401 => return Err(GithubError::Unauthorized(response.error_message())),
                403 | 429 => {
                    let Some(signal) = rate_limit_signal(&response) else {
                        return Err(GithubError::Forbidden(response.error_message()));
                    };
                    if let Some(secs) = signal.retry_after_secs {
                        self.rate.block_for(bucket, secs);
                    }

                    let wait = signal.retry_after_secs.map(Duration::from_secs);
                    match wait {
                        Some(wait)
                            if rate_limit_waits < self.rate_limit_retries
                                && wait <= self.max_rate_limit_wait =>
                        {
                            rate_limit_waits += 1;
                            info!(
                                path = url.path(),
                                wait_secs = wait.as_secs(),
                                secondary = signal.secondary,
                                "Rate limited by GitHub, waiting before retry"
                            );
                            tokio::time::sleep(wait).await;
                            // Waiting for a rate limit is not a transient failure
                            attempt = attempt.saturating_sub(1);
                        }
                        _ => {
                            warn!(
                                path = url.path(),
                                retry_after_secs = ?signal.retry_after_secs,
                                secondary = signal.secondary,
                                "Rate limited by GitHub"
                            );
                            return Err(GithubError::RateLimited {
                                retry_after_secs: signal.retry_after_secs,
                                secondary: signal.secondary,
                            });
                        }
                    }
                }
                404 => return Err(GithubError::NotFound(response.error_message())),
                422 => return Err(GithubError::Unprocessable(response.error_message())),
                500 | 502 | 503 | 504 if attempt < self.max_attempts => {
                    let delay = self.backoff(attempt);
                    warn!(
                        path = url.path(),
                        status = response.status,
                        attempt,
                        delay_ms = millis(delay),
                        "GitHub server error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                status => {
                    return Err(GithubError::Api {
                        status,
                        message: response.error_message(),
                    });
                }
            }
        }
    }

    /// Exponential backoff with up to 50% jitter.
    fn backoff(&self, attempt: u32) -> Duration {
        let base = self.retry_base_ms.max(1);
        let exponential = base.saturating_mul(2_u64.saturating_pow(attempt.saturating_sub(1)));
        let jitter = rand::rng().random_range(0..=base / 2);
        Duration::from_millis(exponential.saturating_add(jitter)).min(MAX_BACKOFF)
    }

    pub async fn repository(&self, repo: &RepoLocator) -> Result<Repository, GithubError> {
        self.get_json(RateBucket::Core, &["repos", &repo.owner, &repo.name], &[])
            .await
    }

    pub async fn tree(
        &self,
        repo: &RepoLocator,
        git_ref: &str,
        recursive: bool,
    ) -> Result<GitTree, GithubError> {
        let query = if recursive {
            vec![("recursive", "1".to_string())]
        } else {
            Vec::new()
        };
        self.get_json(
            RateBucket::Core,
            &["repos", &repo.owner, &repo.name, "git", "trees", git_ref],
            &query,
        )
        .await
    }

    /// Code search, collecting at most `max_results` hits over at most
    /// `max_pages` pages.
    pub async fn search_code(
        &self,
        query: &str,
        max_results: usize,
        max_pages: u32,
    ) -> Result<SearchResults, GithubError> {
        let max_pages = max_pages.max(1);
        let per_page = max_results
            .div_ceil(max_pages as usize)
            .clamp(1, MAX_PER_PAGE);
        let mut results = SearchResults::default();

        for page in 1..=max_pages {
            let batch: SearchPage = self
                .get_json(
                    RateBucket::Search,
                    &["search", "code"],
                    &[
                        ("q", query.to_string()),
                        ("per_page", per_page.to_string()),
                        ("page", page.to_string()),
                    ],
                )
                .await?;

            let fetched = batch.items.len();
            results.total_count = batch.total_count;
            results.incomplete_results |= batch.incomplete_results;
            results.items.extend(batch.items);

            let seen = page as u64 * per_page as u64;
            if results.items.len() >= max_results
                || fetched < per_page
                || seen >= results.total_count
            {
                break;
            }
        }

        results.items.truncate(max_results);
        Ok(results)
    }

    pub async fn contents(
        &self,
        repo: &RepoLocator,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<Contents, GithubError> {
        let mut segments = vec!["repos", repo.owner.as_str(), repo.name.as_str(), "contents"];
        segments.extend(path.split('/').filter(|s| !s.is_empty()));
        let query: Vec<(&str, String)> = git_ref.map(|r| ("ref", r.to_string())).into_iter().collect();

        let response = self.get(RateBucket::Core, &segments, &query).await?;
        Contents::from_body(&response.body)
    }
}

fn millis(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}

/// What a 403/429 says about rate limiting.
struct RateLimitSignal {
    retry_after_secs: Option<u64>,
    secondary: bool,
}

/// `None` when a 403 is a plain permission failure.
fn rate_limit_signal(response: &RawResponse) -> Option<RateLimitSignal> {
    let retry_after = parse_retry_after(response.header("retry-after"));
    let remaining_zero = response.header("x-ratelimit-remaining").map(str::trim) == Some("0");
    let message = response.error_message().to_lowercase();
    let secondary = message.contains("secondary rate limit");
    let mentions_limit = message.contains("rate limit");

    let is_rate_limit =
        response.status == 429 || retry_after.is_some() || remaining_zero || mentions_limit;
    if !is_rate_limit {
        return None;
    }

    let retry_after_secs = retry_after.or_else(|| {
        if !remaining_zero {
            return None;
        }
        let reset = response.header("x-ratelimit-reset")?.trim().parse::<u64>().ok()?;
        Some(reset.saturating_sub(unix_now()))
    });

    Some(RateLimitSignal {
        retry_after_secs,
        secondary,
    })
}

/// `Retry-After` is either delta-seconds or an HTTP date.
fn parse_retry_after(value: Option<&str>) -> Option<u64> {
    let value = value?.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(seconds);
    }
    let retry_at = DateTime::parse_from_rfc2822(value)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(value, "%a, %d %b %Y %H:%M:%S GMT")
                .map(|naive| DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
        })
        .ok()?;
    let delta = retry_at.signed_duration_since(Utc::now()).num_seconds();
    Some(delta.max(0) as u64)
}
