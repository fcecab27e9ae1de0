//! Process-wide view of GitHub's remaining quota.
//!
//! Every response updates the tracker; before issuing a call the client
//! asks it whether the bucket is exhausted, so concurrent loops back off
//! together instead of each burning through the limit.

use reqwest::header::HeaderMap;
use std::sync::RwLock;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// GitHub meters core REST calls and search calls separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateBucket {
    Core,
    Search,
}

impl RateBucket {
    fn from_resource(resource: &str) -> Option<Self> {
        match resource {
            "core" => Some(Self::Core),
            "search" | "code_search" => Some(Self::Search),
            _ => None,
        }
    }
}

/// Last known quota for one bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Quota {
    pub limit: Option<u64>,
    pub remaining: Option<u64>,
    /// Unix seconds at which the window resets
    pub reset_at: Option<u64>,
}

#[derive(Debug, Default)]
pub struct RateLimitTracker {
    core: RwLock<Quota>,
    search: RwLock<Quota>,
}

impl RateLimitTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, bucket: RateBucket) -> &RwLock<Quota> {
        match bucket {
            RateBucket::Core => &self.core,
            RateBucket::Search => &self.search,
        }
    }

    pub fn snapshot(&self, bucket: RateBucket) -> Quota {
        self.slot(bucket).read().map(|q| *q).unwrap_or_default()
    }

    /// Record the `x-ratelimit-*` headers of a response. The
    /// `x-ratelimit-resource` header, when present, overrides `bucket`.
    pub fn observe(&self, bucket: RateBucket, headers: &HeaderMap) {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
        };
        let number = |name: &str| header(name).and_then(|v| v.parse::<u64>().ok());

        let remaining = number("x-ratelimit-remaining");
        let reset_at = number("x-ratelimit-reset");
        if remaining.is_none() && reset_at.is_none() {
            return;
        }

        let bucket = header("x-ratelimit-resource")
            .and_then(RateBucket::from_resource)
            .unwrap_or(bucket);

        if let Ok(mut quota) = self.slot(bucket).write() {
            quota.limit = number("x-ratelimit-limit").or(quota.limit);
            quota.remaining = remaining.or(quota.remaining);
            quota.reset_at = reset_at.or(quota.reset_at);
        }
    }

    /// Mark a bucket exhausted for `secs` (from a `Retry-After`).
    pub fn block_for(&self, bucket: RateBucket, secs: u64) {
        if let Ok(mut quota) = self.slot(bucket).write() {
            quota.remaining = Some(0);
            quota.reset_at = Some(unix_now().saturating_add(secs));
        }
    }

    /// How long to wait before calling into an exhausted bucket.
    pub fn wait_hint(&self, bucket: RateBucket) -> Option<Duration> {
        let quota = self.snapshot(bucket);
        if quota.remaining != Some(0) {
            return None;
        }
        let reset_at = quota.reset_at?;
        let now = unix_now();
        (reset_at > now).then(|| Duration::from_secs(reset_at - now))
    }
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, String)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, value.parse().unwrap());
        }
        map
    }

    #[test]
    fn observe_records_quota() {
        let tracker = RateLimitTracker::new();
        tracker.observe(
            RateBucket::Core,
            &headers(&[
                ("x-ratelimit-limit", "5000".into()),
                ("x-ratelimit-remaining", "4999".into()),
                ("x-ratelimit-reset", "1700000000".into()),
            ]),
        );
        let quota = tracker.snapshot(RateBucket::Core);
        assert_eq!(quota.remaining, Some(4999));
        assert_eq!(quota.limit, Some(5000));
        assert_eq!(tracker.wait_hint(RateBucket::Core), None);
    }

    #[test]
    fn resource_header_selects_bucket() {
        let tracker = RateLimitTracker::new();
        tracker.observe(
            RateBucket::Core,
            &headers(&[
                ("x-ratelimit-remaining", "9".into()),
                ("x-ratelimit-resource", "search".into()),
            ]),
        );
        assert_eq!(tracker.snapshot(RateBucket::Search).remaining, Some(9));
        assert_eq!(tracker.snapshot(RateBucket::Core), Quota::default());
    }

    #[test]
    fn exhausted_bucket_reports_wait() {
        let tracker = RateLimitTracker::new();
        let reset = unix_now() + 30;
        tracker.observe(
            RateBucket::Search,
            &headers(&[
                ("x-ratelimit-remaining", "0".into()),
                ("x-ratelimit-reset", reset.to_string()),
            ]),
        );
        let wait = tracker.wait_hint(RateBucket::Search).unwrap();
        assert!(wait <= Duration::from_secs(30));
        assert!(wait >= Duration::from_secs(28));
        assert_eq!(tracker.wait_hint(RateBucket::Core), None);
    }

    #[test]
    fn past_reset_means_no_wait() {
        let tracker = RateLimitTracker::new();
        tracker.observe(
            RateBucket::Core,
            &headers(&[
                ("x-ratelimit-remaining", "0".into()),
                ("x-ratelimit-reset", "1".into()),
            ]),
        );
        assert_eq!(tracker.wait_hint(RateBucket::Core), None);
    }

    #[test]
    fn block_for_is_shared() {
        let tracker = std::sync::Arc::new(RateLimitTracker::new());
        let other = tracker.clone();
        tracker.block_for(RateBucket::Core, 5);
        assert!(other.wait_hint(RateBucket::Core).is_some());
    }
}
