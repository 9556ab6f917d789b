//! Polite Fetcher
//!
//! Every page request in the pipeline goes through [`PoliteFetcher`]:
//! - per-host spacing: at least `min_interval` between requests to one host,
//!   hosts never wait on each other
//! - robots.txt check before fetching, cached per origin, failing open
//! - hard timeout; failures come back as `status == 0` with an error string
//! - conditional retrieval (ETag / Last-Modified) where a 304 is a normal outcome
//!
//! The fetcher is cheap to clone; clones share the limiter and robots cache.

pub mod robots;

use governor::clock::DefaultClock;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};
use playbill_common::config::ScraperConfig;
use playbill_common::{Error, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use url::Url;

pub use robots::RobotsPolicy;

type HostLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Error string for robots.txt denials
pub const ROBOTS_BLOCKED: &str = "Blocked by robots.txt";

/// Outcome of one fetch; never an `Err`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchResult {
    pub content: String,
    /// HTTP status, or 0 for network failure / timeout / bad URL
    pub status: u16,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub error: Option<String>,
}

impl FetchResult {
    fn failed(status: u16, error: impl Into<String>) -> Self {
        Self {
            status,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    pub fn is_not_modified(&self) -> bool {
        self.status == 304
    }
}

/// Fetcher behavior, normally taken from [`ScraperConfig`]
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub user_agent: String,
    pub min_interval: Duration,
    pub timeout: Duration,
    pub robots_timeout: Duration,
    pub respect_robots: bool,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self::from(&ScraperConfig::default())
    }
}

impl From<&ScraperConfig> for FetchSettings {
    fn from(config: &ScraperConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            min_interval: config.min_interval(),
            timeout: config.timeout(),
            robots_timeout: config.robots_timeout(),
            respect_robots: config.respect_robots,
        }
    }
}

/// Per-call overrides
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub headers: Vec<(String, String)>,
    pub timeout: Option<Duration>,
    pub respect_robots: Option<bool>,
}

/// Rate-limited, robots-aware HTTP fetcher
#[derive(Clone)]
pub struct PoliteFetcher {
    inner: Arc<FetcherInner>,
}

struct FetcherInner {
    client: Client,
    limiter: Option<HostLimiter>,
    robots_cache: RwLock<HashMap<String, Arc<RobotsPolicy>>>,
    settings: FetchSettings,
}

impl std::fmt::Debug for PoliteFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoliteFetcher")
            .field("settings", &self.inner.settings)
            .finish()
    }
}

impl PoliteFetcher {
    pub fn new(settings: FetchSettings) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(settings.timeout)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))?;

        // Burst of one: each host gets one request per period
        let limiter = Quota::with_period(settings.min_interval).map(RateLimiter::keyed);

        Ok(Self {
            inner: Arc::new(FetcherInner {
                client,
                limiter,
                robots_cache: RwLock::new(HashMap::new()),
                settings,
            }),
        })
    }

    pub fn from_config(config: &ScraperConfig) -> Result<Self> {
        Self::new(FetchSettings::from(config))
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.inner.settings
    }

    /// GET with default options
    pub async fn fetch(&self, url: &str) -> FetchResult {
        self.fetch_with(url, &FetchOptions::default()).await
    }

    /// GET with conditional headers from a previous response
    ///
    /// A 304 comes back with empty content and status 304.
    pub async fn fetch_conditional(
        &self,
        url: &str,
        etag: Option<&str>,
        last_modified: Option<&str>,
    ) -> FetchResult {
        let mut options = FetchOptions::default();
        if let Some(etag) = etag {
            options.headers.push(("If-None-Match".to_string(), etag.to_string()));
        }
        if let Some(last_modified) = last_modified {
            options.headers.push(("If-Modified-Since".to_string(), last_modified.to_string()));
        }

        let mut result = self.fetch_with(url, &options).await;
        if result.is_not_modified() {
            result.content.clear();
            result.etag = result.etag.or_else(|| etag.map(str::to_string));
            result.last_modified = result.last_modified.or_else(|| last_modified.map(str::to_string));
        }
        result
    }

    /// GET with per-call overrides
    pub async fn fetch_with(&self, url: &str, options: &FetchOptions) -> FetchResult {
        let settings = &self.inner.settings;

        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(e) => return FetchResult::failed(0, format!("Invalid URL {}: {}", url, e)),
        };
        let Some(host) = parsed.host_str().map(str::to_ascii_lowercase) else {
            return FetchResult::failed(0, format!("URL has no host: {}", url));
        };

        if options.respect_robots.unwrap_or(settings.respect_robots) && !self.robots_allows(&parsed).await {
            warn!(url = %url, "Fetch blocked by robots.txt");
            return FetchResult::failed(403, ROBOTS_BLOCKED);
        }

        if let Some(limiter) = &self.inner.limiter {
            limiter.until_key_ready(&host).await;
        }

        let headers = match build_headers(&settings.user_agent, &options.headers) {
            Ok(headers) => headers,
            Err(e) => return FetchResult::failed(0, e),
        };

        let timeout = options.timeout.unwrap_or(settings.timeout);
        let request = self.inner.client.get(parsed.clone()).headers(headers);

        debug!(url = %url, "Fetching");
        let outcome = tokio::time::timeout(timeout, async move {
            let response = request.send().await?;
            let status = response.status();
            let etag = header_string(response.headers(), reqwest::header::ETAG);
            let last_modified = header_string(response.headers(), reqwest::header::LAST_MODIFIED);
            let content = response.text().await?;
            Ok::<_, reqwest::Error>((status, etag, last_modified, content))
        })
        .await;

        match outcome {
            Ok(Ok((status, etag, last_modified, content))) => {
                debug!(url = %url, status = status.as_u16(), bytes = content.len(), "Fetched");
                FetchResult {
                    content,
                    status: status.as_u16(),
                    etag,
                    last_modified,
                    error: None,
                }
            }
            Ok(Err(e)) => {
                warn!(url = %url, error = %e, "Fetch failed");
                FetchResult::failed(0, e.to_string())
            }
            Err(_) => {
                warn!(url = %url, timeout_ms = timeout.as_millis() as u64, "Fetch timed out");
                FetchResult::failed(0, format!("Request timed out after {} ms", timeout.as_millis()))
            }
        }
    }

    /// Check robots.txt for the URL's origin, fetching and caching it on first use
    pub async fn robots_allows(&self, url: &Url) -> bool {
        let origin = url.origin().ascii_serialization();

        let cached = self.inner.robots_cache.read().await.get(&origin).cloned();
        let policy = match cached {
            Some(policy) => policy,
            None => {
                let policy = Arc::new(self.load_robots(&origin).await);
                self.inner
                    .robots_cache
                    .write()
                    .await
                    .insert(origin.clone(), policy.clone());
                policy
            }
        };

        let mut path = url.path().to_string();
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }

        policy.is_allowed(&path, &self.inner.settings.user_agent)
    }

    async fn load_robots(&self, origin: &str) -> RobotsPolicy {
        let robots_url = format!("{}/robots.txt", origin);
        let request = self
            .inner
            .client
            .get(&robots_url)
            .header(reqwest::header::USER_AGENT, &self.inner.settings.user_agent);

        let outcome = tokio::time::timeout(self.inner.settings.robots_timeout, async move {
            let response = request.send().await?;
            let status = response.status();
            let text = response.text().await?;
            Ok::<_, reqwest::Error>((status, text))
        })
        .await;

        match outcome {
            Ok(Ok((status, text))) if status == StatusCode::OK => RobotsPolicy::parse(&text),
            Ok(Ok((status, _))) => {
                debug!(origin = origin, status = status.as_u16(), "No robots.txt, allowing");
                RobotsPolicy::allow_all()
            }
            Ok(Err(e)) => {
                warn!(origin = origin, error = %e, "Failed to fetch robots.txt, allowing");
                RobotsPolicy::allow_all()
            }
            Err(_) => {
                warn!(origin = origin, "robots.txt timed out, allowing");
                RobotsPolicy::allow_all()
            }
        }
    }
}

fn build_headers(user_agent: &str, extra: &[(String, String)]) -> std::result::Result<HeaderMap, String> {
    let mut headers = HeaderMap::new();
    let defaults = [
        ("user-agent", user_agent),
        ("accept", "text/html,application/xhtml+xml,application/xml;q=0.9,text/calendar;q=0.9,*/*;q=0.8"),
        ("accept-language", "en-US,en;q=0.5"),
        ("cache-control", "no-cache"),
    ];

    for (name, value) in defaults
        .iter()
        .map(|(n, v)| (*n, *v))
        .chain(extra.iter().map(|(n, v)| (n.as_str(), v.as_str())))
    {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| format!("Invalid header name {}: {}", name, e))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| format!("Invalid value for header {}: {}", name, e))?;
        headers.insert(name, value);
    }

    Ok(headers)
}

fn header_string(headers: &HeaderMap, name: HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn settings(min_interval_ms: u64) -> FetchSettings {
        FetchSettings {
            min_interval: Duration::from_millis(min_interval_ms),
            respect_robots: false,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_invalid_url_is_status_zero() {
        let fetcher = PoliteFetcher::new(settings(0)).unwrap();
        let result = fetcher.fetch("not a url").await;
        assert_eq!(result.status, 0);
        assert!(result.error.is_some());
        assert!(result.content.is_empty());
    }

    #[tokio::test]
    async fn test_host_limiter_spaces_same_host() {
        let fetcher = PoliteFetcher::new(settings(300)).unwrap();
        let limiter = fetcher.inner.limiter.as_ref().unwrap();

        let start = Instant::now();
        limiter.until_key_ready(&"a.example".to_string()).await;
        assert!(start.elapsed() < Duration::from_millis(100));

        limiter.until_key_ready(&"a.example".to_string()).await;
        assert!(start.elapsed() >= Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_host_limiter_independent_hosts() {
        let fetcher = PoliteFetcher::new(settings(1000)).unwrap();
        let limiter = fetcher.inner.limiter.as_ref().unwrap();

        let start = Instant::now();
        limiter.until_key_ready(&"a.example".to_string()).await;
        limiter.until_key_ready(&"b.example".to_string()).await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn test_zero_interval_disables_limiter() {
        let fetcher = PoliteFetcher::new(settings(0)).unwrap();
        assert!(fetcher.inner.limiter.is_none());
    }

    #[test]
    fn test_invalid_extra_header_rejected() {
        let extra = vec![("bad header".to_string(), "x".to_string())];
        assert!(build_headers("TestBot/1.0", &extra).is_err());
    }
}
