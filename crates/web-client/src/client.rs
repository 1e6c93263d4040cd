//! HTTP client for the external search and page-retrieval services.
//!
//! Request flow: cache lookup, then an explicit retry loop with
//! exponential backoff where every attempt (retries included) claims a
//! rate-window slot before going out. A cache hit never consumes rate
//! budget.

use std::error::Error as StdError;
use std::time::Duration;

use common::Error;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::TtlCache;
use crate::rate_limit::{RateLimiter, SlidingWindow};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub url: String,
    pub snippet: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageContent {
    pub content: String,
    pub word_count: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebClientConfig {
    pub search_base_url: String,
    pub fetch_base_url: String,
    pub requests_per_window: usize,
    pub window_secs: u64,
    pub cache_ttl_secs: u64,
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

impl Default for WebClientConfig {
    fn default() -> Self {
        Self {
            search_base_url: "http://127.0.0.1:8810".into(),
            fetch_base_url: "http://127.0.0.1:8811".into(),
            requests_per_window: 30,
            window_secs: 60,
            cache_ttl_secs: 3600,
            timeout_ms: 30_000,
            max_retries: 3,
            retry_base_delay_ms: 500,
        }
    }
}

enum Endpoint {
    Search,
    Fetch,
}

pub struct WebClient {
    http: reqwest::Client,
    config: WebClientConfig,
    limiter: RateLimiter,
    search_cache: TtlCache<Vec<SearchResult>>,
    page_cache: TtlCache<PageContent>,
}

impl WebClient {
    pub fn new(config: WebClientConfig) -> Result<Self, Error> {
        if config.requests_per_window == 0 {
            return Err(Error::Config("requests_per_window must be positive".into()));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| Error::Config(format!("failed to build http client: {e}")))?;

        let limiter = RateLimiter::new(
            config.requests_per_window,
            Duration::from_secs(config.window_secs),
        );
        let ttl = Duration::from_secs(config.cache_ttl_secs);

        Ok(Self {
            http,
            config,
            limiter,
            search_cache: TtlCache::new(ttl),
            page_cache: TtlCache::new(ttl),
        })
    }

    /// Shared limiter, for callers that need to coordinate additional
    /// traffic against the same windows.
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, Error> {
        let key = TtlCache::<Vec<SearchResult>>::key(&["search", query, &max_results.to_string()]);
        if let Some(hit) = self.search_cache.get(&key) {
            debug!(query, "search cache hit");
            return Ok(hit);
        }

        let url = format!("{}/search", self.config.search_base_url.trim_end_matches('/'));
        let body = self
            .get_json(
                self.limiter.search_window(),
                &url,
                &[("q", query), ("max_results", &max_results.to_string())],
            )
            .await?;

        let mut results: Vec<SearchResult> = serde_json::from_value(body)?;
        results.truncate(max_results);
        self.search_cache.put(key, results.clone());
        Ok(results)
    }

    pub async fn fetch(&self, page_url: &str) -> Result<PageContent, Error> {
        let key = TtlCache::<PageContent>::key(&["fetch", page_url]);
        if let Some(hit) = self.page_cache.get(&key) {
            debug!(url = page_url, "fetch cache hit");
            return Ok(hit);
        }

        let url = format!("{}/fetch", self.config.fetch_base_url.trim_end_matches('/'));
        let body = self
            .get_json(self.limiter.fetch_window(), &url, &[("url", page_url)])
            .await?;

        let content: PageContent = serde_json::from_value(body)?;
        self.page_cache.put(key, content.clone());
        Ok(content)
    }

    /// GET with an explicit attempt-counter retry loop. Each attempt,
    /// retries included, acquires a slot in the endpoint's rate window
    /// first, which also honors any Retry-After hold. Timeouts, 5xx and
    /// 429 back off (base delay doubled per attempt); 429 additionally
    /// resets the rate window to the server's Retry-After.
    async fn get_json(
        &self,
        window: &SlidingWindow,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<serde_json::Value, Error> {
        let mut attempt = 0u32;
        loop {
            window.acquire().await;
            let send_result = self.http.get(url).query(query).send().await;

            let err = match send_result {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response
                            .json::<serde_json::Value>()
                            .await
                            .map_err(|e| Error::TransientFetch(format_reqwest_error(&e)));
                    }

                    if status.as_u16() == 429 {
                        let retry_after = response
                            .headers()
                            .get(reqwest::header::RETRY_AFTER)
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok());
                        if let Some(secs) = retry_after {
                            window.reset_for(Duration::from_secs(secs)).await;
                        }
                        let body = response.text().await.unwrap_or_default();
                        Error::Fetch {
                            status: 429,
                            body: summarize_body(&body),
                        }
                    } else {
                        let code = status.as_u16();
                        let body = response.text().await.unwrap_or_default();
                        let err = Error::Fetch {
                            status: code,
                            body: summarize_body(&body),
                        };
                        if !err.is_retryable() {
                            return Err(err);
                        }
                        err
                    }
                }
                Err(e) if e.is_timeout() => Error::Timeout(self.config.timeout_ms),
                Err(e) => Error::TransientFetch(format_reqwest_error(&e)),
            };

            if attempt >= self.config.max_retries {
                return Err(err);
            }
            let delay = self.config.retry_base_delay_ms * 2u64.pow(attempt);
            warn!(url, attempt, delay_ms = delay, error = %err, "retrying after transient failure");
            tokio::time::sleep(Duration::from_millis(delay)).await;
            attempt += 1;
        }
    }
}

fn format_reqwest_error(err: &reqwest::Error) -> String {
    // Keep chained causes so network failures (DNS/TLS/socket) are visible.
    let mut message = err.to_string();
    let mut source = err.source();

    while let Some(cause) = source {
        let cause_msg = cause.to_string();
        if !cause_msg.is_empty() && !message.contains(&cause_msg) {
            message.push_str(": ");
            message.push_str(&cause_msg);
        }
        source = cause.source();
    }

    message
}

fn summarize_body(raw: &str) -> String {
    const MAX_CHARS: usize = 800;
    let compact = raw.replace(['\n', '\r'], " ");
    if compact.chars().count() > MAX_CHARS {
        let truncated: String = compact.chars().take(MAX_CHARS).collect();
        format!("{truncated}…")
    } else {
        compact
    }
}
