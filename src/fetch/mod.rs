//! Retrying, timeout-bounded, cache-backed HTTP fetcher.
//!
//! One fetcher instance wraps the process-wide connection pool. Every call
//! is bounded by the per-attempt timeout; timeouts and transport errors
//! retry with linear backoff, any non-2xx status is fatal without retry.
//! Successful bodies are enqueued to the cache, never written inline.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode, Url};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::cache::CacheRepository;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("invalid header {0}")]
    InvalidHeader(String),
    #[error("upstream returned status {0}")]
    Status(StatusCode),
    #[error("invalid content-range header: {0}")]
    InvalidContentRange(String),
    #[error("fetch failed after {0} attempts")]
    Exhausted(u32),
}

/// Page size of partial-content upstreams.
const PAGE_SIZE: usize = 50;

/// Connection-pool and retry knobs: builder setters over defaults that
/// match the upstream contracts.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub context_timeout: Duration,
    pub max_retries: u32,
    pub initial_retry_delay: Duration,
    pub max_idle_conns_per_host: usize,
    pub idle_conn_timeout: Duration,
    pub disable_keep_alives: bool,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            context_timeout: Duration::from_secs(7),
            max_retries: 2,
            initial_retry_delay: Duration::from_secs(2),
            max_idle_conns_per_host: 100,
            idle_conn_timeout: Duration::from_secs(90),
            disable_keep_alives: false,
        }
    }
}

impl FetcherConfig {
    pub fn with_context_timeout(mut self, timeout: Duration) -> Self {
        self.context_timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.initial_retry_delay = delay;
        self
    }

    pub fn with_max_idle_conns_per_host(mut self, max: usize) -> Self {
        self.max_idle_conns_per_host = max;
        self
    }

    pub fn with_idle_conn_timeout(mut self, timeout: Duration) -> Self {
        self.idle_conn_timeout = timeout;
        self
    }

    pub fn with_disable_keep_alives(mut self, disable: bool) -> Self {
        self.disable_keep_alives = disable;
        self
    }
}

#[derive(Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    cache: Arc<dyn CacheRepository>,
    config: FetcherConfig,
}

impl Fetcher {
    pub fn new(cache: Arc<dyn CacheRepository>, config: FetcherConfig) -> Self {
        let mut builder = reqwest::Client::builder()
            .pool_idle_timeout(config.idle_conn_timeout)
            .pool_max_idle_per_host(config.max_idle_conns_per_host);
        if config.disable_keep_alives {
            builder = builder.pool_max_idle_per_host(0);
        }
        let client = builder.build().expect("reqwest client construction");
        Self {
            client,
            cache,
            config,
        }
    }

    pub fn cache(&self) -> Arc<dyn CacheRepository> {
        Arc::clone(&self.cache)
    }

    /// Fetches `url` with retry, timeout and read-through caching.
    ///
    /// GET sends `params` as the query string (the full URL doubles as the
    /// cache key); POST sends them form-urlencoded. The body is returned
    /// raw; parsing stays with the caller.
    pub async fn fetch(
        &self,
        method: Method,
        url: &str,
        params: &[(String, String)],
        headers: &[(String, String)],
        namespace: &str,
        ttl: Duration,
    ) -> Result<Vec<u8>, FetchError> {
        let (request_url, form) = if method == Method::GET && !params.is_empty() {
            let parsed =
                Url::parse_with_params(url, params).map_err(|err| FetchError::InvalidUrl {
                    url: url.to_string(),
                    reason: err.to_string(),
                })?;
            (parsed, None)
        } else {
            let parsed = Url::parse(url).map_err(|err| FetchError::InvalidUrl {
                url: url.to_string(),
                reason: err.to_string(),
            })?;
            (parsed, (method == Method::POST).then_some(params))
        };
        let header_map = build_headers(headers)?;
        let cache_key = request_url.to_string();

        if let Some(cached) = self.cache.get(namespace, &cache_key).await {
            return Ok(cached);
        }

        let mut attempt = 0;
        loop {
            let started = Instant::now();
            let mut request = self
                .client
                .request(method.clone(), request_url.clone())
                .headers(header_map.clone())
                .timeout(self.config.context_timeout);
            if let Some(form) = form {
                request = request.form(form);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    info!(
                        method = %method,
                        url = %request_url,
                        %status,
                        elapsed = ?started.elapsed(),
                        "upstream request"
                    );
                    if status == StatusCode::OK {
                        if let Ok(body) = response.bytes().await {
                            let body = body.to_vec();
                            self.cache.enqueue(namespace, &cache_key, body.clone(), ttl);
                            return Ok(body);
                        }
                    } else if status == StatusCode::PARTIAL_CONTENT {
                        let assembled = self
                            .assemble_partial_content(&method, &request_url, &header_map, form, response)
                            .await;
                        if let Ok(body) = assembled {
                            self.cache.enqueue(namespace, &cache_key, body.clone(), ttl);
                            return Ok(body);
                        }
                    } else {
                        return Err(FetchError::Status(status));
                    }
                }
                Err(err) if err.is_timeout() => {
                    warn!(attempt, url = %request_url, elapsed = ?started.elapsed(), "attempt timed out");
                }
                Err(err) => {
                    error!(attempt, url = %request_url, %err, "transport error");
                }
            }

            if attempt >= self.config.max_retries {
                error!(url = %request_url, "fetch failed after {} attempts", attempt + 1);
                return Err(FetchError::Exhausted(attempt + 1));
            }
            let backoff = self.config.initial_retry_delay * (attempt + 1);
            info!(
                attempt = attempt + 1,
                max = self.config.max_retries,
                url = %request_url,
                "retrying in {:?}",
                backoff
            );
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }

    /// Reassembles a paged response: the first page arrived with a
    /// `Content-Range: .../total` header, remaining pages are fetched
    /// concurrently with `Range: n-(n+49)`. Page bodies have their outer
    /// brackets trimmed and are comma-joined inside one array envelope.
    /// Failed pages log and are skipped.
    async fn assemble_partial_content(
        &self,
        method: &Method,
        url: &Url,
        headers: &HeaderMap,
        form: Option<&[(String, String)]>,
        first: reqwest::Response,
    ) -> Result<Vec<u8>, FetchError> {
        let content_range = first
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let total: usize = content_range
            .rsplit_once('/')
            .and_then(|(_, total)| total.trim().parse().ok())
            .ok_or_else(|| FetchError::InvalidContentRange(content_range.clone()))?;

        let first_body = first
            .bytes()
            .await
            .map_err(|_| FetchError::InvalidContentRange(content_range))?;

        let pages = (PAGE_SIZE..total)
            .step_by(PAGE_SIZE)
            .map(|offset| self.fetch_page(method, url, headers, form, offset));
        let fetched = join_all(pages).await;

        let mut assembled = Vec::with_capacity(first_body.len() * (total / PAGE_SIZE + 1));
        assembled.push(b'[');
        assembled.extend_from_slice(trim_brackets(&first_body));
        for page in fetched.into_iter().flatten() {
            let fragment = trim_brackets(&page);
            if fragment.is_empty() {
                continue;
            }
            if assembled.len() > 1 {
                assembled.push(b',');
            }
            assembled.extend_from_slice(fragment);
        }
        assembled.push(b']');
        Ok(assembled)
    }

    async fn fetch_page(
        &self,
        method: &Method,
        url: &Url,
        headers: &HeaderMap,
        form: Option<&[(String, String)]>,
        offset: usize,
    ) -> Option<bytes::Bytes> {
        let range = format!("{}-{}", offset, offset + PAGE_SIZE - 1);
        let started = Instant::now();
        let mut request = self
            .client
            .request(method.clone(), url.clone())
            .headers(headers.clone())
            .header("Range", &range)
            .timeout(self.config.context_timeout);
        if let Some(form) = form {
            request = request.form(form);
        }
        match request.send().await {
            Ok(response) => {
                info!(
                    url = %url,
                    range,
                    status = %response.status(),
                    elapsed = ?started.elapsed(),
                    "partial-content page"
                );
                response.bytes().await.ok()
            }
            Err(err) => {
                error!(url = %url, range, %err, "partial-content page failed");
                None
            }
        }
    }
}

fn build_headers(headers: &[(String, String)]) -> Result<HeaderMap, FetchError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| FetchError::InvalidHeader(name.clone()))?;
        let value =
            HeaderValue::from_str(value).map_err(|_| FetchError::InvalidHeader(value.clone()))?;
        map.insert(name, value);
    }
    Ok(map)
}

/// Strips the outer `[` `]` (plus surrounding whitespace) from one page of
/// a paged JSON array. Kept byte-compatible with the upstream contract.
fn trim_brackets(body: &[u8]) -> &[u8] {
    let mut slice = body;
    while let [first, rest @ ..] = slice {
        if first.is_ascii_whitespace() || *first == b'[' {
            slice = rest;
        } else {
            break;
        }
    }
    while let [rest @ .., last] = slice {
        if last.is_ascii_whitespace() || *last == b']' {
            slice = rest;
        } else {
            break;
        }
    }
    slice
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_outer_brackets_only() {
        assert_eq!(trim_brackets(b"[{\"a\":1},{\"b\":[2]}]"), b"{\"a\":1},{\"b\":[2]}");
        assert_eq!(trim_brackets(b" [ {\"a\":1} ] "), b"{\"a\":1}");
        assert_eq!(trim_brackets(b"[]"), b"");
    }

    #[test]
    fn default_config_matches_contract() {
        let config = FetcherConfig::default();
        assert_eq!(config.context_timeout, Duration::from_secs(7));
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.initial_retry_delay, Duration::from_secs(2));
    }

    #[test]
    fn builder_setters_apply() {
        let config = FetcherConfig::default()
            .with_max_retries(5)
            .with_context_timeout(Duration::from_secs(3));
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.context_timeout, Duration::from_secs(3));
    }
}
