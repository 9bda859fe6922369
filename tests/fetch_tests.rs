//! Fetcher behavior against a stub upstream: caching, retry, paged
//! reassembly and the failure model.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::Request;
use axum::http::{header, StatusCode};
use axum::routing::get;
use axum::Router;
use reqwest::Method;

use common::spawn_stub;
use sailgate::cache::{CacheRepository, MemoryCache};
use sailgate::fetch::{FetchError, Fetcher, FetcherConfig};

fn fetcher(cache: Arc<MemoryCache>, config: FetcherConfig) -> Fetcher {
    let cache: Arc<dyn CacheRepository> = cache;
    Fetcher::new(cache, config)
}

fn no_params() -> Vec<(String, String)> {
    Vec::new()
}

#[tokio::test]
async fn ok_response_is_returned_and_enqueued() {
    let stub = spawn_stub(Router::new().route("/data", get(|| async { "[1,2]" }))).await;
    let cache = Arc::new(MemoryCache::new());
    let fetcher = fetcher(cache.clone(), FetcherConfig::default().with_max_retries(0));

    let body = fetcher
        .fetch(
            Method::GET,
            &format!("{stub}/data"),
            &no_params(),
            &no_params(),
            "test ns",
            Duration::from_secs(60),
        )
        .await
        .unwrap();
    assert_eq!(body, b"[1,2]");

    cache.commit("watch").await.unwrap();
    assert_eq!(
        cache.get("test ns", &format!("{stub}/data")).await.unwrap(),
        b"[1,2]"
    );
}

#[tokio::test]
async fn cache_hit_skips_the_upstream_entirely() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let stub = spawn_stub(Router::new().route(
        "/data",
        get(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                "fresh"
            }
        }),
    ))
    .await;
    let cache = Arc::new(MemoryCache::new());
    let fetcher = fetcher(cache.clone(), FetcherConfig::default().with_max_retries(0));
    let url = format!("{stub}/data");

    cache.enqueue("ns", &url, b"cached".to_vec(), Duration::from_secs(60));
    cache.commit("watch").await.unwrap();

    let body = fetcher
        .fetch(Method::GET, &url, &no_params(), &no_params(), "ns", Duration::from_secs(60))
        .await
        .unwrap();
    assert_eq!(body, b"cached");
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn non_2xx_fails_without_retry() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let stub = spawn_stub(Router::new().route(
        "/data",
        get(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                (StatusCode::FORBIDDEN, "denied")
            }
        }),
    ))
    .await;
    let fetcher = fetcher(
        Arc::new(MemoryCache::new()),
        FetcherConfig::default().with_max_retries(3),
    );

    let err = fetcher
        .fetch(
            Method::GET,
            &format!("{stub}/data"),
            &no_params(),
            &no_params(),
            "ns",
            Duration::from_secs(60),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Status(status) if status == StatusCode::FORBIDDEN));
    assert_eq!(hits.load(Ordering::SeqCst), 1, "a hard status never retries");
}

#[tokio::test]
async fn timeouts_retry_with_backoff_then_exhaust() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let stub = spawn_stub(Router::new().route(
        "/slow",
        get(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(5)).await;
                "too late"
            }
        }),
    ))
    .await;
    let fetcher = fetcher(
        Arc::new(MemoryCache::new()),
        FetcherConfig::default()
            .with_max_retries(1)
            .with_context_timeout(Duration::from_millis(100))
            .with_retry_delay(Duration::from_millis(10)),
    );

    let err = fetcher
        .fetch(
            Method::GET,
            &format!("{stub}/slow"),
            &no_params(),
            &no_params(),
            "ns",
            Duration::from_secs(60),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Exhausted(2)));
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn partial_content_pages_are_reassembled() {
    // 120 items in pages of 50: the first response carries 0-49 plus the
    // total, the fetcher collects 50-99 and 100-119 itself.
    async fn paged(request: Request) -> axum::response::Response {
        let range = request
            .headers()
            .get("Range")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("0-49")
            .to_string();
        let start: usize = range.split('-').next().unwrap().parse().unwrap();
        let end = (start + 50).min(120);
        let items: Vec<String> = (start..end).map(|i| format!("{{\"n\":{i}}}")).collect();
        axum::response::Response::builder()
            .status(StatusCode::PARTIAL_CONTENT)
            .header(header::CONTENT_RANGE, format!("items {start}-{}/120", end - 1))
            .body(axum::body::Body::from(format!("[{}]", items.join(","))))
            .unwrap()
    }

    let stub = spawn_stub(Router::new().route("/paged", get(paged))).await;
    let fetcher = fetcher(
        Arc::new(MemoryCache::new()),
        FetcherConfig::default().with_max_retries(0),
    );

    let body = fetcher
        .fetch(
            Method::GET,
            &format!("{stub}/paged"),
            &no_params(),
            &no_params(),
            "ns",
            Duration::from_secs(60),
        )
        .await
        .unwrap();

    let parsed: Vec<serde_json::Value> = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed.len(), 120);
    assert_eq!(parsed[0]["n"], 0);
    assert_eq!(parsed[60]["n"], 60);
    assert_eq!(parsed[119]["n"], 119);
}

#[tokio::test]
async fn get_params_become_the_query_string_and_cache_key() {
    let stub = spawn_stub(Router::new().route(
        "/echo",
        get(|request: Request| async move {
            request.uri().query().unwrap_or_default().to_string()
        }),
    ))
    .await;
    let cache = Arc::new(MemoryCache::new());
    let fetcher = fetcher(cache.clone(), FetcherConfig::default().with_max_retries(0));

    let params = vec![
        ("a".to_string(), "1".to_string()),
        ("b".to_string(), "two words".to_string()),
    ];
    let body = fetcher
        .fetch(
            Method::GET,
            &format!("{stub}/echo"),
            &params,
            &no_params(),
            "ns",
            Duration::from_secs(60),
        )
        .await
        .unwrap();
    assert_eq!(body, b"a=1&b=two+words");

    cache.commit("watch").await.unwrap();
    assert!(
        cache
            .get("ns", &format!("{stub}/echo?a=1&b=two+words"))
            .await
            .is_some(),
        "the full request url keys the cache entry"
    );
}
