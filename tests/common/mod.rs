//! Shared harness for the router-level integration tests: a stub upstream,
//! an in-memory cache and voyage store, and request helpers.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use sqlx::SqlitePool;
use tower::util::ServiceExt;

use sailgate::cache::{CacheRepository, MemoryCache};
use sailgate::config::ConfigStore;
use sailgate::env::EnvManager;
use sailgate::fetch::{Fetcher, FetcherConfig};
use sailgate::voyage::{SqliteVoyageStore, VOYAGE_HISTORY_SCHEMA};
use sailgate::{carriers, AppState};

pub const TEST_CONFIG: &str = r#"
base:
  environment: test
  activeCarriers:
    CMDU: true
    HLCU: true
    MSCU: true
    ZIMU: true
    ANNU: true
    CHNL: true
    ONEY: false
"#;

/// Environment pointing every carrier at `base`; tests override the
/// carriers they stub.
pub fn env_for(base: &str) -> EnvManager {
    EnvManager {
        zim_url: format!("{base}/zim/schedules"),
        zim_token_url: format!("{base}/zim/token"),
        zim_subscription_key: "zim-sub".into(),
        zim_client: "zim-client".into(),
        zim_secret: "zim-secret".into(),
        iqax_url: format!("{base}/iqax/schedules"),
        iqax_token: "iqax-key".into(),
        msc_url: format!("{base}/msc/schedules"),
        msc_oauth_url: format!("{base}/msc/oauth"),
        msc_audience: "msc-aud".into(),
        msc_client: "msc-client".into(),
        msc_thumbprint: "abcdef012345".into(),
        msc_scope: "schedules.read".into(),
        msc_rsa_key: String::new(),
        maersk_p2p_url: format!("{base}/maersk/p2p"),
        maersk_vessel_url: format!("{base}/maersk/vessels"),
        maersk_location_url: format!("{base}/maersk/locations"),
        maersk_token: "maersk-key".into(),
        maersk_location_token: "maersk-loc-key".into(),
        maersk_vessel_token: "maersk-vs-key".into(),
        hapag_url: format!("{base}/hapag/schedules"),
        hapag_vessel_url: format!("{base}/hapag/vessels"),
        hapag_client: "hapag-client".into(),
        hapag_secret: "hapag-secret".into(),
        one_url: format!("{base}/one/schedules"),
        one_token_url: format!("{base}/one/token"),
        one_api_key: "one-key".into(),
        one_basic_auth: "Basic b25lOm9uZQ==".into(),
        cma_url: format!("{base}/cma/schedules"),
        cma_vessel_url: format!("{base}/cma/vessels"),
        cma_token: "cma-key".into(),
        redis_url: None,
        database_url: "sqlite::memory:".into(),
    }
}

/// Binds a stub upstream on a random port and serves `router` from it.
pub async fn spawn_stub(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("binding stub upstream");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });
    format!("http://{addr}")
}

pub struct TestApp {
    pub state: Arc<AppState>,
    pub cache: Arc<MemoryCache>,
    pub db: SqlitePool,
}

impl TestApp {
    pub async fn new(stub_base: &str) -> Self {
        Self::with_config(stub_base, TEST_CONFIG).await
    }

    pub async fn with_config(stub_base: &str, config_yaml: &str) -> Self {
        let env = env_for(stub_base);
        let cache = Arc::new(MemoryCache::new());
        let shared_cache: Arc<dyn CacheRepository> = cache.clone();
        let fetcher = Fetcher::new(
            shared_cache,
            FetcherConfig::default()
                .with_max_retries(0)
                .with_context_timeout(std::time::Duration::from_secs(5)),
        );
        let config = ConfigStore::new();
        config.set_from_str(config_yaml).expect("test config");

        let db = SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::query(VOYAGE_HISTORY_SCHEMA).execute(&db).await.unwrap();

        let state = Arc::new(AppState {
            p2p_registry: carriers::p2p::registry(&env),
            vessel_registry: carriers::vessel::registry(&env),
            voyages: Arc::new(SqliteVoyageStore::new(db.clone())),
            env,
            config,
            fetcher,
        });
        TestApp { state, cache, db }
    }

    pub fn p2p_router(&self) -> Router {
        sailgate::p2p_router(self.state.clone())
    }

    pub fn voyage_router(&self) -> Router {
        sailgate::voyage_router(self.state.clone())
    }

    pub fn config_router(&self) -> Router {
        sailgate::config_router(self.state.clone())
    }

    /// Waits for the detached cache commit that follows a streamed
    /// response.
    pub async fn wait_for_cache_commit(&self) {
        for _ in 0..100 {
            if !self.cache.is_empty() {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("cache commit never landed");
    }

    pub async fn insert_voyage_row(
        &self,
        voyage: &str,
        direction: &str,
        event: &str,
        port: &str,
        time: &str,
    ) {
        sqlx::query(
            "INSERT INTO voyage_history VALUES ('HISTORY', 'CMDU', ?1, 'APL RAFFLES', \
             '9839272', ?2, ?3, 'FAL1', ?4, ?4, ?5, ?6)",
        )
        .bind(format!("ID-{voyage}"))
        .bind(voyage)
        .bind(direction)
        .bind(port)
        .bind(event)
        .bind(time)
        .execute(&self.db)
        .await
        .unwrap();
    }
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("reading response body");
    serde_json::from_slice(&bytes).expect("parsing response body")
}

pub async fn request_json(router: Router, uri: &str) -> (StatusCode, Value) {
    let response = router.oneshot(get(uri)).await.unwrap();
    let status = response.status();
    (status, body_json(response).await)
}
