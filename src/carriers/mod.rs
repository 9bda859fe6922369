//! Carrier integration engine.
//!
//! A carrier adapter is a set of capabilities: building a token request,
//! building a location lookup, and building + parsing the schedule call.
//! The generic service composes whichever capabilities a carrier's config
//! declares, so every vendor shares one fetch path. Registries map SCACs to
//! configs for the two query shapes (P2P and master-vessel voyage).

pub mod p2p;
pub mod util;
pub mod vessel;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::env::EnvManager;
use crate::fetch::{FetchError, Fetcher};
use crate::models::{MasterVesselSchedule, P2PSchedule, P2pQuery, Scac, VoyageQuery};

/// Schedule payloads cached for six hours.
pub const SCHEDULE_TTL: Duration = Duration::from_secs(6 * 60 * 60);
/// Tokens refresh a little before their hour expiry.
pub const TOKEN_TTL: Duration = Duration::from_secs(55 * 60);
/// Carrier location ids are effectively static.
pub const LOCATION_TTL: Duration = Duration::from_secs(8000 * 60 * 60);

#[derive(Debug, Error)]
pub enum CarrierError {
    #[error("unsupported carrier: {0}")]
    Unsupported(Scac),
    #[error("failed to get auth token: {0}")]
    Auth(String),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("could not parse upstream payload: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("empty upstream response")]
    EmptyResponse,
}

/// Headers and parameters of one outbound request.
#[derive(Debug, Default, Clone)]
pub struct RequestParts {
    pub headers: Vec<(String, String)>,
    pub params: Vec<(String, String)>,
}

impl RequestParts {
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty() && self.params.is_empty()
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }
}

/// Parsed token-endpoint response.
pub type TokenData = serde_json::Map<String, Value>;

/// Location-endpoint response: a list of location objects.
pub type LocationData = Vec<serde_json::Map<String, Value>>;

pub trait TokenProvider: Send + Sync {
    fn token_request(&self, env: &EnvManager) -> Result<RequestParts, CarrierError>;
}

pub trait LocationProvider: Send + Sync {
    fn location_request(&self, env: &EnvManager, port: &str) -> RequestParts;
}

/// Everything a schedule request builder may draw on. Per-request only;
/// nothing here outlives the query.
pub struct ScheduleArgs<'a, Q> {
    pub token: Option<TokenData>,
    pub scac: Scac,
    pub env: &'a EnvManager,
    pub query: &'a Q,
    pub origin: Option<LocationData>,
    pub destination: Option<LocationData>,
}

pub trait ScheduleParser<T, Q>: Send + Sync {
    fn schedule_request(&self, args: &ScheduleArgs<'_, Q>) -> Result<RequestParts, CarrierError>;
    fn parse(&self, body: &[u8]) -> Result<T, CarrierError>;
}

/// Port pair of a query, when it has one. Location resolution only applies
/// to queries carrying ports.
pub trait PortPair {
    fn port_pair(&self) -> Option<(&str, &str)>;
}

impl PortPair for P2pQuery {
    fn port_pair(&self) -> Option<(&str, &str)> {
        Some((&self.point_from, &self.point_to))
    }
}

impl PortPair for VoyageQuery {
    fn port_pair(&self) -> Option<(&str, &str)> {
        None
    }
}

pub struct AuthConfig {
    pub token_url: String,
    pub ttl: Duration,
    pub namespace: String,
    pub provider: Arc<dyn TokenProvider>,
}

pub struct LocationConfig {
    pub url: String,
    pub ttl: Duration,
    pub namespace: String,
    pub provider: Arc<dyn LocationProvider>,
}

/// Static per-carrier wiring: endpoints, cache namespaces and the adapter.
pub struct CarrierConfig<T, Q> {
    pub name: &'static str,
    pub schedule_url: String,
    pub method: Method,
    pub namespace: String,
    pub ttl: Duration,
    pub auth: Option<AuthConfig>,
    pub location: Option<LocationConfig>,
    pub parser: Arc<dyn ScheduleParser<T, Q>>,
}

/// Generic schedule service: optional token, optional location resolution,
/// then the schedule fetch, all through the shared fetcher and cache.
pub struct ScheduleService<'a, T, Q> {
    config: &'a CarrierConfig<T, Q>,
}

impl<'a, T, Q: PortPair> ScheduleService<'a, T, Q> {
    pub fn new(config: &'a CarrierConfig<T, Q>) -> Self {
        Self { config }
    }

    /// Runs the composed pipeline for one carrier. `Ok(None)` means the
    /// carrier is silently skipped (unresolvable location or an adapter
    /// declining the query).
    pub async fn fetch_schedule(
        &self,
        fetcher: &Fetcher,
        env: &EnvManager,
        query: &Q,
        scac: Scac,
    ) -> Result<Option<T>, CarrierError> {
        let mut args = ScheduleArgs {
            token: None,
            scac,
            env,
            query,
            origin: None,
            destination: None,
        };

        if let Some(auth) = &self.config.auth {
            args.token = Some(self.acquire_token(fetcher, env, auth).await?);
        } else if let Some(location) = &self.config.location {
            if let Some((from, to)) = query.port_pair() {
                let origin = self.resolve_location(fetcher, env, location, from).await;
                let destination = self.resolve_location(fetcher, env, location, to).await;
                match (origin, destination) {
                    (Some(origin), Some(destination))
                        if !origin.is_empty() && !destination.is_empty() =>
                    {
                        args.origin = Some(origin);
                        args.destination = Some(destination);
                    }
                    _ => {
                        info!(%scac, "origin or destination unavailable, skipping carrier");
                        return Ok(None);
                    }
                }
            }
        }

        let parts = self.config.parser.schedule_request(&args)?;
        if parts.is_empty() {
            return Ok(None);
        }
        let body = fetcher
            .fetch(
                self.config.method.clone(),
                &self.config.schedule_url,
                &parts.params,
                &parts.headers,
                &self.config.namespace,
                self.config.ttl,
            )
            .await?;
        Ok(Some(self.config.parser.parse(&body)?))
    }

    async fn acquire_token(
        &self,
        fetcher: &Fetcher,
        env: &EnvManager,
        auth: &AuthConfig,
    ) -> Result<TokenData, CarrierError> {
        let parts = auth.provider.token_request(env)?;
        let body = fetcher
            .fetch(
                Method::POST,
                &auth.token_url,
                &parts.params,
                &parts.headers,
                &auth.namespace,
                auth.ttl,
            )
            .await
            .map_err(|err| CarrierError::Auth(err.to_string()))?;
        serde_json::from_slice(&body).map_err(|err| CarrierError::Auth(err.to_string()))
    }

    async fn resolve_location(
        &self,
        fetcher: &Fetcher,
        env: &EnvManager,
        location: &LocationConfig,
        port: &str,
    ) -> Option<LocationData> {
        let parts = location.provider.location_request(env, port);
        let body = fetcher
            .fetch(
                Method::GET,
                &location.url,
                &parts.params,
                &parts.headers,
                &location.namespace,
                location.ttl,
            )
            .await
            .ok()?;
        serde_json::from_slice(&body).ok()
    }
}

/// SCAC → config registry shared by both query shapes.
pub struct Registry<T, Q> {
    configs: HashMap<Scac, CarrierConfig<T, Q>>,
}

impl<T, Q: PortPair> Registry<T, Q> {
    pub fn from_configs(configs: HashMap<Scac, CarrierConfig<T, Q>>) -> Self {
        Self { configs }
    }

    pub fn contains(&self, scac: Scac) -> bool {
        self.configs.contains_key(&scac)
    }

    pub fn service(&self, scac: Scac) -> Result<ScheduleService<'_, T, Q>, CarrierError> {
        self.configs
            .get(&scac)
            .map(ScheduleService::new)
            .ok_or(CarrierError::Unsupported(scac))
    }
}

pub type P2pRegistry = Registry<Vec<P2PSchedule>, P2pQuery>;
pub type VesselRegistry = Registry<MasterVesselSchedule, VoyageQuery>;
