//! Process-wide state shared across the three listeners.
//!
//! Everything here is initialized once at startup and passed by handle;
//! per-request state lives in the pipeline.

use std::sync::Arc;

use crate::carriers::{P2pRegistry, VesselRegistry};
use crate::cache::CacheRepository;
use crate::config::ConfigStore;
use crate::env::EnvManager;
use crate::fetch::Fetcher;
use crate::voyage::VoyageRepository;

pub struct AppState {
    pub env: EnvManager,
    pub config: ConfigStore,
    pub fetcher: Fetcher,
    pub p2p_registry: P2pRegistry,
    pub vessel_registry: VesselRegistry,
    pub voyages: Arc<dyn VoyageRepository>,
}

impl AppState {
    pub fn cache(&self) -> Arc<dyn CacheRepository> {
        self.fetcher.cache()
    }
}
