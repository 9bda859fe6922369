//! Service-view configuration.
//!
//! `config.yaml` holds a `base` map plus per-service override maps. A view
//! for a service name is the base merged with its overrides. A watcher task
//! re-reads the file on a fixed period; the snapshot swap happens under a
//! writer lock, readers take the read lock only.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde_yaml::Value;
use thiserror::Error;
use tracing::{error, info};

/// Reload period for the hot-reload watcher.
pub const RELOAD_PERIOD: Duration = Duration::from_secs(300);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("config root is not a map")]
    NotAMap,
    #[error("config section {0:?} is not a map")]
    SectionNotAMap(String),
}

type Section = BTreeMap<String, Value>;

/// Shared configuration store with hot reload.
#[derive(Clone, Default)]
pub struct ConfigStore {
    sections: Arc<RwLock<BTreeMap<String, Section>>>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the file once, then spawns the periodic reloader.
    pub async fn start(path: PathBuf, period: Duration) -> Result<Self, ConfigError> {
        let store = ConfigStore::new();
        store.reload_from(&path).await?;
        let watcher = store.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await; // first tick fires immediately; already loaded
            loop {
                ticker.tick().await;
                if let Err(err) = watcher.reload_from(&path).await {
                    error!(%err, "config reload failed, keeping previous snapshot");
                }
            }
        });
        Ok(store)
    }

    pub async fn reload_from(&self, path: &PathBuf) -> Result<(), ConfigError> {
        let data = tokio::fs::read_to_string(path).await?;
        self.set_from_str(&data)?;
        info!(path = %path.display(), "configuration loaded");
        Ok(())
    }

    pub fn set_from_str(&self, data: &str) -> Result<(), ConfigError> {
        let root: Value = serde_yaml::from_str(data)?;
        let Value::Mapping(root) = root else {
            return Err(ConfigError::NotAMap);
        };
        let mut sections = BTreeMap::new();
        for (key, value) in root {
            let name = key.as_str().ok_or(ConfigError::NotAMap)?.to_string();
            let Value::Mapping(section) = value else {
                return Err(ConfigError::SectionNotAMap(name));
            };
            let mut flattened = Section::new();
            for (k, v) in section {
                if let Some(k) = k.as_str() {
                    flattened.insert(k.to_string(), v);
                }
            }
            sections.insert(name, flattened);
        }
        *self.sections.write().expect("config lock poisoned") = sections;
        Ok(())
    }

    /// Merged view for `service_name`: base overlaid with the service map.
    /// A service without overrides sees the base alone.
    pub fn view(&self, service_name: &str) -> Section {
        let sections = self.sections.read().expect("config lock poisoned");
        let mut merged = sections.get("base").cloned().unwrap_or_default();
        if let Some(overrides) = sections.get(service_name) {
            for (k, v) in overrides {
                merged.insert(k.clone(), v.clone());
            }
        }
        merged
    }

    /// The `activeCarriers` map of a service view: SCAC → active flag.
    pub fn active_carriers(&self, service_name: &str) -> BTreeMap<String, bool> {
        let view = self.view(service_name);
        let mut carriers = BTreeMap::new();
        if let Some(Value::Mapping(map)) = view.get("activeCarriers") {
            for (k, v) in map {
                if let (Some(code), Some(active)) = (k.as_str(), v.as_bool()) {
                    carriers.insert(code.to_string(), active);
                }
            }
        }
        carriers
    }
}
