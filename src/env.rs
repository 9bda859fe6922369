//! Startup environment: carrier endpoints and secrets.
//!
//! Values come from a `.env`-style file merged under the process
//! environment (process environment wins). Every carrier key is required at
//! startup so a misconfigured deployment fails fast instead of at the first
//! request.

use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnvError {
    #[error("could not read env file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed env line {line}: {text:?}")]
    Malformed { line: usize, text: String },
    #[error("required environment variable {0} not found")]
    Missing(&'static str),
}

/// Typed view over the carrier configuration environment.
#[derive(Debug, Clone)]
pub struct EnvManager {
    pub zim_url: String,
    pub zim_token_url: String,
    pub zim_subscription_key: String,
    pub zim_client: String,
    pub zim_secret: String,
    pub iqax_url: String,
    pub iqax_token: String,
    pub msc_url: String,
    pub msc_oauth_url: String,
    pub msc_audience: String,
    pub msc_client: String,
    pub msc_thumbprint: String,
    pub msc_scope: String,
    pub msc_rsa_key: String,
    pub maersk_p2p_url: String,
    pub maersk_vessel_url: String,
    pub maersk_location_url: String,
    pub maersk_token: String,
    pub maersk_location_token: String,
    pub maersk_vessel_token: String,
    pub hapag_url: String,
    pub hapag_vessel_url: String,
    pub hapag_client: String,
    pub hapag_secret: String,
    pub one_url: String,
    pub one_token_url: String,
    pub one_api_key: String,
    pub one_basic_auth: String,
    pub cma_url: String,
    pub cma_vessel_url: String,
    pub cma_token: String,
    /// Cache backend, e.g. `redis://127.0.0.1:6379/0`. Optional: absent
    /// means the in-process cache.
    pub redis_url: Option<String>,
    /// Voyage history store, e.g. `sqlite://voyages.db`.
    pub database_url: String,
}

impl EnvManager {
    /// Loads `path` (when present) and resolves all typed keys.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EnvError> {
        let mut vars = HashMap::new();
        let path = path.as_ref();
        if path.exists() {
            parse_env_file(&std::fs::read_to_string(path)?, &mut vars)?;
        }
        for (key, value) in std::env::vars() {
            vars.insert(key, value);
        }
        Self::from_vars(&vars)
    }

    fn from_vars(vars: &HashMap<String, String>) -> Result<Self, EnvError> {
        let must = |key: &'static str| -> Result<String, EnvError> {
            vars.get(key)
                .filter(|v| !v.is_empty())
                .cloned()
                .ok_or(EnvError::Missing(key))
        };
        Ok(EnvManager {
            zim_url: must("ZIM_URL")?,
            zim_token_url: must("ZIM_TURL")?,
            zim_subscription_key: must("ZIM_TOKEN")?,
            zim_client: must("ZIM_CLIENT")?,
            zim_secret: must("ZIM_SECRET")?,
            iqax_url: must("IQAX_URL")?,
            iqax_token: must("IQAX_TOKEN")?,
            msc_url: must("MSCU_URL")?,
            msc_oauth_url: must("MSCU_OAUTH")?,
            msc_audience: must("MSCU_AUD")?,
            msc_client: must("MSCU_CLIENT")?,
            msc_thumbprint: must("MSCU_THUMBPRINT")?,
            msc_scope: must("MSCU_SCOPE")?,
            msc_rsa_key: must("MSCU_RSA_KEY")?,
            maersk_p2p_url: must("MAEU_P2P")?,
            maersk_vessel_url: must("MAEU_VESSEL_SCHEDULE")?,
            maersk_location_url: must("MAEU_LOCATION")?,
            maersk_token: must("MAEU_TOKEN")?,
            maersk_location_token: must("MAEU_TOKEN2")?,
            maersk_vessel_token: must("MAEU_TOKEN3")?,
            hapag_url: must("HLCU_URL")?,
            hapag_vessel_url: must("HLCU_VV_URL")?,
            hapag_client: must("HLCU_CLIENT_ID")?,
            hapag_secret: must("HLCU_CLIENT_SECRET")?,
            one_url: must("ONEY_URL")?,
            one_token_url: must("ONEY_TURL")?,
            one_api_key: must("ONEY_TOKEN")?,
            one_basic_auth: must("ONEY_AUTH")?,
            cma_url: must("CMA_URL")?,
            cma_vessel_url: must("CMA_VV_URL")?,
            cma_token: must("CMA_TOKEN")?,
            redis_url: vars.get("REDIS_URL").filter(|v| !v.is_empty()).cloned(),
            database_url: must("DATABASE_URL")?,
        })
    }
}

fn parse_env_file(content: &str, vars: &mut HashMap<String, String>) -> Result<(), EnvError> {
    for (index, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            return Err(EnvError::Malformed {
                line: index + 1,
                text: raw.to_string(),
            });
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(EnvError::Malformed {
                line: index + 1,
                text: raw.to_string(),
            });
        }
        vars.insert(key.to_string(), value.trim().to_string());
    }
    Ok(())
}

#[cfg(test)]
pub fn test_env() -> EnvManager {
    let base = "https://upstream.invalid";
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
