//! Master-vessel voyage adapters for carriers with a live vessel-schedule
//! API. Carriers without one are served from the voyage history store.

mod cma;
mod hapag;
mod maersk;
mod one;

use std::collections::HashMap;
use std::sync::Arc;

use reqwest::Method;

pub use cma::CmaVesselParser;
pub use hapag::HapagVesselParser;
pub use maersk::MaerskVesselParser;
pub use one::OneVesselParser;

use super::{AuthConfig, CarrierConfig, VesselRegistry, SCHEDULE_TTL, TOKEN_TTL};
use crate::env::EnvManager;
use crate::models::Scac;

/// Builds the vessel-voyage carrier registry from the environment.
pub fn registry(env: &EnvManager) -> VesselRegistry {
    let mut configs = HashMap::new();

    let maersk = Arc::new(MaerskVesselParser);
    for (scac, namespace) in [
        (Scac::MAEU, "maersk a/s vessel schedule"),
        (Scac::MAEI, "maersk line vessel schedule"),
    ] {
        configs.insert(
            scac,
            CarrierConfig {
                name: "MAERSK",
                schedule_url: env.maersk_vessel_url.clone(),
                method: Method::GET,
                namespace: namespace.to_string(),
                ttl: SCHEDULE_TTL,
                auth: None,
                location: None,
                parser: maersk.clone(),
            },
        );
    }

    let cma = Arc::new(CmaVesselParser);
    for (scac, namespace) in [
        (Scac::CMDU, "cma vessel schedule"),
        (Scac::APLU, "apl vessel schedule"),
        (Scac::ANNU, "anl vessel schedule"),
        (Scac::CHNL, "cnl vessel schedule"),
    ] {
        configs.insert(
            scac,
            CarrierConfig {
                name: "CMA",
                schedule_url: env.cma_vessel_url.clone(),
                method: Method::GET,
                namespace: namespace.to_string(),
                ttl: SCHEDULE_TTL,
                auth: None,
                location: None,
                parser: cma.clone(),
            },
        );
    }

    configs.insert(
        Scac::HLCU,
        CarrierConfig {
            name: "HAPAG",
            schedule_url: env.hapag_vessel_url.clone(),
            method: Method::GET,
            namespace: "hapag vessel schedule".to_string(),
            ttl: SCHEDULE_TTL,
            auth: None,
            location: None,
            parser: Arc::new(HapagVesselParser),
        },
    );

    let one = Arc::new(OneVesselParser);
    configs.insert(
        Scac::ONEY,
        CarrierConfig {
            name: "ONE",
            schedule_url: format!("{}/transportID", env.one_url),
            method: Method::GET,
            namespace: "one vessel schedule".to_string(),
            ttl: SCHEDULE_TTL,
            auth: Some(AuthConfig {
                token_url: env.one_token_url.clone(),
                ttl: TOKEN_TTL,
                namespace: "ONE token".to_string(),
                provider: one.clone(),
            }),
            location: None,
            parser: one,
        },
    );

    VesselRegistry::from_configs(configs)
}
