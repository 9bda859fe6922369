//! Point-to-point schedule adapters, one module per upstream family.

mod cma;
mod hapag;
mod iqax;
mod maersk;
mod msc;
mod one;
mod zim;

use std::collections::HashMap;
use std::sync::Arc;

use reqwest::Method;

pub use cma::CmaParser;
pub use hapag::HapagParser;
pub use iqax::IqaxParser;
pub use maersk::MaerskParser;
pub use msc::MscParser;
pub use one::OneParser;
pub use zim::ZimParser;

use super::{
    AuthConfig, CarrierConfig, LocationConfig, P2pRegistry, LOCATION_TTL, SCHEDULE_TTL, TOKEN_TTL,
};
use crate::env::EnvManager;
use crate::models::Scac;

/// Builds the full P2P carrier registry from the environment.
pub fn registry(env: &EnvManager) -> P2pRegistry {
    let mut configs = HashMap::new();

    let cma = Arc::new(CmaParser);
    for (scac, namespace) in [
        (Scac::CMDU, "cma schedule"),
        (Scac::APLU, "apl schedule"),
        (Scac::ANNU, "anl schedule"),
        (Scac::CHNL, "cnl schedule"),
    ] {
        configs.insert(
            scac,
            CarrierConfig {
                name: "CMA",
                schedule_url: env.cma_url.clone(),
                method: Method::GET,
                namespace: namespace.to_string(),
                ttl: SCHEDULE_TTL,
                auth: None,
                location: None,
                parser: cma.clone(),
            },
        );
    }

    let zim = Arc::new(ZimParser);
    configs.insert(
        Scac::ZIMU,
        CarrierConfig {
            name: "ZIM",
            schedule_url: env.zim_url.clone(),
            method: Method::GET,
            namespace: "zim schedule".to_string(),
            ttl: SCHEDULE_TTL,
            auth: Some(AuthConfig {
                token_url: env.zim_token_url.clone(),
                ttl: TOKEN_TTL,
                namespace: "ZIM token".to_string(),
                provider: zim.clone(),
            }),
            location: None,
            parser: zim,
        },
    );

    let msc = Arc::new(MscParser);
    configs.insert(
        Scac::MSCU,
        CarrierConfig {
            name: "MSC",
            schedule_url: env.msc_url.clone(),
            method: Method::GET,
            namespace: "msc schedule".to_string(),
            ttl: SCHEDULE_TTL,
            auth: Some(AuthConfig {
                token_url: env.msc_oauth_url.clone(),
                ttl: TOKEN_TTL,
                namespace: "MSC token".to_string(),
                provider: msc.clone(),
            }),
            location: None,
            parser: msc,
        },
    );

    let one = Arc::new(OneParser);
    configs.insert(
        Scac::ONEY,
        CarrierConfig {
            name: "ONE",
            schedule_url: env.one_url.clone(),
            method: Method::GET,
            namespace: "one schedule".to_string(),
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

    configs.insert(
        Scac::HLCU,
        CarrierConfig {
            name: "HAPAG",
            schedule_url: env.hapag_url.clone(),
            method: Method::GET,
            namespace: "hapag schedule".to_string(),
            ttl: SCHEDULE_TTL,
            auth: None,
            location: None,
            parser: Arc::new(HapagParser),
        },
    );

    let iqax = Arc::new(IqaxParser);
    for (scac, namespace) in [(Scac::COSU, "cosco schedule"), (Scac::OOLU, "oocl schedule")] {
        configs.insert(
            scac,
            CarrierConfig {
                name: "IQAX",
                schedule_url: format!("{}/{}", env.iqax_url, scac),
                method: Method::GET,
                namespace: namespace.to_string(),
                ttl: SCHEDULE_TTL,
                auth: None,
                location: None,
                parser: iqax.clone(),
            },
        );
    }

    let maersk = Arc::new(MaerskParser);
    for (scac, namespace) in [
        (Scac::MAEU, "maersk a/s schedule"),
        (Scac::MAEI, "maersk line schedule"),
    ] {
        configs.insert(
            scac,
            CarrierConfig {
                name: "MAERSK",
                schedule_url: env.maersk_p2p_url.clone(),
                method: Method::GET,
                namespace: namespace.to_string(),
                ttl: SCHEDULE_TTL,
                auth: None,
                location: Some(LocationConfig {
                    url: env.maersk_location_url.clone(),
                    ttl: LOCATION_TTL,
                    namespace: "maersk location".to_string(),
                    provider: maersk.clone(),
                }),
                parser: maersk.clone(),
            },
        );
    }

    P2pRegistry::from_configs(configs)
}
