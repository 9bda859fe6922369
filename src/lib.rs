//! sailgate - aggregating gateway for container-shipping schedule data.
//!
//! Clients issue a point-to-point sailing search or a master-vessel voyage
//! lookup; the gateway fans the query out across ocean-carrier APIs and
//! the voyage history store, normalizes every answer into one canonical
//! schema, validates it, and streams the merged result back as a single
//! JSON document.

pub mod api;
pub mod cache;
pub mod carriers;
pub mod config;
pub mod env;
pub mod error;
pub mod fetch;
pub mod models;
pub mod pipeline;
pub mod state;
pub mod voyage;

pub use api::{config_router, p2p_router, voyage_router};
pub use state::AppState;
