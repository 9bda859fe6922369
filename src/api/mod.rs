//! HTTP surface: routers for the three listeners plus shared middleware.

pub mod middleware;
pub mod query;

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, Request, State};
use axum::middleware::from_fn;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::pipeline;
use crate::state::AppState;

/// Config view consulted for the active-carrier map of the P2P surface.
pub const P2P_SERVICE_VIEW: &str = "p2p";

fn with_middleware(router: Router<Arc<AppState>>, state: Arc<AppState>) -> Router {
    // Outermost first: recovery wraps everything, logging sees the final
    // status, headers/cors decorate whatever the handlers produce.
    router
        .layer(from_fn(middleware::logging))
        .layer(from_fn(middleware::standard_headers))
        .layer(from_fn(middleware::correlation_id))
        .layer(from_fn(middleware::cors))
        .layer(from_fn(middleware::recovery))
        .with_state(state)
}

/// Listener on the P2P port: schedule search plus liveness.
pub fn p2p_router(state: Arc<AppState>) -> Router {
    with_middleware(
        Router::new()
            .route("/schedules/p2p", get(p2p_schedules))
            .route("/health", get(health)),
        state,
    )
}

/// Listener on the voyage port.
pub fn voyage_router(state: Arc<AppState>) -> Router {
    with_middleware(
        Router::new()
            .route("/schedules/mastervoyage", get(master_voyage))
            .route("/health", get(health)),
        state,
    )
}

/// Listener on the config port: merged service views.
pub fn config_router(state: Arc<AppState>) -> Router {
    with_middleware(
        Router::new()
            .route("/read/:serviceName", get(read_config))
            .route("/health", get(health)),
        state,
    )
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({"message": "Health check successful"}))
}

async fn read_config(
    State(state): State<Arc<AppState>>,
    Path(service_name): Path<String>,
) -> Json<BTreeMap<String, serde_yaml::Value>> {
    Json(state.config.view(&service_name))
}

async fn p2p_schedules(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let raw_query = request.uri().query().unwrap_or_default();
    let active_carriers = state.config.active_carriers(P2P_SERVICE_VIEW);
    let parsed = match query::parse_p2p_query(raw_query, &active_carriers) {
        Ok(parsed) => parsed,
        Err(err) => return err.into_response(),
    };
    let watch_key = request.uri().to_string();
    pipeline::stream_p2p(state, parsed, watch_key).into_response()
}

async fn master_voyage(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let raw_query = request.uri().query().unwrap_or_default();
    let parsed = match query::parse_voyage_query(raw_query) {
        Ok(parsed) => parsed,
        Err(err) => return err.into_response(),
    };
    let watch_key = request.uri().to_string();
    pipeline::stream_voyage(state, parsed, watch_key).into_response()
}
