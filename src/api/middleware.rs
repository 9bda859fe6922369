//! Request middleware shared by all three listeners: correlation ids,
//! response headers, CORS, request logging and panic recovery.

use std::time::Instant;

use axum::extract::Request;
use axum::http::{header::HeaderValue, HeaderName, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{error, info};
use uuid::Uuid;

use crate::error::ApiError;

pub const CORRELATION_HEADER: &str = "X-Correlation-ID";

/// Correlation id carried through request extensions so logging can reach
/// it after the handler ran.
#[derive(Clone)]
pub struct CorrelationId(pub String);

pub async fn correlation_id(mut request: Request, next: Next) -> Response {
    let id = request
        .headers()
        .get(CORRELATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    request.extensions_mut().insert(CorrelationId(id.clone()));

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static("x-correlation-id"), value);
    }
    response
}

/// Standard response headers of the gateway contract.
pub async fn standard_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        axum::http::header::CONNECTION,
        HeaderValue::from_static("Keep-Alive"),
    );
    headers.insert(
        axum::http::header::CACHE_CONTROL,
        HeaderValue::from_static("max-age=7200,stale-while-revalidate=86400"),
    );
    headers
        .entry(axum::http::header::CONTENT_TYPE)
        .or_insert(HeaderValue::from_static("application/json"));
    response
}

/// CORS: any origin, GET and OPTIONS only.
pub async fn cors(request: Request, next: Next) -> Response {
    let is_preflight = request.method() == Method::OPTIONS
        && request.headers().contains_key(axum::http::header::ORIGIN)
        && request
            .headers()
            .contains_key("Access-Control-Request-Method");
    let mut response = if is_preflight {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };
    let headers = response.headers_mut();
    headers.insert(
        axum::http::header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    if is_preflight {
        headers.insert(
            axum::http::header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, OPTIONS"),
        );
    }
    headers.insert(axum::http::header::VARY, HeaderValue::from_static("Origin"));
    response
}

pub async fn logging(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();
    let correlation = request
        .extensions()
        .get::<CorrelationId>()
        .map(|c| c.0.clone())
        .unwrap_or_default();

    let response = next.run(request).await;
    info!(
        %method,
        %uri,
        status = %response.status(),
        correlation_id = %correlation,
        elapsed = ?started.elapsed(),
        "request"
    );
    response
}

/// Runs the rest of the stack on its own task so a panicking handler
/// renders the error envelope instead of killing the connection.
pub async fn recovery(request: Request, next: Next) -> Response {
    match tokio::spawn(next.run(request)).await {
        Ok(response) => response,
        Err(join_error) => {
            let reason = if join_error.is_panic() {
                match join_error.into_panic().downcast::<String>() {
                    Ok(message) => *message,
                    Err(payload) => payload
                        .downcast::<&'static str>()
                        .map(|s| s.to_string())
                        .unwrap_or_else(|_| "unknown panic payload".to_string()),
                }
            } else {
                "handler task cancelled".to_string()
            };
            error!(reason, "caught panic in request handler");
            ApiError::Internal(format!("caught panic: {reason}")).into_response()
        }
    }
}
