//! End-to-end tests of the point-to-point schedule surface against
//! stubbed carrier upstreams.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use futures_util::StreamExt;
use tower::util::ServiceExt;

use common::{body_json, get as get_request, request_json, spawn_stub, TestApp};

/// Hapag-shaped payload: one two-leg sailing HKHKG -> SGSIN -> DEHAM.
fn hapag_two_leg_payload() -> serde_json::Value {
    serde_json::json!([
      {
        "placeOfReceipt": {
          "location": {"locationName": "Hong Kong", "UNLocationCode": "HKHKG"},
          "dateTime": "2025-01-07T20:00:00+08:00"
        },
        "placeOfDelivery": {
          "location": {"locationName": "Hamburg", "UNLocationCode": "DEHAM"},
          "dateTime": "2025-02-08T07:00:00+01:00"
        },
        "transitTime": 31,
        "cutOffTimes": [],
        "legs": [
          {
            "modeOfTransport": "VESSEL",
            "vesselIMONumber": "9540118",
            "vesselName": "BRUSSELS EXPRESS",
            "carrierServiceCode": "FE4",
            "carrierServiceName": "Far East Loop 4",
            "universalExportVoyageReference": "2501W",
            "departure": {
              "location": {"locationName": "Hong Kong", "UNLocationCode": "HKHKG"},
              "dateTime": "2025-01-07T20:00:00+08:00"
            },
            "arrival": {
              "location": {"locationName": "Singapore", "UNLocationCode": "SGSIN"},
              "dateTime": "2025-01-11T06:00:00+08:00"
            }
          },
          {
            "modeOfTransport": "VESSEL",
            "vesselIMONumber": "9632040",
            "vesselName": "AL ZUBARA",
            "carrierServiceCode": "FE4",
            "carrierServiceName": "Far East Loop 4",
            "universalExportVoyageReference": "2502W",
            "departure": {
              "location": {"locationName": "Singapore", "UNLocationCode": "SGSIN"},
              "dateTime": "2025-01-12T22:00:00+08:00"
            },
            "arrival": {
              "location": {"locationName": "Hamburg", "UNLocationCode": "DEHAM"},
              "dateTime": "2025-02-08T07:00:00+01:00"
            }
          }
        ]
      }
    ])
}

/// CMA-shaped payload: one direct route and one transshipment route.
fn cma_two_route_payload() -> serde_json::Value {
    let leg = |from: &str, to: &str, etd: &str, eta: &str, imo: &str| {
        serde_json::json!({
          "pointFrom": {
            "location": {"name": from, "internalCode": from, "locationCodifications": [], "facility": {"name": "", "facilityCodifications": []}},
            "departureDateGmt": etd
          },
          "pointTo": {
            "location": {"name": to, "internalCode": to, "locationCodifications": [], "facility": {"name": "", "facilityCodifications": []}},
            "arrivalDateGmt": eta
          },
          "transportation": {
            "meanOfTransport": "VESSEL",
            "vehicule": {"vehiculeType": "Vessel", "vehiculeName": "CMA CGM LYRA", "reference": imo},
            "voyage": {"voyageReference": "0TUPE1MA", "service": {"code": "FAL1"}}
          },
          "legTransitTime": 5
        })
    };
    serde_json::json!([
      {
        "shippingCompany": "0001",
        "transitTime": 31,
        "routingDetails": [leg("HKHKG", "DEHAM", "2025-01-08T10:00:00Z", "2025-02-08T06:00:00Z", "9410781")]
      },
      {
        "shippingCompany": "0001",
        "transitTime": 33,
        "routingDetails": [
          leg("HKHKG", "SGSIN", "2025-01-09T10:00:00Z", "2025-01-13T06:00:00Z", "9410781"),
          leg("SGSIN", "DEHAM", "2025-01-14T22:00:00Z", "2025-02-11T06:00:00Z", "9632040")
        ]
      }
    ])
}

const P2P_BASE: &str = "/schedules/p2p?pointFrom=HKHKG&pointTo=DEHAM\
                        &startDateType=Departure&startDate=2025-01-06&searchRange=2";

#[tokio::test]
async fn single_carrier_happy_path() {
    let stub = spawn_stub(Router::new().route(
        "/hapag/schedules",
        get(|| async { Json(hapag_two_leg_payload()) }),
    ))
    .await;
    let app = TestApp::new(&stub).await;

    let (status, body) = request_json(app.p2p_router(), &format!("{P2P_BASE}&scac=HLCU")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["origin"], "HKHKG");
    assert_eq!(body["destination"], "DEHAM");
    let schedules = body["schedules"].as_array().unwrap();
    assert_eq!(schedules.len(), 1);
    let schedule = &schedules[0];
    assert_eq!(schedule["scac"], "HLCU");
    assert_eq!(schedule["transshipment"], true);
    assert_eq!(schedule["legs"].as_array().unwrap().len(), 2);
    assert!(schedule["transitTime"].as_i64().unwrap() > 0);
    assert!(schedule["etd"].as_str().unwrap() < schedule["eta"].as_str().unwrap());
    assert!(body.get("message").is_none());
}

#[tokio::test]
async fn fan_in_merges_two_carriers() {
    let stub = spawn_stub(
        Router::new()
            .route("/hapag/schedules", get(|| async { Json(hapag_two_leg_payload()) }))
            .route("/cma/schedules", get(|| async { Json(cma_two_route_payload()) })),
    )
    .await;
    let app = TestApp::new(&stub).await;

    let (status, body) =
        request_json(app.p2p_router(), &format!("{P2P_BASE}&scac=HLCU&scac=CMDU")).await;
    assert_eq!(status, StatusCode::OK);
    let schedules = body["schedules"].as_array().unwrap();
    assert_eq!(schedules.len(), 3);
    let mut by_carrier: Vec<&str> = schedules
        .iter()
        .map(|s| s["scac"].as_str().unwrap())
        .collect();
    by_carrier.sort();
    assert_eq!(by_carrier, vec!["CMDU", "CMDU", "HLCU"]);
}

#[tokio::test]
async fn direct_only_filters_transshipments() {
    let stub = spawn_stub(Router::new().route(
        "/cma/schedules",
        get(|| async { Json(cma_two_route_payload()) }),
    ))
    .await;
    let app = TestApp::new(&stub).await;

    let (status, body) = request_json(
        app.p2p_router(),
        &format!("{P2P_BASE}&scac=CMDU&directOnly=true"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let schedules = body["schedules"].as_array().unwrap();
    assert_eq!(schedules.len(), 1);
    assert_eq!(schedules[0]["transshipment"], false);
}

#[tokio::test]
async fn second_request_is_served_from_cache() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let stub = spawn_stub(Router::new().route(
        "/hapag/schedules",
        get(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Json(hapag_two_leg_payload())
            }
        }),
    ))
    .await;
    let app = TestApp::new(&stub).await;
    let uri = format!("{P2P_BASE}&scac=HLCU");

    let (_, first) = request_json(app.p2p_router(), &uri).await;
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    app.wait_for_cache_commit().await;

    let (_, second) = request_json(app.p2p_router(), &uri).await;
    assert_eq!(hits.load(Ordering::SeqCst), 1, "second request hit the cache");
    assert_eq!(first, second);
}

#[tokio::test]
async fn empty_selection_returns_the_documented_message() {
    let stub = spawn_stub(Router::new()).await;
    // Only the default-excluded carriers are active, so an unqualified
    // request selects nothing.
    let config = r#"
base:
  activeCarriers:
    ANNU: true
    CHNL: true
"#;
    let app = TestApp::with_config(&stub, config).await;

    let (status, body) = request_json(app.p2p_router(), P2P_BASE).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["schedules"].as_array().unwrap().len(), 0);
    assert_eq!(
        body["message"],
        "No available schedules for the requested route."
    );
}

#[tokio::test]
async fn upstream_failure_drops_the_carrier_not_the_request() {
    let stub = spawn_stub(
        Router::new()
            .route("/hapag/schedules", get(|| async { Json(hapag_two_leg_payload()) }))
            .route(
                "/cma/schedules",
                get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "upstream down") }),
            ),
    )
    .await;
    let app = TestApp::new(&stub).await;

    let (status, body) =
        request_json(app.p2p_router(), &format!("{P2P_BASE}&scac=HLCU&scac=CMDU")).await;
    assert_eq!(status, StatusCode::OK);
    let schedules = body["schedules"].as_array().unwrap();
    assert_eq!(schedules.len(), 1);
    assert_eq!(schedules[0]["scac"], "HLCU");
}

#[tokio::test]
async fn unknown_parameter_is_a_bad_request_envelope() {
    let stub = spawn_stub(Router::new()).await;
    let app = TestApp::new(&stub).await;

    let (status, body) =
        request_json(app.p2p_router(), &format!("{P2P_BASE}&scac=HLCU&bogus=1")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let errors = body["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0]["message"]
        .as_str()
        .unwrap()
        .contains("wrong parameters provided: bogus"));
    assert_eq!(errors[0]["severity"], "error");
    assert!(errors[0]["count"].as_u64().unwrap() >= 1);
}

#[tokio::test]
async fn inactive_scac_is_rejected() {
    let stub = spawn_stub(Router::new()).await;
    let app = TestApp::new(&stub).await;

    let (status, body) =
        request_json(app.p2p_router(), &format!("{P2P_BASE}&scac=ONEY")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"][0]["message"]
        .as_str()
        .unwrap()
        .contains("inactive scac provided: ONEY"));
}

#[tokio::test]
async fn responses_carry_the_contract_headers() {
    let stub = spawn_stub(Router::new().route(
        "/hapag/schedules",
        get(|| async { Json(hapag_two_leg_payload()) }),
    ))
    .await;
    let app = TestApp::new(&stub).await;

    let request = axum::http::Request::builder()
        .method("GET")
        .uri(format!("{P2P_BASE}&scac=HLCU"))
        .header("X-Correlation-ID", "corr-123")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.p2p_router().oneshot(request).await.unwrap();

    let headers = response.headers();
    assert_eq!(headers["x-correlation-id"], "corr-123");
    assert_eq!(headers["content-type"], "application/json");
    assert_eq!(headers["connection"], "Keep-Alive");
    assert_eq!(
        headers["cache-control"],
        "max-age=7200,stale-while-revalidate=86400"
    );
    assert_eq!(headers["access-control-allow-origin"], "*");
}

#[tokio::test]
async fn client_disconnect_cancels_without_caching() {
    let stub = spawn_stub(
        Router::new()
            .route("/hapag/schedules", get(|| async { Json(hapag_two_leg_payload()) }))
            .route(
                "/cma/schedules",
                get(|| async {
                    tokio::time::sleep(std::time::Duration::from_secs(3)).await;
                    Json(cma_two_route_payload())
                }),
            ),
    )
    .await;
    let app = TestApp::new(&stub).await;

    let response = app
        .p2p_router()
        .oneshot(get_request(&format!("{P2P_BASE}&scac=HLCU&scac=CMDU")))
        .await
        .unwrap();
    let mut stream = response.into_body().into_data_stream();

    // Read the envelope prelude and the first record, then hang up.
    let prelude = stream.next().await.unwrap().unwrap();
    assert!(prelude.starts_with(b"{\"origin\""));
    let first_record = stream.next().await.unwrap().unwrap();
    assert!(!first_record.is_empty());
    drop(stream);

    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    assert!(
        app.cache.is_empty(),
        "an abandoned response must not commit cache writes"
    );
}

#[tokio::test]
async fn config_view_merges_base_and_overrides() {
    let stub = spawn_stub(Router::new()).await;
    let config = r#"
base:
  environment: test
  activeCarriers:
    HLCU: true
p2p:
  environment: p2p-override
"#;
    let app = TestApp::with_config(&stub, config).await;

    let (status, body) = request_json(app.config_router(), "/read/p2p").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["environment"], "p2p-override");
    assert_eq!(body["activeCarriers"]["HLCU"], true);

    let (_, base) = request_json(app.config_router(), "/read/other").await;
    assert_eq!(base["environment"], "test");
}

#[tokio::test]
async fn health_endpoints_answer_on_every_listener() {
    let stub = spawn_stub(Router::new()).await;
    let app = TestApp::new(&stub).await;
    for router in [app.p2p_router(), app.voyage_router(), app.config_router()] {
        let (status, body) = request_json(router, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Health check successful");
    }
}

#[tokio::test]
async fn streamed_and_collected_bodies_agree() {
    let stub = spawn_stub(Router::new().route(
        "/hapag/schedules",
        get(|| async { Json(hapag_two_leg_payload()) }),
    ))
    .await;
    let app = TestApp::new(&stub).await;

    let response = app
        .p2p_router()
        .oneshot(get_request(&format!("{P2P_BASE}&scac=HLCU")))
        .await
        .unwrap();
    let value = body_json(response).await;
    assert!(value["schedules"].is_array());
}
