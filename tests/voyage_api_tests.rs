//! End-to-end tests of the master-vessel voyage surface: history-store
//! aggregation with overlap collapsing, plus the live-adapter fallback.

mod common;

use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};

use common::{request_json, spawn_stub, TestApp};

const VOYAGE_URI: &str = "/schedules/mastervoyage?scac=CMDU&vesselIMO=9839272";

#[tokio::test]
async fn overlapped_port_collapses_into_arrays() {
    let stub = spawn_stub(Router::new()).await;
    let app = TestApp::new(&stub).await;

    // Voyage A1 ends in Singapore where A2 begins: the loading call is
    // recorded once per voyage number.
    app.insert_voyage_row("A1", "WBO", "UNL", "HKHKG", "2025-01-28T08:00:00").await;
    app.insert_voyage_row("A1", "WBO", "LOA", "SGSIN", "2025-02-01T10:00:00").await;
    app.insert_voyage_row("A2", "EBO", "LOA", "SGSIN", "2025-02-01T10:00:00").await;
    app.insert_voyage_row("A2", "EBO", "UNL", "DEHAM", "2025-03-01T07:00:00").await;

    let (status, body) = request_json(app.voyage_router(), VOYAGE_URI).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["vesselIMO"], "9839272");

    let schedules = body["vesselSchedules"].as_array().unwrap();
    assert_eq!(schedules.len(), 1);
    let schedule = &schedules[0];
    assert_eq!(schedule["scac"], "CMDU");
    assert_eq!(schedule["voyage"], "A1");
    assert_eq!(schedule["nextVoyage"], "A2");
    assert_eq!(schedule["vessel"]["imo"], "9839272");

    let calls = schedule["calls"].as_array().unwrap();
    assert_eq!(calls.len(), 3, "the overlap twin is removed");

    let overlap = calls
        .iter()
        .find(|c| c["port"]["portCode"] == "SGSIN")
        .expect("overlapped call present");
    assert_eq!(overlap["voyage"], serde_json::json!(["A1", "A2"]));
    assert_eq!(overlap["key"], serde_json::json!(["ID-A1", "ID-A2"]));
    assert_eq!(overlap["bound"], serde_json::json!(["WBO", "EBO"]));
    assert_eq!(overlap["portEvent"], "Loading");
    assert_eq!(overlap["estimatedEventDate"], "2025-02-01T10:00:00");

    let seqs: Vec<u64> = calls.iter().map(|c| c["seq"].as_u64().unwrap()).collect();
    assert_eq!(seqs, vec![1, 2, 3]);
}

#[tokio::test]
async fn scalar_fields_without_overlap() {
    let stub = spawn_stub(Router::new()).await;
    let app = TestApp::new(&stub).await;

    app.insert_voyage_row("A1", "WBO", "LOA", "HKHKG", "2025-01-28T08:00:00").await;
    app.insert_voyage_row("A1", "WBO", "UNL", "SGSIN", "2025-02-01T10:00:00").await;

    let (status, body) = request_json(app.voyage_router(), VOYAGE_URI).await;
    assert_eq!(status, StatusCode::OK);
    let calls = body["vesselSchedules"][0]["calls"].as_array().unwrap();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0]["voyage"], "A1");
    assert_eq!(calls[0]["bound"], "WBO");
    assert!(body["vesselSchedules"][0].get("nextVoyage").is_none());
}

#[tokio::test]
async fn empty_store_falls_back_to_the_live_adapter() {
    let stub = spawn_stub(Router::new().route(
        "/cma/vessels",
        get(|| async {
            Json(serde_json::json!([
              {
                "id": "CMA-90211",
                "activities": ["Load"],
                "voyageCode": "0MX3EW1MA",
                "bound": "WEST",
                "shippingCompany": "0001",
                "location": {
                  "name": "Singapore",
                  "internalCode": "SGSIN",
                  "locationCodifications": [],
                  "facility": {"name": "PSA", "internalCode": "PSA1", "facilityCodifications": []}
                },
                "vessel": {"name": "CMA CGM JACQUES SAADE", "imo": "9839179"},
                "service": {"code": "FAL1", "name": "French Asia Line 1"},
                "berthDate": {"utc": "2025-02-01T06:00:00Z"},
                "unberthDate": {"utc": "2025-02-02T18:00:00Z"},
                "nextVoyage": "0MX3FW1MA"
              }
            ]))
        }),
    ))
    .await;
    let app = TestApp::new(&stub).await;

    let (status, body) = request_json(
        app.voyage_router(),
        "/schedules/mastervoyage?scac=CMDU&vesselIMO=9839179",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let schedules = body["vesselSchedules"].as_array().unwrap();
    assert_eq!(schedules.len(), 1);
    assert_eq!(schedules[0]["voyage"], "0MX3EW1MA");
    assert_eq!(schedules[0]["vessel"]["imo"], "9839179");
}

#[tokio::test]
async fn nothing_anywhere_yields_the_empty_message() {
    let stub = spawn_stub(Router::new()).await;
    let app = TestApp::new(&stub).await;

    // MSCU has no live vessel adapter and the store is empty.
    let (status, body) = request_json(
        app.voyage_router(),
        "/schedules/mastervoyage?scac=MSCU&vesselIMO=9839272",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["vesselSchedules"].as_array().unwrap().len(), 0);
    assert!(body["message"].as_str().unwrap().contains("No available"));
}

#[tokio::test]
async fn missing_required_parameters_are_rejected() {
    let stub = spawn_stub(Router::new()).await;
    let app = TestApp::new(&stub).await;

    let (status, _) =
        request_json(app.voyage_router(), "/schedules/mastervoyage?vesselIMO=9839272").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) =
        request_json(app.voyage_router(), "/schedules/mastervoyage?scac=CMDU").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn two_carriers_fan_in_independently() {
    let stub = spawn_stub(Router::new()).await;
    let app = TestApp::new(&stub).await;

    app.insert_voyage_row("A1", "WBO", "LOA", "HKHKG", "2025-01-28T08:00:00").await;
    app.insert_voyage_row("A1", "WBO", "UNL", "SGSIN", "2025-02-01T10:00:00").await;

    // MSCU contributes nothing (no store rows, no live adapter) while
    // CMDU streams its schedule.
    let (status, body) = request_json(
        app.voyage_router(),
        "/schedules/mastervoyage?scac=CMDU&scac=MSCU&vesselIMO=9839272",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let schedules = body["vesselSchedules"].as_array().unwrap();
    assert_eq!(schedules.len(), 1);
    assert_eq!(schedules[0]["scac"], "CMDU");
}
