//! Per-request streaming pipeline.
//!
//! One worker task per selected carrier fetches, filters and validates its
//! batch, then hands it to a shared fan-in channel. A single streamer task
//! serializes records into the response body as they arrive, flushing per
//! record. Every stage selects on the request's done signal; dropping the
//! response body (client disconnect) tears the whole tree down within one
//! suspension interval.

pub mod filters;

use std::sync::Arc;

use axum::body::Body;
use bytes::Bytes;
use futures_util::stream;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use crate::models::{MasterVesselSchedule, P2PSchedule, P2pQuery, Scac, VoyageQuery};
use crate::state::AppState;
use crate::voyage;

/// Fan-out channels are minimally buffered so a slow consumer throttles
/// its producers.
const FAN_IN_CAPACITY: usize = 1;

const EMPTY_MESSAGE: &str = "No available schedules for the requested route.";

/// Streams the P2P aggregate for `query`, committing buffered cache writes
/// once the response has been fully written.
pub fn stream_p2p(state: Arc<AppState>, query: P2pQuery, cache_watch_key: String) -> Body {
    let (batch_tx, batch_rx) = mpsc::channel::<Vec<P2PSchedule>>(FAN_IN_CAPACITY);
    let (done_tx, done_rx) = watch::channel(false);

    for scac in query.scac.clone() {
        let state = Arc::clone(&state);
        let query = query.clone();
        let batch_tx = batch_tx.clone();
        let mut done = done_rx.clone();
        tokio::spawn(async move {
            let batch = tokio::select! {
                _ = done.changed() => return,
                batch = fetch_p2p_batch(&state, &query, scac) => batch,
            };
            let Some(batch) = batch else { return };
            let batch: Vec<P2PSchedule> = if query.wants_post_filtering() {
                batch
                    .into_iter()
                    .filter(|schedule| filters::passes(schedule, &query))
                    .collect()
            } else {
                batch
            };
            if batch.is_empty() {
                return;
            }
            if let Some(issue) = batch.iter().find_map(|s| s.validate().err()) {
                // Malformed carrier data costs that carrier, not the request.
                error!(%scac, ?issue, "batch failed validation, dropping");
                return;
            }
            tokio::select! {
                _ = done.changed() => {}
                _ = batch_tx.send(batch) => {}
            }
        });
    }
    drop(batch_tx);

    let prelude = format!(
        "{{\"origin\":\"{}\",\"destination\":\"{}\",\"schedules\":[",
        query.point_from, query.point_to
    );
    stream_envelope(state, prelude, batch_rx, done_tx, cache_watch_key)
}

async fn fetch_p2p_batch(
    state: &AppState,
    query: &P2pQuery,
    scac: Scac,
) -> Option<Vec<P2PSchedule>> {
    let service = match state.p2p_registry.service(scac) {
        Ok(service) => service,
        Err(err) => {
            error!(%scac, %err, "no schedule service for carrier");
            return None;
        }
    };
    match service
        .fetch_schedule(&state.fetcher, &state.env, query, scac)
        .await
    {
        Ok(batch) => batch.filter(|b| !b.is_empty()),
        Err(err) => {
            // Partial aggregation is a feature: log and omit the carrier.
            warn!(%scac, %err, "carrier omitted from aggregate");
            None
        }
    }
}

/// Streams the voyage aggregate. Carriers resolve through the history
/// store first; carriers with a live vessel-schedule adapter fall back to
/// it when the store has nothing for the query.
pub fn stream_voyage(state: Arc<AppState>, query: VoyageQuery, cache_watch_key: String) -> Body {
    let (batch_tx, batch_rx) = mpsc::channel::<Vec<MasterVesselSchedule>>(FAN_IN_CAPACITY);
    let (done_tx, done_rx) = watch::channel(false);

    for scac in query.scac.clone() {
        let state = Arc::clone(&state);
        let query = query.clone();
        let batch_tx = batch_tx.clone();
        let mut done = done_rx.clone();
        tokio::spawn(async move {
            let schedule = tokio::select! {
                _ = done.changed() => return,
                schedule = fetch_vessel_schedule(&state, &query, scac) => schedule,
            };
            let Some(schedule) = schedule else { return };
            if let Err(issue) = schedule.validate() {
                error!(%scac, ?issue, "vessel schedule failed validation, dropping");
                return;
            }
            tokio::select! {
                _ = done.changed() => {}
                _ = batch_tx.send(vec![schedule]) => {}
            }
        });
    }
    drop(batch_tx);

    let prelude = format!(
        "{{\"vesselIMO\":\"{}\",\"vesselSchedules\":[",
        query.vessel_imo
    );
    stream_envelope(state, prelude, batch_rx, done_tx, cache_watch_key)
}

async fn fetch_vessel_schedule(
    state: &AppState,
    query: &VoyageQuery,
    scac: Scac,
) -> Option<MasterVesselSchedule> {
    match state.voyages.voyage_rows(scac, query).await {
        Ok(rows) => {
            if let Some(schedule) = voyage::build_master_schedule(query, scac.as_str(), &rows) {
                return Some(schedule);
            }
            info!(%scac, "history store had no voyage rows, trying live adapter");
        }
        Err(err) => {
            error!(%scac, %err, "voyage store query failed");
        }
    }

    let service = state.vessel_registry.service(scac).ok()?;
    match service
        .fetch_schedule(&state.fetcher, &state.env, query, scac)
        .await
    {
        Ok(Some(mut schedule)) => {
            // Some vendors do not echo the operator code.
            if schedule.scac.is_empty() {
                schedule.scac = scac.to_string();
            }
            Some(schedule)
        }
        Ok(None) => None,
        Err(err) => {
            warn!(%scac, %err, "carrier omitted from aggregate");
            None
        }
    }
}

/// Shared fan-in + incremental JSON writer. The returned body yields the
/// prelude, one chunk per record (comma-prefixed after the first), and a
/// closing chunk carrying the empty-result message when nothing arrived.
fn stream_envelope<T: Serialize + Send + 'static>(
    state: Arc<AppState>,
    prelude: String,
    mut batch_rx: mpsc::Receiver<Vec<T>>,
    done_tx: watch::Sender<bool>,
    cache_watch_key: String,
) -> Body {
    let (byte_tx, byte_rx) = mpsc::channel::<Result<Bytes, std::convert::Infallible>>(4);

    tokio::spawn(async move {
        let mut written = 0usize;
        let mut client_gone = byte_tx.send(Ok(Bytes::from(prelude))).await.is_err();

        'fan_in: while !client_gone {
            let Some(batch) = batch_rx.recv().await else {
                break 'fan_in;
            };
            for record in batch {
                let mut chunk = Vec::new();
                if written > 0 {
                    chunk.push(b',');
                }
                if serde_json::to_writer(&mut chunk, &record).is_err() {
                    continue;
                }
                if byte_tx.send(Ok(Bytes::from(chunk))).await.is_err() {
                    client_gone = true;
                    break 'fan_in;
                }
                written += 1;
            }
        }

        if !client_gone {
            let tail = if written == 0 {
                format!("],\"message\":\"{EMPTY_MESSAGE}\"}}")
            } else {
                "]}".to_string()
            };
            let _ = byte_tx.send(Ok(Bytes::from(tail))).await;
        }

        // Unwind any producer still mid-fetch.
        let _ = done_tx.send(true);

        if client_gone {
            info!("client went away, response abandoned");
            return;
        }
        // Cache writes are committed only after the response is complete;
        // a cancelled request never caches partial state.
        let cache = state.cache();
        tokio::spawn(async move {
            if let Err(err) = cache.commit(&cache_watch_key).await {
                warn!(%err, "cache commit failed");
            }
        });
    });

    Body::from_stream(stream::unfold(byte_rx, |mut rx| async move {
        rx.recv().await.map(|chunk| (chunk, rx))
    }))
}
