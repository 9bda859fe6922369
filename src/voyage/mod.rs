//! Voyage history aggregation.
//!
//! Rows from the voyage store describe individual port events, possibly
//! spanning two voyage numbers when the end of an inbound voyage and the
//! start of the outbound one share a physical call. Aggregation detects
//! those overlaps, emits array-valued fields for them, collapses the
//! redundant twin rows and numbers the final timeline.

mod repository;

use std::collections::{HashMap, HashSet};

pub use repository::{SqliteVoyageStore, VoyageRepository, VOYAGE_HISTORY_SCHEMA};

use crate::models::{
    MasterVesselSchedule, Port, PortCall, PortEvent, ScalarOrList, ScheduleRow, ServiceInfo,
    VesselDetails, VoyageQuery,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct GroupKey {
    port_event: String,
    port_code: String,
    event_time: String,
}

impl GroupKey {
    fn of(row: &ScheduleRow) -> Self {
        GroupKey {
            port_event: row.port_event.clone(),
            port_code: row.port_code.clone(),
            event_time: row.event_time.clone(),
        }
    }
}

/// Rows sharing (event, port, time) mark a single physical call serving
/// two voyages.
fn find_overlapped_ports(rows: &[ScheduleRow]) -> HashSet<GroupKey> {
    let mut counts: HashMap<GroupKey, usize> = HashMap::with_capacity(rows.len());
    for row in rows {
        *counts.entry(GroupKey::of(row)).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(key, _)| key)
        .collect()
}

struct UniqueData {
    voyage_numbers: Vec<String>,
    bounds: Vec<String>,
    keys: Vec<String>,
}

/// Distinct voyage numbers beyond the first row's; directions and provider
/// voyage ids only matter when overlaps exist.
fn unique_data(rows: &[ScheduleRow], has_overlaps: bool) -> UniqueData {
    let current_voyage = &rows[0].voyage_num;
    let mut voyage_numbers = Vec::with_capacity(2);
    let mut bounds = Vec::with_capacity(2);
    let mut keys = Vec::with_capacity(2);
    let mut seen_voyages = HashSet::new();
    let mut seen_bounds = HashSet::new();
    let mut seen_keys = HashSet::new();

    for row in rows {
        if row.voyage_num != *current_voyage && seen_voyages.insert(row.voyage_num.clone()) {
            voyage_numbers.push(row.voyage_num.clone());
        }
        if has_overlaps {
            if seen_bounds.insert(row.voyage_direction.clone()) {
                bounds.push(row.voyage_direction.clone());
            }
            if seen_keys.insert(row.provider_voyage_id.clone()) {
                keys.push(row.provider_voyage_id.clone());
            }
        }
    }
    UniqueData {
        voyage_numbers,
        bounds,
        keys,
    }
}

fn construct_port_calls(
    rows: &[ScheduleRow],
    overlapped: &HashSet<GroupKey>,
    unique: &UniqueData,
) -> Vec<PortCall> {
    let current_voyage = &rows[0].voyage_num;
    rows.iter()
        .map(|row| {
            let (key, bound, voyage) = if overlapped.contains(&GroupKey::of(row)) {
                let mut voyages = vec![current_voyage.clone()];
                if let Some(next) = unique.voyage_numbers.first() {
                    voyages.push(next.clone());
                }
                (
                    ScalarOrList::Many(unique.keys.clone()),
                    ScalarOrList::Many(unique.bounds.clone()),
                    ScalarOrList::Many(voyages),
                )
            } else {
                (
                    ScalarOrList::One(row.provider_voyage_id.clone()),
                    ScalarOrList::One(row.voyage_direction.clone()),
                    ScalarOrList::One(row.voyage_num.clone()),
                )
            };
            PortCall {
                seq: 0,
                key,
                bound,
                voyage,
                service: ServiceInfo::from_parts(Some(row.service_code.clone()), None),
                port_event: PortEvent::from_code(&row.port_event).unwrap_or(PortEvent::Pass),
                port: Port {
                    port_name: Some(row.port_name.clone()).filter(|s| !s.is_empty()),
                    port_code: row.port_code.clone(),
                    terminal_name: None,
                    terminal_code: None,
                },
                estimated_event_date: Some(row.event_time.clone()).filter(|s| !s.is_empty()),
                actual_event_date: None,
            }
        })
        .collect()
}

/// Overlap twins serialize identically once their fields are arrays, so
/// content equality removes them. Sequence numbers are assigned last.
fn collapse_duplicates(calls: Vec<PortCall>, has_overlaps: bool) -> Vec<PortCall> {
    let mut collapsed = if has_overlaps {
        let mut seen = HashSet::new();
        calls
            .into_iter()
            .filter(|call| {
                let serialized =
                    serde_json::to_string(call).expect("port call serialization");
                seen.insert(serialized)
            })
            .collect()
    } else {
        calls
    };
    for (index, call) in collapsed.iter_mut().enumerate() {
        call.seq = index + 1;
    }
    collapsed
}

/// Builds the master-vessel envelope from sorted voyage rows. `None` when
/// the store had nothing usable for the query.
pub fn build_master_schedule(
    query: &VoyageQuery,
    scac: &str,
    rows: &[ScheduleRow],
) -> Option<MasterVesselSchedule> {
    if rows.len() < 2 {
        return None;
    }
    let overlapped = find_overlapped_ports(rows);
    let unique = unique_data(rows, !overlapped.is_empty());
    let calls = construct_port_calls(rows, &overlapped, &unique);
    let calls = collapse_duplicates(calls, !overlapped.is_empty());
    Some(MasterVesselSchedule {
        scac: scac.to_string(),
        voyage: query
            .voyage_num
            .clone()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| rows[0].voyage_num.clone()),
        next_voyage: unique.voyage_numbers.first().cloned(),
        vessel: VesselDetails {
            vessel_name: rows[0].vessel_name.clone(),
            imo: rows[0].vessel_imo.clone(),
        },
        services: ServiceInfo::from_parts(Some(rows[0].service_code.clone()), None),
        calls,
    })
}
