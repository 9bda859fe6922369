//! Post-fetch schedule filters, ANDed into one composite predicate.
//! An absent query parameter passes everything through.

use crate::models::{P2PSchedule, P2pQuery};

type Filter = fn(&P2PSchedule, &P2pQuery) -> bool;

const FILTERS: [Filter; 4] = [direct_only, transhipment_port, vessel_imo, service];

/// The composite predicate applied to every schedule of a carrier batch.
pub fn passes(schedule: &P2PSchedule, query: &P2pQuery) -> bool {
    FILTERS.iter().all(|filter| filter(schedule, query))
}

fn direct_only(schedule: &P2PSchedule, query: &P2pQuery) -> bool {
    match query.direct_only {
        Some(true) => !schedule.transshipment,
        _ => true,
    }
}

/// The transshipment port shows up as an endpoint of some leg after the
/// first one.
fn transhipment_port(schedule: &P2PSchedule, query: &P2pQuery) -> bool {
    let Some(port) = &query.transhipment_port else {
        return true;
    };
    schedule.legs.iter().skip(1).any(|leg| {
        leg.point_from.location_code == *port || leg.point_to.location_code == *port
    })
}

fn vessel_imo(schedule: &P2PSchedule, query: &P2pQuery) -> bool {
    let Some(imo) = &query.vessel_imo else {
        return true;
    };
    schedule
        .legs
        .iter()
        .any(|leg| leg.transportations.reference.as_deref() == Some(imo.as_str()))
}

fn service(schedule: &P2PSchedule, query: &P2pQuery) -> bool {
    let Some(code) = &query.service else {
        return true;
    };
    schedule.legs.iter().any(|leg| {
        leg.services
            .as_ref()
            .and_then(|s| s.service_code.as_deref())
            == Some(code.as_str())
    })
}
