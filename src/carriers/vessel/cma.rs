//! CMA CGM group vessel-schedule adapter. Every activity of a port visit
//! becomes its own call; loading keys off the unberth time, unloading off
//! the berth time.

use serde::Deserialize;

use crate::carriers::util::normalize_date;
use crate::carriers::{CarrierError, RequestParts, ScheduleArgs, ScheduleParser};
use crate::models::{
    MasterVesselSchedule, Port, PortCall, PortEvent, ScalarOrList, Scac, ServiceInfo,
    VesselDetails, VoyageQuery,
};

const DATE_LAYOUT: &str = "%Y-%m-%dT%H:%M:%SZ";
const DEFAULT_DATE_RANGE: i64 = 60;

#[derive(Debug, Deserialize)]
struct CmaVesselCall {
    #[serde(default)]
    id: String,
    #[serde(default)]
    activities: Vec<String>,
    #[serde(rename = "voyageCode", default)]
    voyage_code: String,
    #[serde(default)]
    bound: String,
    #[serde(rename = "shippingCompany", default)]
    shipping_company: String,
    #[serde(default)]
    location: CmaLocation,
    #[serde(default)]
    vessel: CmaVessel,
    #[serde(default)]
    service: CmaService,
    #[serde(rename = "berthDate", default)]
    berth_date: CmaDateTime,
    #[serde(rename = "unberthDate", default)]
    unberth_date: CmaDateTime,
    #[serde(rename = "nextVoyage", default)]
    next_voyage: String,
}

#[derive(Debug, Deserialize, Default)]
struct CmaLocation {
    #[serde(default)]
    name: String,
    #[serde(rename = "internalCode", default)]
    internal_code: String,
    #[serde(rename = "locationCodifications", default)]
    location_codifications: Vec<CmaCodification>,
    #[serde(default)]
    facility: CmaFacility,
}

#[derive(Debug, Deserialize, Default)]
struct CmaCodification {
    #[serde(default)]
    codification: String,
}

#[derive(Debug, Deserialize, Default)]
struct CmaFacility {
    #[serde(default)]
    name: String,
    #[serde(rename = "internalCode", default)]
    internal_code: String,
    #[serde(rename = "facilityCodifications", default)]
    facility_codifications: Vec<CmaCodification>,
}

#[derive(Debug, Deserialize, Default)]
struct CmaVessel {
    #[serde(default)]
    name: String,
    #[serde(default)]
    imo: String,
}

#[derive(Debug, Deserialize, Default)]
struct CmaService {
    #[serde(default)]
    code: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize, Default)]
struct CmaDateTime {
    #[serde(default)]
    utc: String,
}

fn direction(bound: &str) -> &'static str {
    match bound {
        "WEST" => "WBO",
        "EAST" => "EBO",
        "NORTH" => "NBO",
        "SOUTH" => "SBO",
        _ => "UNK",
    }
}

pub struct CmaVesselParser;

impl CmaVesselParser {
    fn port(location: &CmaLocation) -> Port {
        let code = if !location.internal_code.is_empty() {
            location.internal_code.clone()
        } else {
            location
                .location_codifications
                .first()
                .map(|c| c.codification.clone())
                .unwrap_or_default()
        };
        let terminal_code = location
            .facility
            .facility_codifications
            .first()
            .map(|c| c.codification.clone())
            .filter(|s| !s.is_empty())
            .or_else(|| {
                Some(location.facility.internal_code.clone()).filter(|s| !s.is_empty())
            });
        Port {
            port_name: Some(location.name.clone()).filter(|s| !s.is_empty()),
            port_code: code,
            terminal_name: Some(location.facility.name.clone()).filter(|s| !s.is_empty()),
            terminal_code,
        }
    }

    fn calls(visits: &[CmaVesselCall]) -> Vec<PortCall> {
        let mut calls = Vec::with_capacity(visits.len());
        for visit in visits {
            // The activity list arrives discharge-first; walk it backwards
            // so loading precedes the sail-out.
            for activity in visit.activities.iter().rev() {
                let (event, timestamp) = match activity.as_str() {
                    "Load" => (PortEvent::Loading, &visit.unberth_date.utc),
                    "Discharge" => (PortEvent::Unloading, &visit.berth_date.utc),
                    _ => continue,
                };
                calls.push(PortCall {
                    seq: calls.len() + 1,
                    key: ScalarOrList::One(visit.id.clone()),
                    bound: ScalarOrList::One(direction(&visit.bound).to_string()),
                    voyage: ScalarOrList::One(visit.voyage_code.clone()),
                    service: ServiceInfo::from_parts(
                        Some(visit.service.code.clone()),
                        Some(visit.service.name.clone()),
                    ),
                    port_event: event,
                    port: Self::port(&visit.location),
                    estimated_event_date: normalize_date(timestamp, DATE_LAYOUT),
                    actual_event_date: None,
                });
            }
        }
        calls
    }
}

impl ScheduleParser<MasterVesselSchedule, VoyageQuery> for CmaVesselParser {
    fn schedule_request(
        &self,
        args: &ScheduleArgs<'_, VoyageQuery>,
    ) -> Result<RequestParts, CarrierError> {
        let internal_code = args
            .scac
            .cma_internal_code()
            .ok_or(CarrierError::Unsupported(args.scac))?;
        let mut parts = RequestParts::default()
            .header("KeyId", args.env.cma_token.clone())
            .param("shipcomp", internal_code)
            .param("vesselIMO", args.query.vessel_imo.clone());
        if let Some(voyage) = &args.query.voyage_num {
            parts = parts.param("voyageCode", voyage.clone());
        }
        if let Some(start_date) = &args.query.start_date {
            let range = args.query.date_range.unwrap_or(0).max(DEFAULT_DATE_RANGE);
            let end = crate::carriers::util::end_date_after_days(start_date, range)
                .unwrap_or_else(|| start_date.clone());
            parts = parts.param("from", start_date.clone()).param("to", end);
        }
        Ok(parts)
    }

    fn parse(&self, body: &[u8]) -> Result<MasterVesselSchedule, CarrierError> {
        let visits: Vec<CmaVesselCall> = serde_json::from_slice(body)?;
        let first = visits.first().ok_or(CarrierError::EmptyResponse)?;
        Ok(MasterVesselSchedule {
            scac: Scac::from_cma_internal_code(&first.shipping_company)
                .map(|s| s.to_string())
                .unwrap_or_else(|| first.shipping_company.clone()),
            voyage: first.voyage_code.clone(),
            next_voyage: Some(first.next_voyage.clone()).filter(|s| !s.is_empty()),
            vessel: VesselDetails {
                vessel_name: first.vessel.name.clone(),
                imo: first.vessel.imo.clone(),
            },
            services: ServiceInfo::from_parts(
                Some(first.service.code.clone()),
                Some(first.service.name.clone()),
            ),
            calls: Self::calls(&visits),
        })
    }
}
