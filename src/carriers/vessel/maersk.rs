//! Maersk vessel-schedule adapter (MAEU, MAEI). Arrival events key off the
//! inbound service, departures off the outbound; the requested scac and
//! imo flow through the per-request args, never shared state.

use serde::Deserialize;

use crate::carriers::util::{voyage_direction, voyage_window};
use crate::carriers::{CarrierError, RequestParts, ScheduleArgs, ScheduleParser};
use crate::models::{
    MasterVesselSchedule, Port, PortCall, PortEvent, ScalarOrList, ServiceInfo, VesselDetails,
    VoyageQuery,
};

#[derive(Debug, Deserialize)]
struct MaerskVesselResponse {
    vessel: Option<MaerskVessel>,
    #[serde(rename = "vesselCalls", default)]
    vessel_calls: Vec<MaerskVesselCall>,
}

#[derive(Debug, Deserialize)]
struct MaerskVessel {
    #[serde(rename = "vesselIMONumber", default)]
    vessel_imo_number: String,
    #[serde(rename = "vesselName", default)]
    vessel_name: String,
}

#[derive(Debug, Deserialize)]
struct MaerskVesselCall {
    #[serde(default)]
    facility: MaerskFacility,
    #[serde(default)]
    transport: MaerskTransport,
    #[serde(rename = "callSchedules", default)]
    call_schedules: Vec<MaerskCallSchedule>,
}

#[derive(Debug, Deserialize, Default)]
struct MaerskFacility {
    #[serde(rename = "locationName", default)]
    location_name: String,
    #[serde(rename = "carrierTerminalCode", default)]
    carrier_terminal_code: String,
    #[serde(rename = "portName", default)]
    port_name: String,
    #[serde(rename = "UNLocationCode", default)]
    un_location_code: String,
}

#[derive(Debug, Deserialize, Default)]
struct MaerskTransport {
    #[serde(rename = "inboundService", default)]
    inbound_service: MaerskServiceLeg,
    #[serde(rename = "outboundService", default)]
    outbound_service: MaerskServiceLeg,
}

#[derive(Debug, Deserialize, Default)]
struct MaerskServiceLeg {
    #[serde(rename = "carrierVoyageNumber", default)]
    carrier_voyage_number: String,
    #[serde(rename = "carrierServiceName", default)]
    carrier_service_name: String,
}

#[derive(Debug, Deserialize)]
struct MaerskCallSchedule {
    #[serde(rename = "transportEventTypeCode", default)]
    transport_event_type_code: String,
    #[serde(rename = "eventClassifierCode", default)]
    event_classifier_code: String,
    #[serde(rename = "classifierDateTime", default)]
    classifier_date_time: String,
}

pub struct MaerskVesselParser;

impl MaerskVesselParser {
    fn calls(imo: &str, vessel_calls: &[MaerskVesselCall]) -> Vec<PortCall> {
        let mut calls = Vec::new();
        for visit in vessel_calls {
            for schedule in &visit.call_schedules {
                let (event, service_leg) = match schedule.transport_event_type_code.as_str() {
                    "ARRI" => (PortEvent::Unloading, &visit.transport.inbound_service),
                    "DEPA" => (PortEvent::Loading, &visit.transport.outbound_service),
                    _ => continue,
                };
                let voyage = service_leg.carrier_voyage_number.clone();
                let service = service_leg.carrier_service_name.clone();
                let event_date = Some(schedule.classifier_date_time.clone())
                    .filter(|s| !s.is_empty());
                let (estimated, actual) = match schedule.event_classifier_code.as_str() {
                    "ACT" => (None, event_date),
                    _ => (event_date, None),
                };
                calls.push(PortCall {
                    seq: calls.len() + 1,
                    key: ScalarOrList::One(format!("{imo}{voyage}{service}")),
                    bound: ScalarOrList::One(voyage_direction(&voyage).to_string()),
                    voyage: ScalarOrList::One(voyage),
                    service: ServiceInfo::from_parts(Some(service), None),
                    port_event: event,
                    port: Port {
                        port_name: Some(visit.facility.port_name.clone())
                            .filter(|s| !s.is_empty()),
                        port_code: visit.facility.un_location_code.clone(),
                        terminal_name: Some(visit.facility.location_name.clone())
                            .filter(|s| !s.is_empty()),
                        terminal_code: Some(visit.facility.carrier_terminal_code.clone())
                            .filter(|s| !s.is_empty()),
                    },
                    estimated_event_date: estimated,
                    actual_event_date: actual,
                });
            }
        }
        calls
    }
}

impl ScheduleParser<MasterVesselSchedule, VoyageQuery> for MaerskVesselParser {
    fn schedule_request(
        &self,
        args: &ScheduleArgs<'_, VoyageQuery>,
    ) -> Result<RequestParts, CarrierError> {
        let start_date = args
            .query
            .start_date
            .as_deref()
            .and_then(|date| voyage_window(date, args.query.date_range.unwrap_or(0)))
            .map(|(start, _)| start);
        let mut parts = RequestParts::default()
            .header("Consumer-Key", args.env.maersk_vessel_token.clone())
            .param("vesselIMONumber", args.query.vessel_imo.clone())
            .param("carrierCodes", args.scac.to_string())
            .param("dateRange", "P16W");
        if let Some(start_date) = start_date {
            parts = parts.param("startDate", start_date);
        }
        Ok(parts)
    }

    fn parse(&self, body: &[u8]) -> Result<MasterVesselSchedule, CarrierError> {
        let data: MaerskVesselResponse = serde_json::from_slice(body)?;
        let vessel = data.vessel.ok_or(CarrierError::EmptyResponse)?;
        let first = data.vessel_calls.first().ok_or(CarrierError::EmptyResponse)?;
        Ok(MasterVesselSchedule {
            // Maersk does not echo the operator; the registry stamps the
            // requested SCAC when it validates the batch downstream.
            scac: String::new(),
            voyage: first.transport.inbound_service.carrier_voyage_number.clone(),
            next_voyage: None,
            vessel: VesselDetails {
                vessel_name: vessel.vessel_name.clone(),
                imo: vessel.vessel_imo_number.clone(),
            },
            services: ServiceInfo::from_parts(
                Some(first.transport.inbound_service.carrier_service_name.clone()),
                None,
            ),
            calls: Self::calls(&vessel.vessel_imo_number, &data.vessel_calls),
        })
    }
}
