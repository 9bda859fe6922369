//! ONE vessel-schedule adapter. Each port visit yields an arrival and a
//! departure call with their own voyage numbers.

use serde::Deserialize;

use crate::carriers::util::{normalize_date, voyage_direction, voyage_window};
use crate::carriers::{
    CarrierError, RequestParts, ScheduleArgs, ScheduleParser, TokenProvider,
};
use crate::env::EnvManager;
use crate::models::{
    MasterVesselSchedule, Port, PortCall, PortEvent, ScalarOrList, ServiceInfo, VesselDetails,
    VoyageQuery,
};

const DATE_LAYOUT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Deserialize)]
struct OneVesselResponse {
    #[serde(default)]
    vessel: Vec<OneVesselCall>,
}

#[derive(Debug, Deserialize)]
struct OneVesselCall {
    #[serde(rename = "serviceCode", default)]
    service_code: String,
    #[serde(rename = "serviceNameArrival", default)]
    service_name_arrival: String,
    #[serde(rename = "serviceNameDeparture", default)]
    service_name_departure: String,
    #[serde(rename = "vesselName", default)]
    vessel_name: String,
    #[serde(rename = "voyageNumberArrival", default)]
    voyage_number_arrival: String,
    #[serde(rename = "voyageNumberDeparture", default)]
    voyage_number_departure: String,
    #[serde(rename = "imoNumber", default)]
    imo_number: String,
    #[serde(default)]
    port: String,
    #[serde(rename = "portName", default)]
    port_name: String,
    #[serde(default)]
    terminal: String,
    #[serde(rename = "arrivalDateEstimated", default)]
    arrival_date_estimated: String,
    #[serde(rename = "arrivalDateActual", default)]
    arrival_date_actual: String,
    #[serde(rename = "departureDateEstimated", default)]
    departure_date_estimated: String,
    #[serde(rename = "departureDateActual", default)]
    departure_date_actual: String,
}

pub struct OneVesselParser;

impl OneVesselParser {
    fn calls(visits: &[OneVesselCall]) -> Vec<PortCall> {
        let mut calls = Vec::with_capacity(visits.len() * 2);
        for visit in visits {
            let events = [
                (
                    PortEvent::Unloading,
                    &visit.voyage_number_arrival,
                    &visit.service_name_arrival,
                    &visit.arrival_date_estimated,
                    &visit.arrival_date_actual,
                ),
                (
                    PortEvent::Loading,
                    &visit.voyage_number_departure,
                    &visit.service_name_departure,
                    &visit.departure_date_estimated,
                    &visit.departure_date_actual,
                ),
            ];
            for (event, voyage, service_name, estimated, actual) in events {
                calls.push(PortCall {
                    seq: calls.len() + 1,
                    key: ScalarOrList::One(format!(
                        "{}{}{}",
                        visit.imo_number, voyage, visit.service_code
                    )),
                    bound: ScalarOrList::One(voyage_direction(voyage).to_string()),
                    voyage: ScalarOrList::One(voyage.clone()),
                    service: ServiceInfo::from_parts(
                        Some(visit.service_code.clone()),
                        Some(service_name.clone()),
                    ),
                    port_event: event,
                    port: Port {
                        port_name: Some(visit.port_name.clone()).filter(|s| !s.is_empty()),
                        port_code: visit.port.clone(),
                        terminal_name: Some(visit.terminal.clone()).filter(|s| !s.is_empty()),
                        terminal_code: None,
                    },
                    estimated_event_date: normalize_date(estimated, DATE_LAYOUT),
                    actual_event_date: normalize_date(actual, DATE_LAYOUT),
                });
            }
        }
        calls
    }
}

impl TokenProvider for OneVesselParser {
    fn token_request(&self, env: &EnvManager) -> Result<RequestParts, CarrierError> {
        Ok(RequestParts::default()
            .header("apikey", env.one_api_key.clone())
            .header("Authorization", env.one_basic_auth.clone())
            .header("Content-Type", "application/json")
            .param("grant_type", "client_credentials"))
    }
}

impl ScheduleParser<MasterVesselSchedule, VoyageQuery> for OneVesselParser {
    fn schedule_request(
        &self,
        args: &ScheduleArgs<'_, VoyageQuery>,
    ) -> Result<RequestParts, CarrierError> {
        let access_token = args
            .token
            .as_ref()
            .and_then(|t| t.get("access_token"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| CarrierError::Auth("token response had no access_token".into()))?;
        let mut parts = RequestParts::default()
            .header("apikey", args.env.one_api_key.clone())
            .header("Authorization", format!("Bearer {access_token}"))
            .header("Accept", "application/json")
            .param("transportID", args.query.vessel_imo.clone())
            .param("transportIDTypeCode", "I");
        if let Some(start_date) = &args.query.start_date {
            if let Some((start, end)) =
                voyage_window(start_date, args.query.date_range.unwrap_or(0))
            {
                parts = parts
                    .param("departureDate", start)
                    .param("arrivalDate", end);
            }
        }
        Ok(parts)
    }

    fn parse(&self, body: &[u8]) -> Result<MasterVesselSchedule, CarrierError> {
        let data: OneVesselResponse = serde_json::from_slice(body)?;
        let first = data.vessel.first().ok_or(CarrierError::EmptyResponse)?;
        let voyage = if !first.voyage_number_arrival.is_empty() {
            first.voyage_number_arrival.clone()
        } else {
            first.voyage_number_departure.clone()
        };
        Ok(MasterVesselSchedule {
            scac: "ONEY".to_string(),
            voyage,
            next_voyage: None,
            vessel: VesselDetails {
                vessel_name: first.vessel_name.clone(),
                imo: first.imo_number.clone(),
            },
            services: ServiceInfo::from_parts(
                Some(first.service_code.clone()),
                Some(first.service_name_arrival.clone()),
            ),
            calls: Self::calls(&data.vessel),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"{
      "vessel": [
        {
          "serviceCode": "FP1",
          "serviceNameArrival": "Far East Pacific 1",
          "serviceNameDeparture": "Far East Pacific 1",
          "vesselName": "ONE HARBOUR",
          "voyageNumberArrival": "087W",
          "voyageNumberDeparture": "088E",
          "imoNumber": "9380453",
          "port": "SGSIN",
          "portName": "Singapore",
          "terminal": "PSA",
          "arrivalDateEstimated": "2025-02-01 06:00:00",
          "departureDateEstimated": "2025-02-02 18:00:00",
          "departureDateActual": "2025-02-02 18:45:00"
        }
      ]
    }"#;

    #[test]
    fn each_visit_becomes_arrival_and_departure_calls() {
        let schedule = OneVesselParser.parse(FIXTURE.as_bytes()).unwrap();
        assert_eq!(schedule.scac, "ONEY");
        assert_eq!(schedule.voyage, "087W");
        assert_eq!(schedule.calls.len(), 2);
        let unloading = &schedule.calls[0];
        assert_eq!(unloading.port_event, PortEvent::Unloading);
        assert_eq!(unloading.voyage, ScalarOrList::One("087W".into()));
        assert_eq!(
            unloading.estimated_event_date.as_deref(),
            Some("2025-02-01T06:00:00")
        );
        let loading = &schedule.calls[1];
        assert_eq!(loading.port_event, PortEvent::Loading);
        assert_eq!(loading.bound, ScalarOrList::One("EBO".into()));
        assert_eq!(loading.actual_event_date.as_deref(), Some("2025-02-02T18:45:00"));
        assert!(schedule.validate().is_ok());
    }

    #[test]
    fn empty_vessel_list_is_an_error() {
        assert!(matches!(
            OneVesselParser.parse(b"{\"vessel\": []}"),
            Err(CarrierError::EmptyResponse)
        ));
    }
}
