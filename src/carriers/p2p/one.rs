//! Ocean Network Express adapter (ONEY). Direct and transshipment routes
//! arrive in separate arrays; a route without legs is itself the leg.

use serde::Deserialize;

use crate::carriers::util::{is_departure, normalize_date, transit_days};
use crate::carriers::{
    CarrierError, RequestParts, ScheduleArgs, ScheduleParser, TokenProvider,
};
use crate::env::EnvManager;
use crate::models::{
    Cutoff, Leg, P2PSchedule, P2pQuery, PointBase, ServiceInfo, Transportation, TransportType,
    Voyage,
};

const DATE_LAYOUT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Deserialize, Default)]
struct OneRouteBody {
    #[serde(default)]
    scac: String,
    #[serde(rename = "serviceCode", default)]
    service_code: String,
    #[serde(rename = "serviceName", default)]
    service_name: String,
    #[serde(rename = "terminalCutoff", default)]
    terminal_cutoff: String,
    #[serde(rename = "docCutoff", default)]
    doc_cutoff: String,
    #[serde(rename = "vgmCutoff", default)]
    vgm_cutoff: String,
    #[serde(rename = "vesselName", default)]
    vessel_name: String,
    #[serde(rename = "voyageNumber", default)]
    voyage_number: String,
    #[serde(rename = "imoNumber", default)]
    imo_number: String,
    #[serde(rename = "originUnloc", default)]
    origin_unloc: String,
    #[serde(rename = "originTerminal", default)]
    origin_terminal: String,
    #[serde(rename = "originDepartureDateEstimated", default)]
    origin_departure_date_estimated: String,
    #[serde(rename = "destinationUnloc", default)]
    destination_unloc: String,
    #[serde(rename = "destinationTerminal", default)]
    destination_terminal: String,
    #[serde(rename = "destinationArrivalDateEstimated", default)]
    destination_arrival_date_estimated: String,
    #[serde(rename = "transitDurationHrsUtc", default)]
    transit_duration_hrs_utc: i64,
}

#[derive(Debug, Deserialize)]
struct OneLeg {
    #[serde(rename = "serviceCode", default)]
    service_code: String,
    #[serde(rename = "serviceName", default)]
    service_name: String,
    #[serde(rename = "transportName", default)]
    transport_name: String,
    #[serde(rename = "conveyanceNumber", default)]
    conveyance_number: String,
    #[serde(rename = "transportID", default)]
    transport_id: String,
    #[serde(rename = "departureUnloc", default)]
    departure_unloc: String,
    #[serde(rename = "departureTerminal", default)]
    departure_terminal: String,
    #[serde(rename = "departureDateEstimated", default)]
    departure_date_estimated: String,
    #[serde(rename = "arrivalUnloc", default)]
    arrival_unloc: String,
    #[serde(rename = "arrivalTerminal", default)]
    arrival_terminal: String,
    #[serde(rename = "arrivalDateEstimated", default)]
    arrival_date_estimated: String,
}

#[derive(Debug, Deserialize)]
struct OneRoute {
    #[serde(flatten)]
    body: OneRouteBody,
    #[serde(default)]
    legs: Vec<OneLeg>,
}

#[derive(Debug, Deserialize)]
struct OneScheduleResponse {
    #[serde(rename = "Direct", default)]
    direct: Vec<OneRoute>,
    #[serde(rename = "Transshipment", default)]
    transshipment: Vec<OneRoute>,
}

pub struct OneParser;

impl OneParser {
    fn cutoffs(body: &OneRouteBody) -> Option<Cutoff> {
        Cutoff::from_parts(
            normalize_date(&body.terminal_cutoff, DATE_LAYOUT),
            normalize_date(&body.doc_cutoff, DATE_LAYOUT),
            normalize_date(&body.vgm_cutoff, DATE_LAYOUT),
        )
    }

    fn leg_from_route(body: &OneRouteBody) -> Leg {
        let etd = normalize_date(&body.origin_departure_date_estimated, DATE_LAYOUT)
            .unwrap_or_default();
        let eta = normalize_date(&body.destination_arrival_date_estimated, DATE_LAYOUT)
            .unwrap_or_default();
        Leg {
            point_from: PointBase {
                location_name: None,
                location_code: body.origin_unloc.clone(),
                terminal_name: Some(body.origin_terminal.clone()).filter(|s| !s.is_empty()),
                terminal_code: None,
            },
            point_to: PointBase {
                location_name: None,
                location_code: body.destination_unloc.clone(),
                terminal_name: Some(body.destination_terminal.clone()).filter(|s| !s.is_empty()),
                terminal_code: None,
            },
            etd: etd.clone(),
            eta: eta.clone(),
            transit_time: transit_days(Some(&etd), Some(&eta)),
            cutoffs: Self::cutoffs(body),
            transportations: Transportation::new(
                TransportType::Vessel,
                body.vessel_name.clone(),
                Some("IMO".to_string()),
                Some(body.imo_number.clone()).filter(|s| !s.is_empty()),
            ),
            voyages: Voyage::internal_or_tbn(body.voyage_number.clone()),
            services: ServiceInfo::from_parts(
                Some(body.service_code.clone()),
                Some(body.service_name.clone()),
            ),
        }
    }

    fn leg_from_leg(body: &OneRouteBody, leg: &OneLeg) -> Leg {
        let etd = normalize_date(&leg.departure_date_estimated, DATE_LAYOUT).unwrap_or_default();
        let eta = normalize_date(&leg.arrival_date_estimated, DATE_LAYOUT).unwrap_or_default();
        Leg {
            point_from: PointBase {
                location_name: None,
                location_code: leg.departure_unloc.clone(),
                terminal_name: Some(leg.departure_terminal.clone()).filter(|s| !s.is_empty()),
                terminal_code: None,
            },
            point_to: PointBase {
                location_name: None,
                location_code: leg.arrival_unloc.clone(),
                terminal_name: Some(leg.arrival_terminal.clone()).filter(|s| !s.is_empty()),
                terminal_code: None,
            },
            etd: etd.clone(),
            eta: eta.clone(),
            transit_time: transit_days(Some(&etd), Some(&eta)),
            cutoffs: Self::cutoffs(body),
            transportations: Transportation::new(
                TransportType::Vessel,
                leg.transport_name.clone(),
                Some("IMO".to_string()),
                Some(leg.transport_id.clone()).filter(|s| !s.is_empty()),
            ),
            voyages: Voyage::internal_or_tbn(leg.conveyance_number.clone()),
            services: ServiceInfo::from_parts(
                Some(leg.service_code.clone()),
                Some(leg.service_name.clone()),
            ),
        }
    }

    fn schedule(route: &OneRoute) -> P2PSchedule {
        let body = &route.body;
        let etd = normalize_date(&body.origin_departure_date_estimated, DATE_LAYOUT)
            .unwrap_or_default();
        let eta = normalize_date(&body.destination_arrival_date_estimated, DATE_LAYOUT)
            .unwrap_or_default();
        let legs = if route.legs.is_empty() {
            vec![Self::leg_from_route(body)]
        } else {
            route
                .legs
                .iter()
                .map(|leg| Self::leg_from_leg(body, leg))
                .collect()
        };
        P2PSchedule {
            scac: body.scac.clone(),
            point_from: body.origin_unloc.clone(),
            point_to: body.destination_unloc.clone(),
            etd,
            eta,
            // Vendor transit is in hours; round half-up to days.
            transit_time: (body.transit_duration_hrs_utc as f64 / 24.0 + 0.5).floor() as i64,
            transshipment: legs.len() > 1,
            legs,
        }
    }
}

impl TokenProvider for OneParser {
    fn token_request(&self, env: &EnvManager) -> Result<RequestParts, CarrierError> {
        Ok(RequestParts::default()
            .header("apikey", env.one_api_key.clone())
            .header("Authorization", env.one_basic_auth.clone())
            .header("Content-Type", "application/json")
            .param("grant_type", "client_credentials"))
    }
}

impl ScheduleParser<Vec<P2PSchedule>, P2pQuery> for OneParser {
    fn schedule_request(
        &self,
        args: &ScheduleArgs<'_, P2pQuery>,
    ) -> Result<RequestParts, CarrierError> {
        let access_token = args
            .token
            .as_ref()
            .and_then(|t| t.get("access_token"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| CarrierError::Auth("token response had no access_token".into()))?;
        let date_type = if is_departure(args.query.start_date_type) {
            "BY_DEPARTURE_DATE"
        } else {
            "BY_ARRIVAL_DATE"
        };
        Ok(RequestParts::default()
            .header("apikey", args.env.one_api_key.clone())
            .header("Authorization", format!("Bearer {access_token}"))
            .header("Accept", "application/json")
            .param("originPort", args.query.point_from.clone())
            .param("destinationPort", args.query.point_to.clone())
            .param("searchDate", args.query.start_date.clone())
            .param("weeksOut", args.query.search_range.to_string())
            .param("searchDateType", date_type))
    }

    fn parse(&self, body: &[u8]) -> Result<Vec<P2PSchedule>, CarrierError> {
        let data: OneScheduleResponse = serde_json::from_slice(body)?;
        Ok(data
            .direct
            .iter()
            .chain(data.transshipment.iter())
            .map(Self::schedule)
            .collect())
    }
}
