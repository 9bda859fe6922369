//! ZIM adapter (ZIMU). OAuth client-credentials behind an APIM
//! subscription key; voyage and leg direction concatenate into the
//! internal voyage number.

use serde::Deserialize;

use crate::carriers::util::{normalize_date, transit_days, is_departure};
use crate::carriers::{
    CarrierError, RequestParts, ScheduleArgs, ScheduleParser, TokenProvider,
};
use crate::env::EnvManager;
use crate::models::{
    Cutoff, Leg, P2PSchedule, P2pQuery, PointBase, ServiceInfo, Transportation, TransportType,
    Voyage,
};

const DATE_LAYOUT: &str = "%Y-%m-%dT%H:%M:%S%.3f%:z";

#[derive(Debug, Deserialize)]
struct ZimResponse {
    #[serde(default)]
    response: ZimRoutes,
}

#[derive(Debug, Deserialize, Default)]
struct ZimRoutes {
    #[serde(default)]
    routes: Vec<ZimRoute>,
}

#[derive(Debug, Deserialize)]
struct ZimRoute {
    #[serde(rename = "departurePort", default)]
    departure_port: String,
    #[serde(rename = "arrivalPort", default)]
    arrival_port: String,
    #[serde(rename = "departureDate", default)]
    departure_date: String,
    #[serde(rename = "arrivalDate", default)]
    arrival_date: String,
    #[serde(rename = "transitTime", default)]
    transit_time: f64,
    #[serde(rename = "routeLegs", default)]
    route_legs: Vec<ZimLeg>,
}

#[derive(Debug, Deserialize)]
struct ZimLeg {
    #[serde(rename = "departurePort", default)]
    departure_port: String,
    #[serde(rename = "departurePortName", default)]
    departure_port_name: String,
    #[serde(rename = "arrivalPort", default)]
    arrival_port: String,
    #[serde(rename = "arrivalPortName", default)]
    arrival_port_name: String,
    #[serde(rename = "departureDate", default)]
    departure_date: String,
    #[serde(rename = "arrivalDate", default)]
    arrival_date: String,
    #[serde(rename = "vesselName", default)]
    vessel_name: String,
    #[serde(rename = "lloydsCode", default)]
    lloyds_code: String,
    #[serde(default)]
    voyage: String,
    #[serde(rename = "consortSailingNumber", default)]
    consort_sailing_number: String,
    #[serde(default)]
    leg: String,
    #[serde(default)]
    line: String,
    #[serde(rename = "containerClosingDate", default)]
    container_closing_date: String,
    #[serde(rename = "docClosingDate", default)]
    doc_closing_date: String,
    #[serde(rename = "vgmClosingDate", default)]
    vgm_closing_date: String,
}

pub struct ZimParser;

impl ZimParser {
    /// ZIM's transport kind hides in the vessel-name field.
    fn transport_type(vessel_name: &str) -> TransportType {
        match vessel_name {
            "TO BE NAMED" => TransportType::Vessel,
            name if name.starts_with("TRUCK") => TransportType::Truck,
            _ => TransportType::Vessel,
        }
    }

    fn reference(leg: &ZimLeg, transport: TransportType) -> String {
        let named = leg.vessel_name != "TO BE NAMED";
        match transport {
            TransportType::Truck => "3".to_string(),
            _ if named => leg.lloyds_code.clone(),
            TransportType::Feeder => "9".to_string(),
            _ if leg.line == "UNK" => "9".to_string(),
            _ => "1".to_string(),
        }
    }

    fn leg(leg: &ZimLeg) -> Leg {
        let etd = normalize_date(&leg.departure_date, DATE_LAYOUT).unwrap_or_default();
        let eta = normalize_date(&leg.arrival_date, DATE_LAYOUT).unwrap_or_default();
        let transport = Self::transport_type(&leg.vessel_name);
        let internal_voyage = if leg.voyage.is_empty() {
            "TBN".to_string()
        } else {
            format!("{}{}", leg.voyage, leg.leg)
        };
        Leg {
            point_from: PointBase {
                location_name: Some(leg.departure_port_name.clone()).filter(|s| !s.is_empty()),
                location_code: leg.departure_port.clone(),
                terminal_name: None,
                terminal_code: None,
            },
            point_to: PointBase {
                location_name: Some(leg.arrival_port_name.clone()).filter(|s| !s.is_empty()),
                location_code: leg.arrival_port.clone(),
                terminal_name: None,
                terminal_code: None,
            },
            etd: etd.clone(),
            eta: eta.clone(),
            transit_time: transit_days(Some(&etd), Some(&eta)),
            cutoffs: Cutoff::from_parts(
                normalize_date(&leg.container_closing_date, DATE_LAYOUT),
                normalize_date(&leg.doc_closing_date, DATE_LAYOUT),
                normalize_date(&leg.vgm_closing_date, DATE_LAYOUT),
            ),
            transportations: Transportation::new(
                transport,
                leg.vessel_name.clone(),
                Some("IMO".to_string()),
                Some(Self::reference(leg, transport)),
            ),
            voyages: Voyage {
                internal_voyage,
                external_voyage: Some(leg.consort_sailing_number.clone())
                    .filter(|s| !s.is_empty()),
            },
            services: if leg.voyage.is_empty() {
                None
            } else {
                ServiceInfo::from_parts(Some(leg.line.clone()), None)
            },
        }
    }
}

impl TokenProvider for ZimParser {
    fn token_request(&self, env: &EnvManager) -> Result<RequestParts, CarrierError> {
        Ok(RequestParts::default()
            .header("Ocp-Apim-Subscription-Key", env.zim_subscription_key.clone())
            .header("Content-Type", "application/x-www-form-urlencoded")
            .param("grant_type", "client_credentials")
            .param("client_id", env.zim_client.clone())
            .param("client_secret", env.zim_secret.clone())
            .param("scope", "Vessel Schedule"))
    }
}

impl ScheduleParser<Vec<P2PSchedule>, P2pQuery> for ZimParser {
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
        let to_date = crate::carriers::util::end_date_after_weeks(
            &args.query.start_date,
            args.query.search_range,
        )
        .unwrap_or_else(|| args.query.start_date.clone());
        let date_type = if is_departure(args.query.start_date_type) {
            "Departure"
        } else {
            "Arrival"
        };
        Ok(RequestParts::default()
            .header("Ocp-Apim-Subscription-Key", args.env.zim_subscription_key.clone())
            .header("Authorization", format!("Bearer {access_token}"))
            .header("Accept", "application/json")
            .param("originCode", args.query.point_from.clone())
            .param("destCode", args.query.point_to.clone())
            .param("fromDate", args.query.start_date.clone())
            .param("toDate", to_date)
            .param("sortByDepartureOrArrival", date_type))
    }

    fn parse(&self, body: &[u8]) -> Result<Vec<P2PSchedule>, CarrierError> {
        let data: ZimResponse = serde_json::from_slice(body)?;
        Ok(data
            .response
            .routes
            .iter()
            .map(|route| P2PSchedule {
                scac: "ZIMU".to_string(),
                point_from: route.departure_port.clone(),
                point_to: route.arrival_port.clone(),
                etd: normalize_date(&route.departure_date, DATE_LAYOUT).unwrap_or_default(),
                eta: normalize_date(&route.arrival_date, DATE_LAYOUT).unwrap_or_default(),
                transit_time: route.transit_time as i64,
                transshipment: route.route_legs.len() > 1,
                legs: route.route_legs.iter().map(Self::leg).collect(),
            })
            .collect())
    }
}
