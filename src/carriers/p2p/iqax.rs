//! IQAX adapter serving COSU and OOLU. Leg timestamps are sparse; missing
//! ones are reconstructed from the per-leg transit time around the route
//! window.

use chrono::{Days, NaiveDateTime};
use serde::Deserialize;

use crate::carriers::util::{
    is_departure, normalize_date, title_case_mode, transport_type_from_label, ISO_LOCAL,
};
use crate::carriers::{CarrierError, RequestParts, ScheduleArgs, ScheduleParser};
use crate::models::{
    Cutoff, Leg, P2PSchedule, P2pQuery, PointBase, ServiceInfo, Transportation, Voyage,
};

const DATE_LAYOUT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

#[derive(Debug, Deserialize)]
struct IqaxResponse {
    #[serde(rename = "routeGroupsList", default)]
    route_groups_list: Vec<IqaxRouteGroup>,
}

#[derive(Debug, Deserialize)]
struct IqaxRouteGroup {
    #[serde(default)]
    route: Vec<IqaxRoute>,
}

#[derive(Debug, Deserialize)]
struct IqaxRoute {
    #[serde(rename = "carrierScac", default)]
    carrier_scac: String,
    #[serde(default)]
    por: RoutePoint,
    #[serde(default)]
    fnd: RoutePoint,
    #[serde(rename = "transitTime", default)]
    transit_time: i64,
    #[serde(default)]
    direct: bool,
    #[serde(default)]
    leg: Vec<IqaxLeg>,
}

#[derive(Debug, Deserialize, Default)]
struct RoutePoint {
    #[serde(default)]
    location: IqaxLocation,
    #[serde(default)]
    etd: Option<String>,
    #[serde(default)]
    eta: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct IqaxLocation {
    #[serde(default)]
    name: String,
    #[serde(default)]
    unlocode: String,
    #[serde(default)]
    facility: IqaxFacility,
}

#[derive(Debug, Deserialize, Default)]
struct IqaxFacility {
    #[serde(default)]
    name: String,
    #[serde(default)]
    code: String,
}

#[derive(Debug, Deserialize)]
struct IqaxLeg {
    #[serde(rename = "fromPoint")]
    from_point: LegPoint,
    #[serde(rename = "toPoint")]
    to_point: LegPoint,
    #[serde(rename = "transportMode", default)]
    transport_mode: String,
    #[serde(default)]
    service: IqaxService,
    #[serde(default)]
    vessel: IqaxVessel,
    #[serde(rename = "transitTime", default)]
    transit_time: i64,
    #[serde(rename = "internalVoyageNumber", default)]
    internal_voyage_number: String,
    #[serde(rename = "imoNumber", default)]
    imo_number: i64,
    #[serde(rename = "externalVoyageNumber", default)]
    external_voyage_number: String,
}

#[derive(Debug, Deserialize, Default)]
struct LegPoint {
    #[serde(default)]
    location: IqaxLocation,
    #[serde(rename = "defaultCutoff", default)]
    default_cutoff: String,
    #[serde(default)]
    etd: String,
    #[serde(default)]
    eta: String,
}

#[derive(Debug, Deserialize, Default)]
struct IqaxService {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct IqaxVessel {
    #[serde(default)]
    name: String,
}

struct RouteWindow {
    first_etd: Option<String>,
    last_eta: Option<String>,
}

pub struct IqaxParser;

impl IqaxParser {
    fn point(location: &IqaxLocation) -> PointBase {
        PointBase {
            location_name: Some(location.name.clone()).filter(|s| !s.is_empty()),
            location_code: location.unlocode.clone(),
            terminal_name: Some(location.facility.name.clone()).filter(|s| !s.is_empty()),
            terminal_code: Some(location.facility.code.clone()).filter(|s| !s.is_empty()),
        }
    }

    fn shift_days(timestamp: &str, days: i64) -> Option<String> {
        let parsed = NaiveDateTime::parse_from_str(timestamp, ISO_LOCAL).ok()?;
        let shifted = if days >= 0 {
            parsed.checked_add_days(Days::new(days as u64))?
        } else {
            parsed.checked_sub_days(Days::new((-days) as u64))?
        };
        Some(shifted.format(ISO_LOCAL).to_string())
    }

    /// Second legs fall back to the route window; truck on-carriage walks
    /// back from its own ETD, everything else walks forward or back by the
    /// leg transit time.
    fn event_dates(index: usize, window: &RouteWindow, leg: &IqaxLeg) -> (String, String) {
        let from_etd = normalize_date(&leg.from_point.etd, DATE_LAYOUT);
        let to_eta = normalize_date(&leg.to_point.eta, DATE_LAYOUT);
        if index == 1 {
            let etd = from_etd.or_else(|| window.first_etd.clone()).unwrap_or_default();
            if leg.vessel.name == "TRUCK" {
                let shifted = Self::shift_days(&etd, -leg.transit_time).unwrap_or_default();
                (shifted, String::new())
            } else {
                let eta = to_eta
                    .or_else(|| Self::shift_days(&etd, leg.transit_time))
                    .unwrap_or_default();
                (etd, eta)
            }
        } else {
            let eta = to_eta.or_else(|| window.last_eta.clone()).unwrap_or_default();
            let etd = from_etd
                .or_else(|| Self::shift_days(&eta, -leg.transit_time))
                .unwrap_or_default();
            (etd, eta)
        }
    }

    fn transportation(leg: &IqaxLeg) -> Transportation {
        let transport_name = match leg.vessel.name.as_str() {
            "---" => "TBA".to_string(),
            name => name.to_string(),
        };
        let imo_code = match leg.imo_number {
            0 => String::new(),
            n => n.to_string(),
        };
        let mode = title_case_mode(&leg.transport_mode);
        let tbn_feeder =
            imo_code.is_empty() && transport_name == "TBA" && (mode == "Feeder" || mode == "Barge");
        let dummy_vehicle = (!tbn_feeder && imo_code.is_empty()) || imo_code == "9999999";
        let (reference_type, reference) = if tbn_feeder {
            (Some("IMO".to_string()), Some("1".to_string()))
        } else if dummy_vehicle {
            (None, None)
        } else {
            (Some("IMO".to_string()), Some(imo_code))
        };
        Transportation::new(
            transport_type_from_label(&mode),
            transport_name,
            reference_type,
            reference,
        )
    }

    fn leg(index: usize, window: &RouteWindow, leg: &IqaxLeg) -> Option<Leg> {
        let point_from = Self::point(&leg.from_point.location);
        let point_to = Self::point(&leg.to_point.location);
        // Some routes carry zero-length positioning legs; drop them.
        if point_from.location_code == point_to.location_code {
            return None;
        }
        let (etd, eta) = Self::event_dates(index, window, leg);
        Some(Leg {
            point_from,
            point_to,
            etd,
            eta,
            transit_time: leg.transit_time,
            cutoffs: Cutoff::from_parts(
                normalize_date(&leg.from_point.default_cutoff, DATE_LAYOUT),
                None,
                None,
            ),
            transportations: Self::transportation(leg),
            voyages: Voyage {
                internal_voyage: if leg.internal_voyage_number.is_empty() {
                    "TBN".to_string()
                } else {
                    leg.internal_voyage_number.clone()
                },
                external_voyage: Some(if leg.external_voyage_number.is_empty() {
                    "TBN".to_string()
                } else {
                    leg.external_voyage_number.clone()
                }),
            },
            services: leg.service.code.as_ref().and_then(|code| {
                ServiceInfo::from_parts(Some(code.clone()), leg.service.name.clone())
            }),
        })
    }
}

impl ScheduleParser<Vec<P2PSchedule>, P2pQuery> for IqaxParser {
    fn schedule_request(
        &self,
        args: &ScheduleArgs<'_, P2pQuery>,
    ) -> Result<RequestParts, CarrierError> {
        let mut parts = RequestParts::default()
            .header("appKey", args.env.iqax_token.clone())
            .param("porID", args.query.point_from.clone())
            .param("fndID", args.query.point_to.clone())
            .param("searchDuration", args.query.search_range.to_string());
        if is_departure(args.query.start_date_type) {
            parts = parts.param("departureFrom", args.query.start_date.clone());
        } else {
            parts = parts.param("arrivalFrom", args.query.start_date.clone());
        }
        Ok(parts)
    }

    fn parse(&self, body: &[u8]) -> Result<Vec<P2PSchedule>, CarrierError> {
        let data: IqaxResponse = serde_json::from_slice(body)?;
        let mut schedules = Vec::new();
        for group in &data.route_groups_list {
            for route in &group.route {
                let window = RouteWindow {
                    first_etd: route
                        .por
                        .etd
                        .as_deref()
                        .and_then(|etd| normalize_date(etd, DATE_LAYOUT)),
                    last_eta: route
                        .fnd
                        .eta
                        .as_deref()
                        .and_then(|eta| normalize_date(eta, DATE_LAYOUT)),
                };
                schedules.push(P2PSchedule {
                    scac: route.carrier_scac.clone(),
                    point_from: route.por.location.unlocode.clone(),
                    point_to: route.fnd.location.unlocode.clone(),
                    etd: window.first_etd.clone().unwrap_or_default(),
                    eta: window.last_eta.clone().unwrap_or_default(),
                    transit_time: route.transit_time,
                    transshipment: !route.direct,
                    legs: route
                        .leg
                        .iter()
                        .enumerate()
                        .filter_map(|(index, leg)| Self::leg(index, &window, leg))
                        .collect(),
                });
            }
        }
        Ok(schedules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"{
      "routeGroupsList": [
        {
          "route": [
            {
              "carrierScac": "COSU",
              "por": {"location": {"name": "Hong Kong", "unlocode": "HKHKG"}, "etd": "2025-01-06T12:00:00.000Z"},
              "fnd": {"location": {"name": "Hamburg", "unlocode": "DEHAM"}, "eta": "2025-02-06T09:00:00.000Z"},
              "transitTime": 30,
              "direct": true,
              "leg": [
                {
                  "fromPoint": {
                    "location": {"name": "Hong Kong", "unlocode": "HKHKG", "facility": {"name": "HIT", "code": "HIT4"}},
                    "defaultCutoff": "2025-01-05T10:00:00.000Z",
                    "etd": "2025-01-06T12:00:00.000Z"
                  },
                  "toPoint": {
                    "location": {"name": "Hamburg", "unlocode": "DEHAM", "facility": {"name": "CTA", "code": "CTA"}},
                    "eta": "2025-02-06T10:00:00.000Z"
                  },
                  "transportMode": "VESSEL",
                  "service": {"code": "AEU3", "name": "Asia Europe 3"},
                  "vessel": {"name": "COSCO SHIPPING ARIES"},
                  "transitTime": 30,
                  "internalVoyageNumber": "062W",
                  "imoNumber": 9783497
                }
              ]
            }
          ]
        }
      ]
    }"#;

    #[test]
    fn parses_fixture_to_canonical() {
        let schedules = IqaxParser.parse(FIXTURE.as_bytes()).unwrap();
        assert_eq!(schedules.len(), 1);
        let s = &schedules[0];
        assert_eq!(s.scac, "COSU");
        assert_eq!(s.etd, "2025-01-06T12:00:00");
        assert_eq!(s.eta, "2025-02-06T09:00:00");
        assert!(!s.transshipment);
        let leg = &s.legs[0];
        assert_eq!(leg.transportations.reference.as_deref(), Some("9783497"));
        assert_eq!(leg.cutoffs.as_ref().unwrap().cy_cutoff_date.as_deref(), Some("2025-01-05T10:00:00"));
        assert_eq!(leg.voyages.internal_voyage, "062W");
        assert_eq!(leg.voyages.external_voyage.as_deref(), Some("TBN"));
        assert!(s.validate().is_ok());
    }

    #[test]
    fn dummy_vehicles_clear_the_reference_pair_then_default() {
        let fixture = FIXTURE.replace("9783497", "9999999");
        let schedules = IqaxParser.parse(fixture.as_bytes()).unwrap();
        let transport = &schedules[0].legs[0].transportations;
        // Cleared pair re-defaults to the vessel token.
        assert_eq!(transport.reference.as_deref(), Some("1"));
    }

    #[test]
    fn zero_length_legs_are_dropped() {
        let fixture = FIXTURE.replace("\"unlocode\": \"DEHAM\", \"facility\": {\"name\": \"CTA\", \"code\": \"CTA\"}", "\"unlocode\": \"HKHKG\", \"facility\": {\"name\": \"CTA\", \"code\": \"CTA\"}");
        let schedules = IqaxParser.parse(fixture.as_bytes()).unwrap();
        assert!(schedules[0].legs.is_empty());
    }

    #[test]
    fn missing_leg_eta_falls_back_to_the_route_window() {
        let fixture = FIXTURE.replace("\"eta\": \"2025-02-06T10:00:00.000Z\"", "\"eta\": \"\"");
        let schedules = IqaxParser.parse(fixture.as_bytes()).unwrap();
        assert_eq!(schedules[0].legs[0].eta, "2025-02-06T09:00:00");
    }
}
