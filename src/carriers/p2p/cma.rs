//! CMA CGM group adapter (CMDU, APLU, ANNU, CHNL).
//!
//! One upstream serves the whole group, selected by an internal shipping
//! company code. Responses are paged; the fetcher's partial-content
//! reassembly makes pagination invisible here.

use serde::Deserialize;

use crate::carriers::util::{
    normalize_date, title_case_mode, transit_days, transport_type_from_label,
};
use crate::carriers::{CarrierError, RequestParts, ScheduleArgs, ScheduleParser};
use crate::models::{
    Cutoff, Leg, P2PSchedule, P2pQuery, PointBase, Scac, ServiceInfo, Transportation, Voyage,
};

const DATE_LAYOUT: &str = "%Y-%m-%dT%H:%M:%SZ";

#[derive(Debug, Deserialize)]
struct CmaRoute {
    #[serde(rename = "shippingCompany", default)]
    shipping_company: String,
    #[serde(rename = "transitTime", default)]
    transit_time: i64,
    #[serde(rename = "routingDetails", default)]
    routing_details: Vec<RoutingDetail>,
}

#[derive(Debug, Deserialize)]
struct RoutingDetail {
    #[serde(rename = "pointFrom")]
    point_from: CmaPoint,
    #[serde(rename = "pointTo")]
    point_to: CmaPoint,
    transportation: CmaTransportation,
    #[serde(rename = "legTransitTime", default)]
    leg_transit_time: i64,
}

#[derive(Debug, Deserialize, Default)]
struct CmaPoint {
    location: CmaLocation,
    #[serde(rename = "departureDateGmt", default)]
    departure_date_gmt: String,
    #[serde(rename = "arrivalDateGmt", default)]
    arrival_date_gmt: String,
    #[serde(rename = "cutOff", default)]
    cut_off: CmaCutoff,
}

#[derive(Debug, Deserialize, Default)]
struct CmaLocation {
    #[serde(default)]
    name: String,
    #[serde(rename = "internalCode", default)]
    internal_code: String,
    #[serde(rename = "locationCodifications", default)]
    location_codifications: Vec<Codification>,
    #[serde(default)]
    facility: CmaFacility,
}

#[derive(Debug, Deserialize, Default)]
struct Codification {
    #[serde(default)]
    codification: String,
}

#[derive(Debug, Deserialize, Default)]
struct CmaFacility {
    #[serde(default)]
    name: String,
    #[serde(rename = "facilityCodifications", default)]
    facility_codifications: Vec<Codification>,
}

#[derive(Debug, Deserialize, Default)]
struct CmaCutoff {
    #[serde(rename = "portCutoff")]
    port_cutoff: Option<CmaTime>,
    #[serde(rename = "shippingInstructionAcceptance")]
    shipping_instruction_acceptance: Option<CmaTime>,
    vgm: Option<CmaTime>,
}

#[derive(Debug, Deserialize, Default)]
struct CmaTime {
    #[serde(default)]
    utc: String,
}

#[derive(Debug, Deserialize)]
struct CmaTransportation {
    #[serde(rename = "meanOfTransport", default)]
    mean_of_transport: String,
    #[serde(default)]
    vehicule: CmaVehicle,
    #[serde(default)]
    voyage: CmaVoyage,
}

#[derive(Debug, Deserialize, Default)]
struct CmaVehicle {
    #[serde(rename = "vehiculeType", default)]
    vehicule_type: String,
    #[serde(rename = "vehiculeName", default)]
    vehicule_name: String,
    #[serde(default)]
    reference: String,
}

#[derive(Debug, Deserialize, Default)]
struct CmaVoyage {
    #[serde(rename = "voyageReference", default)]
    voyage_reference: String,
    #[serde(default)]
    service: CmaService,
}

#[derive(Debug, Deserialize, Default)]
struct CmaService {
    code: Option<String>,
}

pub struct CmaParser;

impl CmaParser {
    fn location_code(location: &CmaLocation) -> String {
        if !location.internal_code.is_empty() {
            return location.internal_code.clone();
        }
        location
            .location_codifications
            .first()
            .map(|c| c.codification.clone())
            .unwrap_or_default()
    }

    fn point(point: &CmaPoint) -> PointBase {
        let facility = &point.location.facility;
        PointBase {
            location_name: Some(point.location.name.clone()).filter(|s| !s.is_empty()),
            location_code: Self::location_code(&point.location),
            terminal_name: Some(facility.name.clone()).filter(|s| !s.is_empty()),
            terminal_code: facility
                .facility_codifications
                .first()
                .map(|c| c.codification.clone())
                .filter(|s| !s.is_empty()),
        }
    }

    /// The group's cutoff block is all-or-nothing: a partial set is noise.
    fn cutoffs(point: &CmaPoint) -> Option<Cutoff> {
        let cy = point
            .cut_off
            .port_cutoff
            .as_ref()
            .and_then(|t| normalize_date(&t.utc, DATE_LAYOUT));
        let doc = point
            .cut_off
            .shipping_instruction_acceptance
            .as_ref()
            .and_then(|t| normalize_date(&t.utc, DATE_LAYOUT));
        let vgm = point
            .cut_off
            .vgm
            .as_ref()
            .and_then(|t| normalize_date(&t.utc, DATE_LAYOUT));
        match (cy, doc, vgm) {
            (Some(cy), Some(doc), Some(vgm)) => {
                Cutoff::from_parts(Some(cy), Some(doc), Some(vgm))
            }
            _ => None,
        }
    }

    fn transportation(details: &CmaTransportation) -> Transportation {
        let mode = title_case_mode(&details.mean_of_transport);
        let imo = &details.vehicule.reference;
        let (reference_type, reference) = if !imo.is_empty() && imo.len() < 9 {
            (Some("IMO".to_string()), Some(imo.clone()))
        } else if details.vehicule.vehicule_type == "Barge" {
            (Some("IMO".to_string()), Some("9".to_string()))
        } else {
            (None, None)
        };
        Transportation::new(
            transport_type_from_label(&mode),
            details.vehicule.vehicule_name.clone(),
            reference_type,
            reference,
        )
    }

    fn leg(details: &RoutingDetail) -> Leg {
        let etd = normalize_date(&details.point_from.departure_date_gmt, DATE_LAYOUT)
            .unwrap_or_default();
        let eta =
            normalize_date(&details.point_to.arrival_date_gmt, DATE_LAYOUT).unwrap_or_default();
        Leg {
            point_from: Self::point(&details.point_from),
            point_to: Self::point(&details.point_to),
            etd,
            eta,
            transit_time: details.leg_transit_time,
            cutoffs: Self::cutoffs(&details.point_from),
            transportations: Self::transportation(&details.transportation),
            voyages: Voyage::internal_or_tbn(details.transportation.voyage.voyage_reference.clone()),
            services: ServiceInfo::from_parts(details.transportation.voyage.service.code.clone(), None),
        }
    }

    fn first_etd(route: &CmaRoute) -> Option<String> {
        route
            .routing_details
            .iter()
            .find(|d| !d.point_from.departure_date_gmt.is_empty())
            .and_then(|d| normalize_date(&d.point_from.departure_date_gmt, DATE_LAYOUT))
    }

    fn last_eta(route: &CmaRoute) -> Option<String> {
        route
            .routing_details
            .iter()
            .rev()
            .find(|d| !d.point_to.arrival_date_gmt.is_empty())
            .and_then(|d| normalize_date(&d.point_to.arrival_date_gmt, DATE_LAYOUT))
    }
}

impl ScheduleParser<Vec<P2PSchedule>, P2pQuery> for CmaParser {
    fn schedule_request(
        &self,
        args: &ScheduleArgs<'_, P2pQuery>,
    ) -> Result<RequestParts, CarrierError> {
        let internal_code = args
            .scac
            .cma_internal_code()
            .ok_or(CarrierError::Unsupported(args.scac))?;
        // APL keeps US-flag government routings separate from commercial.
        let us_to_us =
            args.query.point_from.starts_with("US") && args.query.point_to.starts_with("US");
        let specific_routings = if args.scac == Scac::APLU && us_to_us {
            "USGovernment"
        } else {
            "Commercial"
        };

        let mut parts = RequestParts::default()
            .header("keyID", args.env.cma_token.clone())
            .param("shippingCompany", internal_code)
            .param("placeOfLoading", args.query.point_from.clone())
            .param("placeOfDischarge", args.query.point_to.clone())
            .param("searchRange", (args.query.search_range * 7).to_string())
            .param("specificRoutings", specific_routings);
        if crate::carriers::util::is_departure(args.query.start_date_type) {
            parts = parts.param("departureDate", args.query.start_date.clone());
        } else {
            parts = parts.param("arrivalDate", args.query.start_date.clone());
        }
        Ok(parts)
    }

    fn parse(&self, body: &[u8]) -> Result<Vec<P2PSchedule>, CarrierError> {
        let routes: Vec<CmaRoute> = serde_json::from_slice(body)?;
        let mut schedules = Vec::with_capacity(routes.len());
        for route in &routes {
            let legs: Vec<Leg> = route.routing_details.iter().map(Self::leg).collect();
            let etd = Self::first_etd(route);
            let eta = Self::last_eta(route);
            let point_from = route
                .routing_details
                .first()
                .map(|d| Self::location_code(&d.point_from.location))
                .unwrap_or_default();
            let point_to = route
                .routing_details
                .last()
                .map(|d| Self::location_code(&d.point_to.location))
                .unwrap_or_default();
            schedules.push(P2PSchedule {
                scac: Scac::from_cma_internal_code(&route.shipping_company)
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| route.shipping_company.clone()),
                point_from,
                point_to,
                etd: etd.clone().unwrap_or_default(),
                eta: eta.clone().unwrap_or_default(),
                transit_time: if route.transit_time > 0 {
                    route.transit_time
                } else {
                    transit_days(etd.as_deref(), eta.as_deref())
                },
                transshipment: route.routing_details.len() > 1,
                legs,
            });
        }
        Ok(schedules)
    }
}
