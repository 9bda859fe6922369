//! Maersk adapter (MAEU, MAEI). The schedule endpoint keys on country and
//! city names, so both ports resolve through the location API first.

use serde::Deserialize;

use crate::carriers::util::{is_departure, transit_days, transport_type_from_code};
use crate::carriers::{
    CarrierError, LocationProvider, RequestParts, ScheduleArgs, ScheduleParser,
};
use crate::env::EnvManager;
use crate::models::{
    Leg, P2PSchedule, P2pQuery, PointBase, ServiceInfo, Transportation, Voyage,
};

#[derive(Debug, Deserialize)]
struct MaerskResponse {
    #[serde(rename = "oceanProducts", default)]
    ocean_products: Vec<OceanProduct>,
}

#[derive(Debug, Deserialize)]
struct OceanProduct {
    #[serde(rename = "vesselOperatorCarrierCode", default)]
    vessel_operator_carrier_code: String,
    #[serde(rename = "transportSchedules", default)]
    transport_schedules: Vec<TransportSchedule>,
}

#[derive(Debug, Deserialize)]
struct TransportSchedule {
    #[serde(rename = "departureDateTime", default)]
    departure_date_time: String,
    #[serde(rename = "arrivalDateTime", default)]
    arrival_date_time: String,
    #[serde(default)]
    facilities: Facilities,
    #[serde(rename = "transitTime", default)]
    transit_time: String,
    #[serde(rename = "transportLegs", default)]
    transport_legs: Vec<TransportLeg>,
}

#[derive(Debug, Deserialize, Default)]
struct Facilities {
    #[serde(rename = "collectionOrigin", default)]
    collection_origin: MaerskLocation,
    #[serde(rename = "deliveryDestination", default)]
    delivery_destination: MaerskLocation,
}

#[derive(Debug, Deserialize, Default)]
struct MaerskLocation {
    #[serde(rename = "cityName", default)]
    city_name: String,
    #[serde(rename = "locationName", default)]
    location_name: String,
    #[serde(rename = "cityUNLocationCode", default)]
    city_un_location_code: String,
    #[serde(rename = "siteUNLocationCode", default)]
    site_un_location_code: String,
}

#[derive(Debug, Deserialize)]
struct TransportLeg {
    #[serde(rename = "departureDateTime", default)]
    departure_date_time: String,
    #[serde(rename = "arrivalDateTime", default)]
    arrival_date_time: String,
    #[serde(default)]
    facilities: LegFacilities,
    #[serde(default)]
    transport: Transport,
}

#[derive(Debug, Deserialize, Default)]
struct LegFacilities {
    #[serde(rename = "startLocation", default)]
    start_location: MaerskLocation,
    #[serde(rename = "endLocation", default)]
    end_location: MaerskLocation,
}

#[derive(Debug, Deserialize, Default)]
struct Transport {
    #[serde(rename = "transportMode", default)]
    transport_mode: String,
    #[serde(default)]
    vessel: MaerskVessel,
    #[serde(rename = "carrierDepartureVoyageNumber", default)]
    carrier_departure_voyage_number: String,
    #[serde(rename = "carrierServiceCode", default)]
    carrier_service_code: String,
    #[serde(rename = "carrierServiceName", default)]
    carrier_service_name: String,
}

#[derive(Debug, Deserialize, Default)]
struct MaerskVessel {
    #[serde(rename = "vesselIMONumber", default)]
    vessel_imo_number: String,
    #[serde(rename = "vesselName", default)]
    vessel_name: String,
}

/// Vendor transit is minutes; a day of sailing is ~1400 of them on this API.
const TRANSIT_MINUTES_PER_DAY: f64 = 1400.0;

pub struct MaerskParser;

impl MaerskParser {
    fn point(location: &MaerskLocation) -> PointBase {
        let code = if !location.city_un_location_code.is_empty() {
            location.city_un_location_code.clone()
        } else {
            location.site_un_location_code.clone()
        };
        PointBase {
            location_name: Some(location.city_name.clone()).filter(|s| !s.is_empty()),
            location_code: code,
            terminal_name: Some(location.location_name.clone()).filter(|s| !s.is_empty()),
            terminal_code: None,
        }
    }

    fn leg(leg: &TransportLeg) -> Leg {
        let etd = leg.departure_date_time.clone();
        let eta = leg.arrival_date_time.clone();
        let imo = match leg.transport.vessel.vessel_imo_number.as_str() {
            "" => None,
            // Maersk's placeholder for unassigned tonnage.
            "999999" => Some("1".to_string()),
            imo => Some(imo.to_string()),
        };
        let service = if !leg.transport.carrier_service_name.is_empty() {
            leg.transport.carrier_service_name.clone()
        } else {
            leg.transport.carrier_service_code.clone()
        };
        Leg {
            point_from: Self::point(&leg.facilities.start_location),
            point_to: Self::point(&leg.facilities.end_location),
            etd: etd.clone(),
            eta: eta.clone(),
            transit_time: transit_days(Some(&etd), Some(&eta)),
            cutoffs: None,
            transportations: Transportation::new(
                transport_type_from_code(&leg.transport.transport_mode),
                leg.transport.vessel.vessel_name.clone(),
                imo.is_some().then(|| "IMO".to_string()),
                imo,
            ),
            voyages: Voyage::internal_or_tbn(leg.transport.carrier_departure_voyage_number.clone()),
            services: ServiceInfo::from_parts(Some(service.clone()), Some(service)),
        }
    }
}

impl LocationProvider for MaerskParser {
    fn location_request(&self, env: &EnvManager, port: &str) -> RequestParts {
        RequestParts::default()
            .header("Consumer-Key", env.maersk_location_token.clone())
            .param("locationType", "CITY")
            .param("UNLocationCode", port)
    }
}

impl ScheduleParser<Vec<P2PSchedule>, P2pQuery> for MaerskParser {
    fn schedule_request(
        &self,
        args: &ScheduleArgs<'_, P2pQuery>,
    ) -> Result<RequestParts, CarrierError> {
        let field = |data: &Option<crate::carriers::LocationData>, key: &str| {
            data.as_ref()
                .and_then(|d| d.first())
                .and_then(|m| m.get(key))
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };
        let date_type = if is_departure(args.query.start_date_type) {
            "D"
        } else {
            "A"
        };
        Ok(RequestParts::default()
            .header("Consumer-Key", args.env.maersk_token.clone())
            .param("collectionOriginCountryCode", field(&args.origin, "countryCode"))
            .param("collectionOriginCityName", field(&args.origin, "cityName"))
            .param("collectionOriginUNLocationCode", args.query.point_from.clone())
            .param(
                "deliveryDestinationCountryCode",
                field(&args.destination, "countryCode"),
            )
            .param(
                "deliveryDestinationCityName",
                field(&args.destination, "cityName"),
            )
            .param("deliveryDestinationUNLocationCode", args.query.point_to.clone())
            .param("dateRange", format!("P{}W", args.query.search_range))
            .param("startDate", args.query.start_date.clone())
            .param("startDateType", date_type)
            .param("vesselOperatorCarrierCode", args.scac.to_string()))
    }

    fn parse(&self, body: &[u8]) -> Result<Vec<P2PSchedule>, CarrierError> {
        let data: MaerskResponse = serde_json::from_slice(body)?;
        let mut schedules = Vec::new();
        for product in &data.ocean_products {
            for schedule in &product.transport_schedules {
                let transit_minutes: f64 = schedule.transit_time.parse().unwrap_or(0.0);
                schedules.push(P2PSchedule {
                    scac: product.vessel_operator_carrier_code.clone(),
                    point_from: schedule
                        .facilities
                        .collection_origin
                        .city_un_location_code
                        .clone(),
                    point_to: schedule
                        .facilities
                        .delivery_destination
                        .city_un_location_code
                        .clone(),
                    etd: schedule.departure_date_time.clone(),
                    eta: schedule.arrival_date_time.clone(),
                    transit_time: (transit_minutes / TRANSIT_MINUTES_PER_DAY).floor() as i64,
                    transshipment: schedule.transport_legs.len() > 1,
                    legs: schedule.transport_legs.iter().map(Self::leg).collect(),
                });
            }
        }
        Ok(schedules)
    }
}
