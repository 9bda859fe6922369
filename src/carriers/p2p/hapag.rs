//! Hapag-Lloyd adapter (HLCU), DCSA-shaped point-to-point routings.

use serde::Deserialize;

use crate::carriers::util::{
    is_departure, normalize_date, p2p_window, title_case_mode, transit_days,
    transport_type_from_label, usable_imo,
};
use crate::carriers::{CarrierError, RequestParts, ScheduleArgs, ScheduleParser};
use crate::models::{
    Cutoff, Leg, P2PSchedule, P2pQuery, PointBase, ServiceInfo, Transportation, Voyage,
};

const DATE_LAYOUT: &str = "%Y-%m-%dT%H:%M:%S%:z";
const WINDOW_LAYOUT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

#[derive(Debug, Deserialize)]
struct HapagRouting {
    #[serde(rename = "placeOfReceipt")]
    place_of_receipt: Terminal,
    #[serde(rename = "placeOfDelivery")]
    place_of_delivery: Terminal,
    #[serde(rename = "transitTime", default)]
    transit_time: i64,
    #[serde(rename = "cutOffTimes", default)]
    cut_off_times: Vec<CutOffTime>,
    #[serde(default)]
    legs: Vec<HapagLeg>,
}

#[derive(Debug, Deserialize)]
struct HapagLeg {
    #[serde(rename = "modeOfTransport", default)]
    mode_of_transport: String,
    #[serde(rename = "vesselIMONumber", default)]
    vessel_imo_number: String,
    #[serde(rename = "vesselName", default)]
    vessel_name: String,
    #[serde(rename = "carrierServiceName", default)]
    carrier_service_name: String,
    #[serde(rename = "carrierServiceCode", default)]
    carrier_service_code: String,
    #[serde(rename = "universalExportVoyageReference", default)]
    universal_export_voyage_reference: String,
    departure: Terminal,
    arrival: Terminal,
}

#[derive(Debug, Deserialize)]
struct CutOffTime {
    #[serde(rename = "cutOffDateTimeCode", default)]
    cut_off_date_time_code: String,
    #[serde(rename = "cutOffDateTime", default)]
    cut_off_date_time: String,
}

#[derive(Debug, Deserialize)]
struct Terminal {
    location: HapagLocation,
    #[serde(rename = "dateTime", default)]
    date_time: String,
}

#[derive(Debug, Deserialize)]
struct HapagLocation {
    #[serde(rename = "locationName", default)]
    location_name: String,
    #[serde(rename = "UNLocationCode", default)]
    un_location_code: String,
    #[serde(rename = "facilitySMDGCode", default)]
    facility_smdg_code: String,
}

pub struct HapagParser;

impl HapagParser {
    fn point(terminal: &Terminal) -> PointBase {
        PointBase {
            location_name: Some(terminal.location.location_name.clone())
                .filter(|s| !s.is_empty()),
            location_code: terminal.location.un_location_code.clone(),
            terminal_name: None,
            terminal_code: Some(terminal.location.facility_smdg_code.clone())
                .filter(|s| !s.is_empty()),
        }
    }

    /// DCSA cutoff codes; only the first leg of a routing carries them.
    fn cutoffs(cut_offs: &[CutOffTime]) -> Option<Cutoff> {
        let mut cy = None;
        let mut doc = None;
        let mut vgm = None;
        for cut_off in cut_offs {
            let normalized = normalize_date(&cut_off.cut_off_date_time, DATE_LAYOUT);
            match cut_off.cut_off_date_time_code.as_str() {
                "FCO" => cy = normalized,
                "DCO" => doc = normalized,
                "VCO" => vgm = normalized,
                _ => {}
            }
        }
        Cutoff::from_parts(cy, doc, vgm)
    }

    fn leg(sequence: usize, cut_offs: &[CutOffTime], leg: &HapagLeg) -> Leg {
        let etd = normalize_date(&leg.departure.date_time, DATE_LAYOUT).unwrap_or_default();
        let eta = normalize_date(&leg.arrival.date_time, DATE_LAYOUT).unwrap_or_default();
        let mode = if leg.mode_of_transport.is_empty() {
            "Vessel".to_string()
        } else {
            title_case_mode(&leg.mode_of_transport)
        };
        let reference = Some(leg.vessel_imo_number.clone())
            .filter(|imo| !imo.is_empty() && imo.len() < 9 && usable_imo(imo));
        Leg {
            point_from: Self::point(&leg.departure),
            point_to: Self::point(&leg.arrival),
            etd: etd.clone(),
            eta: eta.clone(),
            transit_time: transit_days(Some(&etd), Some(&eta)),
            cutoffs: if sequence == 0 {
                Self::cutoffs(cut_offs)
            } else {
                None
            },
            transportations: Transportation::new(
                transport_type_from_label(&mode),
                leg.vessel_name.clone(),
                reference.is_some().then(|| "IMO".to_string()),
                reference,
            ),
            voyages: Voyage::internal_or_tbn(leg.universal_export_voyage_reference.clone()),
            services: ServiceInfo::from_parts(
                Some(leg.carrier_service_code.clone()),
                Some(leg.carrier_service_name.clone()),
            ),
        }
    }
}

impl ScheduleParser<Vec<P2PSchedule>, P2pQuery> for HapagParser {
    fn schedule_request(
        &self,
        args: &ScheduleArgs<'_, P2pQuery>,
    ) -> Result<RequestParts, CarrierError> {
        let (start, end) = p2p_window(
            &args.query.start_date,
            args.query.search_range,
            WINDOW_LAYOUT,
        )
        .unwrap_or_default();
        let mut parts = RequestParts::default()
            .header("X-IBM-Client-Id", args.env.hapag_client.clone())
            .header("X-IBM-Client-Secret", args.env.hapag_secret.clone())
            .header("Accept", "application/json")
            .param("placeOfReceipt", args.query.point_from.clone())
            .param("placeOfDelivery", args.query.point_to.clone());
        if is_departure(args.query.start_date_type) {
            parts = parts
                .param("departureDateTime:gte", start)
                .param("departureDateTime:lte", end);
        } else {
            parts = parts
                .param("arrivalDateTime:gte", start)
                .param("arrivalDateTime:lte", end);
        }
        Ok(parts)
    }

    fn parse(&self, body: &[u8]) -> Result<Vec<P2PSchedule>, CarrierError> {
        let routings: Vec<HapagRouting> = serde_json::from_slice(body)?;
        Ok(routings
            .iter()
            .map(|routing| {
                let etd = normalize_date(&routing.place_of_receipt.date_time, DATE_LAYOUT)
                    .unwrap_or_default();
                let eta = normalize_date(&routing.place_of_delivery.date_time, DATE_LAYOUT)
                    .unwrap_or_default();
                P2PSchedule {
                    scac: "HLCU".to_string(),
                    point_from: routing.place_of_receipt.location.un_location_code.clone(),
                    point_to: routing.place_of_delivery.location.un_location_code.clone(),
                    etd: etd.clone(),
                    eta: eta.clone(),
                    transit_time: if routing.transit_time > 0 {
                        routing.transit_time
                    } else {
                        transit_days(Some(&etd), Some(&eta))
                    },
                    transshipment: routing.legs.len() > 1,
                    legs: routing
                        .legs
                        .iter()
                        .enumerate()
                        .map(|(sequence, leg)| Self::leg(sequence, &routing.cut_off_times, leg))
                        .collect(),
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::test_env;
    use crate::models::{Scac, StartDateType};

    const FIXTURE: &str = r#"[
      {
        "placeOfReceipt": {
          "location": {"locationName": "Hong Kong", "UNLocationCode": "HKHKG"},
          "dateTime": "2025-01-07T20:00:00+08:00"
        },
        "placeOfDelivery": {
          "location": {"locationName": "Hamburg", "UNLocationCode": "DEHAM"},
          "dateTime": "2025-02-08T07:00:00+01:00"
        },
        "transitTime": 0,
        "cutOffTimes": [
          {"cutOffDateTimeCode": "DCO", "cutOffDateTime": "2025-01-05T12:00:00+08:00"},
          {"cutOffDateTimeCode": "VCO", "cutOffDateTime": "2025-01-06T10:00:00+08:00"},
          {"cutOffDateTimeCode": "FCO", "cutOffDateTime": "2025-01-06T16:00:00+08:00"}
        ],
        "legs": [
          {
            "modeOfTransport": "VESSEL",
            "vesselIMONumber": "9540118",
            "vesselName": "BRUSSELS EXPRESS",
            "carrierServiceName": "Far East Loop 4",
            "carrierServiceCode": "FE4",
            "universalExportVoyageReference": "2501W",
            "departure": {
              "location": {"locationName": "Hong Kong", "UNLocationCode": "HKHKG", "facilitySMDGCode": "HIT4"},
              "dateTime": "2025-01-07T20:00:00+08:00"
            },
            "arrival": {
              "location": {"locationName": "Hamburg", "UNLocationCode": "DEHAM", "facilitySMDGCode": "CTA"},
              "dateTime": "2025-02-08T07:00:00+01:00"
            }
          }
        ]
      }
    ]"#;

    #[test]
    fn request_uses_week_window_on_the_chosen_pivot() {
        let env = test_env();
        let query = P2pQuery {
            point_from: "HKHKG".into(),
            point_to: "DEHAM".into(),
            start_date_type: StartDateType::Departure,
            start_date: "2025-01-06".into(),
            search_range: 3,
            scac: vec![Scac::HLCU],
            direct_only: None,
            transhipment_port: None,
            vessel_imo: None,
            service: None,
        };
        let args = ScheduleArgs {
            token: None,
            scac: Scac::HLCU,
            env: &env,
            query: &query,
            origin: None,
            destination: None,
        };
        let parts = HapagParser.schedule_request(&args).unwrap();
        assert!(parts
            .params
            .contains(&("departureDateTime:gte".into(), "2025-01-06T00:00:00.000Z".into())));
        assert!(parts
            .params
            .contains(&("departureDateTime:lte".into(), "2025-01-27T00:00:00.000Z".into())));
    }

    #[test]
    fn parses_fixture_to_canonical() {
        let schedules = HapagParser.parse(FIXTURE.as_bytes()).unwrap();
        assert_eq!(schedules.len(), 1);
        let s = &schedules[0];
        assert_eq!(s.scac, "HLCU");
        assert_eq!(s.etd, "2025-01-07T20:00:00", "offset is discarded, not converted");
        assert_eq!(s.eta, "2025-02-08T07:00:00");
        assert_eq!(s.transit_time, 31, "computed when the vendor sends zero");
        assert!(!s.transshipment);
        let leg = &s.legs[0];
        assert_eq!(leg.transportations.reference.as_deref(), Some("9540118"));
        assert_eq!(leg.voyages.internal_voyage, "2501W");
        let cutoffs = leg.cutoffs.as_ref().unwrap();
        assert_eq!(cutoffs.cy_cutoff_date.as_deref(), Some("2025-01-06T16:00:00"));
        assert_eq!(cutoffs.doc_cutoff_date.as_deref(), Some("2025-01-05T12:00:00"));
        assert!(s.validate().is_ok());
    }

    #[test]
    fn zero_imo_falls_back_to_type_default() {
        let fixture = FIXTURE.replace("9540118", "0000000");
        let schedules = HapagParser.parse(fixture.as_bytes()).unwrap();
        let transport = &schedules[0].legs[0].transportations;
        assert_eq!(transport.reference.as_deref(), Some("1"));
        assert_eq!(transport.reference_type.as_deref(), Some("IMO"));
    }
}
