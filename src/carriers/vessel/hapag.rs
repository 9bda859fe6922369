//! Hapag-Lloyd DCSA vessel-schedule adapter. Import and export voyages of
//! a transport call become separate events, then the timeline is sorted by
//! event date and deduplicated per (port, date).

use std::collections::HashMap;

use serde::Deserialize;

use crate::carriers::util::{end_date_after_days, normalize_date, voyage_direction};
use crate::carriers::{CarrierError, RequestParts, ScheduleArgs, ScheduleParser};
use crate::models::{
    MasterVesselSchedule, Port, PortCall, PortEvent, ScalarOrList, ServiceInfo, VesselDetails,
    VoyageQuery,
};

const DATE_LAYOUT: &str = "%Y-%m-%dT%H:%M:%S%:z";
const DEFAULT_DATE_RANGE: i64 = 60;

#[derive(Debug, Deserialize)]
struct HapagCarrierService {
    #[serde(rename = "carrierServiceName", default)]
    carrier_service_name: String,
    #[serde(rename = "carrierServiceCode", default)]
    carrier_service_code: String,
    #[serde(rename = "vesselSchedules", default)]
    vessel_schedules: Vec<HapagVesselSchedule>,
}

#[derive(Debug, Deserialize)]
struct HapagVesselSchedule {
    #[serde(rename = "vesselIMONumber", default)]
    vessel_imo_number: String,
    #[serde(rename = "vesselName", default)]
    vessel_name: String,
    #[serde(rename = "transportCalls", default)]
    transport_calls: Vec<HapagTransportCall>,
}

#[derive(Debug, Deserialize)]
struct HapagTransportCall {
    #[serde(rename = "transportCallReference", default)]
    transport_call_reference: String,
    #[serde(rename = "carrierImportVoyageNumber", default)]
    carrier_import_voyage_number: String,
    #[serde(rename = "carrierExportVoyageNumber", default)]
    carrier_export_voyage_number: String,
    #[serde(default)]
    location: HapagCallLocation,
    #[serde(default)]
    timestamps: Vec<HapagTimestamp>,
}

#[derive(Debug, Deserialize, Default)]
struct HapagCallLocation {
    #[serde(rename = "UNLocationCode", default)]
    un_location_code: String,
    #[serde(rename = "facilitySMDGCode", default)]
    facility_smdg_code: String,
}

#[derive(Debug, Deserialize)]
struct HapagTimestamp {
    #[serde(rename = "eventTypeCode", default)]
    event_type_code: String,
    #[serde(rename = "eventClassifierCode", default)]
    event_classifier_code: String,
    #[serde(rename = "eventDateTime", default)]
    event_date_time: String,
}

pub struct HapagVesselParser;

impl HapagVesselParser {
    fn event_date(
        timestamps: &[HapagTimestamp],
        event: PortEvent,
        classifiers: &[&str],
    ) -> Option<String> {
        let wanted_type = match event {
            PortEvent::Unloading => "ARRI",
            PortEvent::Loading => "DEPA",
            PortEvent::Pass => return None,
        };
        timestamps
            .iter()
            .find(|t| t.event_type_code == wanted_type && classifiers.contains(&t.event_classifier_code.as_str()))
            .and_then(|t| normalize_date(&t.event_date_time, DATE_LAYOUT))
    }

    /// Orders by estimated date and keeps the first call per
    /// (port, event date), renumbering afterwards.
    fn sort_and_dedupe(mut calls: Vec<PortCall>) -> Vec<PortCall> {
        calls.sort_by(|a, b| a.estimated_event_date.cmp(&b.estimated_event_date));
        let mut seen: HashMap<(String, Option<String>), usize> = HashMap::new();
        let mut unique = Vec::with_capacity(calls.len());
        for mut call in calls {
            let key = (call.port.port_code.clone(), call.estimated_event_date.clone());
            let count = seen.entry(key).or_insert(0);
            *count += 1;
            if *count == 1 {
                call.seq = unique.len() + 1;
                unique.push(call);
            }
        }
        unique
    }

    fn calls(services: &[HapagCarrierService]) -> Vec<PortCall> {
        let mut calls = Vec::new();
        for carrier_service in services {
            for schedule in &carrier_service.vessel_schedules {
                for transport_call in &schedule.transport_calls {
                    let events = [
                        (PortEvent::Unloading, &transport_call.carrier_import_voyage_number),
                        (PortEvent::Loading, &transport_call.carrier_export_voyage_number),
                    ];
                    for (event, voyage) in events {
                        if voyage.is_empty() {
                            continue;
                        }
                        calls.push(PortCall {
                            seq: 0,
                            key: ScalarOrList::One(
                                transport_call.transport_call_reference.clone(),
                            ),
                            bound: ScalarOrList::One(voyage_direction(voyage).to_string()),
                            voyage: ScalarOrList::One(voyage.clone()),
                            service: ServiceInfo::from_parts(
                                Some(carrier_service.carrier_service_code.clone()),
                                Some(carrier_service.carrier_service_name.clone()),
                            ),
                            port_event: event,
                            port: Port {
                                port_name: None,
                                port_code: transport_call.location.un_location_code.clone(),
                                terminal_name: None,
                                terminal_code: Some(
                                    transport_call.location.facility_smdg_code.clone(),
                                )
                                .filter(|s| !s.is_empty()),
                            },
                            estimated_event_date: Self::event_date(
                                &transport_call.timestamps,
                                event,
                                &["EST", "PLN"],
                            ),
                            actual_event_date: Self::event_date(
                                &transport_call.timestamps,
                                event,
                                &["ACT"],
                            ),
                        });
                    }
                }
            }
        }
        Self::sort_and_dedupe(calls)
    }
}

impl ScheduleParser<MasterVesselSchedule, VoyageQuery> for HapagVesselParser {
    fn schedule_request(
        &self,
        args: &ScheduleArgs<'_, VoyageQuery>,
    ) -> Result<RequestParts, CarrierError> {
        let mut parts = RequestParts::default()
            .header("X-IBM-Client-Id", args.env.hapag_client.clone())
            .header("X-IBM-Client-Secret", args.env.hapag_secret.clone())
            .header("Accept", "application/json")
            .param("vesselIMONumber", args.query.vessel_imo.clone());
        if let Some(voyage) = &args.query.voyage_num {
            parts = parts.param("carrierVoyageNumber", voyage.clone());
        }
        if let Some(start_date) = &args.query.start_date {
            let range = args.query.date_range.unwrap_or(0).max(DEFAULT_DATE_RANGE);
            let end = end_date_after_days(start_date, range)
                .unwrap_or_else(|| start_date.clone());
            parts = parts
                .param("startDate", start_date.clone())
                .param("endDate", end);
        }
        Ok(parts)
    }

    fn parse(&self, body: &[u8]) -> Result<MasterVesselSchedule, CarrierError> {
        let services: Vec<HapagCarrierService> = serde_json::from_slice(body)?;
        let first_service = services.first().ok_or(CarrierError::EmptyResponse)?;
        let first_schedule = first_service
            .vessel_schedules
            .first()
            .ok_or(CarrierError::EmptyResponse)?;
        let first_call = first_schedule
            .transport_calls
            .first()
            .ok_or(CarrierError::EmptyResponse)?;
        let voyage = if !first_call.carrier_import_voyage_number.is_empty() {
            first_call.carrier_import_voyage_number.clone()
        } else {
            first_call.carrier_export_voyage_number.clone()
        };
        Ok(MasterVesselSchedule {
            scac: "HLCU".to_string(),
            voyage,
            next_voyage: None,
            vessel: VesselDetails {
                vessel_name: first_schedule.vessel_name.clone(),
                imo: first_schedule.vessel_imo_number.clone(),
            },
            services: ServiceInfo::from_parts(
                Some(first_service.carrier_service_code.clone()),
                Some(first_service.carrier_service_name.clone()),
            ),
            calls: Self::calls(&services),
        })
    }
}
