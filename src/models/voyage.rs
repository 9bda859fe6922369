//! Master-vessel voyage schema.
//!
//! Port-call fields that can name one or several voyages (`key`, `bound`,
//! `voyage`) are a two-case variant so overlapped calls serialize as arrays
//! while the common case stays scalar.

use serde::{Deserialize, Serialize};

use super::validate::{is_iso_local_date, is_valid_imo, is_valid_port_code, ValidationIssues};
use super::ServiceInfo;

/// Scalar-or-array JSON value, decided by overlap detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarOrList {
    One(String),
    Many(Vec<String>),
}

impl ScalarOrList {
    pub fn is_empty(&self) -> bool {
        match self {
            ScalarOrList::One(v) => v.is_empty(),
            ScalarOrList::Many(vs) => vs.is_empty(),
        }
    }
}

impl From<String> for ScalarOrList {
    fn from(value: String) -> Self {
        ScalarOrList::One(value)
    }
}

impl From<&str> for ScalarOrList {
    fn from(value: &str) -> Self {
        ScalarOrList::One(value.to_string())
    }
}

impl From<Vec<String>> for ScalarOrList {
    fn from(value: Vec<String>) -> Self {
        ScalarOrList::Many(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortEvent {
    Loading,
    Unloading,
    Pass,
}

impl PortEvent {
    /// Voyage-store event codes.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "LOA" => Some(PortEvent::Loading),
            "UNL" => Some(PortEvent::Unloading),
            "PAS" => Some(PortEvent::Pass),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Port {
    #[serde(rename = "portName", skip_serializing_if = "Option::is_none")]
    pub port_name: Option<String>,
    #[serde(rename = "portCode")]
    pub port_code: String,
    #[serde(rename = "terminalName", skip_serializing_if = "Option::is_none")]
    pub terminal_name: Option<String>,
    #[serde(rename = "terminalCode", skip_serializing_if = "Option::is_none")]
    pub terminal_code: Option<String>,
}

/// One vessel touch at a port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortCall {
    pub seq: usize,
    pub key: ScalarOrList,
    pub bound: ScalarOrList,
    pub voyage: ScalarOrList,
    #[serde(rename = "service", skip_serializing_if = "Option::is_none")]
    pub service: Option<ServiceInfo>,
    #[serde(rename = "portEvent")]
    pub port_event: PortEvent,
    pub port: Port,
    #[serde(rename = "estimatedEventDate", skip_serializing_if = "Option::is_none")]
    pub estimated_event_date: Option<String>,
    #[serde(rename = "actualEventDate", skip_serializing_if = "Option::is_none")]
    pub actual_event_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VesselDetails {
    #[serde(rename = "vesselName")]
    pub vessel_name: String,
    pub imo: String,
}

/// A vessel's ordered port-call timeline under one voyage number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterVesselSchedule {
    pub scac: String,
    pub voyage: String,
    #[serde(rename = "nextVoyage", skip_serializing_if = "Option::is_none")]
    pub next_voyage: Option<String>,
    pub vessel: VesselDetails,
    #[serde(rename = "services", skip_serializing_if = "Option::is_none")]
    pub services: Option<ServiceInfo>,
    pub calls: Vec<PortCall>,
}

impl MasterVesselSchedule {
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut issues = ValidationIssues::new();
        issues.require(!self.scac.is_empty(), "scac is empty");
        issues.require(!self.voyage.is_empty(), "voyage is empty");
        issues.require(!self.vessel.vessel_name.is_empty(), "vesselName is empty");
        issues.require(
            is_valid_imo(&self.vessel.imo),
            format!("imo {:?} is not a 7-digit IMO number", self.vessel.imo),
        );
        for (index, call) in self.calls.iter().enumerate() {
            issues.require(
                call.seq == index + 1,
                format!("call {} has seq {}", index, call.seq),
            );
            issues.require(!call.key.is_empty(), format!("call {} has empty key", call.seq));
            issues.require(
                !call.bound.is_empty(),
                format!("call {} has empty bound", call.seq),
            );
            issues.require(
                !call.voyage.is_empty(),
                format!("call {} has empty voyage", call.seq),
            );
            issues.require(
                is_valid_port_code(&call.port.port_code),
                format!("call {} port {:?} is not a UN/LOCODE", call.seq, call.port.port_code),
            );
            for date in [&call.estimated_event_date, &call.actual_event_date]
                .into_iter()
                .flatten()
            {
                issues.require(
                    is_iso_local_date(date),
                    format!("call {} event date {date:?} is not ISO local", call.seq),
                );
            }
        }
        issues.into_result()
    }
}

/// Row tuple shape returned by the voyage history store.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ScheduleRow {
    pub data_source: String,
    pub scac: String,
    pub provider_voyage_id: String,
    pub vessel_name: String,
    pub vessel_imo: String,
    pub voyage_num: String,
    pub voyage_direction: String,
    pub service_code: String,
    pub port_code: String,
    pub port_name: String,
    pub port_event: String,
    pub event_time: String,
}
