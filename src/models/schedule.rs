//! Point-to-point sailing schema.
//!
//! All fields serialize with the external camelCase contract. Records are
//! built once by a carrier parser and never mutated afterwards; validation
//! runs on the finished record.

use serde::{Deserialize, Serialize};

use super::validate::{
    is_iso_local_date, is_valid_port_code, parse_iso_local, ValidationIssues,
};

/// A geographic + terminal coordinate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PointBase {
    #[serde(rename = "locationName", skip_serializing_if = "Option::is_none")]
    pub location_name: Option<String>,
    #[serde(rename = "locationCode")]
    pub location_code: String,
    #[serde(rename = "terminalName", skip_serializing_if = "Option::is_none")]
    pub terminal_name: Option<String>,
    #[serde(rename = "terminalCode", skip_serializing_if = "Option::is_none")]
    pub terminal_code: Option<String>,
}

/// Origin-terminal deadlines. Omitted entirely when no cutoff is known.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cutoff {
    #[serde(rename = "cyCutoffDate", skip_serializing_if = "Option::is_none")]
    pub cy_cutoff_date: Option<String>,
    #[serde(rename = "docCutoffDate", skip_serializing_if = "Option::is_none")]
    pub doc_cutoff_date: Option<String>,
    #[serde(rename = "vgmCutoffDate", skip_serializing_if = "Option::is_none")]
    pub vgm_cutoff_date: Option<String>,
}

impl Cutoff {
    pub fn is_empty(&self) -> bool {
        self.cy_cutoff_date.is_none()
            && self.doc_cutoff_date.is_none()
            && self.vgm_cutoff_date.is_none()
    }

    /// Builds a cutoff from normalized dates, dropping empty strings.
    /// Returns `None` when all three are absent.
    pub fn from_parts(cy: Option<String>, doc: Option<String>, vgm: Option<String>) -> Option<Self> {
        let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());
        let cutoff = Cutoff {
            cy_cutoff_date: non_empty(cy),
            doc_cutoff_date: non_empty(doc),
            vgm_cutoff_date: non_empty(vgm),
        };
        if cutoff.is_empty() {
            None
        } else {
            Some(cutoff)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportType {
    Vessel,
    Barge,
    Feeder,
    Truck,
    Rail,
    Truckrail,
    Roadrail,
    Road,
    Intermodal,
}

impl TransportType {
    /// Fixed reference token used when the upstream supplies no usable IMO.
    pub fn default_reference(self) -> &'static str {
        match self {
            TransportType::Vessel => "1",
            TransportType::Truck | TransportType::Road => "3",
            TransportType::Intermodal => "5",
            TransportType::Barge | TransportType::Feeder => "9",
            TransportType::Rail | TransportType::Roadrail | TransportType::Truckrail => "11",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransportType::Vessel => "Vessel",
            TransportType::Barge => "Barge",
            TransportType::Feeder => "Feeder",
            TransportType::Truck => "Truck",
            TransportType::Rail => "Rail",
            TransportType::Truckrail => "Truckrail",
            TransportType::Roadrail => "Roadrail",
            TransportType::Road => "Road",
            TransportType::Intermodal => "Intermodal",
        }
    }
}

/// One means of transport on a leg, with its paired reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transportation {
    #[serde(rename = "transportType")]
    pub transport_type: TransportType,
    #[serde(rename = "transportName", skip_serializing_if = "Option::is_none")]
    pub transport_name: Option<String>,
    #[serde(rename = "referenceType", skip_serializing_if = "Option::is_none")]
    pub reference_type: Option<String>,
    #[serde(rename = "reference", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl Transportation {
    pub fn new(
        transport_type: TransportType,
        transport_name: impl Into<String>,
        reference_type: Option<String>,
        reference: Option<String>,
    ) -> Self {
        let name = transport_name.into();
        let mut t = Transportation {
            transport_type,
            transport_name: if name.is_empty() { None } else { Some(name) },
            reference_type: reference_type.filter(|s| !s.is_empty()),
            reference: reference.filter(|s| !s.is_empty()),
        };
        t.apply_reference_default();
        t
    }

    /// When the upstream gives no reference, an unnamed vessel becomes "TBN"
    /// and the reference falls back to the per-type fixed token.
    pub fn apply_reference_default(&mut self) {
        if self.reference.is_none() {
            if self.transport_name.is_none() {
                self.transport_name = Some("TBN".to_string());
            }
            self.reference_type = Some("IMO".to_string());
            self.reference = Some(self.transport_type.default_reference().to_string());
        }
    }

    pub fn validate(&self, issues: &mut ValidationIssues) {
        if self.reference.is_none() != self.reference_type.is_none() {
            issues.push(format!(
                "transportation {} has unpaired reference/referenceType",
                self.transport_type.as_str()
            ));
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Voyage {
    #[serde(rename = "internalVoyage")]
    pub internal_voyage: String,
    #[serde(rename = "externalVoyage", skip_serializing_if = "Option::is_none")]
    pub external_voyage: Option<String>,
}

impl Voyage {
    /// "TBN" when the voyage number is unknown.
    pub fn internal_or_tbn(voyage: impl Into<String>) -> Self {
        let v = voyage.into();
        Voyage {
            internal_voyage: if v.is_empty() { "TBN".to_string() } else { v },
            external_voyage: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceInfo {
    #[serde(rename = "serviceCode", skip_serializing_if = "Option::is_none")]
    pub service_code: Option<String>,
    #[serde(rename = "serviceName", skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
}

impl ServiceInfo {
    /// `None` unless at least one of code/name is non-empty.
    pub fn from_parts(code: Option<String>, name: Option<String>) -> Option<Self> {
        let code = code.filter(|s| !s.is_empty());
        let name = name.filter(|s| !s.is_empty());
        if code.is_none() && name.is_none() {
            None
        } else {
            Some(ServiceInfo {
                service_code: code,
                service_name: name,
            })
        }
    }
}

/// One continuous transport segment within a sailing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leg {
    #[serde(rename = "pointFrom")]
    pub point_from: PointBase,
    #[serde(rename = "pointTo")]
    pub point_to: PointBase,
    pub etd: String,
    pub eta: String,
    #[serde(rename = "transitTime")]
    pub transit_time: i64,
    #[serde(rename = "cutoffs", skip_serializing_if = "Option::is_none")]
    pub cutoffs: Option<Cutoff>,
    #[serde(rename = "transportations")]
    pub transportations: Transportation,
    #[serde(rename = "voyages")]
    pub voyages: Voyage,
    #[serde(rename = "services", skip_serializing_if = "Option::is_none")]
    pub services: Option<ServiceInfo>,
}

impl Leg {
    pub fn validate(&self, issues: &mut ValidationIssues) {
        issues.require(
            is_valid_port_code(&self.point_from.location_code),
            format!("leg pointFrom {:?} is not a UN/LOCODE", self.point_from.location_code),
        );
        issues.require(
            is_valid_port_code(&self.point_to.location_code),
            format!("leg pointTo {:?} is not a UN/LOCODE", self.point_to.location_code),
        );
        issues.require(
            is_iso_local_date(&self.etd),
            format!("leg etd {:?} is not ISO local", self.etd),
        );
        issues.require(
            is_iso_local_date(&self.eta),
            format!("leg eta {:?} is not ISO local", self.eta),
        );
        if let (Some(etd), Some(eta)) = (parse_iso_local(&self.etd), parse_iso_local(&self.eta)) {
            issues.require(etd <= eta, format!("leg events not chronological: {} > {}", self.etd, self.eta));
        }
        issues.require(self.transit_time >= 0, "leg transitTime is negative");
        if let Some(cutoffs) = &self.cutoffs {
            for date in [
                &cutoffs.cy_cutoff_date,
                &cutoffs.doc_cutoff_date,
                &cutoffs.vgm_cutoff_date,
            ]
            .into_iter()
            .flatten()
            {
                issues.require(
                    is_iso_local_date(date),
                    format!("cutoff date {date:?} is not ISO local"),
                );
            }
        }
        self.transportations.validate(issues);
        issues.require(
            !self.voyages.internal_voyage.is_empty(),
            "leg internalVoyage is empty",
        );
    }
}

/// A top-level sailing offer from one carrier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct P2PSchedule {
    pub scac: String,
    #[serde(rename = "pointFrom")]
    pub point_from: String,
    #[serde(rename = "pointTo")]
    pub point_to: String,
    pub etd: String,
    pub eta: String,
    #[serde(rename = "transitTime")]
    pub transit_time: i64,
    pub transshipment: bool,
    pub legs: Vec<Leg>,
}

impl P2PSchedule {
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut issues = ValidationIssues::new();
        issues.require(!self.scac.is_empty(), "scac is empty");
        issues.require(
            is_valid_port_code(&self.point_from),
            format!("pointFrom {:?} is not a UN/LOCODE", self.point_from),
        );
        issues.require(
            is_valid_port_code(&self.point_to),
            format!("pointTo {:?} is not a UN/LOCODE", self.point_to),
        );
        issues.require(
            is_iso_local_date(&self.etd),
            format!("etd {:?} is not ISO local", self.etd),
        );
        issues.require(
            is_iso_local_date(&self.eta),
            format!("eta {:?} is not ISO local", self.eta),
        );
        if let (Some(etd), Some(eta)) = (parse_iso_local(&self.etd), parse_iso_local(&self.eta)) {
            issues.require(etd <= eta, format!("events not chronological: {} > {}", self.etd, self.eta));
        }
        issues.require(self.transit_time >= 0, "transitTime is negative");
        issues.require(!self.legs.is_empty(), "schedule has no legs");
        issues.require(
            self.transshipment == (self.legs.len() > 1),
            "transshipment flag disagrees with leg count",
        );
        for leg in &self.legs {
            leg.validate(&mut issues);
        }
        issues.into_result()
    }
}
