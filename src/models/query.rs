//! Inbound query types shared by the handlers and the carrier engine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Standard Carrier Alpha Codes the gateway integrates with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scac {
    CMDU,
    ANNU,
    CHNL,
    APLU,
    ZIMU,
    HLCU,
    MSCU,
    COSU,
    OOLU,
    ONEY,
    MAEU,
    MAEI,
}

impl Scac {
    pub const ALL: [Scac; 12] = [
        Scac::CMDU,
        Scac::ANNU,
        Scac::CHNL,
        Scac::APLU,
        Scac::ZIMU,
        Scac::HLCU,
        Scac::MSCU,
        Scac::COSU,
        Scac::OOLU,
        Scac::ONEY,
        Scac::MAEU,
        Scac::MAEI,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Scac::CMDU => "CMDU",
            Scac::ANNU => "ANNU",
            Scac::CHNL => "CHNL",
            Scac::APLU => "APLU",
            Scac::ZIMU => "ZIMU",
            Scac::HLCU => "HLCU",
            Scac::MSCU => "MSCU",
            Scac::COSU => "COSU",
            Scac::OOLU => "OOLU",
            Scac::ONEY => "ONEY",
            Scac::MAEU => "MAEU",
            Scac::MAEI => "MAEI",
        }
    }

    /// CMA-group carriers share one upstream keyed by an internal code.
    pub fn cma_internal_code(self) -> Option<&'static str> {
        match self {
            Scac::CMDU => Some("0001"),
            Scac::ANNU => Some("0002"),
            Scac::CHNL => Some("0011"),
            Scac::APLU => Some("0015"),
            _ => None,
        }
    }

    pub fn from_cma_internal_code(code: &str) -> Option<Scac> {
        match code {
            "0001" => Some(Scac::CMDU),
            "0002" => Some(Scac::ANNU),
            "0011" => Some(Scac::CHNL),
            "0015" => Some(Scac::APLU),
            _ => None,
        }
    }
}

impl fmt::Display for Scac {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scac {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scac::ALL
            .into_iter()
            .find(|scac| scac.as_str() == s)
            .ok_or_else(|| format!("unknown carrier: {s}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartDateType {
    Departure,
    Arrival,
}

impl FromStr for StartDateType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Departure" => Ok(StartDateType::Departure),
            "Arrival" => Ok(StartDateType::Arrival),
            other => Err(format!("startDateType must be Departure or Arrival, got {other}")),
        }
    }
}

/// Validated point-to-point search query.
#[derive(Debug, Clone)]
pub struct P2pQuery {
    pub point_from: String,
    pub point_to: String,
    pub start_date_type: StartDateType,
    /// `YYYY-MM-DD`.
    pub start_date: String,
    /// Weeks, 1..=4.
    pub search_range: i64,
    pub scac: Vec<Scac>,
    pub direct_only: Option<bool>,
    pub transhipment_port: Option<String>,
    pub vessel_imo: Option<String>,
    pub service: Option<String>,
}

impl P2pQuery {
    pub fn wants_post_filtering(&self) -> bool {
        self.direct_only == Some(true)
            || self.transhipment_port.is_some()
            || self.vessel_imo.is_some()
            || self.service.is_some()
    }
}

/// Validated master-vessel voyage query.
#[derive(Debug, Clone)]
pub struct VoyageQuery {
    pub scac: Vec<Scac>,
    pub vessel_imo: String,
    pub voyage_num: Option<String>,
    /// `YYYY-MM-DD`.
    pub start_date: Option<String>,
    /// Days around the start date.
    pub date_range: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scac_round_trips_through_str() {
        for scac in Scac::ALL {
            assert_eq!(scac.as_str().parse::<Scac>().unwrap(), scac);
        }
        assert!("EGLV".parse::<Scac>().is_err());
    }

    #[test]
    fn cma_internal_codes_round_trip() {
        for scac in [Scac::CMDU, Scac::ANNU, Scac::CHNL, Scac::APLU] {
            let code = scac.cma_internal_code().unwrap();
            assert_eq!(Scac::from_cma_internal_code(code), Some(scac));
        }
        assert!(Scac::MSCU.cma_internal_code().is_none());
    }
}
