//! Query-string validation for the two search endpoints.
//!
//! Unknown parameter names are rejected outright; field values validate
//! against the same shapes the canonical model enforces.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::error::ApiError;
use crate::models::{is_valid_port_code, P2pQuery, Scac, StartDateType, VoyageQuery};

const P2P_PARAMS: [&str; 10] = [
    "pointFrom",
    "pointTo",
    "startDateType",
    "startDate",
    "searchRange",
    "scac",
    "directOnly",
    "transhipmentPort",
    "vesselIMO",
    "service",
];

const VOYAGE_PARAMS: [&str; 5] = ["scac", "vesselIMO", "voyageNum", "startDate", "dateRange"];

/// Carriers excluded from the implicit all-carriers selection; they stay
/// reachable when asked for explicitly.
const DEFAULT_EXCLUDED: [Scac; 2] = [Scac::ANNU, Scac::CHNL];

fn pairs(raw_query: &str) -> Result<Vec<(String, String)>, ApiError> {
    serde_urlencoded::from_str::<Vec<(String, String)>>(raw_query)
        .map_err(|err| ApiError::BadRequest(format!("unparseable query string: {err}")))
}

fn reject_unknown(pairs: &[(String, String)], allowed: &[&str]) -> Result<(), ApiError> {
    for (key, _) in pairs {
        if !allowed.contains(&key.as_str()) {
            return Err(ApiError::BadRequest(format!(
                "wrong parameters provided: {key}"
            )));
        }
    }
    Ok(())
}

fn single<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

fn invalid(field: &str, value: impl std::fmt::Display) -> ApiError {
    ApiError::BadRequest(format!("invalid field value found in '{field}': {value}"))
}

fn validate_date(field: &str, value: &str) -> Result<String, ApiError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|_| value.to_string())
        .map_err(|_| invalid(field, value))
}

fn validate_port(field: &str, value: &str) -> Result<String, ApiError> {
    if is_valid_port_code(value) {
        Ok(value.to_string())
    } else {
        Err(invalid(field, value))
    }
}

/// Resolves the effective carrier list: an explicit selection must name
/// active carriers; no selection means every active carrier minus the
/// default exclusions.
fn resolve_scacs(
    requested: Vec<&str>,
    active_carriers: &BTreeMap<String, bool>,
) -> Result<Vec<Scac>, ApiError> {
    if requested.is_empty() {
        let mut selected: Vec<Scac> = active_carriers
            .iter()
            .filter(|(_, active)| **active)
            .filter_map(|(code, _)| code.parse::<Scac>().ok())
            .filter(|scac| !DEFAULT_EXCLUDED.contains(scac))
            .collect();
        selected.sort_by_key(|s| s.as_str());
        return Ok(selected);
    }
    let mut selected = Vec::with_capacity(requested.len());
    for code in requested {
        let scac: Scac = code
            .parse()
            .map_err(|_| ApiError::BadRequest(format!("inactive scac provided: {code}")))?;
        if active_carriers.get(code).copied() != Some(true) {
            return Err(ApiError::BadRequest(format!(
                "inactive scac provided: {code}"
            )));
        }
        selected.push(scac);
    }
    Ok(selected)
}

pub fn parse_p2p_query(
    raw_query: &str,
    active_carriers: &BTreeMap<String, bool>,
) -> Result<P2pQuery, ApiError> {
    let pairs = pairs(raw_query)?;
    reject_unknown(&pairs, &P2P_PARAMS)?;

    let point_from = validate_port(
        "pointFrom",
        single(&pairs, "pointFrom").ok_or_else(|| invalid("pointFrom", "<missing>"))?,
    )?;
    let point_to = validate_port(
        "pointTo",
        single(&pairs, "pointTo").ok_or_else(|| invalid("pointTo", "<missing>"))?,
    )?;
    let start_date_type: StartDateType = single(&pairs, "startDateType")
        .ok_or_else(|| invalid("startDateType", "<missing>"))?
        .parse()
        .map_err(|_| {
            invalid(
                "startDateType",
                single(&pairs, "startDateType").unwrap_or_default(),
            )
        })?;
    let start_date = validate_date(
        "startDate",
        single(&pairs, "startDate").ok_or_else(|| invalid("startDate", "<missing>"))?,
    )?;
    let search_range: i64 = single(&pairs, "searchRange")
        .and_then(|v| v.parse().ok())
        .filter(|range| (1..=4).contains(range))
        .ok_or_else(|| invalid("searchRange", single(&pairs, "searchRange").unwrap_or("<missing>")))?;

    let requested: Vec<&str> = pairs
        .iter()
        .filter(|(k, _)| k == "scac")
        .map(|(_, v)| v.as_str())
        .collect();
    let scac = resolve_scacs(requested, active_carriers)?;

    let direct_only = match single(&pairs, "directOnly") {
        None => None,
        Some(value) => Some(
            value
                .parse::<bool>()
                .map_err(|_| invalid("directOnly", value))?,
        ),
    };
    let transhipment_port = match single(&pairs, "transhipmentPort") {
        None => None,
        Some(value) => Some(validate_port("transhipmentPort", value)?),
    };
    let vessel_imo = match single(&pairs, "vesselIMO") {
        None => None,
        Some(value) if value.len() <= 7 => Some(value.to_string()),
        Some(value) => return Err(invalid("vesselIMO", value)),
    };
    let service = single(&pairs, "service").map(str::to_string);

    Ok(P2pQuery {
        point_from,
        point_to,
        start_date_type,
        start_date,
        search_range,
        scac,
        direct_only,
        transhipment_port,
        vessel_imo,
        service,
    })
}

pub fn parse_voyage_query(raw_query: &str) -> Result<VoyageQuery, ApiError> {
    let pairs = pairs(raw_query)?;
    reject_unknown(&pairs, &VOYAGE_PARAMS)?;

    let mut scac = Vec::new();
    for (key, value) in &pairs {
        if key == "scac" {
            scac.push(
                value
                    .parse::<Scac>()
                    .map_err(|_| invalid("scac", value))?,
            );
        }
    }
    if scac.is_empty() {
        return Err(invalid("scac", "<missing>"));
    }

    let vessel_imo = match single(&pairs, "vesselIMO") {
        Some(value) if !value.is_empty() && value.len() <= 7 => value.to_string(),
        Some(value) => return Err(invalid("vesselIMO", value)),
        None => return Err(invalid("vesselIMO", "<missing>")),
    };
    let start_date = match single(&pairs, "startDate") {
        None => None,
        Some(value) => Some(validate_date("startDate", value)?),
    };
    let date_range = match single(&pairs, "dateRange") {
        None => None,
        Some(value) => Some(
            value
                .parse::<i64>()
                .map_err(|_| invalid("dateRange", value))?,
        ),
    };

    Ok(VoyageQuery {
        scac,
        vessel_imo,
        voyage_num: single(&pairs, "voyageNum")
            .map(str::to_string)
            .filter(|v| !v.is_empty()),
        start_date,
        date_range,
    })
}
