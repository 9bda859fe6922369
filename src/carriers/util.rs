//! Shared conversion helpers for carrier parsers.

use chrono::{DateTime, Days, NaiveDate, NaiveDateTime};

use crate::models::{StartDateType, TransportType};
use crate::models::is_valid_imo as imo_shape;

pub use crate::models::is_valid_imo;

/// Canonical timestamp layout every vendor date normalizes to.
pub const ISO_LOCAL: &str = "%Y-%m-%dT%H:%M:%S";

/// Query-date layout of the inbound API.
pub const QUERY_DATE: &str = "%Y-%m-%d";

/// Converts a vendor timestamp to the canonical wall-clock layout. Any tz
/// offset in the vendor layout is discarded, not converted. Returns `None`
/// for empty or unparseable input.
pub fn normalize_date(value: &str, vendor_layout: &str) -> Option<String> {
    if value.is_empty() {
        return None;
    }
    if NaiveDateTime::parse_from_str(value, ISO_LOCAL).is_ok() {
        return Some(value.to_string());
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(value, vendor_layout) {
        return Some(parsed.format(ISO_LOCAL).to_string());
    }
    if let Ok(parsed) = DateTime::parse_from_str(value, vendor_layout) {
        return Some(parsed.naive_local().format(ISO_LOCAL).to_string());
    }
    None
}

/// Whole days between two canonical timestamps, floored, never negative.
pub fn transit_days(etd: Option<&str>, eta: Option<&str>) -> i64 {
    let (Some(etd), Some(eta)) = (etd, eta) else {
        return 0;
    };
    let (Ok(etd), Ok(eta)) = (
        NaiveDateTime::parse_from_str(etd, ISO_LOCAL),
        NaiveDateTime::parse_from_str(eta, ISO_LOCAL),
    ) else {
        return 0;
    };
    ((eta - etd).num_hours() / 24).max(0)
}

/// Vendor transport-mode codes seen across upstream payloads.
pub fn transport_type_from_code(code: &str) -> TransportType {
    match code {
        "Land Trans" | "TRK" => TransportType::Truck,
        "Feeder" | "FEF" | "FEO" | "VSF" | "VSL" => TransportType::Feeder,
        "BAR" | "BCO" => TransportType::Barge,
        "RCO" | "RR" => TransportType::Rail,
        _ => TransportType::Vessel,
    }
}

/// Free-text transport mode, e.g. `FEEDER`, `Road/Rail`, `truck`.
pub fn transport_type_from_label(label: &str) -> TransportType {
    let squashed: String = label.chars().filter(|c| *c != '/').collect();
    match squashed.to_ascii_lowercase().as_str() {
        "barge" => TransportType::Barge,
        "feeder" => TransportType::Feeder,
        "truck" => TransportType::Truck,
        "rail" => TransportType::Rail,
        "truckrail" => TransportType::Truckrail,
        "roadrail" => TransportType::Roadrail,
        "road" => TransportType::Road,
        "intermodal" => TransportType::Intermodal,
        _ => TransportType::Vessel,
    }
}

/// Title-case of a vendor mode label with any `/` squashed out, matching
/// the canonical `transportType` spelling.
pub fn title_case_mode(label: &str) -> String {
    let squashed: String = label.chars().filter(|c| *c != '/').collect();
    let mut chars = squashed.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

/// Direction code derived from the trailing character of a voyage number.
pub fn voyage_direction(voyage: &str) -> &'static str {
    match voyage.chars().last() {
        Some('W') => "WBO",
        Some('E') => "EBO",
        Some('N') => "NBO",
        Some('S') => "SBO",
        _ => "UNK",
    }
}

/// An IMO usable as a vessel reference: seven digits and not the all-zero
/// placeholder some vendors send.
pub fn usable_imo(imo: &str) -> bool {
    imo_shape(imo) && imo != "0000000"
}

/// P2P search window: start of `start_date` through `search_range` weeks
/// later, both rendered in `layout`.
pub fn p2p_window(
    start_date: &str,
    search_range_weeks: i64,
    layout: &str,
) -> Option<(String, String)> {
    let start = NaiveDate::parse_from_str(start_date, QUERY_DATE).ok()?;
    let end = start.checked_add_days(Days::new((search_range_weeks * 7) as u64))?;
    let midnight = |d: NaiveDate| d.and_hms_opt(0, 0, 0).expect("midnight");
    Some((
        midnight(start).format(layout).to_string(),
        midnight(end).format(layout).to_string(),
    ))
}

const VOYAGE_WINDOW_MIN_BACK: i64 = 20;
const VOYAGE_WINDOW_MIN_FORWARD: i64 = 150;

/// Voyage lookup window around `start_date`, widened to the vendor minimums.
pub fn voyage_window(start_date: &str, date_range: i64) -> Option<(String, String)> {
    let date = NaiveDate::parse_from_str(start_date, QUERY_DATE).ok()?;
    let back = date_range.max(VOYAGE_WINDOW_MIN_BACK);
    let forward = date_range.max(VOYAGE_WINDOW_MIN_FORWARD);
    Some((
        date.checked_sub_days(Days::new(back as u64))?
            .format(QUERY_DATE)
            .to_string(),
        date.checked_add_days(Days::new(forward as u64))?
            .format(QUERY_DATE)
            .to_string(),
    ))
}

/// End date `weeks` weeks after `start_date`, same `YYYY-MM-DD` layout.
pub fn end_date_after_weeks(start_date: &str, weeks: i64) -> Option<String> {
    end_date_after_days(start_date, weeks * 7)
}

/// End date `days` days after `start_date`, same `YYYY-MM-DD` layout.
pub fn end_date_after_days(start_date: &str, days: i64) -> Option<String> {
    let date = NaiveDate::parse_from_str(start_date, QUERY_DATE).ok()?;
    Some(
        date.checked_add_days(Days::new(days as u64))?
            .format(QUERY_DATE)
            .to_string(),
    )
}

/// Vendor spelling of the departure/arrival pivot.
pub fn is_departure(start_date_type: StartDateType) -> bool {
    start_date_type == StartDateType::Departure
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_normalized_dates_pass_through() {
        assert_eq!(
            normalize_date("2025-01-06T10:00:00", "%Y-%m-%d %H:%M:%S").as_deref(),
            Some("2025-01-06T10:00:00")
        );
    }

    #[test]
    fn offset_layouts_discard_the_offset() {
        assert_eq!(
            normalize_date("2025-01-06T10:00:00.000+08:00", "%Y-%m-%dT%H:%M:%S%.3f%:z").as_deref(),
            Some("2025-01-06T10:00:00")
        );
    }

    #[test]
    fn space_separated_layouts_normalize() {
        assert_eq!(
            normalize_date("2025-01-06 10:00:00", "%Y-%m-%d %H:%M:%S").as_deref(),
            Some("2025-01-06T10:00:00")
        );
    }

    #[test]
    fn unparseable_dates_are_none() {
        assert_eq!(normalize_date("", "%Y-%m-%d %H:%M:%S"), None);
        assert_eq!(normalize_date("not a date", "%Y-%m-%d %H:%M:%S"), None);
    }

    #[test]
    fn transit_days_floor_and_clamp() {
        assert_eq!(
            transit_days(Some("2025-01-06T10:00:00"), Some("2025-01-11T08:00:00")),
            4
        );
        assert_eq!(
            transit_days(Some("2025-01-11T08:00:00"), Some("2025-01-06T10:00:00")),
            0
        );
        assert_eq!(transit_days(None, Some("2025-01-06T10:00:00")), 0);
    }

    #[test]
    fn vendor_mode_codes_map() {
        assert_eq!(transport_type_from_code("Land Trans"), TransportType::Truck);
        assert_eq!(transport_type_from_code("FEF"), TransportType::Feeder);
        assert_eq!(transport_type_from_code("BCO"), TransportType::Barge);
        assert_eq!(transport_type_from_code("RR"), TransportType::Rail);
        assert_eq!(transport_type_from_code("anything"), TransportType::Vessel);
    }

    #[test]
    fn mode_labels_squash_slashes() {
        assert_eq!(transport_type_from_label("ROAD/RAIL"), TransportType::Roadrail);
        assert_eq!(transport_type_from_label("FEEDER"), TransportType::Feeder);
        assert_eq!(transport_type_from_label("unknown"), TransportType::Vessel);
        assert_eq!(title_case_mode("ROAD/RAIL"), "Roadrail");
    }

    #[test]
    fn directions_come_from_the_last_character() {
        assert_eq!(voyage_direction("101W"), "WBO");
        assert_eq!(voyage_direction("101E"), "EBO");
        assert_eq!(voyage_direction("101N"), "NBO");
        assert_eq!(voyage_direction("101S"), "SBO");
        assert_eq!(voyage_direction("101X"), "UNK");
        assert_eq!(voyage_direction(""), "UNK");
    }

    #[test]
    fn p2p_window_spans_whole_weeks() {
        let (start, end) = p2p_window("2025-01-06", 2, "%Y-%m-%dT%H:%M:%S%.3fZ").unwrap();
        assert_eq!(start, "2025-01-06T00:00:00.000Z");
        assert_eq!(end, "2025-01-20T00:00:00.000Z");
    }

    #[test]
    fn voyage_window_honors_minimums() {
        let (start, end) = voyage_window("2025-03-01", 0).unwrap();
        assert_eq!(start, "2025-02-09");
        assert_eq!(end, "2025-07-29");

        let (start, _) = voyage_window("2025-03-01", 40).unwrap();
        assert_eq!(start, "2025-01-20");
    }

    #[test]
    fn placeholder_imo_is_unusable() {
        assert!(usable_imo("9839272"));
        assert!(!usable_imo("0000000"));
        assert!(!usable_imo("123"));
    }
}
