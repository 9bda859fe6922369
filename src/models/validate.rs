//! Shared validation primitives for the canonical schema.

use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;

/// ISO local timestamp layout used everywhere in the canonical model.
pub const ISO_LOCAL: &str = "%Y-%m-%dT%H:%M:%S";

static PORT_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{2}[A-Z0-9]{3}$").unwrap());
static IMO: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{7}$").unwrap());

/// UN/LOCODE: two country letters followed by three alphanumerics.
pub fn is_valid_port_code(code: &str) -> bool {
    PORT_CODE.is_match(code)
}

/// Seven-digit IMO vessel number.
pub fn is_valid_imo(imo: &str) -> bool {
    IMO.is_match(imo)
}

/// `YYYY-MM-DDTHH:MM:SS` with no offset.
pub fn is_iso_local_date(value: &str) -> bool {
    NaiveDateTime::parse_from_str(value, ISO_LOCAL).is_ok()
}

pub fn parse_iso_local(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, ISO_LOCAL).ok()
}

/// Accumulates validation failures for one canonical record.
///
/// A record with any issue is dropped from the aggregate rather than
/// failing the whole request.
#[derive(Debug, Default)]
pub struct ValidationIssues {
    issues: Vec<String>,
}

impl ValidationIssues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, issue: impl Into<String>) {
        self.issues.push(issue.into());
    }

    pub fn require(&mut self, ok: bool, issue: impl Into<String>) {
        if !ok {
            self.push(issue);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn into_result(self) -> Result<(), Vec<String>> {
        if self.issues.is_empty() {
            Ok(())
        } else {
            Err(self.issues)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_code_shape() {
        assert!(is_valid_port_code("HKHKG"));
        assert!(is_valid_port_code("DEHAM"));
        assert!(is_valid_port_code("US9C9"));
        assert!(!is_valid_port_code("hkhkg"));
        assert!(!is_valid_port_code("HKHK"));
        assert!(!is_valid_port_code("1KHKG"));
        assert!(!is_valid_port_code("HKHKGX"));
    }

    #[test]
    fn imo_shape() {
        assert!(is_valid_imo("9839272"));
        assert!(!is_valid_imo("983927"));
        assert!(!is_valid_imo("98392722"));
        assert!(!is_valid_imo("983927a"));
    }

    #[test]
    fn iso_local_dates() {
        assert!(is_iso_local_date("2025-01-06T00:00:00"));
        assert!(!is_iso_local_date("2025-01-06"));
        assert!(!is_iso_local_date("2025-01-06T00:00:00Z"));
        assert!(!is_iso_local_date("2025-01-06T00:00:00+01:00"));
    }
}
