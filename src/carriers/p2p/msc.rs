//! MSC adapter (MSCU). The token endpoint wants an RS256 client-assertion
//! JWT whose x5t header is the base64 form of a hex certificate thumbprint.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::carriers::util::{end_date_after_weeks, is_departure, transit_days};
use crate::carriers::{
    CarrierError, RequestParts, ScheduleArgs, ScheduleParser, TokenProvider,
};
use crate::env::EnvManager;
use crate::models::{
    Cutoff, Leg, P2PSchedule, P2pQuery, PointBase, ServiceInfo, Transportation, TransportType,
    Voyage,
};

#[derive(Debug, Deserialize)]
struct MscResponse {
    #[serde(rename = "MSCSchedule", default)]
    msc_schedule: MscSchedules,
}

#[derive(Debug, Deserialize, Default)]
struct MscSchedules {
    #[serde(rename = "Transactions", default)]
    transactions: Vec<MscTransaction>,
}

#[derive(Debug, Deserialize)]
struct MscTransaction {
    #[serde(rename = "Schedules", default)]
    schedules: Vec<MscLeg>,
}

#[derive(Debug, Deserialize)]
struct MscLeg {
    #[serde(rename = "Voyages", default)]
    voyages: Vec<MscVoyage>,
    #[serde(rename = "TransportationMeansName", default)]
    transportation_means_name: String,
    #[serde(rename = "IMONumber", default)]
    imo_number: String,
    #[serde(rename = "Service")]
    service: Option<MscService>,
    #[serde(rename = "Calls", default)]
    calls: Vec<MscCall>,
}

#[derive(Debug, Deserialize)]
struct MscVoyage {
    #[serde(rename = "Description", default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct MscService {
    #[serde(rename = "Description", default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct MscCall {
    #[serde(rename = "Code", default)]
    code: String,
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "EHF", default)]
    ehf: MscEhf,
    #[serde(rename = "CallDates", default)]
    call_dates: Vec<MscCallDate>,
    #[serde(rename = "DepartureEHFSMDGCode", default)]
    departure_ehf_smdg_code: String,
}

#[derive(Debug, Deserialize, Default)]
struct MscEhf {
    #[serde(rename = "Description", default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct MscCallDate {
    #[serde(rename = "Type", default)]
    date_type: String,
    #[serde(rename = "CallDateTime", default)]
    call_date_time: String,
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    aud: &'a str,
    iss: &'a str,
    sub: &'a str,
    exp: i64,
    nbf: i64,
}

pub struct MscParser;

impl MscParser {
    fn call_date(call: &MscCall, date_type: &str) -> Option<String> {
        call.call_dates
            .iter()
            .find(|d| d.date_type == date_type)
            .map(|d| d.call_date_time.clone())
            .filter(|s| !s.is_empty())
    }

    fn point(call: &MscCall) -> PointBase {
        PointBase {
            location_name: Some(call.name.clone()).filter(|s| !s.is_empty()),
            location_code: call.code.clone(),
            terminal_name: Some(call.ehf.description.clone()).filter(|s| !s.is_empty()),
            terminal_code: Some(call.departure_ehf_smdg_code.clone()).filter(|s| !s.is_empty()),
        }
    }

    fn leg(leg: &MscLeg) -> Option<Leg> {
        let (origin, destination) = match leg.calls.as_slice() {
            [origin, destination, ..] => (origin, destination),
            _ => return None,
        };
        let etd = Self::call_date(origin, "ETD");
        let eta = Self::call_date(destination, "ETA");
        Some(Leg {
            point_from: Self::point(origin),
            point_to: Self::point(destination),
            etd: etd.clone().unwrap_or_default(),
            eta: eta.clone().unwrap_or_default(),
            transit_time: transit_days(etd.as_deref(), eta.as_deref()),
            cutoffs: Cutoff::from_parts(
                Self::call_date(origin, "CYCUTOFF"),
                Self::call_date(origin, "SI"),
                Self::call_date(origin, "VGM"),
            ),
            transportations: Transportation::new(
                TransportType::Vessel,
                leg.transportation_means_name.clone(),
                Some("IMO".to_string()),
                Some(leg.imo_number.clone()).filter(|s| !s.is_empty()),
            ),
            voyages: Voyage::internal_or_tbn(
                leg.voyages
                    .first()
                    .map(|v| v.description.clone())
                    .unwrap_or_default(),
            ),
            services: ServiceInfo::from_parts(
                leg.service.as_ref().map(|s| s.description.clone()),
                None,
            ),
        })
    }

    fn signed_assertion(env: &EnvManager) -> Result<String, CarrierError> {
        let thumbprint = hex::decode(&env.msc_thumbprint)
            .map_err(|err| CarrierError::Auth(format!("bad thumbprint hex: {err}")))?;
        let rsa_pem = BASE64
            .decode(&env.msc_rsa_key)
            .map_err(|err| CarrierError::Auth(format!("bad rsa key base64: {err}")))?;
        let key = EncodingKey::from_rsa_pem(&rsa_pem)
            .map_err(|err| CarrierError::Auth(format!("bad rsa key: {err}")))?;

        let mut header = Header::new(Algorithm::RS256);
        header.x5t = Some(BASE64.encode(thumbprint));
        header.typ = Some("JWT".to_string());

        let now = Utc::now();
        let claims = AssertionClaims {
            aud: &env.msc_audience,
            iss: &env.msc_client,
            sub: &env.msc_client,
            exp: (now + ChronoDuration::hours(2)).timestamp(),
            nbf: now.timestamp(),
        };
        jsonwebtoken::encode(&header, &claims, &key)
            .map_err(|err| CarrierError::Auth(format!("assertion signing failed: {err}")))
    }
}

impl TokenProvider for MscParser {
    fn token_request(&self, env: &EnvManager) -> Result<RequestParts, CarrierError> {
        let assertion = Self::signed_assertion(env)?;
        Ok(RequestParts::default()
            .header("Content-Type", "application/x-www-form-urlencoded")
            .param("scope", env.msc_scope.clone())
            .param("client_id", env.msc_client.clone())
            .param(
                "client_assertion_type",
                "urn:ietf:params:oauth:client-assertion-type:jwt-bearer",
            )
            .param("grant_type", "client_credentials")
            .param("client_assertion", assertion))
    }
}

impl ScheduleParser<Vec<P2PSchedule>, P2pQuery> for MscParser {
    fn schedule_request(
        &self,
        args: &ScheduleArgs<'_, P2pQuery>,
    ) -> Result<RequestParts, CarrierError> {
        let access_token = args
            .token
            .as_ref()
            .and_then(|t| t.get("access_token"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| CarrierError::Auth("token response had no access_token".into()))?;
        let to_date = end_date_after_weeks(&args.query.start_date, args.query.search_range)
            .unwrap_or_else(|| args.query.start_date.clone());
        let dates_related = if is_departure(args.query.start_date_type) {
            "POL"
        } else {
            "POD"
        };
        Ok(RequestParts::default()
            .header("Authorization", format!("Bearer {access_token}"))
            .param("fromPortUNCode", args.query.point_from.clone())
            .param("toPortUNCode", args.query.point_to.clone())
            .param("fromDate", args.query.start_date.clone())
            .param("toDate", to_date)
            .param("datesRelated", dates_related))
    }

    fn parse(&self, body: &[u8]) -> Result<Vec<P2PSchedule>, CarrierError> {
        let data: MscResponse = serde_json::from_slice(body)?;
        let mut schedules = Vec::with_capacity(data.msc_schedule.transactions.len());
        for transaction in &data.msc_schedule.transactions {
            let (Some(first), Some(last)) =
                (transaction.schedules.first(), transaction.schedules.last())
            else {
                continue;
            };
            let (Some(origin), Some(destination)) = (first.calls.first(), last.calls.get(1)) else {
                continue;
            };
            let etd = Self::call_date(origin, "ETD");
            let eta = Self::call_date(destination, "ETA");
            schedules.push(P2PSchedule {
                scac: "MSCU".to_string(),
                point_from: origin.code.clone(),
                point_to: destination.code.clone(),
                etd: etd.clone().unwrap_or_default(),
                eta: eta.clone().unwrap_or_default(),
                transit_time: transit_days(etd.as_deref(), eta.as_deref()),
                transshipment: transaction.schedules.len() > 1,
                legs: transaction.schedules.iter().filter_map(Self::leg).collect(),
            });
        }
        Ok(schedules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::test_env;
    use crate::models::{Scac, StartDateType};

    const FIXTURE: &str = r#"{
      "MSCSchedule": {
        "Transactions": [
          {
            "Schedules": [
              {
                "Voyages": [{"Type": "Voy", "Description": "502A", "SeqNo": 1}],
                "TransportationMeansName": "MSC ANNA",
                "IMONumber": "9777204",
                "Service": {"Description": "DRAGON"},
                "Calls": [
                  {
                    "Code": "HKHKG",
                    "Name": "Hong Kong",
                    "EHF": {"Description": "HIT"},
                    "DepartureEHFSMDGCode": "HIT4",
                    "CallDates": [
                      {"Type": "ETD", "CallDateTime": "2025-01-06T18:00:00"},
                      {"Type": "CYCUTOFF", "CallDateTime": "2025-01-05T12:00:00"},
                      {"Type": "SI", "CallDateTime": "2025-01-04T12:00:00"},
                      {"Type": "VGM", "CallDateTime": "2025-01-05T10:00:00"}
                    ]
                  },
                  {
                    "Code": "SGSIN",
                    "Name": "Singapore",
                    "EHF": {"Description": "PSA"},
                    "CallDates": [{"Type": "ETA", "CallDateTime": "2025-01-10T06:00:00"}]
                  }
                ]
              },
              {
                "Voyages": [{"Type": "Voy", "Description": "503W", "SeqNo": 1}],
                "TransportationMeansName": "MSC LORETO",
                "IMONumber": "9941386",
                "Service": {"Description": "LION"},
                "Calls": [
                  {
                    "Code": "SGSIN",
                    "Name": "Singapore",
                    "EHF": {"Description": "PSA"},
                    "CallDates": [{"Type": "ETD", "CallDateTime": "2025-01-12T20:00:00"}]
                  },
                  {
                    "Code": "DEHAM",
                    "Name": "Hamburg",
                    "EHF": {"Description": "EUROGATE"},
                    "CallDates": [{"Type": "ETA", "CallDateTime": "2025-02-03T08:00:00"}]
                  }
                ]
              }
            ]
          }
        ]
      }
    }"#;

    #[test]
    fn parses_fixture_to_canonical() {
        let schedules = MscParser.parse(FIXTURE.as_bytes()).unwrap();
        assert_eq!(schedules.len(), 1);
        let s = &schedules[0];
        assert_eq!(s.scac, "MSCU");
        assert_eq!(s.point_from, "HKHKG");
        assert_eq!(s.point_to, "DEHAM");
        assert_eq!(s.etd, "2025-01-06T18:00:00");
        assert_eq!(s.eta, "2025-02-03T08:00:00");
        assert_eq!(s.transit_time, 27);
        assert!(s.transshipment);
        assert_eq!(s.legs.len(), 2);
        assert_eq!(s.legs[0].voyages.internal_voyage, "502A");
        assert_eq!(s.legs[0].cutoffs.as_ref().unwrap().doc_cutoff_date.as_deref(), Some("2025-01-04T12:00:00"));
        assert!(s.legs[1].cutoffs.is_none());
        assert!(s.validate().is_ok());
    }

    #[test]
    fn fixture_parse_is_deterministic() {
        let first = serde_json::to_vec(&MscParser.parse(FIXTURE.as_bytes()).unwrap()).unwrap();
        let second = serde_json::to_vec(&MscParser.parse(FIXTURE.as_bytes()).unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn schedule_request_pivots_on_date_type() {
        let env = test_env();
        let query = P2pQuery {
            point_from: "HKHKG".into(),
            point_to: "DEHAM".into(),
            start_date_type: StartDateType::Arrival,
            start_date: "2025-01-06".into(),
            search_range: 1,
            scac: vec![Scac::MSCU],
            direct_only: None,
            transhipment_port: None,
            vessel_imo: None,
            service: None,
        };
        let mut token = crate::carriers::TokenData::new();
        token.insert("access_token".into(), serde_json::json!("tok"));
        let args = ScheduleArgs {
            token: Some(token),
            scac: Scac::MSCU,
            env: &env,
            query: &query,
            origin: None,
            destination: None,
        };
        let parts = MscParser.schedule_request(&args).unwrap();
        assert!(parts.params.contains(&("datesRelated".into(), "POD".into())));
        assert!(parts.params.contains(&("toDate".into(), "2025-01-13".into())));
    }

    #[test]
    fn token_request_rejects_bad_key_material() {
        // test_env carries no RSA key, so assertion signing must fail loudly.
        let err = MscParser.token_request(&test_env()).unwrap_err();
        assert!(matches!(err, CarrierError::Auth(_)));
    }
}
