//! Canonical data model shared by every carrier integration.
//!
//! Carrier parsers map vendor payloads into these types; the streaming
//! pipeline validates and serializes them without further transformation.

mod query;
mod schedule;
mod validate;
mod voyage;

pub use query::{P2pQuery, Scac, StartDateType, VoyageQuery};
pub use schedule::{
    Cutoff, Leg, P2PSchedule, PointBase, ServiceInfo, Transportation, TransportType, Voyage,
};
pub use validate::{is_iso_local_date, is_valid_imo, is_valid_port_code, ValidationIssues};
pub use voyage::{
    MasterVesselSchedule, Port, PortCall, PortEvent, ScalarOrList, ScheduleRow, VesselDetails,
};
