//! Shared types, error enum, and tracked-entity records for planeradar-core.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// All errors produced by planeradar-core.
#[derive(Debug, Error)]
pub enum RadarError {
    #[error("record too short: expected {expected} fields, got {actual}")]
    ShortRecord { expected: usize, actual: usize },
    #[error("invalid {field}: {value:?}")]
    InvalidField { field: &'static str, value: String },
    #[error("invalid timestamp: {0:?}")]
    InvalidTimestamp(String),
    #[error("store error: {0}")]
    Store(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("metadata error: {0}")]
    Metadata(String),
    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, RadarError>;

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// Registration/type/operator enrichment for one airframe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AircraftInfo {
    pub registration: String,
    pub typecode: String,
    pub operator: String,
}

// ---------------------------------------------------------------------------
// Aircraft identity
// ---------------------------------------------------------------------------

/// One flight of one airframe, keyed by hex address while it stays active.
///
/// `id` is assigned by the store on creation. Counters and enrichment are
/// mutated in memory and only written back on eviction or when a running
/// minimum improves.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AircraftIdentity {
    pub id: i64,
    pub hex_ident: String,
    pub callsign: String,
    pub first_generated: NaiveDateTime,
    pub first_received: DateTime<Utc>,
    pub last_generated: NaiveDateTime,
    pub last_received: DateTime<Utc>,
    pub message_count: u64,
    pub registration: Option<String>,
    pub typecode: Option<String>,
    pub operator: Option<String>,
    pub closest_dist: Option<f64>,
    pub lowest_alt: Option<i32>,
}

impl AircraftIdentity {
    /// Fresh identity with zero messages and no durable id yet.
    pub fn new(
        hex_ident: &str,
        callsign: &str,
        generated: NaiveDateTime,
        received: DateTime<Utc>,
        info: Option<&AircraftInfo>,
    ) -> Self {
        AircraftIdentity {
            id: 0,
            hex_ident: hex_ident.to_string(),
            callsign: callsign.to_string(),
            first_generated: generated,
            first_received: received,
            last_generated: generated,
            last_received: received,
            message_count: 0,
            registration: info.and_then(|i| non_empty(&i.registration)),
            typecode: info.and_then(|i| non_empty(&i.typecode)),
            operator: info.and_then(|i| non_empty(&i.operator)),
            closest_dist: None,
            lowest_alt: None,
        }
    }

    /// Overwrite enrichment fields from the metadata lookup.
    pub fn apply_info(&mut self, info: Option<&AircraftInfo>) {
        self.registration = info.and_then(|i| non_empty(&i.registration));
        self.typecode = info.and_then(|i| non_empty(&i.typecode));
        self.operator = info.and_then(|i| non_empty(&i.operator));
    }

    /// True if the identity received a message at or after `since`.
    pub fn is_active_since(&self, since: DateTime<Utc>) -> bool {
        self.last_received >= since
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// Position report
// ---------------------------------------------------------------------------

/// A persisted position: sequence 0 is the origin, sequence >= 1 the
/// rolling latest report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionReport {
    pub id: i64,
    pub hex_ident: String,
    pub identity_id: i64,
    pub lat: f64,
    pub lon: f64,
    pub altitude_ft: i32,
    pub distance_km: f64,
    pub bearing_rad: f64,
    pub generated: NaiveDateTime,
    pub received: DateTime<Utc>,
    pub sequence: u32,
}

impl PositionReport {
    pub fn is_origin(&self) -> bool {
        self.sequence == 0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_identity_new_starts_at_zero() {
        let info = AircraftInfo {
            registration: "D-AIBA".into(),
            typecode: "A319".into(),
            operator: String::new(),
        };
        let id = AircraftIdentity::new("3C6481", "DLH4AB", ts(), ts().and_utc(), Some(&info));
        assert_eq!(id.message_count, 0);
        assert_eq!(id.registration.as_deref(), Some("D-AIBA"));
        assert_eq!(id.typecode.as_deref(), Some("A319"));
        assert!(id.operator.is_none());
        assert!(id.closest_dist.is_none());
    }

    #[test]
    fn test_apply_info_clears_missing() {
        let info = AircraftInfo {
            registration: "D-AIBA".into(),
            ..Default::default()
        };
        let mut id = AircraftIdentity::new("3C6481", "DLH4AB", ts(), ts().and_utc(), Some(&info));
        id.apply_info(None);
        assert!(id.registration.is_none());
    }

    #[test]
    fn test_error_display() {
        let err = RadarError::ShortRecord {
            expected: 22,
            actual: 5,
        };
        assert_eq!(err.to_string(), "record too short: expected 22 fields, got 5");
    }
}
