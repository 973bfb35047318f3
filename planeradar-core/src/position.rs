//! Position tracker: origin plus one rolling report per identity.
//!
//! The first position of an identity is kept forever as sequence 0. The
//! second creates the rolling row (sequence 1); every later position
//! overwrites that row and bumps its sequence. No further rows are added.

use chrono::{DateTime, Utc};

use crate::geodesy::ObserverLocation;
use crate::sbs::PositionMsg;
use crate::store::RadarStore;
use crate::types::{AircraftIdentity, PositionReport, Result};

#[derive(Debug, Clone)]
pub struct PositionTracker {
    observer: ObserverLocation,
}

impl PositionTracker {
    pub fn new(observer: ObserverLocation) -> Self {
        PositionTracker { observer }
    }

    pub fn observer(&self) -> ObserverLocation {
        self.observer
    }

    /// Persist `msg` for `identity` and update the identity's running
    /// minima. Returns the report as written.
    pub fn record<S: RadarStore + ?Sized>(
        &self,
        msg: &PositionMsg,
        identity: &mut AircraftIdentity,
        now: DateTime<Utc>,
        store: &mut S,
    ) -> Result<PositionReport> {
        let distance_km = self.observer.distance_to(msg.lat, msg.lon);
        let bearing_rad = self.observer.bearing_to(msg.lat, msg.lon);

        let report = match store.find_origin_position(identity.id)? {
            None => self.create(msg, identity, distance_km, bearing_rad, now, 0, store)?,
            Some(_) => match store.find_rolling_position(identity.id)? {
                None => self.create(msg, identity, distance_km, bearing_rad, now, 1, store)?,
                Some(mut rolling) => {
                    rolling.hex_ident = msg.hex_ident.clone();
                    rolling.lat = msg.lat;
                    rolling.lon = msg.lon;
                    rolling.altitude_ft = msg.altitude_ft;
                    rolling.distance_km = distance_km;
                    rolling.bearing_rad = bearing_rad;
                    rolling.generated = msg.generated;
                    rolling.received = now;
                    rolling.sequence += 1;
                    store.update_position(&rolling)?;
                    rolling
                }
            },
        };

        log::debug!(
            "Position stored (id: {}, hex_ident: {}, callsign_id: {}, seq: {})",
            report.id,
            report.hex_ident,
            report.identity_id,
            report.sequence
        );

        if update_minima(identity, distance_km, msg.altitude_ft) {
            if let Err(e) = store.update_identity(identity) {
                log::error!(
                    "failed to persist minima for identity {} ({}): {e}",
                    identity.id,
                    identity.hex_ident
                );
            }
        }

        Ok(report)
    }

    #[allow(clippy::too_many_arguments)]
    fn create<S: RadarStore + ?Sized>(
        &self,
        msg: &PositionMsg,
        identity: &AircraftIdentity,
        distance_km: f64,
        bearing_rad: f64,
        now: DateTime<Utc>,
        sequence: u32,
        store: &mut S,
    ) -> Result<PositionReport> {
        let mut report = PositionReport {
            id: 0,
            hex_ident: msg.hex_ident.clone(),
            identity_id: identity.id,
            lat: msg.lat,
            lon: msg.lon,
            altitude_ft: msg.altitude_ft,
            distance_km,
            bearing_rad,
            generated: msg.generated,
            received: now,
            sequence,
        };
        report.id = store.create_position(&report)?;
        Ok(report)
    }
}

/// Lower `closest_dist` / `lowest_alt` where the new values improve them.
/// Returns true if either changed.
pub fn update_minima(identity: &mut AircraftIdentity, distance_km: f64, altitude_ft: i32) -> bool {
    let mut improved = false;
    if identity.closest_dist.map_or(true, |d| distance_km < d) {
        identity.closest_dist = Some(distance_km);
        improved = true;
    }
    if identity.lowest_alt.map_or(true, |a| altitude_ft < a) {
        identity.lowest_alt = Some(altitude_ft);
        improved = true;
    }
    improved
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::MemoryStore;
    use chrono::{NaiveDate, NaiveDateTime, TimeZone};

    fn gen_time() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn tracker() -> PositionTracker {
        PositionTracker::new(ObserverLocation::from_degrees(50.036, 8.553))
    }

    fn identity(store: &mut MemoryStore) -> AircraftIdentity {
        let mut id = AircraftIdentity::new("3C6481", "DLH4AB", gen_time(), now(), None);
        id.id = store.create_identity(&id).unwrap();
        id
    }

    fn pos(lat: f64, alt: i32) -> PositionMsg {
        PositionMsg {
            hex_ident: "3C6481".into(),
            generated: gen_time(),
            altitude_ft: alt,
            lat,
            lon: 8.553,
        }
    }

    #[test]
    fn test_first_position_is_origin() {
        let mut store = MemoryStore::default();
        let mut ident = identity(&mut store);
        let report = tracker()
            .record(&pos(50.136, 5000), &mut ident, now(), &mut store)
            .unwrap();
        assert!(report.is_origin());
        assert_eq!(report.identity_id, ident.id);
        assert!((report.distance_km - 11.12).abs() < 0.015);
        assert!(report.bearing_rad.abs() < 1e-9);
    }

    #[test]
    fn test_at_most_two_reports() {
        let mut store = MemoryStore::default();
        let mut ident = identity(&mut store);
        let t = tracker();
        for i in 0..10 {
            let lat = 50.2 - f64::from(i) * 0.01;
            t.record(&pos(lat, 10000), &mut ident, now(), &mut store)
                .unwrap();
        }
        let rows = store.positions_for(ident.id);
        assert_eq!(rows.len(), 2);
        let origin = rows.iter().find(|p| p.sequence == 0).unwrap();
        let rolling = rows.iter().find(|p| p.sequence > 0).unwrap();
        assert_eq!(origin.lat, 50.2);
        assert_eq!(rolling.sequence, 9);
        assert!((rolling.lat - 50.11).abs() < 1e-9);
    }

    #[test]
    fn test_second_position_creates_rolling() {
        let mut store = MemoryStore::default();
        let mut ident = identity(&mut store);
        let t = tracker();
        t.record(&pos(50.2, 10000), &mut ident, now(), &mut store)
            .unwrap();
        let second = t
            .record(&pos(50.19, 10000), &mut ident, now(), &mut store)
            .unwrap();
        assert_eq!(second.sequence, 1);
        assert_ne!(second.id, store.find_origin_position(ident.id).unwrap().unwrap().id);
    }

    #[test]
    fn test_minima_updated_and_persisted_on_improvement() {
        let mut store = MemoryStore::default();
        let mut ident = identity(&mut store);
        let t = tracker();
        t.record(&pos(50.3, 12000), &mut ident, now(), &mut store)
            .unwrap();
        let writes = store.identity_writes;
        assert_eq!(ident.lowest_alt, Some(12000));

        // Further away and higher: no identity write.
        t.record(&pos(50.4, 13000), &mut ident, now(), &mut store)
            .unwrap();
        assert_eq!(store.identity_writes, writes);
        assert_eq!(ident.lowest_alt, Some(12000));

        // Closer: persisted.
        t.record(&pos(50.1, 13000), &mut ident, now(), &mut store)
            .unwrap();
        assert_eq!(store.identity_writes, writes + 1);
        let stored = store.identity(ident.id).unwrap();
        assert_eq!(stored.closest_dist, ident.closest_dist);
    }

    #[test]
    fn test_write_failure_no_side_effects() {
        let mut store = MemoryStore::default();
        let mut ident = identity(&mut store);
        store.fail_writes = true;
        let result = tracker().record(&pos(50.136, 5000), &mut ident, now(), &mut store);
        assert!(result.is_err());
        assert!(ident.closest_dist.is_none());
        assert!(store.positions.is_empty());
    }

    #[test]
    fn test_update_minima() {
        let mut ident = AircraftIdentity::new("3C6481", "DLH4AB", gen_time(), now(), None);
        assert!(update_minima(&mut ident, 10.0, 5000));
        assert!(!update_minima(&mut ident, 10.0, 5000));
        assert!(update_minima(&mut ident, 12.0, 4000));
        assert_eq!(ident.closest_dist, Some(10.0));
        assert_eq!(ident.lowest_alt, Some(4000));
    }
}
