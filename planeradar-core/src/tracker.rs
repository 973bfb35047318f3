//! Record dispatch: one decoded feed line in, state updates out.
//!
//! Pure logic. Owns the identity cache, position tracker, closest-aircraft
//! selector and the metadata lookup; the caller supplies the clock and the
//! store and decides what to do with the returned [`TrackOutcome`].

use chrono::{DateTime, Utc};

use crate::geodesy::ObserverLocation;
use crate::identity::IdentityCache;
use crate::metadata::AircraftDatabase;
use crate::position::PositionTracker;
use crate::sbs::{decode_line, IdentificationMsg, PositionMsg, SbsRecord};
use crate::selector::{ClosestSelector, SelectionChange};
use crate::store::RadarStore;
use crate::types::{PositionReport, RadarError, Result};

/// What a single record did.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackOutcome {
    /// Identification applied to this identity.
    Identified { identity_id: i64, hex_ident: String },
    /// Position stored; `change` says which selector slots moved.
    Positioned {
        report: PositionReport,
        change: SelectionChange,
    },
    /// Position for an aircraft with no active identity.
    Skipped { hex_ident: String },
    /// Not a record type the tracker acts on.
    Ignored,
}

pub struct Tracker {
    identities: IdentityCache,
    positions: PositionTracker,
    selector: ClosestSelector,
    metadata: AircraftDatabase,

    // Counters
    pub total_lines: u64,
    pub decode_failures: u64,
    pub identifications: u64,
    pub positions_stored: u64,
    pub positions_skipped: u64,
}

impl Tracker {
    pub fn new(observer: ObserverLocation, metadata: AircraftDatabase, cache_capacity: usize) -> Self {
        Tracker {
            identities: IdentityCache::new(cache_capacity),
            positions: PositionTracker::new(observer),
            selector: ClosestSelector::new(),
            metadata,
            total_lines: 0,
            decode_failures: 0,
            identifications: 0,
            positions_stored: 0,
            positions_skipped: 0,
        }
    }

    /// Decode and apply one feed line. Decode and persistence errors are
    /// returned for the caller to log; they leave no partial state behind.
    pub fn process_line<S: RadarStore + ?Sized>(
        &mut self,
        line: &str,
        now: DateTime<Utc>,
        store: &mut S,
    ) -> Result<TrackOutcome> {
        self.total_lines += 1;
        let record = decode_line(line).inspect_err(|_| self.decode_failures += 1)?;
        self.update(&record, now, store)
    }

    /// Apply an already decoded record.
    pub fn update<S: RadarStore + ?Sized>(
        &mut self,
        record: &SbsRecord,
        now: DateTime<Utc>,
        store: &mut S,
    ) -> Result<TrackOutcome> {
        match record {
            SbsRecord::Identification(msg) => self.identify(msg, now, store),
            SbsRecord::Position(msg) => self.position(msg, now, store),
            SbsRecord::Ignored => Ok(TrackOutcome::Ignored),
        }
    }

    fn identify<S: RadarStore + ?Sized>(
        &mut self,
        msg: &IdentificationMsg,
        now: DateTime<Utc>,
        store: &mut S,
    ) -> Result<TrackOutcome> {
        let info = self.metadata.lookup(&msg.hex_ident);
        let identity = self.identities.handle_identification(msg, info, now, store)?;
        self.selector.refresh_identity(identity);
        self.identifications += 1;
        Ok(TrackOutcome::Identified {
            identity_id: identity.id,
            hex_ident: identity.hex_ident.clone(),
        })
    }

    fn position<S: RadarStore + ?Sized>(
        &mut self,
        msg: &PositionMsg,
        now: DateTime<Utc>,
        store: &mut S,
    ) -> Result<TrackOutcome> {
        let Some(idx) = self.identities.resolve(&msg.hex_ident, now, store)? else {
            log::debug!("no active identity for {}, position skipped", msg.hex_ident);
            self.positions_skipped += 1;
            return Ok(TrackOutcome::Skipped {
                hex_ident: msg.hex_ident.clone(),
            });
        };
        let identity = self
            .identities
            .get_mut(idx)
            .ok_or_else(|| RadarError::Store("cache index out of range".into()))?;

        let report = self.positions.record(msg, identity, now, store)?;
        let change = self.selector.offer(&report, identity);
        self.positions_stored += 1;
        Ok(TrackOutcome::Positioned { report, change })
    }

    /// Write every cached identity back to the store. Returns the count
    /// written.
    pub fn flush<S: RadarStore + ?Sized>(&mut self, store: &mut S) -> usize {
        self.identities.flush(store)
    }

    pub fn selector(&self) -> &ClosestSelector {
        &self.selector
    }

    pub fn identities(&self) -> &IdentityCache {
        &self.identities
    }

    pub fn observer(&self) -> ObserverLocation {
        self.positions.observer()
    }

    pub fn metadata(&self) -> &AircraftDatabase {
        &self.metadata
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
