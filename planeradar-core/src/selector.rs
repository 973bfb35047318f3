//! Closest-aircraft selection under two policies.
//!
//! The global slot holds the nearest aircraft by raw distance. The
//! low-altitude slot adds a fixed penalty to aircraft at or above
//! [`PREF_ALT_LIMIT_FT`], so low traffic wins unless a high aircraft is more
//! than [`ALTITUDE_PENALTY_KM`] nearer.

use serde::Serialize;

use crate::types::{AircraftIdentity, PositionReport};

/// Aircraft below this altitude are preferred by the low-altitude slot.
pub const PREF_ALT_LIMIT_FT: i32 = 15000;

/// Distance added to aircraft at or above the limit.
pub const ALTITUDE_PENALTY_KM: f64 = 20.0;

/// Which slot drives presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PriorityMode {
    Nearest,
    LowAltitude,
}

/// Distance used by the low-altitude slot.
pub fn penalty_distance(distance_km: f64, altitude_ft: i32) -> f64 {
    if altitude_ft < PREF_ALT_LIMIT_FT {
        distance_km
    } else {
        distance_km + ALTITUDE_PENALTY_KM
    }
}

/// A slot holder: owned snapshots of the winning report and its identity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Selection {
    pub report: PositionReport,
    pub identity: AircraftIdentity,
}

/// Per-slot change flags from one [`ClosestSelector::offer`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionChange {
    pub global: bool,
    pub low_altitude: bool,
}

impl SelectionChange {
    pub fn any(&self) -> bool {
        self.global || self.low_altitude
    }
}

#[derive(Debug, Clone)]
struct Slot {
    mode: PriorityMode,
    holder: Option<Selection>,
}

impl Slot {
    fn new(mode: PriorityMode) -> Self {
        Slot { mode, holder: None }
    }

    fn score(&self, report: &PositionReport) -> f64 {
        match self.mode {
            PriorityMode::Nearest => report.distance_km,
            PriorityMode::LowAltitude => penalty_distance(report.distance_km, report.altitude_ft),
        }
    }

    fn offer(&mut self, report: &PositionReport, identity: &AircraftIdentity) -> bool {
        let replace = match &self.holder {
            None => true,
            Some(current) => {
                current.report.hex_ident == report.hex_ident
                    || self.score(report) < self.score(&current.report)
            }
        };
        if replace {
            self.holder = Some(Selection {
                report: report.clone(),
                identity: identity.clone(),
            });
        }
        replace
    }
}

/// The two closest-aircraft slots.
#[derive(Debug, Clone)]
pub struct ClosestSelector {
    global: Slot,
    low_altitude: Slot,
}

impl ClosestSelector {
    pub fn new() -> Self {
        ClosestSelector {
            global: Slot::new(PriorityMode::Nearest),
            low_altitude: Slot::new(PriorityMode::LowAltitude),
        }
    }

    /// Re-evaluate both slots against a freshly stored report.
    pub fn offer(&mut self, report: &PositionReport, identity: &AircraftIdentity) -> SelectionChange {
        SelectionChange {
            global: self.global.offer(report, identity),
            low_altitude: self.low_altitude.offer(report, identity),
        }
    }

    /// Refresh the identity snapshot in any slot holding this identity.
    pub fn refresh_identity(&mut self, identity: &AircraftIdentity) {
        for slot in [&mut self.global, &mut self.low_altitude] {
            if let Some(holder) = slot.holder.as_mut() {
                if holder.identity.id == identity.id {
                    holder.identity = identity.clone();
                }
            }
        }
    }

    pub fn global(&self) -> Option<&Selection> {
        self.global.holder.as_ref()
    }

    pub fn low_altitude(&self) -> Option<&Selection> {
        self.low_altitude.holder.as_ref()
    }

    pub fn selected(&self, mode: PriorityMode) -> Option<&Selection> {
        match mode {
            PriorityMode::Nearest => self.global(),
            PriorityMode::LowAltitude => self.low_altitude(),
        }
    }
}

impl Default for ClosestSelector {
    fn default() -> Self {
        ClosestSelector::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
