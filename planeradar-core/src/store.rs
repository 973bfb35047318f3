//! Persistence seam. The tracker only needs create/update/lookup; the
//! server provides the SQLite implementation.

use chrono::{DateTime, Utc};

use crate::types::{AircraftIdentity, PositionReport, Result};

/// Durable store for identities and position reports.
///
/// Ids returned from the `create_*` calls are assigned by the store and
/// increase monotonically.
pub trait RadarStore {
    fn create_identity(&mut self, identity: &AircraftIdentity) -> Result<i64>;

    fn update_identity(&mut self, identity: &AircraftIdentity) -> Result<()>;

    /// Most recently received identity for `hex_ident` with
    /// `last_received >= since`.
    fn find_recent_identity(
        &self,
        hex_ident: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<AircraftIdentity>>;

    fn create_position(&mut self, report: &PositionReport) -> Result<i64>;

    fn update_position(&mut self, report: &PositionReport) -> Result<()>;

    /// The sequence-0 report for an identity.
    fn find_origin_position(&self, identity_id: i64) -> Result<Option<PositionReport>>;

    /// The sequence >= 1 report for an identity.
    fn find_rolling_position(&self, identity_id: i64) -> Result<Option<PositionReport>>;
}
