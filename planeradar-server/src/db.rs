//! SQLite persistence: WAL mode, two tables, indexed lookups.
//!
//! `callsigns` holds one row per aircraft identity, `positions` at most two
//! rows per identity (origin and rolling latest). Timestamps are RFC 3339
//! text so lexical order matches time order.

use std::path::Path;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult, Row};

use planeradar_core::store::RadarStore;
use planeradar_core::types::{AircraftIdentity, PositionReport, RadarError, Result};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS callsigns (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    hex_ident TEXT NOT NULL,
    callsign TEXT NOT NULL,
    first_message_generated TEXT NOT NULL,
    first_message_received TEXT NOT NULL,
    last_message_generated TEXT NOT NULL,
    last_message_received TEXT NOT NULL,
    registration TEXT,
    typecode TEXT,
    operator TEXT,
    num_messages INTEGER NOT NULL DEFAULT 0,
    closest_dist REAL,
    lowest_alt INTEGER
);

CREATE TABLE IF NOT EXISTS positions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    hex_ident TEXT NOT NULL,
    callsign_id INTEGER NOT NULL REFERENCES callsigns(id),
    latitude REAL NOT NULL,
    longitude REAL NOT NULL,
    altitude INTEGER NOT NULL,
    distance REAL NOT NULL,
    bearing REAL NOT NULL,
    message_generated TEXT NOT NULL,
    message_received TEXT NOT NULL,
    num_message INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_callsigns_hex_received ON callsigns(hex_ident, last_message_received);
CREATE INDEX IF NOT EXISTS idx_positions_callsign ON positions(callsign_id, num_message);
"#;

const IDENTITY_COLUMNS: &str = "id, hex_ident, callsign, first_message_generated, \
    first_message_received, last_message_generated, last_message_received, registration, \
    typecode, operator, num_messages, closest_dist, lowest_alt";

const POSITION_COLUMNS: &str = "id, hex_ident, callsign_id, latitude, longitude, altitude, \
    distance, bearing, message_generated, message_received, num_message";

const NAIVE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// SQLite database for tracked identities and positions.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create a database at the given path.
    pub fn open(path: &str) -> SqlResult<Self> {
        let conn = if path == ":memory:" {
            Connection::open_in_memory()?
        } else {
            // Ensure parent directory exists
            if let Some(parent) = Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    let _ = std::fs::create_dir_all(parent);
                }
            }
            Connection::open(path)?
        };

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(SCHEMA)?;

        Ok(Database { conn })
    }

    /// Open in-memory database (for testing).
    #[cfg(test)]
    pub fn open_memory() -> SqlResult<Self> {
        Self::open(":memory:")
    }

    // -----------------------------------------------------------------------
    // Stats
    // -----------------------------------------------------------------------

    pub fn count_identities(&self) -> i64 {
        self.conn
            .query_row("SELECT COUNT(*) FROM callsigns", [], |r| r.get(0))
            .unwrap_or(0)
    }

    pub fn count_positions(&self) -> i64 {
        self.conn
            .query_row("SELECT COUNT(*) FROM positions", [], |r| r.get(0))
            .unwrap_or(0)
    }

    pub fn stats(&self) -> DbStats {
        DbStats {
            identities: self.count_identities(),
            positions: self.count_positions(),
            aircraft: self
                .conn
                .query_row("SELECT COUNT(DISTINCT hex_ident) FROM callsigns", [], |r| {
                    r.get(0)
                })
                .unwrap_or(0),
            messages: self
                .conn
                .query_row("SELECT COALESCE(SUM(num_messages), 0) FROM callsigns", [], |r| {
                    r.get(0)
                })
                .unwrap_or(0),
        }
    }

    /// Identities ordered by last received message, newest first.
    pub fn recent_identities(&self, limit: i64) -> SqlResult<Vec<AircraftIdentity>> {
        self.query_identities(
            &format!(
                "SELECT {IDENTITY_COLUMNS} FROM callsigns \
                 ORDER BY last_message_received DESC LIMIT ?1"
            ),
            limit,
        )
    }

    /// Identities with a recorded closest approach, nearest first.
    pub fn closest_identities(&self, limit: i64) -> SqlResult<Vec<AircraftIdentity>> {
        self.query_identities(
            &format!(
                "SELECT {IDENTITY_COLUMNS} FROM callsigns WHERE closest_dist IS NOT NULL \
                 ORDER BY closest_dist ASC LIMIT ?1"
            ),
            limit,
        )
    }

    fn query_identities(&self, sql: &str, limit: i64) -> SqlResult<Vec<AircraftIdentity>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params![limit], identity_from_row)?;
        rows.collect()
    }

    fn find_position(&self, identity_id: i64, origin: bool) -> SqlResult<Option<PositionReport>> {
        let filter = if origin {
            "num_message = 0"
        } else {
            "num_message > 0"
        };
        self.conn
            .query_row(
                &format!(
                    "SELECT {POSITION_COLUMNS} FROM positions \
                     WHERE callsign_id = ?1 AND {filter} ORDER BY id LIMIT 1"
                ),
                params![identity_id],
                position_from_row,
            )
            .optional()
    }
}

// ---------------------------------------------------------------------------
// RadarStore
// ---------------------------------------------------------------------------

impl RadarStore for Database {
    fn create_identity(&mut self, identity: &AircraftIdentity) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO callsigns (hex_ident, callsign, first_message_generated,
                     first_message_received, last_message_generated, last_message_received,
                     registration, typecode, operator, num_messages, closest_dist, lowest_alt)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    identity.hex_ident,
                    identity.callsign,
                    fmt_naive(&identity.first_generated),
                    fmt_utc(&identity.first_received),
                    fmt_naive(&identity.last_generated),
                    fmt_utc(&identity.last_received),
                    identity.registration,
                    identity.typecode,
                    identity.operator,
                    identity.message_count as i64,
                    identity.closest_dist,
                    identity.lowest_alt,
                ],
            )
            .map_err(store_err)?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update_identity(&mut self, identity: &AircraftIdentity) -> Result<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE callsigns SET last_message_generated = ?2, last_message_received = ?3,
                     registration = ?4, typecode = ?5, operator = ?6, num_messages = ?7,
                     closest_dist = ?8, lowest_alt = ?9
                 WHERE id = ?1",
                params![
                    identity.id,
                    fmt_naive(&identity.last_generated),
                    fmt_utc(&identity.last_received),
                    identity.registration,
                    identity.typecode,
                    identity.operator,
                    identity.message_count as i64,
                    identity.closest_dist,
                    identity.lowest_alt,
                ],
            )
            .map_err(store_err)?;
        if changed == 0 {
            return Err(RadarError::Store(format!("no callsign row {}", identity.id)));
        }
        Ok(())
    }

    fn find_recent_identity(
        &self,
        hex_ident: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<AircraftIdentity>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {IDENTITY_COLUMNS} FROM callsigns
                     WHERE hex_ident = ?1 AND last_message_received >= ?2
                     ORDER BY last_message_received DESC LIMIT 1"
                ),
                params![hex_ident, fmt_utc(&since)],
                identity_from_row,
            )
            .optional()
            .map_err(store_err)
    }

    fn create_position(&mut self, report: &PositionReport) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO positions (hex_ident, callsign_id, latitude, longitude, altitude,
                     distance, bearing, message_generated, message_received, num_message)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    report.hex_ident,
                    report.identity_id,
                    report.lat,
                    report.lon,
                    report.altitude_ft,
                    report.distance_km,
                    report.bearing_rad,
                    fmt_naive(&report.generated),
                    fmt_utc(&report.received),
                    report.sequence,
                ],
            )
            .map_err(store_err)?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update_position(&mut self, report: &PositionReport) -> Result<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE positions SET hex_ident = ?2, latitude = ?3, longitude = ?4,
                     altitude = ?5, distance = ?6, bearing = ?7, message_generated = ?8,
                     message_received = ?9, num_message = ?10
                 WHERE id = ?1",
                params![
                    report.id,
                    report.hex_ident,
                    report.lat,
                    report.lon,
                    report.altitude_ft,
                    report.distance_km,
                    report.bearing_rad,
                    fmt_naive(&report.generated),
                    fmt_utc(&report.received),
                    report.sequence,
                ],
            )
            .map_err(store_err)?;
        if changed == 0 {
            return Err(RadarError::Store(format!("no position row {}", report.id)));
        }
        Ok(())
    }

    fn find_origin_position(&self, identity_id: i64) -> Result<Option<PositionReport>> {
        self.find_position(identity_id, true).map_err(store_err)
    }

    fn find_rolling_position(&self, identity_id: i64) -> Result<Option<PositionReport>> {
        self.find_position(identity_id, false).map_err(store_err)
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct DbStats {
    pub identities: i64,
    pub aircraft: i64,
    pub positions: i64,
    pub messages: i64,
}

fn store_err(e: rusqlite::Error) -> RadarError {
    RadarError::Store(e.to_string())
}

fn fmt_utc(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn fmt_naive(ts: &NaiveDateTime) -> String {
    ts.format(NAIVE_FORMAT).to_string()
}

fn utc_column(row: &Row<'_>, idx: usize) -> SqlResult<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn naive_column(row: &Row<'_>, idx: usize) -> SqlResult<NaiveDateTime> {
    let text: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&text, NAIVE_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn identity_from_row(r: &Row<'_>) -> SqlResult<AircraftIdentity> {
    Ok(AircraftIdentity {
        id: r.get(0)?,
        hex_ident: r.get(1)?,
        callsign: r.get(2)?,
        first_generated: naive_column(r, 3)?,
        first_received: utc_column(r, 4)?,
        last_generated: naive_column(r, 5)?,
        last_received: utc_column(r, 6)?,
        registration: r.get(7)?,
        typecode: r.get(8)?,
        operator: r.get(9)?,
        message_count: r.get::<_, i64>(10)?.max(0) as u64,
        closest_dist: r.get(11)?,
        lowest_alt: r.get(12)?,
    })
}

fn position_from_row(r: &Row<'_>) -> SqlResult<PositionReport> {
    Ok(PositionReport {
        id: r.get(0)?,
        hex_ident: r.get(1)?,
        identity_id: r.get(2)?,
        lat: r.get(3)?,
        lon: r.get(4)?,
        altitude_ft: r.get(5)?,
        distance_km: r.get(6)?,
        bearing_rad: r.get(7)?,
        generated: naive_column(r, 8)?,
        received: utc_column(r, 9)?,
        sequence: r.get(10)?,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
