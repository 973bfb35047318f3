//! Aircraft metadata lookup: hex address to registration/type/operator.
//!
//! Built once at startup from an OpenSky-style `aircraftDatabase.csv`
//! (`icao24`, `registration`, `typecode`, `operatoricao` columns) and read-only
//! afterwards. Where the CSV comes from is the caller's business.

use std::collections::HashMap;
use std::io::Read;

use serde::Deserialize;

use crate::types::{AircraftInfo, RadarError, Result};

#[derive(Debug, Deserialize)]
struct MetadataRow {
    icao24: String,
    #[serde(default)]
    registration: String,
    #[serde(default)]
    typecode: String,
    #[serde(default)]
    operatoricao: String,
}

/// Read-only map of lowercase hex address to [`AircraftInfo`].
#[derive(Debug, Clone, Default)]
pub struct AircraftDatabase {
    entries: HashMap<String, AircraftInfo>,
}

impl AircraftDatabase {
    pub fn empty() -> Self {
        AircraftDatabase::default()
    }

    /// Parse CSV with a header row. Rows with an empty `icao24` or that do
    /// not deserialize are skipped.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

        let headers = rdr
            .headers()
            .map_err(|e| RadarError::Metadata(e.to_string()))?;
        if !headers.iter().any(|h| h == "icao24") {
            return Err(RadarError::Metadata("missing icao24 column".into()));
        }

        let mut entries = HashMap::new();
        let mut skipped = 0usize;
        for row in rdr.deserialize::<MetadataRow>() {
            let row = match row {
                Ok(r) => r,
                Err(_) => {
                    skipped += 1;
                    continue;
                }
            };
            let key = row.icao24.trim().to_ascii_lowercase();
            if key.is_empty() {
                continue;
            }
            entries.insert(
                key,
                AircraftInfo {
                    registration: row.registration.trim().to_string(),
                    typecode: row.typecode.trim().to_string(),
                    operator: row.operatoricao.trim().to_string(),
                },
            );
        }

        if skipped > 0 {
            log::debug!("metadata: skipped {skipped} malformed rows");
        }

        Ok(AircraftDatabase { entries })
    }

    pub fn from_csv_str(text: &str) -> Result<Self> {
        Self::from_csv_reader(text.as_bytes())
    }

    /// Case-insensitive lookup by hex address.
    pub fn lookup(&self, hex_ident: &str) -> Option<&AircraftInfo> {
        self.entries.get(&hex_ident.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
icao24,registration,manufacturericao,typecode,operatoricao,owner
3c6481,D-AIBA,AIRBUS,A319,DLH,Lufthansa
4ca7b5,EI-DCL,BOEING,B738,RYR,\"Ryanair, Ltd\"
,N12345,CESSNA,C172,,
";

    #[test]
    fn test_parse_and_lookup() {
        let db = AircraftDatabase::from_csv_str(SAMPLE).unwrap();
        assert_eq!(db.len(), 2);
        let info = db.lookup("3c6481").unwrap();
        assert_eq!(info.registration, "D-AIBA");
        assert_eq!(info.typecode, "A319");
        assert_eq!(info.operator, "DLH");
    }

    #[test]
    fn test_lookup_case_insensitive() {
        let db = AircraftDatabase::from_csv_str(SAMPLE).unwrap();
        assert!(db.lookup("3C6481").is_some());
        assert_eq!(db.lookup("4CA7B5").unwrap().operator, "RYR");
    }

    #[test]
    fn test_empty_icao_skipped() {
        let db = AircraftDatabase::from_csv_str(SAMPLE).unwrap();
        assert!(db.lookup("").is_none());
    }

    #[test]
    fn test_unknown_address() {
        let db = AircraftDatabase::from_csv_str(SAMPLE).unwrap();
        assert!(db.lookup("ffffff").is_none());
    }

    #[test]
    fn test_missing_icao_column() {
        let err = AircraftDatabase::from_csv_str("registration,typecode\nD-AIBA,A319\n").unwrap_err();
        assert!(matches!(err, RadarError::Metadata(_)));
    }

    #[test]
    fn test_empty_database() {
        let db = AircraftDatabase::empty();
        assert!(db.is_empty());
        assert!(db.lookup("3c6481").is_none());
    }
}
