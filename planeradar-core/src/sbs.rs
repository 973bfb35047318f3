//! SBS (BaseStation port 30003) record decoding.
//!
//! One comma-separated line per record, 22 positional fields. Only
//! `MSG,1` (identification) and `MSG,3` (airborne position) are decoded;
//! everything else comes back as [`SbsRecord::Ignored`].

use chrono::NaiveDateTime;

use crate::types::{RadarError, Result};

/// Number of fields in a complete MSG line.
pub const SBS_FIELD_COUNT: usize = 22;

const FIELD_MESSAGE_TYPE: usize = 0;
const FIELD_TRANSMISSION_TYPE: usize = 1;
const FIELD_HEX_IDENT: usize = 4;
const FIELD_DATE_GENERATED: usize = 6;
const FIELD_TIME_GENERATED: usize = 7;
const FIELD_CALLSIGN: usize = 10;
const FIELD_ALTITUDE: usize = 11;
const FIELD_LATITUDE: usize = 14;
const FIELD_LONGITUDE: usize = 15;

const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S%.f";

/// Transmission type 1: callsign.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentificationMsg {
    pub hex_ident: String,
    pub callsign: String,
    pub generated: NaiveDateTime,
}

/// Transmission type 3: airborne position.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionMsg {
    pub hex_ident: String,
    pub generated: NaiveDateTime,
    pub altitude_ft: i32,
    pub lat: f64,
    pub lon: f64,
}

/// A decoded feed line.
#[derive(Debug, Clone, PartialEq)]
pub enum SbsRecord {
    Identification(IdentificationMsg),
    Position(PositionMsg),
    /// Well-formed but not acted on (other message or transmission types).
    Ignored,
}

impl SbsRecord {
    pub fn hex_ident(&self) -> Option<&str> {
        match self {
            SbsRecord::Identification(m) => Some(&m.hex_ident),
            SbsRecord::Position(m) => Some(&m.hex_ident),
            SbsRecord::Ignored => None,
        }
    }
}

/// Decode one feed line.
///
/// Type fields are checked first so short non-MSG lines (`STA`, `AIR`, ...)
/// are ignored rather than rejected. A `MSG,1`/`MSG,3` line with fewer than
/// 22 fields or an unparseable required field is an error.
pub fn decode_line(line: &str) -> Result<SbsRecord> {
    let line = line.trim_end_matches(['\r', '\n']);
    let fields: Vec<&str> = line.split(',').collect();

    let message_type = fields.get(FIELD_MESSAGE_TYPE).copied().unwrap_or("");
    let transmission_type = fields.get(FIELD_TRANSMISSION_TYPE).copied().unwrap_or("");
    if message_type != "MSG" || !matches!(transmission_type, "1" | "3") {
        return Ok(SbsRecord::Ignored);
    }

    if fields.len() < SBS_FIELD_COUNT {
        return Err(RadarError::ShortRecord {
            expected: SBS_FIELD_COUNT,
            actual: fields.len(),
        });
    }

    let hex_ident = parse_hex_ident(fields[FIELD_HEX_IDENT])?;
    let generated = parse_timestamp(fields[FIELD_DATE_GENERATED], fields[FIELD_TIME_GENERATED])?;

    if transmission_type == "1" {
        return Ok(SbsRecord::Identification(IdentificationMsg {
            hex_ident,
            callsign: fields[FIELD_CALLSIGN].trim().to_string(),
            generated,
        }));
    }

    let altitude_ft = parse_field::<i32>("altitude", fields[FIELD_ALTITUDE])?;
    let lat = parse_field::<f64>("latitude", fields[FIELD_LATITUDE])?;
    let lon = parse_field::<f64>("longitude", fields[FIELD_LONGITUDE])?;
    if !(-90.0..=90.0).contains(&lat) {
        return Err(RadarError::InvalidField {
            field: "latitude",
            value: fields[FIELD_LATITUDE].to_string(),
        });
    }
    if !(-180.0..=180.0).contains(&lon) {
        return Err(RadarError::InvalidField {
            field: "longitude",
            value: fields[FIELD_LONGITUDE].to_string(),
        });
    }

    Ok(SbsRecord::Position(PositionMsg {
        hex_ident,
        generated,
        altitude_ft,
        lat,
        lon,
    }))
}

/// Non-ICAO addresses (TIS-B, ADS-R) carry a leading `~`, which is kept.
fn parse_hex_ident(raw: &str) -> Result<String> {
    let hex = raw.trim();
    let digits = hex.strip_prefix('~').unwrap_or(hex);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(RadarError::InvalidField {
            field: "hex_ident",
            value: raw.to_string(),
        });
    }
    Ok(hex.to_string())
}

fn parse_timestamp(date: &str, time: &str) -> Result<NaiveDateTime> {
    let text = format!("{} {}", date.trim(), time.trim());
    NaiveDateTime::parse_from_str(&text, TIMESTAMP_FORMAT)
        .map_err(|_| RadarError::InvalidTimestamp(text))
}

fn parse_field<T: std::str::FromStr>(field: &'static str, raw: &str) -> Result<T> {
    raw.trim().parse::<T>().map_err(|_| RadarError::InvalidField {
        field,
        value: raw.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const IDENT: &str =
        "MSG,1,1,1,3C6481,1,2024/06/01,12:00:00.123,2024/06/01,12:00:00.130,DLH4AB  ,,,,,,,,,,,0";
    const POSITION: &str = "MSG,3,1,1,3C6481,1,2024/06/01,12:00:01.500,2024/06/01,12:00:01.510,,5000,,,50.13600,8.55300,,,0,0,0,0";

    #[test]
    fn test_decode_identification() {
        match decode_line(IDENT).unwrap() {
            SbsRecord::Identification(m) => {
                assert_eq!(m.hex_ident, "3C6481");
                assert_eq!(m.callsign, "DLH4AB");
                assert_eq!(m.generated.to_string(), "2024-06-01 12:00:00.123");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_decode_position() {
        match decode_line(POSITION).unwrap() {
            SbsRecord::Position(m) => {
                assert_eq!(m.hex_ident, "3C6481");
                assert_eq!(m.altitude_ft, 5000);
                assert_eq!(m.lat, 50.136);
                assert_eq!(m.lon, 8.553);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_trailing_crlf() {
        let line = format!("{POSITION}\r\n");
        assert!(matches!(decode_line(&line).unwrap(), SbsRecord::Position(_)));
    }

    #[test]
    fn test_other_transmission_types_ignored() {
        let line = "MSG,4,1,1,3C6481,1,2024/06/01,12:00:01.500,2024/06/01,12:00:01.510,,,420,90,,,0,,0,0,0,0";
        assert_eq!(decode_line(line).unwrap(), SbsRecord::Ignored);
    }

    #[test]
    fn test_non_msg_ignored() {
        assert_eq!(decode_line("STA,,5,179,400AE7,10103,2008/11/28,14:58:51.153,2008/11/28,14:58:51.153,RM").unwrap(), SbsRecord::Ignored);
        assert_eq!(decode_line("").unwrap(), SbsRecord::Ignored);
    }

    #[test]
    fn test_short_record_rejected() {
        let err = decode_line("MSG,3,1,1,3C6481,1,2024/06/01").unwrap_err();
        assert!(matches!(
            err,
            RadarError::ShortRecord {
                expected: 22,
                actual: 7
            }
        ));
    }

    #[test]
    fn test_bad_altitude_rejected() {
        let line = POSITION.replace(",5000,", ",FL50,");
        let err = decode_line(&line).unwrap_err();
        assert!(matches!(err, RadarError::InvalidField { field: "altitude", .. }));
    }

    #[test]
    fn test_empty_latitude_rejected() {
        let line = POSITION.replace("50.13600", "");
        let err = decode_line(&line).unwrap_err();
        assert!(matches!(err, RadarError::InvalidField { field: "latitude", .. }));
    }

    #[test]
    fn test_out_of_range_longitude_rejected() {
        let line = POSITION.replace("8.55300", "181.0");
        assert!(decode_line(&line).is_err());
    }

    #[test]
    fn test_bad_timestamp_rejected() {
        let line = IDENT.replace("2024/06/01,12:00:00.123", "2024-06-01,noon");
        assert!(matches!(
            decode_line(&line).unwrap_err(),
            RadarError::InvalidTimestamp(_)
        ));
    }

    #[test]
    fn test_bad_hex_rejected() {
        let line = IDENT.replace("3C6481", "ZZ");
        assert!(matches!(
            decode_line(&line).unwrap_err(),
            RadarError::InvalidField { field: "hex_ident", .. }
        ));
    }

    #[test]
    fn test_non_icao_hex_accepted() {
        let line = POSITION.replace("3C6481", "~A1B2C3");
        match decode_line(&line).unwrap() {
            SbsRecord::Position(m) => {
                assert_eq!(m.hex_ident, "~A1B2C3");
                assert_eq!(m.altitude_ft, 5000);
            }
            other => panic!("unexpected {other:?}"),
        }

        for bad in ["~", "~~A1B2C3", "A1~B2C3", "~G1B2C3"] {
            let line = IDENT.replace("3C6481", bad);
            assert!(
                matches!(
                    decode_line(&line).unwrap_err(),
                    RadarError::InvalidField { field: "hex_ident", .. }
                ),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_record_hex_ident() {
        assert_eq!(decode_line(IDENT).unwrap().hex_ident(), Some("3C6481"));
        assert_eq!(SbsRecord::Ignored.hex_ident(), None);
    }
}
