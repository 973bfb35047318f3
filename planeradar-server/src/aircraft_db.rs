//! Aircraft metadata loading: optional download with local-file fallback.

use std::path::Path;

use planeradar_core::metadata::AircraftDatabase;
use planeradar_core::types::{RadarError, Result};

/// Load the metadata CSV. With `download`, fetch `url` first and fall back
/// to `local_path` on any HTTP or network failure. A missing local file
/// yields an empty database.
pub async fn load(download: bool, url: &str, local_path: &str) -> AircraftDatabase {
    if download {
        log::info!("downloading aircraft database from {url}");
        match fetch(url).await {
            Ok(db) => {
                log::info!("aircraft database downloaded ({} entries)", db.len());
                return db;
            }
            Err(e) => log::warn!("download failed: {e}; using local file {local_path}"),
        }
    }
    load_local(local_path)
}

async fn fetch(url: &str) -> Result<AircraftDatabase> {
    let response = reqwest::get(url)
        .await
        .map_err(|e| RadarError::Metadata(e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(RadarError::Metadata(format!("HTTP {status}")));
    }
    let body = response
        .bytes()
        .await
        .map_err(|e| RadarError::Metadata(e.to_string()))?;
    AircraftDatabase::from_csv_reader(body.as_ref())
}

/// Read the local CSV, or an empty database if it is missing or unreadable.
pub fn load_local(path: &str) -> AircraftDatabase {
    if !Path::new(path).exists() {
        log::warn!("aircraft database {path} not found; continuing without metadata");
        return AircraftDatabase::empty();
    }
    let result = std::fs::File::open(path)
        .map_err(RadarError::from)
        .and_then(AircraftDatabase::from_csv_reader);
    match result {
        Ok(db) => {
            log::info!("aircraft database loaded from {path} ({} entries)", db.len());
            db
        }
        Err(e) => {
            log::warn!("could not read aircraft database {path}: {e}");
            AircraftDatabase::empty()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "icao24,registration,typecode,operatoricao\n3c6481,D-AIBA,A319,DLH\n";

    #[test]
    fn test_load_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aircraftDatabase.csv");
        std::fs::write(&path, CSV).unwrap();
        let db = load_local(path.to_str().unwrap());
        assert_eq!(db.len(), 1);
        assert_eq!(db.lookup("3C6481").unwrap().typecode, "A319");
    }

    #[test]
    fn test_missing_local_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let db = load_local(dir.path().join("nope.csv").to_str().unwrap());
        assert!(db.is_empty());
    }

    #[tokio::test]
    async fn test_download_failure_falls_back_to_local() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aircraftDatabase.csv");
        std::fs::write(&path, CSV).unwrap();
        // Nothing listens on port 9 locally; the request fails fast.
        let db = load(true, "http://127.0.0.1:9/aircraftDatabase.csv", path.to_str().unwrap()).await;
        assert_eq!(db.len(), 1);
    }
}
