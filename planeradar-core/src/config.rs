//! Configuration file management for planeradar.
//!
//! Reads/writes `~/.planeradar/config.yaml` with feed endpoint, observer
//! location, database path, display, broadcast, and metadata settings.

use std::path::PathBuf;

use crate::hardware::SwitchLevel;
use crate::identity::CACHE_CAPACITY;
use crate::types::RadarError;

pub const DEFAULT_LAT: f64 = 50.036;
pub const DEFAULT_LON: f64 = 8.553;
pub const DEFAULT_BROADCAST_URL: &str = "http://127.0.0.1:8000/update";
pub const DEFAULT_METADATA_URL: &str =
    "https://opensky-network.org/datasets/metadata/aircraftDatabase.csv";

/// Full configuration structure.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub feed: FeedConfig,
    pub observer: ObserverConfig,
    pub database: DatabaseConfig,
    pub display: DisplayConfig,
    pub broadcast: BroadcastConfig,
    pub metadata: MetadataConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedConfig {
    pub host: String,
    pub port: u16,
    pub backoff_secs: u64,
    pub max_empty_reads: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObserverConfig {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseConfig {
    pub path: String,
    pub cache_capacity: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DisplayConfig {
    pub screentime: u64,
    pub keep_on: bool,
    /// Priority switch level that selects low-altitude priority.
    pub priority_low_level: SwitchLevel,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BroadcastConfig {
    pub enabled: bool,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetadataConfig {
    pub path: String,
    pub download: bool,
    pub url: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            feed: FeedConfig {
                host: "127.0.0.1".into(),
                port: 30003,
                backoff_secs: 2,
                max_empty_reads: 5,
            },
            observer: ObserverConfig {
                lat: DEFAULT_LAT,
                lon: DEFAULT_LON,
            },
            database: DatabaseConfig {
                path: "data/planeradar.db".into(),
                cache_capacity: CACHE_CAPACITY,
            },
            display: DisplayConfig {
                screentime: 2,
                keep_on: false,
                priority_low_level: SwitchLevel::Low,
            },
            broadcast: BroadcastConfig {
                enabled: false,
                url: DEFAULT_BROADCAST_URL.into(),
            },
            metadata: MetadataConfig {
                path: "aircraftDatabase.csv".into(),
                download: false,
                url: DEFAULT_METADATA_URL.into(),
            },
        }
    }
}

/// Get the config directory path (`~/.planeradar/`).
pub fn config_dir() -> PathBuf {
    dirs_home().join(".planeradar")
}

/// Get the config file path.
pub fn config_file() -> PathBuf {
    config_dir().join("config.yaml")
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Load config from `~/.planeradar/config.yaml`.
///
/// Returns default config if the file doesn't exist or can't be read.
pub fn load_config() -> Config {
    let path = config_file();
    if !path.exists() {
        return Config::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(text) => parse_config(&text),
        Err(e) => {
            log::warn!("could not read {}: {e}; using defaults", path.display());
            Config::default()
        }
    }
}

/// Save config to `~/.planeradar/config.yaml`.
pub fn save_config(config: &Config) -> Result<PathBuf, RadarError> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir).map_err(|e| RadarError::Config(e.to_string()))?;

    let path = config_file();
    std::fs::write(&path, serialize_config(config))
        .map_err(|e| RadarError::Config(e.to_string()))?;

    Ok(path)
}

/// Parse simple YAML-like config text. Unknown keys and unparseable values
/// keep their defaults.
pub fn parse_config(text: &str) -> Config {
    let mut config = Config::default();
    let mut current_section: Option<String> = None;

    for line in text.lines() {
        let stripped = line.trim();
        if stripped.is_empty() || stripped.starts_with('#') {
            continue;
        }

        let is_indented = line.starts_with("  ") || line.starts_with('\t');

        let Some((key, val)) = stripped.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let val = val.trim();

        if !is_indented {
            current_section = val.is_empty().then(|| key.to_string());
            continue;
        }
        let Some(section) = current_section.as_deref() else {
            continue;
        };

        match (section, key) {
            ("feed", "host") => set_string(&mut config.feed.host, val),
            ("feed", "port") => set_parsed(&mut config.feed.port, val),
            ("feed", "backoff_secs") => set_parsed(&mut config.feed.backoff_secs, val),
            ("feed", "max_empty_reads") => set_parsed(&mut config.feed.max_empty_reads, val),
            ("observer", "lat") => set_parsed(&mut config.observer.lat, val),
            ("observer", "lon") => set_parsed(&mut config.observer.lon, val),
            ("database", "path") => set_string(&mut config.database.path, val),
            ("database", "cache_capacity") => set_parsed(&mut config.database.cache_capacity, val),
            ("display", "screentime") => set_parsed(&mut config.display.screentime, val),
            ("display", "keep_on") => set_parsed(&mut config.display.keep_on, val),
            ("display", "priority_low_level") => {
                if let Some(level) = parse_string_value(val).and_then(|v| SwitchLevel::parse(&v)) {
                    config.display.priority_low_level = level;
                }
            }
            ("broadcast", "enabled") => set_parsed(&mut config.broadcast.enabled, val),
            ("broadcast", "url") => set_string(&mut config.broadcast.url, val),
            ("metadata", "path") => set_string(&mut config.metadata.path, val),
            ("metadata", "download") => set_parsed(&mut config.metadata.download, val),
            ("metadata", "url") => set_string(&mut config.metadata.url, val),
            _ => log::debug!("ignoring config key {section}.{key}"),
        }
    }

    config
}

fn parse_string_value(val: &str) -> Option<String> {
    if val == "null" || val == "~" || val.is_empty() {
        return None;
    }
    // Strip quotes
    if val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')))
    {
        return Some(val[1..val.len() - 1].to_string());
    }
    Some(val.to_string())
}

fn set_string(target: &mut String, val: &str) {
    if let Some(v) = parse_string_value(val) {
        *target = v;
    }
}

fn set_parsed<T: std::str::FromStr>(target: &mut T, val: &str) {
    if let Some(v) = parse_string_value(val).and_then(|v| v.parse().ok()) {
        *target = v;
    }
}

/// Serialize config to YAML-like text.
pub fn serialize_config(config: &Config) -> String {
    let mut lines = vec!["# planeradar configuration".to_string(), String::new()];

    lines.push("feed:".into());
    lines.push(format!("  host: \"{}\"", config.feed.host));
    lines.push(format!("  port: {}", config.feed.port));
    lines.push(format!("  backoff_secs: {}", config.feed.backoff_secs));
    lines.push(format!("  max_empty_reads: {}", config.feed.max_empty_reads));
    lines.push(String::new());

    lines.push("observer:".into());
    lines.push(format!("  lat: {}", config.observer.lat));
    lines.push(format!("  lon: {}", config.observer.lon));
    lines.push(String::new());

    lines.push("database:".into());
    lines.push(format!("  path: \"{}\"", config.database.path));
    lines.push(format!("  cache_capacity: {}", config.database.cache_capacity));
    lines.push(String::new());

    lines.push("display:".into());
    lines.push(format!("  screentime: {}", config.display.screentime));
    lines.push(format!("  keep_on: {}", config.display.keep_on));
    lines.push(format!(
        "  priority_low_level: {}",
        config.display.priority_low_level.as_str()
    ));
    lines.push(String::new());

    lines.push("broadcast:".into());
    lines.push(format!("  enabled: {}", config.broadcast.enabled));
    lines.push(format!("  url: \"{}\"", config.broadcast.url));
    lines.push(String::new());

    lines.push("metadata:".into());
    lines.push(format!("  path: \"{}\"", config.metadata.path));
    lines.push(format!("  download: {}", config.metadata.download));
    lines.push(format!("  url: \"{}\"", config.metadata.url));

    lines.join("\n") + "\n"
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
