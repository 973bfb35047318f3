//! planeradar: closest-aircraft tracker for SBS feeds.

use clap::{Args, Parser, Subcommand};
use comfy_table::{Cell, Table};
use log::LevelFilter;
use tokio::sync::watch;

use planeradar_core::config::{self, Config};
use planeradar_core::geodesy::ObserverLocation;
use planeradar_core::hardware::{PriorityPolarity, SwitchLevel};
use planeradar_core::presentation::{Presenter, PresenterConfig};
use planeradar_core::tracker::Tracker;
use planeradar_core::types::AircraftIdentity;

mod aircraft_db;
mod broadcast;
mod db;
mod ingest;
mod logging;
mod panel;
mod web;

use broadcast::BroadcastDispatcher;
use ingest::{IngestSettings, Ingestor, Panel, TcpFeed};
use panel::{FixedSwitches, LogDisplay, LogLeds};

#[derive(Parser)]
#[command(name = "planeradar", version, about = "Closest-aircraft tracker for SBS feeds")]
struct Cli {
    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log_level: LevelFilter,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Track the live feed and present the closest aircraft
    Run(RunArgs),

    /// Show database statistics
    Stats {
        /// SQLite database path (defaults to the configured path)
        #[arg(long)]
        db_path: Option<String>,

        /// Rows per table
        #[arg(long, default_value = "10")]
        limit: i64,
    },

    /// Run the broadcast relay (POST /update, GET /latest, GET /ws)
    Serve {
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        #[arg(long, default_value = "8000")]
        port: u16,
    },

    /// Write the default config file to ~/.planeradar/config.yaml
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    /// Feed host (SBS BaseStation output)
    #[arg(long, env = "FEED_HOST")]
    host: Option<String>,

    /// Feed port
    #[arg(long, env = "FEED_PORT")]
    port: Option<u16>,

    /// Observer latitude in degrees
    #[arg(long, env = "LATITUDE", allow_hyphen_values = true)]
    lat: Option<f64>,

    /// Observer longitude in degrees
    #[arg(long, env = "LONGITUDE", allow_hyphen_values = true)]
    lon: Option<f64>,

    /// SQLite database path
    #[arg(long)]
    db_path: Option<String>,

    /// Seconds between screen refreshes; 0 refreshes immediately
    #[arg(short, long)]
    screentime: Option<u64>,

    /// Keep the screen on
    #[arg(short, long)]
    keepon: bool,

    /// Publish the selection to the broadcast URL
    #[arg(short, long)]
    broadcast: bool,

    /// Broadcast endpoint
    #[arg(long)]
    broadcast_url: Option<String>,

    /// Download the aircraft database before running
    #[arg(short, long)]
    download: bool,

    /// Local aircraft database CSV
    #[arg(long)]
    aircraft_db: Option<String>,

    /// Level of the screen switch on the development panel
    #[arg(long, value_parser = parse_switch, default_value = "high")]
    screen_switch: SwitchLevel,

    /// Level of the priority switch on the development panel
    #[arg(long, value_parser = parse_switch, default_value = "high")]
    priority_switch: SwitchLevel,
}

fn parse_switch(s: &str) -> Result<SwitchLevel, String> {
    SwitchLevel::parse(s).ok_or_else(|| format!("expected high or low, got {s:?}"))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::setup_logging(cli.log_level);

    match cli.command {
        Commands::Run(args) => cmd_run(args).await,
        Commands::Stats { db_path, limit } => cmd_stats(db_path, limit),
        Commands::Serve { host, port } => cmd_serve(&host, port).await,
        Commands::InitConfig { force } => cmd_init_config(force),
    }
}

/// Command-line values win over the config file.
fn apply_overrides(config: &mut Config, args: &RunArgs) {
    if let Some(host) = &args.host {
        config.feed.host = host.clone();
    }
    if let Some(port) = args.port {
        config.feed.port = port;
    }
    if let Some(lat) = args.lat {
        config.observer.lat = lat;
    }
    if let Some(lon) = args.lon {
        config.observer.lon = lon;
    }
    if let Some(path) = &args.db_path {
        config.database.path = path.clone();
    }
    if let Some(screentime) = args.screentime {
        config.display.screentime = screentime;
    }
    if let Some(url) = &args.broadcast_url {
        config.broadcast.url = url.clone();
    }
    if let Some(path) = &args.aircraft_db {
        config.metadata.path = path.clone();
    }
    config.display.keep_on |= args.keepon;
    config.broadcast.enabled |= args.broadcast;
    config.metadata.download |= args.download;
}

async fn cmd_run(args: RunArgs) {
    let mut config = config::load_config();
    apply_overrides(&mut config, &args);

    let database = db::Database::open(&config.database.path).unwrap_or_else(|e| {
        log::error!("cannot open database {}: {e}", config.database.path);
        std::process::exit(1);
    });

    let metadata = aircraft_db::load(
        config.metadata.download,
        &config.metadata.url,
        &config.metadata.path,
    )
    .await;

    let observer = ObserverLocation::from_degrees(config.observer.lat, config.observer.lon);
    log::info!(
        "observer at {:.4}, {:.4}; feed {}:{}",
        config.observer.lat,
        config.observer.lon,
        config.feed.host,
        config.feed.port
    );

    let tracker = Tracker::new(observer, metadata, config.database.cache_capacity);
    let presenter = Presenter::new(PresenterConfig {
        screentime_secs: config.display.screentime,
        keep_on: config.display.keep_on,
        broadcast: config.broadcast.enabled,
        polarity: PriorityPolarity::new(config.display.priority_low_level),
    });
    let panel = Panel {
        switches: Box::new(FixedSwitches {
            screen: args.screen_switch,
            priority: args.priority_switch,
        }),
        leds: Box::new(LogLeds::default()),
        display: Box::new(LogDisplay::default()),
    };
    let broadcaster = config
        .broadcast
        .enabled
        .then(|| BroadcastDispatcher::new(&config.broadcast.url));
    if let Some(b) = &broadcaster {
        log::info!("broadcasting to {}", b.url());
    }

    let settings = IngestSettings {
        backoff: std::time::Duration::from_secs(config.feed.backoff_secs),
        max_empty_reads: config.feed.max_empty_reads,
    };
    let mut ingestor = Ingestor::new(tracker, database, presenter, panel, broadcaster, settings);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                log::info!("interrupt received");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                log::error!("cannot listen for interrupt: {e}");
                // Keep the sender alive so the loop is not shut down.
                std::future::pending::<()>().await;
            }
        }
    });

    let mut feed = TcpFeed::new(&config.feed.host, config.feed.port);
    let stats = ingestor.run(&mut feed, shutdown_rx).await;

    let tracker = ingestor.tracker();
    log::info!(
        "lines {}, empty reads {}, decode failures {}, store errors {}, reconnects {}, broadcasts {}",
        stats.lines_read,
        stats.empty_reads,
        stats.decode_failures,
        stats.store_errors,
        stats.reconnects,
        stats.broadcasts
    );
    log::info!(
        "identifications {}, positions stored {}, positions skipped {}, identities created {}",
        tracker.identifications,
        tracker.positions_stored,
        tracker.positions_skipped,
        tracker.identities().created
    );
}

fn cmd_stats(db_path: Option<String>, limit: i64) {
    let db_path = db_path.unwrap_or_else(|| config::load_config().database.path);
    let database = db::Database::open(&db_path).unwrap_or_else(|e| {
        log::error!("cannot open database {db_path}: {e}");
        std::process::exit(1);
    });

    let stats = database.stats();

    println!();
    println!("Database: {db_path}");
    println!();
    println!("  Identities: {}", stats.identities);
    println!("  Aircraft:   {}", stats.aircraft);
    println!("  Positions:  {}", stats.positions);
    println!("  Messages:   {}", stats.messages);
    println!();

    match database.closest_identities(limit) {
        Ok(rows) if !rows.is_empty() => {
            println!("Closest approaches:");
            println!("{}", identity_table(&rows));
        }
        Ok(_) => {}
        Err(e) => log::error!("query failed: {e}"),
    }

    match database.recent_identities(limit) {
        Ok(rows) if !rows.is_empty() => {
            println!("Most recent:");
            println!("{}", identity_table(&rows));
        }
        Ok(_) => {}
        Err(e) => log::error!("query failed: {e}"),
    }
}

fn identity_table(rows: &[AircraftIdentity]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        "Hex", "Callsign", "Reg", "Type", "Operator", "Closest (km)", "Lowest (ft)", "Msgs",
        "Last seen",
    ]);

    for ident in rows {
        table.add_row(vec![
            Cell::new(&ident.hex_ident),
            Cell::new(&ident.callsign),
            Cell::new(ident.registration.as_deref().unwrap_or("-")),
            Cell::new(ident.typecode.as_deref().unwrap_or("-")),
            Cell::new(ident.operator.as_deref().unwrap_or("-")),
            Cell::new(
                ident
                    .closest_dist
                    .map(|d| format!("{d:.2}"))
                    .unwrap_or("-".into()),
            ),
            Cell::new(
                ident
                    .lowest_alt
                    .map(|a| a.to_string())
                    .unwrap_or("-".into()),
            ),
            Cell::new(ident.message_count),
            Cell::new(
                ident
                    .last_received
                    .with_timezone(&chrono::Local)
                    .format("%Y-%m-%d %H:%M:%S"),
            ),
        ]);
    }

    table
}

async fn cmd_serve(host: &str, port: u16) {
    if let Err(e) = web::serve(host, port).await {
        log::error!("relay server failed: {e}");
        std::process::exit(1);
    }
}

fn cmd_init_config(force: bool) {
    let path = config::config_file();
    if path.exists() && !force {
        log::warn!("{} already exists; use --force to overwrite", path.display());
        return;
    }
    match config::save_config(&Config::default()) {
        Ok(path) => println!("Wrote {}", path.display()),
        Err(e) => {
            log::error!("{e}");
            std::process::exit(1);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_run_flags() {
        let cli = Cli::parse_from([
            "planeradar",
            "run",
            "--host",
            "10.0.0.5",
            "--lat",
            "-33.9",
            "-s",
            "0",
            "-k",
            "-b",
            "--priority-switch",
            "low",
        ]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.host.as_deref(), Some("10.0.0.5"));
        assert_eq!(args.lat, Some(-33.9));
        assert_eq!(args.screentime, Some(0));
        assert!(args.keepon && args.broadcast && !args.download);
        assert_eq!(args.priority_switch, SwitchLevel::Low);
        assert_eq!(args.screen_switch, SwitchLevel::High);
    }

    #[test]
    fn test_cli_log_level() {
        let cli = Cli::parse_from(["planeradar", "--log-level", "debug", "stats"]);
        assert_eq!(cli.log_level, LevelFilter::Debug);
    }

    #[test]
    fn test_cli_rejects_bad_switch() {
        let result = Cli::try_parse_from(["planeradar", "run", "--screen-switch", "sideways"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_overrides() {
        let mut config = Config::default();
        let args = RunArgs {
            port: Some(30005),
            lon: Some(-0.46),
            screentime: Some(5),
            broadcast: true,
            aircraft_db: Some("/tmp/ac.csv".into()),
            ..Default::default()
        };
        apply_overrides(&mut config, &args);
        assert_eq!(config.feed.port, 30005);
        assert_eq!(config.feed.host, "127.0.0.1");
        assert_eq!(config.observer.lon, -0.46);
        assert_eq!(config.display.screentime, 5);
        assert!(config.broadcast.enabled);
        assert!(!config.metadata.download);
        assert_eq!(config.metadata.path, "/tmp/ac.csv");
    }

    #[test]
    fn test_overrides_keep_config_flags() {
        let mut config = Config::default();
        config.broadcast.enabled = true;
        apply_overrides(&mut config, &RunArgs::default());
        assert!(config.broadcast.enabled);
    }
}
