//! Feed ingestion: connect, read lines, dispatch, reconnect.
//!
//! One task owns the tracker, the store and the panel. The loop alternates
//! between connecting and streaming until the shutdown signal fires, then
//! runs cleanup exactly once.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::watch;

use planeradar_core::hardware::{Display, LedState, StatusLeds, Switches};
use planeradar_core::presentation::Presenter;
use planeradar_core::store::RadarStore;
use planeradar_core::tracker::{TrackOutcome, Tracker};
use planeradar_core::types::RadarError;

use crate::broadcast::BroadcastDispatcher;

// ---------------------------------------------------------------------------
// Feed seams
// ---------------------------------------------------------------------------

/// A connected feed. `Ok(None)` (zero-byte read) and whitespace-only lines
/// both count as empty reads, so a feed that sends blank keepalive lines is
/// reconnected after `max_empty_reads` of them in a row. Any non-blank line
/// resets the count.
#[async_trait]
pub trait LineStream: Send {
    async fn next_line(&mut self) -> io::Result<Option<String>>;
}

#[async_trait]
pub trait FeedConnector: Send {
    async fn connect(&mut self) -> io::Result<Box<dyn LineStream>>;

    /// Human-readable endpoint for logs.
    fn endpoint(&self) -> String;
}

/// SBS feed over plain TCP.
pub struct TcpFeed {
    host: String,
    port: u16,
}

impl TcpFeed {
    pub fn new(host: &str, port: u16) -> Self {
        TcpFeed {
            host: host.to_string(),
            port,
        }
    }
}

#[async_trait]
impl FeedConnector for TcpFeed {
    async fn connect(&mut self) -> io::Result<Box<dyn LineStream>> {
        let stream = TcpStream::connect((self.host.as_str(), self.port)).await?;
        Ok(Box::new(TcpLineStream {
            reader: BufReader::new(stream),
            buf: String::new(),
        }))
    }

    fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

struct TcpLineStream {
    reader: BufReader<TcpStream>,
    buf: String,
}

#[async_trait]
impl LineStream for TcpLineStream {
    async fn next_line(&mut self) -> io::Result<Option<String>> {
        self.buf.clear();
        // Zero bytes means the peer closed; reported as an empty read.
        if self.reader.read_line(&mut self.buf).await? == 0 {
            return Ok(None);
        }
        Ok(Some(self.buf.trim_end_matches(['\r', '\n']).to_string()))
    }
}

// ---------------------------------------------------------------------------
// Ingestor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct IngestSettings {
    pub backoff: Duration,
    pub max_empty_reads: u32,
}

impl Default for IngestSettings {
    fn default() -> Self {
        IngestSettings {
            backoff: Duration::from_secs(2),
            max_empty_reads: 5,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct IngestStats {
    pub connections: u64,
    pub connect_failures: u64,
    pub reconnects: u64,
    pub lines_read: u64,
    pub empty_reads: u64,
    pub decode_failures: u64,
    pub store_errors: u64,
    pub broadcasts: u64,
}

/// Host-provided panel I/O.
pub struct Panel {
    pub switches: Box<dyn Switches + Send>,
    pub leds: Box<dyn StatusLeds + Send>,
    pub display: Box<dyn Display + Send>,
}

enum StreamEnd {
    Shutdown,
    Lost(String),
}

pub struct Ingestor<S: RadarStore> {
    tracker: Tracker,
    store: S,
    presenter: Presenter,
    panel: Panel,
    broadcaster: Option<BroadcastDispatcher>,
    settings: IngestSettings,
    stats: IngestStats,
    cleaned_up: bool,
}

impl<S: RadarStore> Ingestor<S> {
    pub fn new(
        tracker: Tracker,
        store: S,
        presenter: Presenter,
        panel: Panel,
        broadcaster: Option<BroadcastDispatcher>,
        settings: IngestSettings,
    ) -> Self {
        Ingestor {
            tracker,
            store,
            presenter,
            panel,
            broadcaster,
            settings,
            stats: IngestStats::default(),
            cleaned_up: false,
        }
    }

    /// Run until `shutdown` becomes true (or its sender is dropped). Retries
    /// the connection indefinitely. Cleanup runs before returning.
    pub async fn run<C: FeedConnector + ?Sized>(
        &mut self,
        connector: &mut C,
        mut shutdown: watch::Receiver<bool>,
    ) -> IngestStats {
        let endpoint = connector.endpoint();
        self.panel.leds.set(LedState::Yellow);

        loop {
            let connected = tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => break,
                res = connector.connect() => res,
            };

            match connected {
                Ok(mut stream) => {
                    self.stats.connections += 1;
                    log::info!("connected to feed {endpoint}");
                    match self.stream(stream.as_mut(), &mut shutdown).await {
                        StreamEnd::Shutdown => break,
                        StreamEnd::Lost(reason) => {
                            log::warn!("feed {endpoint} lost ({reason}); reconnecting")
                        }
                    }
                }
                Err(e) => {
                    self.stats.connect_failures += 1;
                    log::warn!("connect to {endpoint} failed: {e}");
                }
            }

            self.stats.reconnects += 1;
            self.panel.leds.set(LedState::Yellow);
            tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => break,
                _ = tokio::time::sleep(self.settings.backoff) => {}
            }
        }

        log::info!("shutdown requested");
        self.cleanup();
        self.stats.clone()
    }

    async fn stream(
        &mut self,
        stream: &mut dyn LineStream,
        shutdown: &mut watch::Receiver<bool>,
    ) -> StreamEnd {
        let max = self.settings.max_empty_reads.max(1);
        let mut empty_reads = 0u32;

        loop {
            self.panel.leds.set(LedState::Green);
            self.presenter.poll_screen(
                self.panel.switches.as_mut(),
                self.panel.display.as_mut(),
                self.tracker.selector(),
                Utc::now(),
            );

            let read = tokio::select! {
                biased;
                _ = shutdown_requested(shutdown) => return StreamEnd::Shutdown,
                read = stream.next_line() => read,
            };

            let line = match read {
                Ok(Some(line)) if !line.trim().is_empty() => line,
                Ok(_) => {
                    empty_reads += 1;
                    self.stats.empty_reads += 1;
                    if empty_reads >= max {
                        return StreamEnd::Lost(format!("{empty_reads} consecutive empty reads"));
                    }
                    log::warn!("no data received (attempt {empty_reads}/{max})");
                    continue;
                }
                Err(e) => return StreamEnd::Lost(format!("read error: {e}")),
            };

            empty_reads = 0;
            self.stats.lines_read += 1;
            self.panel.leds.set(LedState::Yellow);
            self.handle_line(&line);
        }
    }

    fn handle_line(&mut self, line: &str) {
        let now = Utc::now();
        match self.tracker.process_line(line, now, &mut self.store) {
            Ok(TrackOutcome::Positioned { change, .. }) => {
                let payload = self.presenter.on_position(
                    change,
                    self.panel.switches.as_mut(),
                    self.panel.display.as_mut(),
                    self.tracker.selector(),
                    now,
                );
                if let (Some(payload), Some(broadcaster)) = (payload, &self.broadcaster) {
                    broadcaster.send(payload);
                    self.stats.broadcasts += 1;
                }
            }
            Ok(_) => {}
            Err(
                e @ (RadarError::ShortRecord { .. }
                | RadarError::InvalidField { .. }
                | RadarError::InvalidTimestamp(_)),
            ) => {
                self.stats.decode_failures += 1;
                log::debug!("skipping record: {e}");
            }
            Err(e) => {
                self.stats.store_errors += 1;
                log::error!("record not applied: {e}");
            }
        }
    }

    /// Flush cached identities, clear the display, turn the LEDs off.
    /// Only the first call does anything.
    pub fn cleanup(&mut self) {
        if self.cleaned_up {
            return;
        }
        self.cleaned_up = true;

        let written = self.tracker.flush(&mut self.store);
        log::info!("flushed {written} identities to the store");
        self.panel.display.clear();
        self.panel.leds.set(LedState::Off);
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    #[cfg(test)]
    pub fn store(&self) -> &S {
        &self.store
    }
}

/// Resolves once shutdown is requested or the sender is gone.
async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use planeradar_core::geodesy::ObserverLocation;
    use planeradar_core::hardware::{PriorityPolarity, SwitchLevel};
    use planeradar_core::metadata::AircraftDatabase;
    use planeradar_core::presentation::{DisplayFrame, PresenterConfig};
    use planeradar_core::selector::PriorityMode;
    use tokio::io::AsyncWriteExt;

    use crate::db::Database;
    use crate::panel::FixedSwitches;

    const IDENT: &str = "MSG,1,1,1,3C6481,1,2024/06/01,12:00:00.000,2024/06/01,12:00:00.000,DLH4AB,,,,,,,,,,,0";
    const POS: &str = "MSG,3,1,1,3C6481,1,2024/06/01,12:00:01.000,2024/06/01,12:00:01.000,,5000,,,50.136,8.553,,,0,0,0,0";

    #[derive(Clone)]
    enum Step {
        Line(&'static str),
        Empty,
        Fail,
        Hang,
    }

    struct ScriptedStream {
        steps: VecDeque<Step>,
    }

    #[async_trait]
    impl LineStream for ScriptedStream {
        async fn next_line(&mut self) -> io::Result<Option<String>> {
            match self.steps.pop_front() {
                Some(Step::Line(l)) => Ok(Some(l.to_string())),
                Some(Step::Empty) | None => Ok(None),
                Some(Step::Fail) => Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
                Some(Step::Hang) => std::future::pending().await,
            }
        }
    }

    /// Hands out one scripted session per connect; when the script runs out
    /// it requests shutdown and fails the connect.
    struct ScriptedConnector {
        sessions: VecDeque<Option<Vec<Step>>>,
        connects: usize,
        shutdown: Arc<watch::Sender<bool>>,
    }

    #[async_trait]
    impl FeedConnector for ScriptedConnector {
        async fn connect(&mut self) -> io::Result<Box<dyn LineStream>> {
            self.connects += 1;
            match self.sessions.pop_front() {
                Some(Some(steps)) => Ok(Box::new(ScriptedStream {
                    steps: steps.into(),
                })),
                Some(None) => Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused")),
                None => {
                    let _ = self.shutdown.send(true);
                    Err(io::Error::new(io::ErrorKind::ConnectionRefused, "script done"))
                }
            }
        }

        fn endpoint(&self) -> String {
            "scripted".into()
        }
    }

    #[derive(Default)]
    struct Recorded {
        leds: Vec<LedState>,
        frames: Vec<DisplayFrame>,
        clears: usize,
    }

    struct SharedLeds(Arc<Mutex<Recorded>>);
    struct SharedDisplay(Arc<Mutex<Recorded>>);

    impl StatusLeds for SharedLeds {
        fn set(&mut self, state: LedState) {
            self.0.lock().unwrap().leds.push(state);
        }
    }

    impl Display for SharedDisplay {
        fn show(&mut self, frame: &DisplayFrame) {
            self.0.lock().unwrap().frames.push(frame.clone());
        }
        fn clear(&mut self) {
            self.0.lock().unwrap().clears += 1;
        }
    }

    fn ingestor(screen: SwitchLevel) -> (Ingestor<Database>, Arc<Mutex<Recorded>>) {
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let tracker = Tracker::new(
            ObserverLocation::from_degrees(50.036, 8.553),
            AircraftDatabase::empty(),
            30,
        );
        let presenter = Presenter::new(PresenterConfig {
            screentime_secs: 0,
            keep_on: false,
            broadcast: false,
            polarity: PriorityPolarity::default(),
        });
        let panel = Panel {
            switches: Box::new(FixedSwitches {
                screen,
                priority: SwitchLevel::High,
            }),
            leds: Box::new(SharedLeds(recorded.clone())),
            display: Box::new(SharedDisplay(recorded.clone())),
        };
        let settings = IngestSettings {
            backoff: Duration::from_millis(1),
            max_empty_reads: 5,
        };
        let ing = Ingestor::new(
            tracker,
            Database::open_memory().unwrap(),
            presenter,
            panel,
            None,
            settings,
        );
        (ing, recorded)
    }

    fn connector(sessions: Vec<Option<Vec<Step>>>) -> (ScriptedConnector, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (
            ScriptedConnector {
                sessions: sessions.into(),
                connects: 0,
                shutdown: Arc::new(tx),
            },
            rx,
        )
    }

    #[tokio::test]
    async fn test_lines_processed_until_shutdown() {
        let (mut ing, recorded) = ingestor(SwitchLevel::High);
        let (mut conn, rx) = connector(vec![Some(vec![Step::Line(IDENT), Step::Line(POS)])]);

        let stats = ing.run(&mut conn, rx).await;

        assert_eq!(stats.lines_read, 2);
        assert_eq!(stats.connections, 1);
        assert_eq!(ing.store().count_positions(), 1);
        let selected = ing.tracker().selector().selected(PriorityMode::Nearest).unwrap();
        assert_eq!(selected.identity.callsign, "DLH4AB");

        let rec = recorded.lock().unwrap();
        assert!(!rec.frames.is_empty());
        assert_eq!(rec.frames.last().unwrap().header, "DLH4AB");
        assert_eq!(rec.leds.last(), Some(&LedState::Off));
    }

    #[tokio::test]
    async fn test_five_empty_reads_trigger_one_reconnect() {
        let (mut ing, _recorded) = ingestor(SwitchLevel::Low);
        let (mut conn, rx) = connector(vec![
            Some(vec![
                Step::Line(IDENT),
                Step::Empty,
                Step::Empty,
                Step::Empty,
                Step::Empty,
                Step::Empty,
                // Never read: the connection is torn down first.
                Step::Line(POS),
            ]),
            Some(vec![Step::Line(POS)]),
        ]);

        let stats = ing.run(&mut conn, rx).await;

        // Session one, session two, then the script-exhausted connect.
        assert_eq!(conn.connects, 3);
        assert_eq!(stats.connections, 2);
        assert_eq!(stats.lines_read, 2);
        let rolling = ing.store().count_positions();
        assert_eq!(rolling, 1, "only the second session's position is stored");
    }

    #[tokio::test]
    async fn test_fewer_empty_reads_keep_connection() {
        let (mut ing, _recorded) = ingestor(SwitchLevel::Low);
        let (mut conn, rx) = connector(vec![Some(vec![
            Step::Line(IDENT),
            Step::Empty,
            Step::Empty,
            Step::Empty,
            Step::Empty,
            Step::Line(POS),
        ])]);

        let stats = ing.run(&mut conn, rx).await;

        assert_eq!(stats.lines_read, 2);
        assert_eq!(stats.empty_reads, 4 + 5);
        assert_eq!(ing.store().count_positions(), 1);
    }

    #[tokio::test]
    async fn test_blank_keepalive_lines_count_as_empty_reads() {
        let (mut ing, _recorded) = ingestor(SwitchLevel::Low);
        let (mut conn, rx) = connector(vec![
            Some(vec![
                Step::Line(IDENT),
                Step::Line(""),
                Step::Line("  "),
                Step::Line("\r"),
                Step::Line(""),
                Step::Line(""),
                Step::Line(POS),
            ]),
            Some(vec![Step::Line(POS)]),
        ]);

        let stats = ing.run(&mut conn, rx).await;

        assert_eq!(conn.connects, 3);
        assert_eq!(stats.connections, 2);
        assert_eq!(stats.lines_read, 2);
        assert_eq!(stats.empty_reads, 5 + 5);
        assert_eq!(ing.store().count_positions(), 1);
    }

    #[tokio::test]
    async fn test_socket_errors_reconnect() {
        let (mut ing, _recorded) = ingestor(SwitchLevel::Low);
        let (mut conn, rx) = connector(vec![
            None,
            Some(vec![Step::Line(IDENT), Step::Fail]),
            Some(vec![Step::Line(POS)]),
        ]);

        let stats = ing.run(&mut conn, rx).await;

        assert_eq!(stats.connect_failures, 2);
        assert_eq!(stats.connections, 2);
        assert_eq!(ing.store().count_positions(), 1);
    }

    #[tokio::test]
    async fn test_malformed_lines_skipped() {
        let (mut ing, _recorded) = ingestor(SwitchLevel::Low);
        let (mut conn, rx) = connector(vec![Some(vec![
            Step::Line("MSG,3,1,1,3C6481"),
            Step::Line("garbage"),
            Step::Line(IDENT),
            Step::Line(POS),
        ])]);

        let stats = ing.run(&mut conn, rx).await;

        assert_eq!(stats.decode_failures, 1);
        assert_eq!(stats.lines_read, 4);
        assert_eq!(ing.store().count_positions(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_while_waiting_runs_cleanup_once() {
        let (mut ing, recorded) = ingestor(SwitchLevel::Low);
        let (mut conn, rx) = connector(vec![Some(vec![Step::Line(IDENT), Step::Hang])]);
        let tx = conn.shutdown.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let _ = tx.send(true);
        });
        ing.run(&mut conn, rx).await;
        ing.cleanup();

        assert_eq!(conn.connects, 1);
        let rec = recorded.lock().unwrap();
        assert_eq!(rec.clears, 1);
        assert_eq!(rec.leds.iter().filter(|s| **s == LedState::Off).count(), 1);

        // The cached identity was flushed on the way out.
        let stored = ing.store().recent_identities(1).unwrap();
        assert_eq!(stored[0].message_count, 1);
    }

    #[tokio::test]
    async fn test_tcp_feed_reads_lines() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            sock.write_all(b"first\r\nsecond\n").await.unwrap();
        });

        let mut feed = TcpFeed::new("127.0.0.1", port);
        assert_eq!(feed.endpoint(), format!("127.0.0.1:{port}"));
        let mut stream = feed.connect().await.unwrap();
        assert_eq!(stream.next_line().await.unwrap().as_deref(), Some("first"));
        assert_eq!(stream.next_line().await.unwrap().as_deref(), Some("second"));
        assert_eq!(stream.next_line().await.unwrap(), None);
    }
}
