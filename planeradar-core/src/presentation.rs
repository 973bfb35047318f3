//! Presentation: refresh throttle, display frame, broadcast payload, and
//! the screen/priority switch glue that decides when to use them.

use chrono::{DateTime, Duration, Local, Utc};
use serde::Serialize;

use crate::geodesy::bearing_text;
use crate::hardware::{Display, PriorityPolarity, SwitchLevel, Switches};
use crate::selector::{ClosestSelector, PriorityMode, Selection, SelectionChange};

// ---------------------------------------------------------------------------
// Refresh throttle
// ---------------------------------------------------------------------------

/// Refresh decision. An interval below one second means always; otherwise
/// refresh when nothing was shown yet or the interval has fully elapsed.
pub fn should_refresh(
    interval_secs: u64,
    last_refresh: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    if interval_secs < 1 {
        return true;
    }
    match last_refresh {
        None => true,
        Some(last) => now - last >= Duration::seconds(interval_secs as i64),
    }
}

/// [`should_refresh`] with the last-refresh timestamp kept for the caller.
#[derive(Debug, Clone)]
pub struct RefreshThrottle {
    interval_secs: u64,
    last_refresh: Option<DateTime<Utc>>,
}

impl RefreshThrottle {
    pub fn new(interval_secs: u64) -> Self {
        RefreshThrottle {
            interval_secs,
            last_refresh: None,
        }
    }

    /// True if a refresh is due; records `now` as the refresh time if so.
    pub fn try_refresh(&mut self, now: DateTime<Utc>) -> bool {
        if should_refresh(self.interval_secs, self.last_refresh, now) {
            self.last_refresh = Some(now);
            true
        } else {
            false
        }
    }

    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.last_refresh
    }
}

// ---------------------------------------------------------------------------
// Display frame
// ---------------------------------------------------------------------------

/// Text content for the 128x64 panel. Layout and fonts belong to the
/// renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayFrame {
    pub header: String,
    pub altitude: String,
    pub distance: String,
    pub typecode: String,
    pub time: String,
    pub bearing_rad: f64,
    pub bearing_text: String,
    pub low_altitude_priority: bool,
    pub keep_on: bool,
}

impl DisplayFrame {
    pub fn new(selection: &Selection, mode: PriorityMode, keep_on: bool) -> Self {
        let report = &selection.report;
        let identity = &selection.identity;
        let received = report.received.with_timezone(&Local);
        DisplayFrame {
            header: header(&identity.callsign, identity.registration.as_deref()),
            altitude: format!("Alt: {} ft", report.altitude_ft),
            distance: format!("Dist: {} km", distance_text(report.distance_km)),
            typecode: format!("Type: {}", identity.typecode.as_deref().unwrap_or("")),
            time: format!("{} ({})", received.format("%H:%M:%S"), report.sequence),
            bearing_rad: report.bearing_rad,
            bearing_text: bearing_text(report.bearing_rad),
            low_altitude_priority: mode == PriorityMode::LowAltitude,
            keep_on,
        }
    }
}

/// `"DLH4AB (D-AIBA)"`, or just the callsign without a registration.
pub fn header(callsign: &str, registration: Option<&str>) -> String {
    match registration {
        Some(reg) if !reg.is_empty() => format!("{callsign} ({reg})"),
        _ => callsign.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Broadcast payload
// ---------------------------------------------------------------------------

pub const MODE_PENALTY_ON: &str = "ALT PNY on";
pub const MODE_PENALTY_OFF: &str = "ALT PNY off";

/// Flat object POSTed to the broadcast endpoint. Missing values are `"-"`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BroadcastPayload {
    pub callsign: String,
    pub registration: String,
    pub altitude: String,
    pub distance: String,
    #[serde(rename = "type")]
    pub typecode: String,
    pub bearing: String,
    pub timestamp: String,
    pub message_num: u32,
    pub mode: String,
}

impl BroadcastPayload {
    pub fn new(selection: &Selection, mode: PriorityMode) -> Self {
        let report = &selection.report;
        let identity = &selection.identity;
        BroadcastPayload {
            callsign: dash(Some(identity.callsign.as_str())),
            registration: dash(identity.registration.as_deref()),
            altitude: report.altitude_ft.to_string(),
            distance: distance_text(report.distance_km),
            typecode: dash(identity.typecode.as_deref()),
            bearing: bearing_text(report.bearing_rad),
            timestamp: report
                .received
                .with_timezone(&Local)
                .format("%H:%M:%S")
                .to_string(),
            message_num: report.sequence,
            mode: match mode {
                PriorityMode::LowAltitude => MODE_PENALTY_ON,
                PriorityMode::Nearest => MODE_PENALTY_OFF,
            }
            .to_string(),
        }
    }
}

/// Kilometres with at least one decimal: `11.0`, `11.12`.
fn distance_text(km: f64) -> String {
    format!("{km:?}")
}

fn dash(value: Option<&str>) -> String {
    match value {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => "-".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Presenter
// ---------------------------------------------------------------------------

/// Presentation settings.
#[derive(Debug, Clone)]
pub struct PresenterConfig {
    pub screentime_secs: u64,
    pub keep_on: bool,
    pub broadcast: bool,
    pub polarity: PriorityPolarity,
}

/// Screen on/off tracking, priority switch tracking, and the refresh
/// throttle. Owned by the ingestion loop.
#[derive(Debug, Clone)]
pub struct Presenter {
    config: PresenterConfig,
    throttle: RefreshThrottle,
    screen_on: bool,
    last_priority: Option<SwitchLevel>,
}

impl Presenter {
    pub fn new(config: PresenterConfig) -> Self {
        Presenter {
            throttle: RefreshThrottle::new(config.screentime_secs),
            config,
            screen_on: false,
            last_priority: None,
        }
    }

    pub fn is_screen_on(&self) -> bool {
        self.screen_on
    }

    /// Follow the screen switch. Turning off clears the display; turning on
    /// shows the current selection (throttle permitting).
    pub fn poll_screen(
        &mut self,
        switches: &mut dyn Switches,
        display: &mut dyn Display,
        selector: &ClosestSelector,
        now: DateTime<Utc>,
    ) {
        let level = switches.screen();
        if self.screen_on && level != SwitchLevel::High {
            display.clear();
            self.screen_on = false;
        } else if !self.screen_on && level == SwitchLevel::High {
            self.screen_on = true;
            let mode = self.config.polarity.mode(switches.priority());
            self.show(display, selector, mode, now);
        }
    }

    /// React to a processed position record. A priority-switch change counts
    /// as a change even when no slot moved. Returns the payload to broadcast,
    /// if broadcasting is enabled and something is selected.
    pub fn on_position(
        &mut self,
        change: SelectionChange,
        switches: &mut dyn Switches,
        display: &mut dyn Display,
        selector: &ClosestSelector,
        now: DateTime<Utc>,
    ) -> Option<BroadcastPayload> {
        let level = switches.priority();
        let mut changed = change.any();
        if self.last_priority != Some(level) {
            self.last_priority = Some(level);
            changed = true;
        }
        if !changed {
            return None;
        }

        let mode = self.config.polarity.mode(level);
        if self.screen_on {
            self.show(display, selector, mode, now);
        }
        if self.config.broadcast {
            selector
                .selected(mode)
                .map(|selection| BroadcastPayload::new(selection, mode))
        } else {
            None
        }
    }

    fn show(
        &mut self,
        display: &mut dyn Display,
        selector: &ClosestSelector,
        mode: PriorityMode,
        now: DateTime<Utc>,
    ) {
        let Some(selection) = selector.selected(mode) else {
            return;
        };
        if self.throttle.try_refresh(now) {
            display.show(&DisplayFrame::new(selection, mode, self.config.keep_on));
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
