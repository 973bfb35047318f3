//! Development panel: fixed switch levels, LEDs and display that log.
//!
//! Stand-ins for the GPIO switches, status LEDs and OLED so the tracker runs
//! on any host.

use planeradar_core::hardware::{Display, LedState, StatusLeds, SwitchLevel, Switches};
use planeradar_core::presentation::DisplayFrame;

/// Switches held at fixed levels.
#[derive(Debug, Clone)]
pub struct FixedSwitches {
    pub screen: SwitchLevel,
    pub priority: SwitchLevel,
}

impl Switches for FixedSwitches {
    fn screen(&mut self) -> SwitchLevel {
        self.screen
    }

    fn priority(&mut self) -> SwitchLevel {
        self.priority
    }
}

/// LEDs that log state transitions.
#[derive(Debug, Default)]
pub struct LogLeds {
    state: Option<LedState>,
}

impl LogLeds {
    #[cfg(test)]
    pub fn state(&self) -> Option<LedState> {
        self.state
    }
}

impl StatusLeds for LogLeds {
    fn set(&mut self, state: LedState) {
        if self.state != Some(state) {
            log::trace!("leds: {state:?}");
            self.state = Some(state);
        }
    }
}

/// Display that logs each frame on one line.
#[derive(Debug, Default)]
pub struct LogDisplay {
    pub frames_shown: u64,
}

impl Display for LogDisplay {
    fn show(&mut self, frame: &DisplayFrame) {
        self.frames_shown += 1;
        log::info!(
            "{} | {} | {} | {} | {} | brg {}{}",
            frame.header,
            frame.altitude,
            frame.distance,
            frame.typecode,
            frame.time,
            frame.bearing_text,
            if frame.low_altitude_priority { " | ALT PNY" } else { "" }
        );
    }

    fn clear(&mut self) {
        log::info!("display cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_switches() {
        let mut s = FixedSwitches {
            screen: SwitchLevel::High,
            priority: SwitchLevel::Low,
        };
        assert_eq!(s.screen(), SwitchLevel::High);
        assert_eq!(s.priority(), SwitchLevel::Low);
    }

    #[test]
    fn test_leds_track_state() {
        let mut leds = LogLeds::default();
        assert_eq!(leds.state(), None);
        leds.set(LedState::Yellow);
        leds.set(LedState::Green);
        assert_eq!(leds.state(), Some(LedState::Green));
    }
}
