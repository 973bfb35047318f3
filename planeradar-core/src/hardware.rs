//! Host-provided panel I/O: two switches, two status LEDs, a small display.
//!
//! The tracker never touches hardware directly; the binary injects
//! implementations of these traits.

use serde::Serialize;

use crate::presentation::DisplayFrame;
use crate::selector::PriorityMode;

/// Raw level read from a switch input. Inputs are pulled up, so an
/// unconnected switch reads High.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum SwitchLevel {
    Low,
    #[default]
    High,
}

impl SwitchLevel {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" | "0" | "false" => Some(SwitchLevel::Low),
            "high" | "1" | "true" => Some(SwitchLevel::High),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SwitchLevel::Low => "low",
            SwitchLevel::High => "high",
        }
    }
}

/// Maps the priority switch level to a [`PriorityMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorityPolarity {
    /// Level that selects [`PriorityMode::LowAltitude`].
    pub low_altitude_level: SwitchLevel,
}

impl PriorityPolarity {
    pub fn new(low_altitude_level: SwitchLevel) -> Self {
        PriorityPolarity { low_altitude_level }
    }

    pub fn mode(&self, level: SwitchLevel) -> PriorityMode {
        if level == self.low_altitude_level {
            PriorityMode::LowAltitude
        } else {
            PriorityMode::Nearest
        }
    }
}

impl Default for PriorityPolarity {
    /// Pull-up input: closing the switch pulls it low.
    fn default() -> Self {
        PriorityPolarity::new(SwitchLevel::Low)
    }
}

pub trait Switches {
    /// High means the screen should be on.
    fn screen(&mut self) -> SwitchLevel;

    fn priority(&mut self) -> SwitchLevel;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedState {
    Off,
    /// Waiting for feed data.
    Green,
    /// Processing a record or reconnecting.
    Yellow,
}

pub trait StatusLeds {
    fn set(&mut self, state: LedState);
}

pub trait Display {
    fn show(&mut self, frame: &DisplayFrame);

    fn clear(&mut self);
}
