//! planeradar-core: closest-aircraft tracking library for SBS feeds.
//!
//! No async, no sockets, no database driver. Decoding, geodesy, the identity
//! cache, position tracking, selection and the presentation model live here;
//! `planeradar-server` supplies the feed, the SQLite store and the hardware.

pub mod config;
pub mod geodesy;
pub mod hardware;
pub mod identity;
pub mod metadata;
pub mod position;
pub mod presentation;
pub mod sbs;
pub mod selector;
pub mod store;
pub mod tracker;
pub mod types;

// Re-export commonly used types at crate root
pub use geodesy::ObserverLocation;
pub use metadata::AircraftDatabase;
pub use sbs::{decode_line, SbsRecord};
pub use selector::{ClosestSelector, PriorityMode, Selection, SelectionChange};
pub use store::RadarStore;
pub use tracker::{TrackOutcome, Tracker};
pub use types::*;
