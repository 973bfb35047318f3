//! Flat-earth distance and bearing from a fixed observer.
//!
//! Equirectangular approximation around the observer latitude. Good enough
//! for the ~300 km radius a single receiver hears; no great-circle
//! correction is applied.

/// Mean earth radius in kilometres.
pub const R0_KM: f64 = 6371.0;

/// A point in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub fn from_degrees(lat_deg: f64, lon_deg: f64) -> Self {
        LatLon {
            lat: lat_deg.to_radians(),
            lon: lon_deg.to_radians(),
        }
    }
}

/// Receiver location. Fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObserverLocation {
    position: LatLon,
}

impl ObserverLocation {
    pub fn from_degrees(lat_deg: f64, lon_deg: f64) -> Self {
        ObserverLocation {
            position: LatLon::from_degrees(lat_deg, lon_deg),
        }
    }

    pub fn position(&self) -> LatLon {
        self.position
    }

    /// Distance to an aircraft given in degrees.
    pub fn distance_to(&self, lat_deg: f64, lon_deg: f64) -> f64 {
        distance_km(LatLon::from_degrees(lat_deg, lon_deg), self.position)
    }

    /// Bearing (radians) to an aircraft given in degrees.
    pub fn bearing_to(&self, lat_deg: f64, lon_deg: f64) -> f64 {
        bearing_rad(LatLon::from_degrees(lat_deg, lon_deg), self.position)
    }
}

/// Round half away from zero to two decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Distance in km, rounded to 2 decimals.
pub fn distance_km(aircraft: LatLon, observer: LatLon) -> f64 {
    let f0 = observer.lat.cos();
    let dlat = aircraft.lat - observer.lat;
    let dlon = aircraft.lon - observer.lon;
    round2(R0_KM * (dlat.powi(2) + f0.powi(2) * dlon.powi(2)).sqrt())
}

/// Bearing in radians, 0 = north, clockwise positive, range (-pi, pi].
pub fn bearing_rad(aircraft: LatLon, observer: LatLon) -> f64 {
    let f0 = observer.lat.cos();
    let dlat = aircraft.lat - observer.lat;
    let dlon = aircraft.lon - observer.lon;
    (dlon * f0).atan2(dlat)
}

/// Bearing in degrees, normalised into [0, 360) and rounded to 2 decimals.
pub fn bearing_deg(bearing_rad: f64) -> f64 {
    round2(bearing_rad.to_degrees().rem_euclid(360.0))
}

/// Three-digit compass text, e.g. `"007"`, `"270"`.
pub fn bearing_text(bearing_rad: f64) -> String {
    format!("{:03}", bearing_deg(bearing_rad) as u32)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
