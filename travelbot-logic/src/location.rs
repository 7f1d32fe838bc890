use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geodesy;

/// A "part" of a location
pub type LocationComponent = f64;

/// Milliseconds on a monotonic clock, as stamped by the location source
pub type Millis = u64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
/// Some point in the world
pub struct Coordinate {
    /// Latitude
    pub lat: LocationComponent,
    /// Longitude
    pub lon: LocationComponent,
}

impl Coordinate {
    pub const fn new(lat: LocationComponent, lon: LocationComponent) -> Self {
        Self { lat, lon }
    }

    /// Great-circle distance to another coordinate in meters
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        geodesy::distance(self.lat, self.lon, other.lat, other.lon)
    }

    /// Initial bearing towards another coordinate, [None] if they coincide
    pub fn bearing_to(&self, other: &Coordinate) -> Option<f64> {
        geodesy::bearing(self.lat, self.lon, other.lat, other.lon)
    }

    /// Coordinate reached after moving `meters` along `bearing`
    pub fn offset(&self, bearing: f64, meters: f64) -> Self {
        let (lat, lon) = geodesy::offset(self.lat, self.lon, bearing, meters);
        Self { lat, lon }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
/// One raw position sample as delivered by a Geolocation API
pub struct LocationFix {
    pub lat: LocationComponent,
    pub lon: LocationComponent,
    /// Horizontal accuracy radius in meters
    pub accuracy_m: f64,
    /// Speed reported by the receiver in m/s, not every source has one
    #[serde(default)]
    pub speed_mps: Option<f64>,
    /// Heading reported by the receiver in degrees
    #[serde(default)]
    pub heading: Option<f64>,
    /// When the fix was captured
    pub timestamp_ms: Millis,
}

#[derive(Debug, Clone, Copy, Error, PartialEq)]
pub enum FixError {
    #[error("fix has an invalid coordinate ({lat}, {lon})")]
    InvalidCoordinate { lat: f64, lon: f64 },
    #[error("fix has an invalid accuracy of {0}m")]
    InvalidAccuracy(f64),
    #[error("fix has an invalid speed of {0}m/s")]
    InvalidSpeed(f64),
    #[error("fix has an invalid heading of {0}")]
    InvalidHeading(f64),
    #[error("fix from {got}ms is older than the last processed fix from {last}ms")]
    OutOfOrder { last: Millis, got: Millis },
}

impl LocationFix {
    /// A fix at `coord` with no reported speed or heading
    pub fn at(coord: Coordinate, timestamp_ms: Millis) -> Self {
        Self {
            lat: coord.lat,
            lon: coord.lon,
            accuracy_m: 5.0,
            speed_mps: None,
            heading: None,
            timestamp_ms,
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lon)
    }

    pub fn distance_to(&self, other: &LocationFix) -> f64 {
        self.coordinate().distance_to(&other.coordinate())
    }

    /// Check the fix is usable, malformed fixes should be dropped before they reach any state
    pub fn validate(&self) -> Result<(), FixError> {
        if !self.coordinate().is_valid() {
            return Err(FixError::InvalidCoordinate {
                lat: self.lat,
                lon: self.lon,
            });
        }

        if !self.accuracy_m.is_finite() || self.accuracy_m < 0.0 {
            return Err(FixError::InvalidAccuracy(self.accuracy_m));
        }

        if let Some(speed) = self.speed_mps.filter(|s| !s.is_finite() || *s < 0.0) {
            return Err(FixError::InvalidSpeed(speed));
        }

        if let Some(heading) = self.heading.filter(|h| !h.is_finite()) {
            return Err(FixError::InvalidHeading(heading));
        }

        Ok(())
    }
}
