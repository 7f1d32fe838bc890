use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
/// Thresholds for turning raw fixes into a movement classification
pub struct MovementConfig {
    /// Number of samples averaged together
    pub smoothing_window: usize,
    /// Below this smoothed speed (km/h) the device is considered stopped
    pub stopped_threshold_kmh: f64,
    /// Heading change (degrees) between two samples above which we call it a turn
    pub turning_threshold_deg: f64,
    /// Movement shorter than this (meters) is treated as GPS jitter and never changes direction
    pub direction_min_distance_m: f64,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            smoothing_window: 3,
            stopped_threshold_kmh: 2.0,
            turning_threshold_deg: 15.0,
            direction_min_distance_m: 10.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
/// Settings for turn-by-turn guidance
pub struct NavigationConfig {
    /// Distances (meters) before a maneuver at which it's announced, an immediate (0m) trigger is
    /// always added on top of these
    pub trigger_distances_m: Vec<u32>,
    /// Once closer than this (meters) to the maneuver we move on to the next step
    pub advance_radius_m: f64,
    /// Rough duration estimate, minutes per remaining kilometer
    pub minutes_per_km: f64,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            trigger_distances_m: vec![500, 100, 20],
            advance_radius_m: 20.0,
            minutes_per_km: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
/// Throttling and scoring for ambient commentary
pub struct ObservationConfig {
    /// No observations while the next maneuver is closer than this (meters)
    pub navigation_quiet_radius_m: f64,
    /// Minimum distance (meters) between two observations
    pub min_distance_m: f64,
    /// Minimum time between two observations
    pub min_interval_ms: u64,
    /// Chance (0 to 1) to still observe while stopped
    pub stopped_chance: f64,
    /// Speed (km/h) below which the device counts as stopped for the gate above
    pub stopped_threshold_kmh: f64,
    /// Interest score a location must exceed before commenting on it
    pub interest_threshold: u32,
    /// Maximum number of past observations remembered
    pub history_size: usize,
    /// Radius (meters) used for point of interest lookups
    pub poi_radius_m: u32,
    /// Highway speed (km/h) below which we assume a traffic jam
    pub traffic_jam_speed_kmh: f64,
    /// Discard an observation if the exact same text was already said
    pub suppress_repeats: bool,
}

impl Default for ObservationConfig {
    fn default() -> Self {
        Self {
            navigation_quiet_radius_m: 600.0,
            min_distance_m: 500.0,
            min_interval_ms: 30_000,
            stopped_chance: 0.3,
            stopped_threshold_kmh: 2.0,
            interest_threshold: 50,
            history_size: 50,
            poi_radius_m: 200,
            traffic_jam_speed_kmh: 18.0,
            suppress_repeats: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
/// Settings for the whole companion, every field falls back to its default when missing
pub struct CompanionSettings {
    /// Seed for the random source used by the stopped-observation gate
    pub random_seed: u32,
    /// Time limit for any single call to an external provider
    pub provider_timeout_ms: u64,
    pub movement: MovementConfig,
    pub navigation: NavigationConfig,
    pub observation: ObservationConfig,
}

impl CompanionSettings {
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_millis(self.provider_timeout_ms)
    }
}

impl Default for CompanionSettings {
    fn default() -> Self {
        Self {
            random_seed: rand::random_range(0..=u32::MAX),
            provider_timeout_ms: 10_000,
            movement: MovementConfig::default(),
            navigation: NavigationConfig::default(),
            observation: ObservationConfig::default(),
        }
    }
}
