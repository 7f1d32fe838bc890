use std::collections::VecDeque;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    geodesy,
    location::{LocationFix, Millis},
    settings::MovementConfig,
};

const MPS_TO_KMH: f64 = 3.6;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
/// What kind of stretch of road we're on
pub enum RouteState {
    /// Not enough samples yet
    #[default]
    Detecting,
    Straight,
    Turning,
    Stopped,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
/// Smoothed movement at a point in time
pub struct MovementSample {
    /// Mean speed over the smoothing window, km/h
    pub speed_kmh: f64,
    /// Mean direction over the window in degrees, [None] until we've actually moved
    pub direction: Option<f64>,
    /// Timestamp of the fix this sample was derived from
    pub timestamp_ms: Millis,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
/// A change of [RouteState], reported once per transition
pub struct RouteChange {
    pub previous: RouteState,
    pub current: RouteState,
}

#[derive(Debug, Clone, Copy)]
struct WindowEntry {
    speed_kmh: f64,
    direction: Option<f64>,
}

/// Turns a stream of noisy fixes into smoothed speed and direction and classifies the route.
pub struct MovementTracker {
    config: MovementConfig,
    previous_fix: Option<LocationFix>,
    window: VecDeque<WindowEntry>,
    /// Last raw direction, kept while we're only jittering around
    raw_direction: Option<f64>,
    /// The two most recent smoothed samples, oldest first
    recent: [Option<MovementSample>; 2],
    state: RouteState,
}

impl MovementTracker {
    pub fn new(config: MovementConfig) -> Self {
        let capacity = config.smoothing_window.max(1);
        Self {
            config,
            previous_fix: None,
            window: VecDeque::with_capacity(capacity),
            raw_direction: None,
            recent: [None, None],
            state: RouteState::Detecting,
        }
    }

    pub fn state(&self) -> RouteState {
        self.state
    }

    /// The latest smoothed sample, if any fix has been processed
    pub fn latest(&self) -> Option<MovementSample> {
        self.recent[1]
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    /// Ingest a fix and produce the new smoothed sample
    pub fn update(&mut self, fix: &LocationFix) -> MovementSample {
        let Some(prev) = self.previous_fix.replace(*fix) else {
            // Nothing to measure against yet
            let sample = MovementSample {
                speed_kmh: fix.speed_mps.map(|s| s * MPS_TO_KMH).unwrap_or(0.0),
                direction: None,
                timestamp_ms: fix.timestamp_ms,
            };
            self.push_recent(sample);
            return sample;
        };

        let moved = prev.distance_to(fix);
        let elapsed_secs = (fix.timestamp_ms as f64 - prev.timestamp_ms as f64) / 1000.0;

        let speed_kmh = match fix.speed_mps {
            Some(reported) => reported * MPS_TO_KMH,
            None if elapsed_secs > 0.0 => moved / elapsed_secs * MPS_TO_KMH,
            // Duplicate or out of order timestamps, don't let them look like a stop
            None => self.latest().map(|s| s.speed_kmh).unwrap_or(0.0),
        };

        if moved > self.config.direction_min_distance_m {
            if let Some(bearing) = geodesy::bearing(prev.lat, prev.lon, fix.lat, fix.lon) {
                self.raw_direction = Some(bearing);
            }
        }

        self.window.push_back(WindowEntry {
            speed_kmh,
            direction: self.raw_direction,
        });
        while self.window.len() > self.config.smoothing_window.max(1) {
            self.window.pop_front();
        }

        let sample = MovementSample {
            speed_kmh: self.smoothed_speed(),
            direction: self.smoothed_direction(),
            timestamp_ms: fix.timestamp_ms,
        };

        debug!(
            "Movement: {:.1} km/h, direction {:?}, moved {moved:.1}m",
            sample.speed_kmh, sample.direction
        );

        self.push_recent(sample);
        sample
    }

    /// Re-evaluate the [RouteState] after an [Self::update], returns the change if there was one
    pub fn classify(&mut self) -> Option<RouteChange> {
        if self.window.len() < 2 {
            return None;
        }

        let sample = self.latest()?;

        let next = if sample.speed_kmh < self.config.stopped_threshold_kmh {
            RouteState::Stopped
        } else if self.direction_delta() > self.config.turning_threshold_deg {
            RouteState::Turning
        } else {
            RouteState::Straight
        };

        if next == self.state {
            None
        } else {
            let change = RouteChange {
                previous: self.state,
                current: next,
            };
            debug!("Route state {:?} -> {:?}", change.previous, change.current);
            self.state = next;
            Some(change)
        }
    }

    /// Heading change between the two most recent smoothed samples, 0 if either has no direction
    pub fn direction_delta(&self) -> f64 {
        match (
            self.recent[0].and_then(|s| s.direction),
            self.recent[1].and_then(|s| s.direction),
        ) {
            (Some(a), Some(b)) => geodesy::heading_delta(a, b),
            _ => 0.0,
        }
    }

    fn push_recent(&mut self, sample: MovementSample) {
        self.recent[0] = self.recent[1].take();
        self.recent[1] = Some(sample);
    }

    fn smoothed_speed(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        self.window.iter().map(|e| e.speed_kmh).sum::<f64>() / self.window.len() as f64
    }

    /// Plain arithmetic mean of the known directions. This is off near the 0/360 boundary
    /// (350 and 10 average to 180), callers currently live with that.
    fn smoothed_direction(&self) -> Option<f64> {
        let (sum, count) = self
            .window
            .iter()
            .filter_map(|e| e.direction)
            .fold((0.0, 0usize), |(sum, count), d| (sum + d, count + 1));

        (count > 0).then(|| sum / count as f64)
    }
}
