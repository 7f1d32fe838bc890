use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::location::Coordinate;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
/// The driving action at the start of a route step
pub enum ManeuverKind {
    #[default]
    Straight,
    TurnLeft,
    TurnRight,
    SlightLeft,
    SlightRight,
    UTurn,
    Merge,
    RoundaboutEnter,
    RoundaboutExit,
}

impl ManeuverKind {
    /// Spoken Dutch phrase for this maneuver
    pub fn phrase(&self) -> &'static str {
        match self {
            Self::Straight => "Ga rechtdoor",
            Self::TurnLeft => "Sla linksaf",
            Self::TurnRight => "Sla rechtsaf",
            Self::SlightLeft => "Houd links aan",
            Self::SlightRight => "Houd rechts aan",
            Self::UTurn => "Keer om",
            Self::Merge => "Voeg in",
            Self::RoundaboutEnter => "Ga de rotonde op",
            Self::RoundaboutExit => "Verlaat de rotonde",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// One maneuver as returned by a routing provider
pub struct ProviderStep {
    /// Length of this step in meters
    pub distance_m: f64,
    /// Expected time for this step in seconds
    pub duration_s: f64,
    /// Instruction text, synthesized from [Self::maneuver] when missing
    #[serde(default)]
    pub instruction: Option<String>,
    #[serde(default)]
    pub maneuver: ManeuverKind,
    /// Where the maneuver happens
    #[serde(default)]
    pub target: Option<Coordinate>,
    #[serde(default)]
    pub road_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// A full route as returned by a routing provider
pub struct RouteResponse {
    pub distance_m: f64,
    pub duration_s: f64,
    /// Polyline of the whole route
    pub geometry: Vec<Coordinate>,
    pub steps: Vec<ProviderStep>,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RouteError {
    #[error("no route found, the provider returned no steps")]
    NoSteps,
    #[error("route has no geometry")]
    NoGeometry,
    #[error("route step {index} is malformed: {reason}")]
    MalformedStep { index: usize, reason: &'static str },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// A step of the active route along with its announcement bookkeeping
pub struct RouteStep {
    pub index: usize,
    pub instruction: String,
    pub maneuver: ManeuverKind,
    pub distance_m: f64,
    pub duration_s: f64,
    pub target: Option<Coordinate>,
    /// Announcement distances in meters, descending, always ending with 0
    pub triggers: Vec<u32>,
    /// Parallel to [Self::triggers], whether that trigger was already spoken
    spoken: Vec<bool>,
}

impl RouteStep {
    pub fn from_provider(index: usize, step: &ProviderStep, trigger_distances: &[u32]) -> Self {
        let triggers = trigger_points(step.distance_m, trigger_distances);
        Self {
            index,
            instruction: instruction_text(step),
            maneuver: step.maneuver,
            distance_m: step.distance_m,
            duration_s: step.duration_s,
            target: step.target,
            spoken: vec![false; triggers.len()],
            triggers,
        }
    }

    /// First trigger (largest distance first) we're within range of that hasn't been spoken yet
    pub fn due_trigger(&self, distance_to_step: f64) -> Option<u32> {
        self.triggers
            .iter()
            .zip(self.spoken.iter())
            .find(|(d, spoken)| !**spoken && distance_to_step <= f64::from(**d))
            .map(|(d, _)| *d)
    }

    pub fn mark_spoken(&mut self, trigger: u32) {
        if let Some(i) = self.triggers.iter().position(|d| *d == trigger) {
            self.spoken[i] = true;
        }
    }

    pub fn was_spoken(&self, trigger: u32) -> bool {
        self.triggers
            .iter()
            .position(|d| *d == trigger)
            .is_some_and(|i| self.spoken[i])
    }

    pub fn reset_spoken(&mut self) {
        self.spoken.iter_mut().for_each(|s| *s = false);
    }

    /// Text to speak for a trigger
    pub fn announcement(&self, trigger: u32) -> String {
        let instruction = self.instruction.to_lowercase();
        if trigger > 0 {
            format!("Over {trigger} meter, {instruction}")
        } else {
            format!("Nu {instruction}")
        }
    }
}

/// Trigger distances shorter than the step itself, largest first, plus an immediate one
pub fn trigger_points(step_distance_m: f64, trigger_distances: &[u32]) -> Vec<u32> {
    let mut triggers = trigger_distances
        .iter()
        .copied()
        .filter(|d| *d > 0 && step_distance_m > f64::from(*d))
        .collect::<Vec<_>>();
    triggers.push(0);
    triggers.sort_unstable_by(|a, b| b.cmp(a));
    triggers.dedup();
    triggers
}

/// The provider's own text if it gave one, otherwise a phrase for the maneuver and road
pub fn instruction_text(step: &ProviderStep) -> String {
    if let Some(text) = step.instruction.as_deref().map(str::trim) {
        if !text.is_empty() {
            return text.to_string();
        }
    }

    let phrase = step.maneuver.phrase();
    match step.road_name.as_deref().map(str::trim) {
        Some(road) if !road.is_empty() && !road.eq_ignore_ascii_case("unknown") => {
            format!("{phrase} naar de {road}")
        }
        _ => phrase.to_string(),
    }
}

/// Reject routes we can't guide on
pub fn validate(route: &RouteResponse) -> Result<(), RouteError> {
    if route.steps.is_empty() {
        return Err(RouteError::NoSteps);
    }

    if route.geometry.is_empty() {
        return Err(RouteError::NoGeometry);
    }

    for (index, step) in route.steps.iter().enumerate() {
        if !step.distance_m.is_finite() || step.distance_m < 0.0 {
            return Err(RouteError::MalformedStep {
                index,
                reason: "invalid distance",
            });
        }
        if !step.duration_s.is_finite() || step.duration_s < 0.0 {
            return Err(RouteError::MalformedStep {
                index,
                reason: "invalid duration",
            });
        }
        if step.target.is_some_and(|t| !t.is_valid()) {
            return Err(RouteError::MalformedStep {
                index,
                reason: "invalid target coordinate",
            });
        }
    }

    Ok(())
}
