use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    events::{CompanionEvent, NavigationProgress, RouteSummary},
    location::{Coordinate, LocationFix},
    route::{self, RouteError, RouteResponse, RouteStep},
    settings::NavigationConfig,
};

const ARRIVAL_TEXT: &str = "U bent aangekomen op uw bestemming";
const STOPPED_TEXT: &str = "Navigatie gestopt";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum NavigationStatus {
    /// No route yet
    #[default]
    Inactive,
    /// Guiding, see [NavigationSession::current_step_index]
    Active,
    Arrived,
    Stopped,
}

/// Turn-by-turn guidance along one externally computed route.
///
/// The session is fed every fix while [NavigationStatus::Active] and produces the instructions
/// that need speaking. It never suspends, route fetching happens before [Self::start].
#[derive(Debug, Clone)]
pub struct NavigationSession {
    config: NavigationConfig,
    status: NavigationStatus,
    destination: Option<Coordinate>,
    steps: Vec<RouteStep>,
    current_step: usize,
    total_distance_m: f64,
    total_duration_s: f64,
    remaining_distance_m: f64,
    remaining_duration_s: f64,
}

impl NavigationSession {
    pub fn new(config: NavigationConfig) -> Self {
        Self {
            config,
            status: NavigationStatus::Inactive,
            destination: None,
            steps: Vec::new(),
            current_step: 0,
            total_distance_m: 0.0,
            total_duration_s: 0.0,
            remaining_distance_m: 0.0,
            remaining_duration_s: 0.0,
        }
    }

    pub fn status(&self) -> NavigationStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == NavigationStatus::Active
    }

    pub fn destination(&self) -> Option<Coordinate> {
        self.destination
    }

    pub fn steps(&self) -> &[RouteStep] {
        &self.steps
    }

    pub fn current_step_index(&self) -> usize {
        self.current_step
    }

    pub fn current_step(&self) -> Option<&RouteStep> {
        self.is_active()
            .then(|| self.steps.get(self.current_step))
            .flatten()
    }

    pub fn remaining_distance_m(&self) -> f64 {
        self.remaining_distance_m
    }

    pub fn remaining_duration_s(&self) -> f64 {
        self.remaining_duration_s
    }

    /// Begin guiding along `route`. A route we can't guide on leaves the session untouched.
    pub fn start(
        &mut self,
        destination: Coordinate,
        route: &RouteResponse,
    ) -> Result<Vec<CompanionEvent>, RouteError> {
        route::validate(route)?;

        self.steps = route
            .steps
            .iter()
            .enumerate()
            .map(|(i, step)| RouteStep::from_provider(i, step, &self.config.trigger_distances_m))
            .collect();
        self.steps.iter_mut().for_each(RouteStep::reset_spoken);
        self.destination = Some(destination);
        self.current_step = 0;
        self.total_distance_m = route.distance_m;
        self.total_duration_s = route.duration_s;
        self.remaining_distance_m = route.distance_m;
        self.remaining_duration_s = route.duration_s;
        self.status = NavigationStatus::Active;

        info!(
            "Navigation started: {} steps, {:.0}m",
            self.steps.len(),
            self.total_distance_m
        );

        let summary = RouteSummary {
            distance_m: self.total_distance_m,
            duration_s: self.total_duration_s,
            steps: self.steps.len(),
        };

        Ok(vec![
            CompanionEvent::NavigationStarted(summary),
            CompanionEvent::NavigationInstruction(format!(
                "Navigatie gestart. {}",
                self.overview()
            )),
        ])
    }

    /// Spoken overview of the whole route, rounded to kilometers and minutes
    pub fn overview(&self) -> String {
        let km = (self.total_distance_m / 1000.0).round();
        let minutes = (self.total_duration_s / 60.0).round();
        format!("Route van {km} kilometer, ongeveer {minutes} minuten rijden.")
    }

    /// Distance from `at` to the upcoming maneuver, [None] unless guiding.
    /// A step without a target counts as reached.
    pub fn distance_to_step(&self, at: Coordinate) -> Option<f64> {
        self.current_step()
            .map(|step| step.target.map(|t| at.distance_to(&t)).unwrap_or(0.0))
    }

    /// Advance guidance with a new fix
    pub fn on_fix(&mut self, fix: &LocationFix) -> Vec<CompanionEvent> {
        if !self.is_active() {
            return Vec::new();
        }

        let Some(distance_to_step) = self.distance_to_step(fix.coordinate()) else {
            return self.arrive();
        };

        let mut events = Vec::with_capacity(3);

        self.update_remaining(distance_to_step);

        let step = &mut self.steps[self.current_step];
        if let Some(trigger) = step.due_trigger(distance_to_step) {
            step.mark_spoken(trigger);
            let text = step.announcement(trigger);
            debug!("Step {} trigger {trigger}m: {text}", step.index);
            events.push(CompanionEvent::NavigationInstruction(text));
        }

        events.push(CompanionEvent::NavigationProgress(NavigationProgress {
            current_step: self.current_step,
            distance_to_step,
            remaining_distance_m: self.remaining_distance_m,
            remaining_duration_s: self.remaining_duration_s,
            progress_percent: self.progress_percent(),
        }));

        if distance_to_step < self.config.advance_radius_m {
            self.current_step += 1;
            debug!("Advanced to step {}", self.current_step);
            if self.current_step >= self.steps.len() {
                events.extend(self.arrive());
            }
        }

        events
    }

    /// End guidance. Only an active session has anything to announce, calling this again is a no-op.
    pub fn stop(&mut self) -> Vec<CompanionEvent> {
        if self.status == NavigationStatus::Stopped {
            return Vec::new();
        }

        let was_active = self.is_active();
        self.clear();
        self.status = NavigationStatus::Stopped;

        if was_active {
            info!("Navigation stopped");
            vec![
                CompanionEvent::NavigationInstruction(STOPPED_TEXT.to_string()),
                CompanionEvent::NavigationStopped,
            ]
        } else {
            Vec::new()
        }
    }

    fn arrive(&mut self) -> Vec<CompanionEvent> {
        info!("Arrived at destination");
        self.clear();
        self.status = NavigationStatus::Arrived;
        vec![
            CompanionEvent::NavigationInstruction(ARRIVAL_TEXT.to_string()),
            CompanionEvent::Arrived,
        ]
    }

    fn clear(&mut self) {
        self.steps.clear();
        self.destination = None;
        self.current_step = 0;
        self.remaining_distance_m = 0.0;
        self.remaining_duration_s = 0.0;
    }

    fn update_remaining(&mut self, distance_to_step: f64) {
        let rest = self
            .steps
            .iter()
            .skip(self.current_step + 1)
            .map(|s| s.distance_m)
            .sum::<f64>();
        self.remaining_distance_m = distance_to_step + rest;
        self.remaining_duration_s = self.remaining_distance_m / 1000.0 * self.config.minutes_per_km * 60.0;
    }

    fn progress_percent(&self) -> f64 {
        if self.total_distance_m <= 0.0 {
            0.0
        } else {
            ((self.total_distance_m - self.remaining_distance_m) / self.total_distance_m * 100.0)
                .clamp(0.0, 100.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::{ManeuverKind, ProviderStep};

    const ORIGIN: Coordinate = Coordinate::new(52.0, 5.0);

    fn instructions(events: &[CompanionEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                CompanionEvent::NavigationInstruction(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    fn progress(events: &[CompanionEvent]) -> Option<NavigationProgress> {
        events.iter().find_map(|e| match e {
            CompanionEvent::NavigationProgress(p) => Some(p.clone()),
            _ => None,
        })
    }

    /// 1km north to a right turn, then 300m east to the destination
    fn corner_route() -> (RouteResponse, Coordinate, Coordinate) {
        let corner = ORIGIN.offset(0.0, 1_000.0);
        let end = corner.offset(90.0, 300.0);
        let route = RouteResponse {
            distance_m: 1_300.0,
            duration_s: 120.0,
            geometry: vec![ORIGIN, corner, end],
            steps: vec![
                ProviderStep {
                    distance_m: 1_000.0,
                    duration_s: 90.0,
                    instruction: None,
                    maneuver: ManeuverKind::TurnRight,
                    target: Some(corner),
                    road_name: Some("Kerkstraat".to_string()),
                },
                ProviderStep {
                    distance_m: 300.0,
                    duration_s: 30.0,
                    instruction: Some("Bestemming bereikt".to_string()),
                    maneuver: ManeuverKind::Straight,
                    target: Some(end),
                    road_name: None,
                },
            ],
        };
        (route, corner, end)
    }

    fn fix(at: Coordinate, t: u64) -> LocationFix {
        LocationFix::at(at, t)
    }

    fn session() -> NavigationSession {
        NavigationSession::new(NavigationConfig::default())
    }

    #[test]
    fn empty_route_is_rejected() {
        let mut nav = session();
        let route = RouteResponse {
            distance_m: 0.0,
            duration_s: 0.0,
            geometry: vec![ORIGIN],
            steps: vec![],
        };
        assert_eq!(nav.start(ORIGIN, &route), Err(RouteError::NoSteps));
        assert_eq!(nav.status(), NavigationStatus::Inactive);
        assert!(nav.on_fix(&fix(ORIGIN, 0)).is_empty());
    }

    #[test]
    fn start_announces_overview() {
        let mut nav = session();
        let (route, _, end) = corner_route();
        let events = nav.start(end, &route).unwrap();
        assert_eq!(
            events[0],
            CompanionEvent::NavigationStarted(RouteSummary {
                distance_m: 1_300.0,
                duration_s: 120.0,
                steps: 2
            })
        );
        assert_eq!(
            instructions(&events),
            vec!["Navigatie gestart. Route van 1 kilometer, ongeveer 2 minuten rijden.".to_string()]
        );
        assert!(nav.is_active());
        assert_eq!(nav.remaining_distance_m(), 1_300.0);
        assert_eq!(nav.destination(), Some(end));
    }

    #[test]
    fn triggers_fire_in_order_then_advance_once() {
        let mut nav = session();
        let (route, corner, end) = corner_route();
        nav.start(end, &route).unwrap();

        let south = 180.0;
        let stream = [
            corner.offset(south, 1_000.0),
            corner.offset(south, 450.0),
            corner.offset(south, 90.0),
            corner.offset(south, 15.0),
            corner.offset(90.0, 40.0),
        ];

        let mut spoken = vec![];
        let mut indices = vec![];
        for (i, at) in stream.iter().enumerate() {
            let events = nav.on_fix(&fix(*at, i as u64 * 10_000));
            spoken.extend(instructions(&events));
            indices.push(nav.current_step_index());
        }

        assert_eq!(
            spoken,
            vec![
                "Over 500 meter, sla rechtsaf naar de kerkstraat".to_string(),
                "Over 100 meter, sla rechtsaf naar de kerkstraat".to_string(),
                "Over 20 meter, sla rechtsaf naar de kerkstraat".to_string(),
            ]
        );
        assert_eq!(indices, vec![0, 0, 0, 1, 1]);
        assert!(nav.is_active());
    }

    #[test]
    fn one_instruction_per_fix_and_zero_trigger_once() {
        let mut nav = session();
        let (mut route, corner, end) = corner_route();
        // No target, always counts as on top of the maneuver
        route.steps[0].target = None;
        nav.start(end, &route).unwrap();

        let events = nav.on_fix(&fix(corner, 0));
        assert_eq!(instructions(&events).len(), 1);
        // Reached, so we moved on
        assert_eq!(nav.current_step_index(), 1);

        // 300m step, so the 500m announcement doesn't exist for it
        let events = nav.on_fix(&fix(end, 1_000));
        let said = instructions(&events);
        assert_eq!(said[0], "Over 100 meter, bestemming bereikt");
        assert_eq!(nav.status(), NavigationStatus::Arrived);
    }

    #[test]
    fn immediate_trigger_fires_at_most_once() {
        let mut nav = NavigationSession::new(NavigationConfig {
            advance_radius_m: -1.0,
            ..NavigationConfig::default()
        });
        let (route, corner, end) = corner_route();
        nav.start(end, &route).unwrap();

        let mut zero_count = 0;
        for t in 0..10 {
            let events = nav.on_fix(&fix(corner, t * 1000));
            zero_count += instructions(&events)
                .iter()
                .filter(|s| s.starts_with("Nu "))
                .count();
        }
        assert_eq!(zero_count, 1);
        assert!(nav.steps()[0].was_spoken(0));
    }

    #[test]
    fn remaining_distance_never_increases_on_approach() {
        let mut nav = session();
        let (route, corner, end) = corner_route();
        nav.start(end, &route).unwrap();

        let mut last = f64::INFINITY;
        for i in 0..50 {
            let at = corner.offset(180.0, 1_000.0 - i as f64 * 19.0);
            let events = nav.on_fix(&fix(at, i * 1000));
            let p = progress(&events).unwrap();
            assert!(p.remaining_distance_m <= last + 1e-6);
            assert!((p.remaining_duration_s - p.remaining_distance_m / 1000.0 * 60.0).abs() < 1e-6);
            last = p.remaining_distance_m;
        }
        assert!(last < 400.0);
    }

    #[test]
    fn arrival_ends_guidance() {
        let mut nav = session();
        let (route, corner, end) = corner_route();
        nav.start(end, &route).unwrap();

        nav.on_fix(&fix(corner, 0));
        let events = nav.on_fix(&fix(end, 1000));
        assert!(events.contains(&CompanionEvent::Arrived));
        assert!(instructions(&events).contains(&ARRIVAL_TEXT.to_string()));
        assert_eq!(nav.status(), NavigationStatus::Arrived);
        assert!(nav.steps().is_empty());
        assert!(nav.on_fix(&fix(end, 2000)).is_empty());
        assert_eq!(nav.distance_to_step(end), None);
    }

    #[test]
    fn stop_is_idempotent() {
        let mut nav = session();
        let (route, _, end) = corner_route();
        nav.start(end, &route).unwrap();

        let events = nav.stop();
        assert_eq!(
            events,
            vec![
                CompanionEvent::NavigationInstruction(STOPPED_TEXT.to_string()),
                CompanionEvent::NavigationStopped
            ]
        );
        assert_eq!(nav.status(), NavigationStatus::Stopped);
        assert!(nav.stop().is_empty());
        assert!(nav.steps().is_empty());
        assert!(nav.on_fix(&fix(end, 0)).is_empty());
    }

    #[test]
    fn restart_after_arrival() {
        let mut nav = session();
        let (route, corner, end) = corner_route();
        nav.start(end, &route).unwrap();
        nav.on_fix(&fix(corner, 0));
        nav.on_fix(&fix(end, 1000));
        assert_eq!(nav.status(), NavigationStatus::Arrived);

        nav.start(end, &route).unwrap();
        assert!(nav.is_active());
        assert_eq!(nav.current_step_index(), 0);
        assert!(!nav.steps()[0].was_spoken(500));
    }
}
