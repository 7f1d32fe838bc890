use std::time::Duration;

use log::{debug, info, warn};
use thiserror::Error;
use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;

use crate::{
    events::{CompanionEvent, EventSender, RouteSummary},
    location::{Coordinate, FixError, LocationFix},
    movement::{MovementSample, MovementTracker, RouteState},
    navigation::{NavigationSession, NavigationStatus},
    observation::{CommentaryTemplates, ObservationArbiter, RandomSource, SeededRandom},
    prelude::*,
    providers::{GeocodingProvider, PoiProvider, ProviderError, RoutingProvider, with_timeout},
    route::RouteError,
    settings::CompanionSettings,
};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum NavigationError {
    #[error(transparent)]
    Route(#[from] RouteError),
    #[error("routing failed: {0}")]
    Provider(#[from] ProviderError),
    #[error("no origin given and no location known yet")]
    NoOrigin,
    #[error("route request was cancelled")]
    Cancelled,
}

/// Everything that must only change while processing one fix
struct TrackingState {
    tracker: MovementTracker,
    navigation: NavigationSession,
    last_fix: Option<LocationFix>,
    last_sample: Option<MovementSample>,
}

/// Takes raw fixes from a location source and turns them into [CompanionEvent]s.
///
/// Fixes are pushed with [Self::push_fix] and processed one at a time by [Self::main_loop],
/// only the newest pending fix is kept. Navigation runs on every fix, ambient observations
/// only when no maneuver is close.
pub struct LocationPipeline<
    R: RoutingProvider,
    G: GeocodingProvider,
    P: PoiProvider,
    S: EventSender,
> {
    tracking: Mutex<TrackingState>,
    arbiter: Mutex<ObservationArbiter<G, P>>,
    routing: R,
    sender: S,
    fixes: watch::Sender<Option<LocationFix>>,
    cancel: CancellationToken,
    /// Invalidates the route request in flight, if any
    route_request: Mutex<CancellationToken>,
    provider_timeout: Duration,
}

impl<R: RoutingProvider, G: GeocodingProvider, P: PoiProvider, S: EventSender>
    LocationPipeline<R, G, P, S>
{
    pub fn new(
        settings: CompanionSettings,
        routing: R,
        geocoder: G,
        pois: P,
        templates: Box<dyn CommentaryTemplates>,
        sender: S,
    ) -> Self {
        let provider_timeout = settings.provider_timeout();
        let random = Box::new(SeededRandom::new(settings.random_seed));
        let cancel = CancellationToken::new();
        let (fixes, _) = watch::channel(None);

        Self {
            tracking: Mutex::new(TrackingState {
                tracker: MovementTracker::new(settings.movement),
                navigation: NavigationSession::new(settings.navigation),
                last_fix: None,
                last_sample: None,
            }),
            arbiter: Mutex::new(ObservationArbiter::new(
                settings.observation,
                geocoder,
                pois,
                templates,
                random,
                provider_timeout,
            )),
            routing,
            sender,
            fixes,
            route_request: Mutex::new(cancel.child_token()),
            cancel,
            provider_timeout,
        }
    }

    /// Use another chance source for the stopped roll instead of one seeded from the settings
    pub fn with_random_source(mut self, random: Box<dyn RandomSource>) -> Self {
        self.arbiter.get_mut().set_random_source(random);
        self
    }

    /// Hand a new fix to [Self::main_loop], replacing any fix that's still waiting
    pub fn push_fix(&self, fix: LocationFix) -> Result<(), FixError> {
        fix.validate()
            .inspect_err(|why| warn!("Rejected fix: {why}"))?;
        self.fixes.send_replace(Some(fix));
        Ok(())
    }

    /// Process fixes from [Self::push_fix] until [Self::stop_tracking] is called
    pub async fn main_loop(&self) -> Result {
        let mut fixes = self.fixes.subscribe();

        // Something may have been pushed before we started listening
        if fixes.borrow().is_some() {
            fixes.mark_changed();
        }

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    break;
                }

                changed = fixes.changed() => {
                    changed.context("Fix channel closed")?;
                    let latest = *fixes.borrow_and_update();
                    if let Some(fix) = latest {
                        if let Err(why) = self.on_fix(fix).await {
                            warn!("Dropped fix: {why}");
                        }
                    }
                }
            }
        }

        info!("Location tracking stopped");

        Ok(())
    }

    /// Run one fix through movement tracking, navigation, then observation
    pub async fn on_fix(&self, fix: LocationFix) -> Result<(), FixError> {
        fix.validate()?;

        let (sample, distance_to_maneuver) = {
            let mut state = self.tracking.lock().await;

            if let Some(last) = state.last_fix {
                if fix.timestamp_ms < last.timestamp_ms {
                    return Err(FixError::OutOfOrder {
                        last: last.timestamp_ms,
                        got: fix.timestamp_ms,
                    });
                }
            }

            let sample = state.tracker.update(&fix);
            if let Some(change) = state.tracker.classify() {
                self.sender.send_event(CompanionEvent::RouteChanged {
                    previous: change.previous,
                    current: change.current,
                });
            }

            let events = state.navigation.on_fix(&fix);
            let spoke = events
                .iter()
                .any(|e| matches!(e, CompanionEvent::NavigationInstruction(_)));
            for event in events {
                self.sender.send_event(event);
            }

            state.last_fix = Some(fix);
            state.last_sample = Some(sample);

            if spoke {
                debug!("Navigation spoke, no observation this fix");
                return Ok(());
            }

            (sample, state.navigation.distance_to_step(fix.coordinate()))
        };

        let mut arbiter = self.arbiter.lock().await;
        if let Some(text) = arbiter.consider(&fix, &sample, distance_to_maneuver).await {
            self.sender.send_event(CompanionEvent::Observation(text));
        }

        Ok(())
    }

    /// Fetch a route and start guiding along it.
    ///
    /// Without an `origin` the last processed fix is used. The request is abandoned if
    /// [Self::stop_navigation] or [Self::stop_tracking] is called while it's in flight.
    pub async fn start_navigation(
        &self,
        origin: Option<Coordinate>,
        destination: Coordinate,
    ) -> Result<RouteSummary, NavigationError> {
        let origin = match origin {
            Some(origin) => origin,
            None => self
                .last_fix()
                .await
                .map(|fix| fix.coordinate())
                .ok_or(NavigationError::NoOrigin)?,
        };

        let token = {
            let mut current = self.route_request.lock().await;
            // A newer request supersedes the old one
            current.cancel();
            *current = self.cancel.child_token();
            current.clone()
        };

        info!(
            "Requesting route from ({:.5}, {:.5}) to ({:.5}, {:.5})",
            origin.lat, origin.lon, destination.lat, destination.lon
        );

        let response = tokio::select! {
            biased;

            _ = token.cancelled() => {
                return Err(NavigationError::Cancelled);
            }

            res = with_timeout(self.provider_timeout, self.routing.route(origin, destination)) => {
                res.inspect_err(|why| warn!("Route request failed: {why}"))?
            }
        };

        let mut state = self.tracking.lock().await;

        // Stopped while we waited for the lock
        if token.is_cancelled() {
            return Err(NavigationError::Cancelled);
        }

        let events = state.navigation.start(destination, &response)?;
        let summary = events.iter().find_map(|e| match e {
            CompanionEvent::NavigationStarted(summary) => Some(summary.clone()),
            _ => None,
        });
        for event in events {
            self.sender.send_event(event);
        }

        Ok(summary.unwrap_or(RouteSummary {
            distance_m: response.distance_m,
            duration_s: response.duration_s,
            steps: response.steps.len(),
        }))
    }

    /// Stop guidance, including a route request that's still in flight
    pub async fn stop_navigation(&self) {
        self.route_request.lock().await.cancel();
        let events = self.tracking.lock().await.navigation.stop();
        for event in events {
            self.sender.send_event(event);
        }
    }

    /// Stop [Self::main_loop] and abandon any route request
    pub fn stop_tracking(&self) {
        self.cancel.cancel();
    }

    pub fn is_tracking(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    pub async fn last_fix(&self) -> Option<LocationFix> {
        self.tracking.lock().await.last_fix
    }

    pub async fn last_sample(&self) -> Option<MovementSample> {
        self.tracking.lock().await.last_sample
    }

    pub async fn route_state(&self) -> RouteState {
        self.tracking.lock().await.tracker.state()
    }

    pub async fn navigation_status(&self) -> NavigationStatus {
        self.tracking.lock().await.navigation.status()
    }

    pub fn sender(&self) -> &S {
        &self.sender
    }
}
