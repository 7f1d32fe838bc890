use std::{
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use crate::{
    CompanionEvent, EventSender,
    location::Coordinate,
    observation::{CommentaryTemplates, ObservationContext, ObservationTrigger, RandomSource},
    providers::{
        Address, GeocodingProvider, PoiProvider, PointOfInterest, ProviderError, RoutingProvider,
    },
    route::RouteResponse,
};

/// A provider that always gives the same answer, optionally after a delay
pub struct Scripted<T> {
    answer: Result<T, ProviderError>,
    delay: Duration,
    calls: AtomicUsize,
}

impl<T: Clone> Scripted<T> {
    pub fn answering(answer: T) -> Self {
        Self {
            answer: Ok(answer),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            answer: Err(ProviderError::Unavailable("scripted failure".to_string())),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn respond(&self) -> Result<T, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.answer.clone()
    }
}

pub type MockRouting = Scripted<RouteResponse>;
pub type MockGeocoder = Scripted<Address>;
pub type MockPois = Scripted<Vec<PointOfInterest>>;

impl RoutingProvider for MockRouting {
    async fn route(
        &self,
        _origin: Coordinate,
        _destination: Coordinate,
    ) -> Result<RouteResponse, ProviderError> {
        self.respond().await
    }
}

impl GeocodingProvider for MockGeocoder {
    async fn reverse_geocode(&self, _at: Coordinate) -> Result<Address, ProviderError> {
        self.respond().await
    }
}

impl PoiProvider for MockPois {
    async fn nearby(
        &self,
        _at: Coordinate,
        _radius_m: u32,
    ) -> Result<Vec<PointOfInterest>, ProviderError> {
        self.respond().await
    }
}

/// Worth 50 on its own, one POI more makes it interesting
pub fn interesting_address() -> Address {
    Address {
        road: Some("Bloemgracht".to_string()),
        city: Some("Amsterdam".to_string()),
        district: Some("Centrum".to_string()),
        country: Some("Nederland".to_string()),
    }
}

pub fn boring_address() -> Address {
    Address {
        road: Some("Dorpsstraat".to_string()),
        city: Some("Ede".to_string()),
        district: None,
        country: Some("Nederland".to_string()),
    }
}

pub fn restaurant(name: &str, rating: f64) -> PointOfInterest {
    PointOfInterest {
        name: name.to_string(),
        category: "restaurant".to_string(),
        rating: Some(rating),
    }
}

/// "{tag}: {subject}"
pub struct TagTemplates;

impl CommentaryTemplates for TagTemplates {
    fn render(&self, trigger: &ObservationTrigger, _context: &ObservationContext) -> Option<String> {
        Some(format!(
            "{:?}: {}",
            trigger.tag,
            trigger.subject.as_deref().unwrap_or_default()
        ))
    }
}

/// Includes where the observation was made so no two are alike
pub struct LocationTemplates;

impl CommentaryTemplates for LocationTemplates {
    fn render(&self, trigger: &ObservationTrigger, context: &ObservationContext) -> Option<String> {
        Some(format!(
            "{:?} at {:.5}, {:.5}",
            trigger.tag, context.fix.lat, context.fix.lon
        ))
    }
}

pub struct FixedChance(pub bool);

impl RandomSource for FixedChance {
    fn chance(&mut self, _probability: f64) -> bool {
        self.0
    }
}

#[derive(Default)]
pub struct RecordingSender(Mutex<Vec<CompanionEvent>>);

impl RecordingSender {
    /// Everything sent since the last call
    pub fn take(&self) -> Vec<CompanionEvent> {
        self.0
            .lock()
            .map(|mut events| std::mem::take(&mut *events))
            .unwrap_or_default()
    }
}

impl EventSender for RecordingSender {
    fn send_event(&self, event: CompanionEvent) {
        if let Ok(mut events) = self.0.lock() {
            events.push(event);
        }
    }
}

pub fn observations(events: &[CompanionEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            CompanionEvent::Observation(text) => Some(text.clone()),
            _ => None,
        })
        .collect()
}

pub fn instructions(events: &[CompanionEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            CompanionEvent::NavigationInstruction(text) => Some(text.clone()),
            _ => None,
        })
        .collect()
}
