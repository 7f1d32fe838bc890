use std::{path::Path, time::Duration};

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use travelbot_logic::{
    Address, CommentaryTemplates, CompanionEvent, CompanionSettings, Coordinate, EventSender,
    GeocodingProvider, LocationFix, LocationPipeline, Millis, ObservationContext,
    ObservationTrigger, PoiProvider, PointOfInterest, ProviderError, RouteResponse,
    RoutingProvider, TriggerTag,
};

pub mod prelude {
    pub use anyhow::{Context, anyhow, bail};
    pub type Result<T = (), E = anyhow::Error> = std::result::Result<T, E>;
}

pub use prelude::*;

fn default_accuracy() -> f64 {
    5.0
}

fn default_place_radius() -> f64 {
    200.0
}

/// One recorded position, stamped either with a monotonic clock or a wall clock time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackPoint {
    pub lat: f64,
    pub lon: f64,
    #[serde(default = "default_accuracy")]
    pub accuracy_m: f64,
    #[serde(default)]
    pub speed_mps: Option<f64>,
    #[serde(default)]
    pub heading: Option<f64>,
    #[serde(default)]
    pub timestamp_ms: Option<Millis>,
    /// RFC 3339, used when there's no `timestamp_ms`
    #[serde(default)]
    pub time: Option<DateTime<Utc>>,
}

impl TrackPoint {
    pub fn to_fix(&self) -> Result<LocationFix> {
        let timestamp_ms = match (self.timestamp_ms, self.time) {
            (Some(ms), _) => ms,
            (None, Some(time)) => u64::try_from(time.timestamp_millis())
                .with_context(|| format!("Time {time} is before 1970"))?,
            (None, None) => bail!("Track point ({}, {}) has no time", self.lat, self.lon),
        };

        Ok(LocationFix {
            lat: self.lat,
            lon: self.lon,
            accuracy_m: self.accuracy_m,
            speed_mps: self.speed_mps,
            heading: self.heading,
            timestamp_ms,
        })
    }
}

/// A spot the scripted providers know about
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptedPlace {
    pub at: Coordinate,
    /// Lookups within this many meters of [Self::at] find this place
    #[serde(default = "default_place_radius")]
    pub radius_m: f64,
    #[serde(default)]
    pub address: Address,
    #[serde(default)]
    pub pois: Vec<PointOfInterest>,
}

/// A recorded drive along with everything needed to replay it offline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackFile {
    #[serde(default)]
    pub settings: Option<CompanionSettings>,
    /// Start guidance to here before the first fix
    #[serde(default)]
    pub destination: Option<Coordinate>,
    /// Answer to give instead of asking a routing service
    #[serde(default)]
    pub route: Option<RouteResponse>,
    #[serde(default)]
    pub places: Vec<ScriptedPlace>,
    pub fixes: Vec<TrackPoint>,
}

impl TrackFile {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read track file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse track file {}", path.display()))
    }

    pub fn location_fixes(&self) -> Result<Vec<LocationFix>> {
        self.fixes.iter().map(TrackPoint::to_fix).collect()
    }
}

pub fn load_settings(path: &Path) -> Result<CompanionSettings> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings {}", path.display()))?;
    serde_json::from_str(&raw).context("Failed to parse settings")
}

/// Answers lookups from the places in a track file
pub struct ScriptedWorld {
    places: Vec<ScriptedPlace>,
}

impl ScriptedWorld {
    pub fn new(places: Vec<ScriptedPlace>) -> Self {
        Self { places }
    }

    fn around(&self, at: Coordinate) -> impl Iterator<Item = (f64, &ScriptedPlace)> {
        self.places
            .iter()
            .map(move |place| (place.at.distance_to(&at), place))
            .filter(|(d, place)| *d <= place.radius_m)
    }
}

impl GeocodingProvider for ScriptedWorld {
    async fn reverse_geocode(&self, at: Coordinate) -> Result<Address, ProviderError> {
        Ok(self
            .around(at)
            .min_by(|(a, _), (b, _)| a.total_cmp(b))
            .map(|(_, place)| place.address.clone())
            .unwrap_or_default())
    }
}

impl PoiProvider for ScriptedWorld {
    async fn nearby(
        &self,
        at: Coordinate,
        _radius_m: u32,
    ) -> Result<Vec<PointOfInterest>, ProviderError> {
        Ok(self
            .around(at)
            .flat_map(|(_, place)| place.pois.iter().cloned())
            .collect())
    }
}

/// Hands out the route from a track file
pub struct ScriptedRoute(pub Option<RouteResponse>);

impl RoutingProvider for ScriptedRoute {
    async fn route(
        &self,
        _origin: Coordinate,
        _destination: Coordinate,
    ) -> Result<RouteResponse, ProviderError> {
        self.0
            .clone()
            .ok_or_else(|| ProviderError::Unavailable("Track file has no route".to_string()))
    }
}

/// A small Dutch catalog, enough to hear what the arbiter picked
pub struct PlainTemplates;

impl CommentaryTemplates for PlainTemplates {
    fn render(&self, trigger: &ObservationTrigger, context: &ObservationContext) -> Option<String> {
        let subject = trigger.subject.as_deref();
        let city = context.address.as_ref().and_then(|a| a.city.as_deref());

        let text = match (trigger.tag, subject) {
            (TriggerTag::Restaurant, Some(name)) => {
                format!("{name} schijnt hier erg goed te zijn, misschien iets voor later?")
            }
            (TriggerTag::Attraction, Some(name)) => format!("Kijk, daar is {name}!"),
            (TriggerTag::DarkStreetName, Some(road)) => {
                format!("{road}... wie verzint zo'n straatnaam?")
            }
            (TriggerTag::FlowerStreetName, Some(road)) => {
                format!("{road}, klinkt als een fleurige buurt")
            }
            (TriggerTag::RoyalStreetName, Some(road)) => {
                format!("We rijden over de {road}, heel deftig")
            }
            (TriggerTag::FunnyCityName, Some(name)) => {
                format!("Welkom in {name}, echt waar, zo heet het hier")
            }
            (TriggerTag::TrafficJam, _) => match city {
                Some(city) => format!("Het staat hier vast bij {city}, geduld"),
                None => "Het staat hier vast, geduld".to_string(),
            },
            (TriggerTag::Historical, Some(name)) => {
                format!("{name} heeft een flinke geschiedenis")
            }
            _ => return None,
        };

        Some(text)
    }
}

/// Prints every event as one line of JSON on stdout
pub struct JsonLinesSender;

impl EventSender for JsonLinesSender {
    fn send_event(&self, event: CompanionEvent) {
        match serde_json::to_string(&event) {
            Ok(line) => println!("{line}"),
            Err(why) => warn!("Failed to serialize event {event:?}: {why}"),
        }
    }
}

/// Feed fixes through the pipeline one after another, as fast as they're processed
pub async fn replay_back_to_back<
    R: RoutingProvider,
    G: GeocodingProvider,
    P: PoiProvider,
    S: EventSender,
>(
    pipeline: &LocationPipeline<R, G, P, S>,
    fixes: &[LocationFix],
) {
    for fix in fixes {
        if let Err(why) = pipeline.on_fix(*fix).await {
            warn!("Skipped fix at {}ms: {why}", fix.timestamp_ms);
        }
    }
}

/// Feed fixes through the latest-only queue, sleeping between them as long as the recording did
pub async fn replay_realtime<
    R: RoutingProvider,
    G: GeocodingProvider,
    P: PoiProvider,
    S: EventSender,
>(
    pipeline: &LocationPipeline<R, G, P, S>,
    fixes: &[LocationFix],
    settle: Duration,
) -> Result {
    let feed = async {
        let mut previous: Option<Millis> = None;
        for fix in fixes {
            if let Some(prev) = previous {
                tokio::time::sleep(Duration::from_millis(fix.timestamp_ms.saturating_sub(prev)))
                    .await;
            }
            previous = Some(fix.timestamp_ms);
            if let Err(why) = pipeline.push_fix(*fix) {
                warn!("Skipped fix at {}ms: {why}", fix.timestamp_ms);
            }
        }

        // Give the loop a chance at the last fix before shutting it down
        tokio::time::sleep(settle).await;
        info!("Track finished");
        pipeline.stop_tracking();
    };

    let (res, _) = tokio::join!(pipeline.main_loop(), feed);
    res
}
