use std::{collections::VecDeque, time::Duration};

use log::{debug, warn};
use rand::{
    SeedableRng,
    distr::{Bernoulli, Distribution},
};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

use crate::{
    location::{Coordinate, LocationFix, Millis},
    movement::MovementSample,
    providers::{
        Address, GeocodingProvider, PoiProvider, PointOfInterest, ProviderError, with_timeout,
    },
    settings::ObservationConfig,
};

const DARK_FRAGMENTS: [&str; 3] = ["dood", "hel", "duivel"];
const FLOWER_FRAGMENTS: [&str; 3] = ["bloem", "roos", "tulp"];
const ROYAL_FRAGMENTS: [&str; 3] = ["koning", "koningin", "prins"];
const INTERESTING_ROAD_FRAGMENTS: [&str; 14] = [
    "dood", "hel", "duivel", "gek", "rare", "vreemd", "bloem", "roos", "tulp", "lelie", "koning",
    "koningin", "prins", "graaf",
];
const FUNNY_CITY_FRAGMENTS: [&str; 4] = ["hell", "kut", "puke", "boring"];
const UNUSUAL_PLACE_FRAGMENTS: [&str; 8] =
    ["puke", "hell", "boring", "ugly", "kut", "lul", "dood", "gek"];
const TOURIST_CITIES: [&str; 2] = ["amsterdam", "rotterdam"];

/// Where chance comes from for the stopped-observation roll
pub trait RandomSource: Send + Sync {
    /// Returns true with the given probability (0 to 1)
    fn chance(&mut self, probability: f64) -> bool;
}

/// [RandomSource] backed by a seeded ChaCha stream, reproducible for a given seed
pub struct SeededRandom(ChaCha20Rng);

impl SeededRandom {
    pub fn new(seed: u32) -> Self {
        Self(ChaCha20Rng::seed_from_u64(seed as u64))
    }
}

impl RandomSource for SeededRandom {
    fn chance(&mut self, probability: f64) -> bool {
        Bernoulli::new(probability.clamp(0.0, 1.0))
            .map(|dist| dist.sample(&mut self.0))
            .unwrap_or(false)
    }
}

/// Renders the commentary for a chosen trigger, the phrase catalog lives outside of this crate
pub trait CommentaryTemplates: Send + Sync {
    fn render(&self, trigger: &ObservationTrigger, context: &ObservationContext) -> Option<String>;
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// Reasons to comment on a place, declared in priority order (first wins)
pub enum TriggerTag {
    Restaurant,
    Attraction,
    DarkStreetName,
    FlowerStreetName,
    RoyalStreetName,
    FunnyCityName,
    TrafficJam,
    Historical,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ObservationTrigger {
    pub tag: TriggerTag,
    /// What the trigger is about, a place, road or city name
    pub subject: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum RoadKind {
    #[default]
    Unknown,
    Street,
    Avenue,
    Highway,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoadInfo {
    pub kind: RoadKind,
    pub has_interesting_name: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// Everything we know about a candidate spot for commentary
pub struct ObservationContext {
    pub fix: LocationFix,
    pub address: Option<Address>,
    pub pois: Vec<PointOfInterest>,
    pub road: RoadInfo,
    /// 0 to 100
    pub interest_score: u32,
    /// Matching triggers, highest priority first
    pub triggers: Vec<ObservationTrigger>,
}

impl ObservationContext {
    /// Score and classify a spot from what the providers told us
    pub fn build(
        fix: LocationFix,
        sample: &MovementSample,
        address: Option<Address>,
        pois: Vec<PointOfInterest>,
        config: &ObservationConfig,
    ) -> Self {
        let road = analyze_road(address.as_ref());
        let mut ctx = Self {
            fix,
            address,
            pois,
            road,
            interest_score: 0,
            triggers: Vec::new(),
        };
        ctx.interest_score = ctx.score();
        ctx.triggers = ctx.identify_triggers(sample.speed_kmh, config.traffic_jam_speed_kmh);
        ctx
    }

    fn score(&self) -> u32 {
        let mut score = (self.pois.len() as u32).saturating_mul(15).min(40);

        if self.road.has_interesting_name {
            score += 20;
        }

        if let Some(address) = &self.address {
            let in_centre = lowercase(&address.district).contains("centrum")
                || TOURIST_CITIES
                    .iter()
                    .any(|c| lowercase(&address.city).contains(c));
            if in_centre {
                score += 30;
            }
        }

        if self.road.kind == RoadKind::Highway {
            score += 10;
        }

        if has_unusual_place_name(self.address.as_ref()) {
            score += 25;
        }

        score.min(100)
    }

    fn identify_triggers(&self, speed_kmh: f64, jam_speed_kmh: f64) -> Vec<ObservationTrigger> {
        let mut triggers = Vec::new();

        for poi in &self.pois {
            let category = poi.category.to_lowercase();
            let tag = match category.as_str() {
                "restaurant" if poi.rating.is_some_and(|r| r > 4.0) => Some(TriggerTag::Restaurant),
                "tourist_attraction" | "attraction" => Some(TriggerTag::Attraction),
                "historical" | "historic" | "museum" => Some(TriggerTag::Historical),
                _ => None,
            };
            if let Some(tag) = tag {
                triggers.push(ObservationTrigger {
                    tag,
                    subject: Some(poi.name.clone()),
                });
            }
        }

        if let Some(road) = self.address.as_ref().and_then(|a| a.road.as_ref()) {
            let lower = road.to_lowercase();
            for (fragments, tag) in [
                (&DARK_FRAGMENTS, TriggerTag::DarkStreetName),
                (&FLOWER_FRAGMENTS, TriggerTag::FlowerStreetName),
                (&ROYAL_FRAGMENTS, TriggerTag::RoyalStreetName),
            ] {
                if fragments.iter().any(|f| lower.contains(f)) {
                    triggers.push(ObservationTrigger {
                        tag,
                        subject: Some(road.clone()),
                    });
                }
            }
        }

        if let Some(city) = self.address.as_ref().and_then(|a| a.city.as_ref()) {
            let lower = city.to_lowercase();
            if FUNNY_CITY_FRAGMENTS.iter().any(|f| lower.contains(f)) {
                triggers.push(ObservationTrigger {
                    tag: TriggerTag::FunnyCityName,
                    subject: Some(city.clone()),
                });
            }
        }

        if self.road.kind == RoadKind::Highway && speed_kmh < jam_speed_kmh {
            triggers.push(ObservationTrigger {
                tag: TriggerTag::TrafficJam,
                subject: None,
            });
        }

        // Stable, so the provider's order is kept within one tag
        triggers.sort_by_key(|t| t.tag);
        triggers
    }

    pub fn is_interesting(&self, threshold: u32) -> bool {
        self.interest_score > threshold
    }

    /// The trigger commentary should be about
    pub fn primary_trigger(&self) -> Option<&ObservationTrigger> {
        self.triggers.first()
    }
}

fn lowercase(field: &Option<String>) -> String {
    field.as_deref().unwrap_or_default().to_lowercase()
}

/// Classify the road we're on from its name
pub fn analyze_road(address: Option<&Address>) -> RoadInfo {
    let Some(road) = address.and_then(|a| a.road.as_deref()) else {
        return RoadInfo::default();
    };

    let road = road.to_lowercase();

    let kind = if road.contains("snelweg") || road.contains("autoweg") || has_motorway_number(&road)
    {
        RoadKind::Highway
    } else if road.contains("laan") || road.contains("boulevard") {
        RoadKind::Avenue
    } else {
        RoadKind::Street
    };

    RoadInfo {
        kind,
        has_interesting_name: INTERESTING_ROAD_FRAGMENTS.iter().any(|f| road.contains(f)),
    }
}

/// Dutch motorways are numbered like "A2" or "a10"
fn has_motorway_number(road: &str) -> bool {
    road.split(|c: char| !c.is_alphanumeric()).any(|token| {
        token
            .strip_prefix('a')
            .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
    })
}

fn has_unusual_place_name(address: Option<&Address>) -> bool {
    let Some(address) = address else {
        return false;
    };
    let place = format!("{} {}", lowercase(&address.city), lowercase(&address.road));
    UNUSUAL_PLACE_FRAGMENTS.iter().any(|f| place.contains(f))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ObservationEntry {
    pub location: Coordinate,
    pub text: String,
    pub timestamp_ms: Millis,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// Past observations, used only to throttle new ones
pub struct ObservationHistory {
    capacity: usize,
    entries: VecDeque<ObservationEntry>,
}

impl ObservationHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    pub fn last(&self) -> Option<&ObservationEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ObservationEntry> {
        self.entries.iter()
    }

    pub fn contains_text(&self, text: &str) -> bool {
        self.entries.iter().any(|e| e.text == text)
    }

    pub fn record(&mut self, location: Coordinate, text: String, timestamp_ms: Millis) {
        self.entries.push_back(ObservationEntry {
            location,
            text,
            timestamp_ms,
        });
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Why a fix didn't get an observation
pub enum SkipReason {
    NavigationImminent,
    TooClose,
    TooSoon,
    Stopped,
    NotInteresting,
    NoTemplate,
    Repeat,
}

/// Whether a maneuver is close enough that we should keep quiet
pub fn navigation_imminent(distance_to_maneuver: Option<f64>, config: &ObservationConfig) -> bool {
    distance_to_maneuver.is_some_and(|d| d < config.navigation_quiet_radius_m)
}

/// Decides when to make ambient remarks about the surroundings and what they're about
pub struct ObservationArbiter<G: GeocodingProvider, P: PoiProvider> {
    config: ObservationConfig,
    history: ObservationHistory,
    geocoder: G,
    pois: P,
    templates: Box<dyn CommentaryTemplates>,
    random: Box<dyn RandomSource>,
    timeout: Duration,
}

impl<G: GeocodingProvider, P: PoiProvider> ObservationArbiter<G, P> {
    pub fn new(
        config: ObservationConfig,
        geocoder: G,
        pois: P,
        templates: Box<dyn CommentaryTemplates>,
        random: Box<dyn RandomSource>,
        timeout: Duration,
    ) -> Self {
        Self {
            history: ObservationHistory::new(config.history_size),
            config,
            geocoder,
            pois,
            templates,
            random,
            timeout,
        }
    }

    pub fn set_random_source(&mut self, random: Box<dyn RandomSource>) {
        self.random = random;
    }

    pub fn history(&self) -> &ObservationHistory {
        &self.history
    }

    /// Cheap checks that run before any provider gets involved
    pub fn gate(
        &mut self,
        fix: &LocationFix,
        sample: &MovementSample,
        distance_to_maneuver: Option<f64>,
    ) -> Result<(), SkipReason> {
        if navigation_imminent(distance_to_maneuver, &self.config) {
            return Err(SkipReason::NavigationImminent);
        }

        if let Some(last) = self.history.last() {
            if last.location.distance_to(&fix.coordinate()) <= self.config.min_distance_m {
                return Err(SkipReason::TooClose);
            }

            if fix.timestamp_ms.saturating_sub(last.timestamp_ms) < self.config.min_interval_ms {
                return Err(SkipReason::TooSoon);
            }
        }

        if sample.speed_kmh < self.config.stopped_threshold_kmh
            && !self.random.chance(self.config.stopped_chance)
        {
            return Err(SkipReason::Stopped);
        }

        Ok(())
    }

    /// Look up address and surroundings, a failing provider just means knowing less
    pub async fn analyze(&self, fix: &LocationFix, sample: &MovementSample) -> ObservationContext {
        let at = fix.coordinate();
        let (address, pois) = tokio::join!(
            with_timeout(self.timeout, self.geocoder.reverse_geocode(at)),
            with_timeout(self.timeout, self.pois.nearby(at, self.config.poi_radius_m)),
        );

        let address = address
            .inspect_err(|why| warn!("Reverse geocode failed: {why}"))
            .ok();
        let pois = pois
            .inspect_err(|why: &ProviderError| warn!("POI lookup failed: {why}"))
            .unwrap_or_default();

        ObservationContext::build(*fix, sample, address, pois, &self.config)
    }

    /// Decide whether to say something about the current spot, returns the text to say
    pub async fn consider(
        &mut self,
        fix: &LocationFix,
        sample: &MovementSample,
        distance_to_maneuver: Option<f64>,
    ) -> Option<String> {
        match self.try_observe(fix, sample, distance_to_maneuver).await {
            Ok(text) => Some(text),
            Err(reason) => {
                debug!("No observation: {reason:?}");
                None
            }
        }
    }

    async fn try_observe(
        &mut self,
        fix: &LocationFix,
        sample: &MovementSample,
        distance_to_maneuver: Option<f64>,
    ) -> Result<String, SkipReason> {
        self.gate(fix, sample, distance_to_maneuver)?;

        let context = self.analyze(fix, sample).await;

        if !context.is_interesting(self.config.interest_threshold) {
            return Err(SkipReason::NotInteresting);
        }

        let trigger = context.primary_trigger().ok_or(SkipReason::NotInteresting)?;

        let text = self
            .templates
            .render(trigger, &context)
            .ok_or(SkipReason::NoTemplate)?;

        if self.config.suppress_repeats && self.history.contains_text(&text) {
            return Err(SkipReason::Repeat);
        }

        debug!(
            "Observation ({:?}, score {}): {text}",
            trigger.tag, context.interest_score
        );

        self.history
            .record(fix.coordinate(), text.clone(), fix.timestamp_ms);

        Ok(text)
    }
}
