use log::debug;
use reqwest::{
    Client,
    header::{AUTHORIZATION, CONTENT_TYPE},
};
use serde::{Deserialize, Serialize};

use travelbot_logic::{
    Coordinate, ManeuverKind, ProviderError, ProviderStep, RouteResponse, RoutingProvider,
    prelude::*,
};

use crate::{
    config,
    http::{self, map_parse_error, map_request_error},
};

/// Directions from the OpenRouteService API
pub struct OpenRouteService {
    client: Client,
    api_key: String,
}

impl OpenRouteService {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: http::client()?,
            api_key: api_key.into(),
        })
    }

    /// Read the API key from `ORS_API_KEY`
    pub fn from_env() -> Result<Self> {
        let key = std::env::var(config::ORS_API_KEY_VAR)
            .with_context(|| format!("{} is not set", config::ORS_API_KEY_VAR))?;
        Self::new(key)
    }
}

impl RoutingProvider for OpenRouteService {
    async fn route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Result<RouteResponse, ProviderError> {
        let body = serde_json::to_string(&DirectionsRequest::new(origin, destination))
            .map_err(map_parse_error)?;

        let resp = self
            .client
            .post(config::ORS_DIRECTIONS_URL)
            .header(AUTHORIZATION, &self.api_key)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(map_request_error)?;

        let body = http::read_body("OpenRouteService", resp).await?;
        parse_directions(&body)
    }
}

#[derive(Serialize)]
struct DirectionsRequest {
    /// Longitude first
    coordinates: [[f64; 2]; 2],
    instructions: bool,
    language: &'static str,
}

impl DirectionsRequest {
    fn new(origin: Coordinate, destination: Coordinate) -> Self {
        Self {
            coordinates: [[origin.lon, origin.lat], [destination.lon, destination.lat]],
            instructions: true,
            language: config::LANGUAGE,
        }
    }
}

#[derive(Deserialize)]
struct DirectionsResponse {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Deserialize)]
struct Feature {
    geometry: LineString,
    properties: Properties,
}

#[derive(Deserialize)]
struct LineString {
    /// `[lon, lat]` or `[lon, lat, elevation]`
    #[serde(default)]
    coordinates: Vec<Vec<f64>>,
}

// ORS leaves out fields that are zero
#[derive(Deserialize)]
struct Properties {
    #[serde(default)]
    summary: Summary,
    #[serde(default)]
    segments: Vec<Segment>,
}

#[derive(Deserialize, Default)]
struct Summary {
    #[serde(default)]
    distance: f64,
    #[serde(default)]
    duration: f64,
}

#[derive(Deserialize)]
struct Segment {
    #[serde(default)]
    steps: Vec<Step>,
}

#[derive(Deserialize)]
struct Step {
    #[serde(default)]
    distance: f64,
    #[serde(default)]
    duration: f64,
    #[serde(rename = "type", default)]
    kind: i64,
    #[serde(default)]
    instruction: Option<String>,
    #[serde(default)]
    name: Option<String>,
    /// Indices into the geometry, the maneuver happens at the first
    #[serde(default)]
    way_points: Vec<usize>,
}

/// ORS step type to our maneuvers
pub fn maneuver_from_code(code: i64) -> ManeuverKind {
    match code {
        0 | 2 => ManeuverKind::TurnLeft,
        1 | 3 => ManeuverKind::TurnRight,
        4 | 12 => ManeuverKind::SlightLeft,
        5 | 13 => ManeuverKind::SlightRight,
        7 => ManeuverKind::RoundaboutEnter,
        8 => ManeuverKind::RoundaboutExit,
        9 => ManeuverKind::UTurn,
        // 6 straight, 10 goal, 11 depart
        _ => ManeuverKind::Straight,
    }
}

/// Turn a GeoJSON directions response into a [RouteResponse].
///
/// ORS gives each step the distance driven *after* its maneuver. Guidance wants the distance
/// driven *towards* the maneuver, so every step gets the length of the one before it.
pub fn parse_directions(body: &str) -> Result<RouteResponse, ProviderError> {
    let resp = serde_json::from_str::<DirectionsResponse>(body).map_err(map_parse_error)?;

    let Some(feature) = resp.features.into_iter().next() else {
        debug!("OpenRouteService returned no routes");
        return Ok(RouteResponse {
            distance_m: 0.0,
            duration_s: 0.0,
            geometry: Vec::new(),
            steps: Vec::new(),
        });
    };

    let geometry = feature
        .geometry
        .coordinates
        .iter()
        .filter_map(|point| match point.as_slice() {
            [lon, lat, ..] => Some(Coordinate::new(*lat, *lon)),
            _ => None,
        })
        .collect::<Vec<_>>();

    let mut approach = (0.0, 0.0);
    let steps = feature
        .properties
        .segments
        .into_iter()
        .flat_map(|segment| segment.steps)
        .map(|step| {
            let (distance_m, duration_s) = approach;
            approach = (step.distance, step.duration);
            ProviderStep {
                distance_m,
                duration_s,
                target: step
                    .way_points
                    .first()
                    .and_then(|i| geometry.get(*i))
                    .copied(),
                maneuver: maneuver_from_code(step.kind),
                instruction: step.instruction,
                // Unnamed roads come back as "-"
                road_name: step.name.filter(|name| name.trim() != "-"),
            }
        })
        .collect::<Vec<_>>();

    debug!(
        "Parsed route: {} steps, {:.0}m",
        steps.len(),
        feature.properties.summary.distance
    );

    Ok(RouteResponse {
        distance_m: feature.properties.summary.distance,
        duration_s: feature.properties.summary.duration,
        geometry,
        steps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"{
        "type": "FeatureCollection",
        "features": [{
            "bbox": [4.88, 52.36, 4.90, 52.38],
            "type": "Feature",
            "properties": {
                "segments": [{
                    "distance": 1350.2,
                    "duration": 160.4,
                    "steps": [
                        {"distance": 1000.0, "duration": 120.0, "type": 11,
                         "instruction": "Vertrek richting noorden op Damrak", "name": "Damrak",
                         "way_points": [0, 1]},
                        {"distance": 350.2, "duration": 40.4, "type": 1,
                         "instruction": "Sla rechtsaf naar Prins Hendrikkade", "name": "Prins Hendrikkade",
                         "way_points": [1, 2]},
                        {"distance": 0.0, "duration": 0.0, "type": 10,
                         "instruction": "Aankomst bij Prins Hendrikkade", "name": "-",
                         "way_points": [2, 2]}
                    ]
                }],
                "summary": {"distance": 1350.2, "duration": 160.4},
                "way_points": [0, 2]
            },
            "geometry": {
                "coordinates": [[4.8910, 52.3700], [4.8912, 52.3790], [4.8963, 52.3791]],
                "type": "LineString"
            }
        }]
    }"#;

    #[test]
    fn parses_directions() {
        let route = parse_directions(FIXTURE).expect("Failed to parse");
        assert_eq!(route.distance_m, 1350.2);
        assert_eq!(route.geometry.len(), 3);
        assert_eq!(route.geometry[1], Coordinate::new(52.3790, 4.8912));
        assert_eq!(route.steps.len(), 3);

        let depart = &route.steps[0];
        assert_eq!(depart.distance_m, 0.0);
        assert_eq!(depart.maneuver, ManeuverKind::Straight);
        assert_eq!(depart.target, Some(Coordinate::new(52.3700, 4.8910)));

        let turn = &route.steps[1];
        assert_eq!(turn.distance_m, 1000.0);
        assert_eq!(turn.duration_s, 120.0);
        assert_eq!(turn.maneuver, ManeuverKind::TurnRight);
        assert_eq!(turn.target, Some(Coordinate::new(52.3790, 4.8912)));
        assert_eq!(turn.road_name.as_deref(), Some("Prins Hendrikkade"));

        let goal = &route.steps[2];
        assert_eq!(goal.distance_m, 350.2);
        assert_eq!(goal.road_name, None);
    }

    #[test]
    fn no_route_means_no_steps() {
        let route = parse_directions(r#"{"type": "FeatureCollection", "features": []}"#)
            .expect("Failed to parse");
        assert!(route.steps.is_empty());
    }

    #[test]
    fn garbage_is_unavailable() {
        assert!(matches!(
            parse_directions("<html>Bad Gateway</html>"),
            Err(ProviderError::Unavailable(_))
        ));
    }

    #[test]
    fn maneuver_codes() {
        assert_eq!(maneuver_from_code(0), ManeuverKind::TurnLeft);
        assert_eq!(maneuver_from_code(3), ManeuverKind::TurnRight);
        assert_eq!(maneuver_from_code(12), ManeuverKind::SlightLeft);
        assert_eq!(maneuver_from_code(5), ManeuverKind::SlightRight);
        assert_eq!(maneuver_from_code(7), ManeuverKind::RoundaboutEnter);
        assert_eq!(maneuver_from_code(8), ManeuverKind::RoundaboutExit);
        assert_eq!(maneuver_from_code(9), ManeuverKind::UTurn);
        assert_eq!(maneuver_from_code(10), ManeuverKind::Straight);
        assert_eq!(maneuver_from_code(42), ManeuverKind::Straight);
    }

    #[test]
    fn request_is_lon_lat() {
        let req = DirectionsRequest::new(Coordinate::new(52.0, 4.0), Coordinate::new(53.0, 5.0));
        let json = serde_json::to_value(&req).expect("Failed to serialize");
        assert_eq!(json["coordinates"][0][0], 4.0);
        assert_eq!(json["coordinates"][1][1], 53.0);
        assert_eq!(json["language"], "nl");
    }
}
