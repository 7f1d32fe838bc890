use std::collections::HashMap;

use reqwest::{Client, header::CONTENT_TYPE};
use serde::Deserialize;

use travelbot_logic::{Coordinate, PoiProvider, PointOfInterest, ProviderError, prelude::*};

use crate::{
    config,
    http::{self, map_parse_error, map_request_error},
};

/// Max places asked for per lookup
const POI_LIMIT: u32 = 10;

/// Nearby places from the Overpass API
pub struct Overpass {
    client: Client,
}

impl Overpass {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: http::client()?,
        })
    }
}

/// Overpass QL for named amenities and tourist spots within `radius_m`
pub fn poi_query(at: Coordinate, radius_m: u32) -> String {
    let around = format!("around:{radius_m},{:.6},{:.6}", at.lat, at.lon);
    format!(
        "[out:json][timeout:5];(\
         node({around})[amenity~\"^(restaurant|cafe|museum|theatre|cinema|attraction)$\"];\
         node({around})[tourism~\"^(attraction|museum)$\"];\
         );out {POI_LIMIT};"
    )
}

impl PoiProvider for Overpass {
    async fn nearby(
        &self,
        at: Coordinate,
        radius_m: u32,
    ) -> Result<Vec<PointOfInterest>, ProviderError> {
        let resp = self
            .client
            .post(config::OVERPASS_URL)
            .header(CONTENT_TYPE, "text/plain")
            .body(poi_query(at, radius_m))
            .send()
            .await
            .map_err(map_request_error)?;

        let body = http::read_body("Overpass", resp).await?;
        parse_elements(&body)
    }
}

#[derive(Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<Element>,
}

#[derive(Deserialize)]
struct Element {
    #[serde(default)]
    tags: HashMap<String, String>,
}

/// Named places only, categorised by their amenity or tourism tag
pub fn parse_elements(body: &str) -> Result<Vec<PointOfInterest>, ProviderError> {
    let resp = serde_json::from_str::<OverpassResponse>(body).map_err(map_parse_error)?;

    Ok(resp
        .elements
        .into_iter()
        .filter_map(|mut element| {
            let name = element.tags.remove("name")?;
            let category = element
                .tags
                .remove("amenity")
                .or_else(|| element.tags.remove("tourism"))
                .unwrap_or_else(|| "unknown".to_string());
            let rating = element
                .tags
                .get("rating")
                .and_then(|r| r.parse::<f64>().ok());
            Some(PointOfInterest {
                name,
                category,
                rating,
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_named_places() {
        let body = r#"{
            "version": 0.6,
            "elements": [
                {"type": "node", "id": 1, "lat": 52.37, "lon": 4.89,
                 "tags": {"amenity": "restaurant", "name": "De Kas", "rating": "4.5"}},
                {"type": "node", "id": 2, "lat": 52.37, "lon": 4.89,
                 "tags": {"amenity": "cafe"}},
                {"type": "node", "id": 3, "lat": 52.37, "lon": 4.89,
                 "tags": {"tourism": "museum", "name": "Rijksmuseum", "rating": "great"}}
            ]
        }"#;

        let pois = parse_elements(body).expect("Failed to parse");
        assert_eq!(
            pois,
            vec![
                PointOfInterest {
                    name: "De Kas".to_string(),
                    category: "restaurant".to_string(),
                    rating: Some(4.5),
                },
                PointOfInterest {
                    name: "Rijksmuseum".to_string(),
                    category: "museum".to_string(),
                    rating: None,
                },
            ]
        );
    }

    #[test]
    fn empty_result() {
        assert!(parse_elements(r#"{"elements": []}"#).expect("Failed to parse").is_empty());
    }

    #[test]
    fn query_has_radius_and_limit() {
        let query = poi_query(Coordinate::new(52.0, 4.5), 200);
        assert!(query.contains("around:200,52.000000,4.500000"));
        assert!(query.ends_with("out 10;"));
    }
}
