use log::debug;
use reqwest::Client;
use serde::Deserialize;

use travelbot_logic::{Address, Coordinate, GeocodingProvider, ProviderError, prelude::*};

use crate::{
    config,
    http::{self, map_parse_error, map_request_error},
};

/// Reverse geocoding through OpenStreetMap's Nominatim
pub struct Nominatim {
    client: Client,
}

impl Nominatim {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: http::client()?,
        })
    }
}

pub fn reverse_url(at: Coordinate) -> String {
    format!(
        "{}?format=jsonv2&lat={:.6}&lon={:.6}&zoom=18&addressdetails=1&accept-language={}",
        config::NOMINATIM_REVERSE_URL,
        at.lat,
        at.lon,
        config::LANGUAGE
    )
}

impl GeocodingProvider for Nominatim {
    async fn reverse_geocode(&self, at: Coordinate) -> Result<Address, ProviderError> {
        let resp = self
            .client
            .get(reverse_url(at))
            .send()
            .await
            .map_err(map_request_error)?;

        let body = http::read_body("Nominatim", resp).await?;
        parse_reverse(&body)
    }
}

#[derive(Deserialize)]
struct ReverseResponse {
    #[serde(default)]
    address: Option<RawAddress>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize, Default)]
struct RawAddress {
    road: Option<String>,
    pedestrian: Option<String>,
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    suburb: Option<String>,
    district: Option<String>,
    country: Option<String>,
}

/// Pick the fields we care about, a place Nominatim can't name is just an empty [Address]
pub fn parse_reverse(body: &str) -> Result<Address, ProviderError> {
    let resp = serde_json::from_str::<ReverseResponse>(body).map_err(map_parse_error)?;

    if let Some(why) = resp.error {
        debug!("Nominatim has no address here: {why}");
        return Ok(Address::default());
    }

    let raw = resp.address.unwrap_or_default();

    Ok(Address {
        road: raw.road.or(raw.pedestrian),
        city: raw.city.or(raw.town).or(raw.village),
        district: raw.suburb.or(raw.district),
        country: raw.country,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_city_address() {
        let body = r#"{
            "place_id": 1234,
            "display_name": "Bloemgracht, Jordaan, Centrum, Amsterdam, Nederland",
            "address": {
                "road": "Bloemgracht",
                "neighbourhood": "Jordaan",
                "suburb": "Centrum",
                "city": "Amsterdam",
                "country": "Nederland",
                "country_code": "nl"
            }
        }"#;
        let address = parse_reverse(body).expect("Failed to parse");
        assert_eq!(address.road.as_deref(), Some("Bloemgracht"));
        assert_eq!(address.city.as_deref(), Some("Amsterdam"));
        assert_eq!(address.district.as_deref(), Some("Centrum"));
        assert_eq!(address.country.as_deref(), Some("Nederland"));
    }

    #[test]
    fn falls_back_to_smaller_places() {
        let body = r#"{"address": {"pedestrian": "Kerkpad", "village": "Hel", "district": "Oost"}}"#;
        let address = parse_reverse(body).expect("Failed to parse");
        assert_eq!(address.road.as_deref(), Some("Kerkpad"));
        assert_eq!(address.city.as_deref(), Some("Hel"));
        assert_eq!(address.district.as_deref(), Some("Oost"));
        assert_eq!(address.country, None);
    }

    #[test]
    fn unknown_place_is_empty() {
        let address = parse_reverse(r#"{"error": "Unable to geocode"}"#).expect("Failed to parse");
        assert_eq!(address, Address::default());
    }

    #[test]
    fn url_has_coordinates() {
        let url = reverse_url(Coordinate::new(52.37, 4.89));
        assert!(url.contains("lat=52.370000&lon=4.890000"));
        assert!(url.contains("accept-language=nl"));
    }
}
