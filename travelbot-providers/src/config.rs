const fn ors_base_url() -> &'static str {
    if let Some(url) = option_env!("ORS_BASE_URL") {
        url
    } else {
        "https://api.openrouteservice.org"
    }
}

const fn nominatim_base_url() -> &'static str {
    if let Some(url) = option_env!("NOMINATIM_BASE_URL") {
        url
    } else {
        "https://nominatim.openstreetmap.org"
    }
}

const fn overpass_url() -> &'static str {
    if let Some(url) = option_env!("OVERPASS_URL") {
        url
    } else {
        "https://overpass-api.de/api/interpreter"
    }
}

const fn ors_profile() -> &'static str {
    if let Some(profile) = option_env!("ORS_PROFILE") {
        profile
    } else {
        "driving-car"
    }
}

pub const ORS_BASE_URL: &str = ors_base_url();
pub const NOMINATIM_BASE_URL: &str = nominatim_base_url();
pub const OVERPASS_URL: &str = overpass_url();
pub const ORS_PROFILE: &str = ors_profile();

pub const ORS_DIRECTIONS_URL: &str =
    const_str::concat!(ORS_BASE_URL, "/v2/directions/", ORS_PROFILE, "/geojson");
pub const NOMINATIM_REVERSE_URL: &str = const_str::concat!(NOMINATIM_BASE_URL, "/reverse");

/// Nominatim refuses clients without one
pub const USER_AGENT: &str = const_str::concat!("travelbot/", env!("CARGO_PKG_VERSION"));

/// Runtime, so a release build doesn't carry a key
pub const ORS_API_KEY_VAR: &str = "ORS_API_KEY";

/// Language used for provider-written instructions and addresses
pub const LANGUAGE: &str = "nl";
