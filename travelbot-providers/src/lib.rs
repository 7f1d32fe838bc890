mod config;
mod http;
mod nominatim;
mod openrouteservice;
mod overpass;

pub use config::{NOMINATIM_BASE_URL, ORS_BASE_URL, ORS_DIRECTIONS_URL, OVERPASS_URL};
pub use nominatim::{Nominatim, parse_reverse};
pub use openrouteservice::{OpenRouteService, maneuver_from_code, parse_directions};
pub use overpass::{Overpass, parse_elements, poi_query};
